use crate::page::PageSnapshot;

/// Page-scoped session values, fixed for the lifetime of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub authenticated: bool,
    pub csrf_token: String,
}

impl PageContext {
    pub fn from_snapshot(snapshot: &PageSnapshot) -> Self {
        Self {
            authenticated: snapshot.authenticated,
            csrf_token: snapshot.csrf_token.clone(),
        }
    }
}
