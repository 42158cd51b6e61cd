use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use moments_interact::page::NodeId;
use moments_interact::timestamp::TimestampRenderer;
use moments_interact::toggle::RelationState;
use moments_interact::transport::{Method, Request, Response};
use moments_interact::{EventKind, Interactions, PageEvent, PageSnapshot, RequestError, Settings, Transport};

/// Answers from a fixed table keyed by URL; a route may hold a sequence of bodies.
#[derive(Clone, Default)]
struct Server {
    routes: Arc<Mutex<HashMap<String, Vec<(u16, String)>>>>,
    log: Arc<Mutex<Vec<Request>>>,
}

impl Server {
    fn route(self, url: &str, responses: &[(u16, &str)]) -> Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            responses.iter().map(|(s, b)| (*s, b.to_string())).collect(),
        );
        self
    }

    fn hits(&self, method: Method, url: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }
}

impl Transport for Server {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, RequestError>> {
        let mut routes = self.routes.lock().unwrap();
        let response = match routes.get_mut(&request.url) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => (404, String::new()),
        };
        self.log.lock().unwrap().push(request);

        futures::future::ready(Ok(Response {
            status: response.0,
            body: response.1,
        }))
        .boxed()
    }
}

const PAGE: &str = r#"{
    "authenticated": true,
    "csrf_token": "page-token",
    "nodes": [
        { "id": "body" },
        { "id": "badge", "parent": "body", "classes": ["notification-badge"], "data": { "href": "/ajax/notifications-count" }, "visible": false },
        { "id": "card", "parent": "body" },
        { "id": "avatar", "parent": "card", "classes": ["profile-popover"], "data": { "href": "/ajax/profile/42" } },
        { "id": "follow", "parent": "card", "classes": ["btn", "follow-btn"], "data": { "id": "42", "href": "/ajax/follow/alice" } },
        { "id": "follow-label", "parent": "follow", "text": "Follow" },
        { "id": "unfollow", "parent": "card", "classes": ["btn", "unfollow-btn"], "data": { "id": "42", "href": "/ajax/unfollow/alice" }, "visible": false },
        { "id": "followers-count-42", "parent": "card", "text": "7" },
        { "id": "photo", "parent": "body" },
        { "id": "collect", "parent": "photo", "classes": ["collect-btn"], "data": { "id": "9", "href": "/ajax/collect/9" } },
        { "id": "uncollect", "parent": "photo", "classes": ["uncollect-btn"], "data": { "id": "9", "href": "/ajax/uncollect/9" }, "visible": false },
        { "id": "collectors-count-9", "parent": "photo", "text": "2" },
        { "id": "posted", "parent": "photo", "classes": ["timestamp"], "data": { "timestamp": "2024-05-01T08:00:00Z", "mode": "relative tooltip" } },
        { "id": "edited", "parent": "photo", "classes": ["timestamp"], "data": { "timestamp": "2024-05-01T09:30:00Z", "mode": "tooltip" }, "text": "edited" },
        { "id": "tags", "parent": "photo" },
        { "id": "tag-form", "parent": "photo", "visible": false },
        { "id": "tag-btn", "parent": "photo", "classes": ["panel-switch"], "data": { "show": "tag-form", "hide": "tags" } },
        { "id": "cancel-tag", "parent": "tag-form", "classes": ["panel-switch"], "data": { "show": "tags", "hide": "tag-form" } },
        { "id": "delete-photo", "parent": "photo", "classes": ["delete-btn"], "data": { "href": "/delete/photo/9" } },
        { "id": "delete-form", "parent": "body", "classes": ["delete-form"] },
        { "id": "share", "parent": "photo", "data": { "toggle": "tooltip", "title": "Share" } }
    ]
}"#;

fn boot(server: &Server) -> Interactions {
    let snapshot: PageSnapshot = serde_json::from_str(PAGE).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    Interactions::init_with(
        snapshot,
        Settings::default(),
        Arc::new(server.clone()),
        TimestampRenderer::new(Utc, now),
    )
    .unwrap()
}

fn node(page: &Interactions, name: &str) -> NodeId {
    page.page().read(|d| d.find(name).unwrap())
}

fn visible(page: &Interactions, name: &str) -> bool {
    let id = node(page, name);
    page.page().read(|d| d.is_visible(id))
}

fn text(page: &Interactions, name: &str) -> String {
    let id = node(page, name);
    page.page().read(|d| d.text(id).to_string())
}

fn fire(page: &Interactions, kind: EventKind, name: &str) -> Option<tokio::task::JoinHandle<()>> {
    page.dispatch(PageEvent::new(kind, node(page, name)))
}

async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn brief_hover_never_fetches() {
    let server = Server::default().route("/ajax/profile/42", &[(200, "<div>Profile preview</div>")]);
    let page = boot(&server);

    fire(&page, EventKind::PointerEnter, "avatar");
    wait(200).await;
    fire(&page, EventKind::PointerLeave, "avatar");
    wait(2000).await;

    assert_eq!(server.hits(Method::Get, "/ajax/profile/42"), 0);
    let avatar = node(&page, "avatar");
    assert!(page.page().read(|d| d.preview(avatar).is_none()));
}

#[tokio::test(start_paused = true)]
async fn preview_survives_transit_to_widget() {
    let server = Server::default().route("/ajax/profile/42", &[(200, "<div>Profile preview</div>")]);
    let page = boot(&server);
    let avatar = node(&page, "avatar");

    fire(&page, EventKind::PointerEnter, "avatar");
    wait(600).await;
    assert_eq!(
        page.page().read(|d| d.preview(avatar).map(|w| w.content.clone())).as_deref(),
        Some("<div>Profile preview</div>")
    );

    fire(&page, EventKind::PointerLeave, "avatar");
    wait(150).await;
    fire(&page, EventKind::PreviewEnter, "avatar");
    wait(1000).await;
    assert!(page.page().read(|d| d.preview(avatar).is_some()));
}

#[tokio::test(start_paused = true)]
async fn follow_click_on_label() {
    let server = Server::default()
        .route("/ajax/follow/alice", &[(200, r#"{"message":"Followed."}"#)])
        .route("/ajax/followers-count/42", &[(200, r#"{"count":8}"#)]);
    let page = boot(&server);

    fire(&page, EventKind::Click, "follow-label").unwrap().await.unwrap();

    assert!(!visible(&page, "follow"));
    assert!(visible(&page, "unfollow"));
    assert_eq!(text(&page, "followers-count-42"), "8");
    assert_eq!(page.page().read(|d| d.toast().text.clone()), "Followed.");
    assert_eq!(server.hits(Method::Post, "/ajax/follow/alice"), 1);
    assert_eq!(server.hits(Method::Get, "/ajax/followers-count/42"), 1);

    let post = server.log.lock().unwrap().iter().find(|r| r.method == Method::Post).cloned().unwrap();
    assert_eq!(post.headers, vec![("X-CSRF-Token".to_string(), "page-token".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn rejected_collect_leaves_pair_alone() {
    let server = Server::default().route("/ajax/collect/9", &[(400, r#"{"message":"Already collected."}"#)]);
    let page = boot(&server);

    fire(&page, EventKind::Click, "collect").unwrap().await.unwrap();

    assert!(visible(&page, "collect"));
    assert!(!visible(&page, "uncollect"));
    assert_eq!(text(&page, "collectors-count-9"), "2");
    assert_eq!(page.page().read(|d| d.toast().text.clone()), "Already collected.");
}

#[tokio::test(start_paused = true)]
async fn pair_stays_exclusive_through_toggles() {
    let server = Server::default()
        .route("/ajax/collect/9", &[(200, r#"{"message":"Photo collected."}"#)])
        .route("/ajax/uncollect/9", &[(200, r#"{"message":"Collect canceled."}"#)])
        .route("/ajax/collectors-count/9", &[(200, r#"{"count":3}"#), (200, r#"{"count":2}"#), (200, r#"{"count":3}"#)]);
    let page = boot(&server);

    for name in ["collect", "uncollect", "collect", "collect"] {
        fire(&page, EventKind::Click, name).unwrap().await.unwrap();
        assert_ne!(visible(&page, "collect"), visible(&page, "uncollect"));
    }
    assert!(visible(&page, "uncollect"));
    assert_eq!(page.toggles().state_of(node(&page, "collect")), Some(RelationState::Active));
    assert_eq!(text(&page, "collectors-count-9"), "3");
}

#[tokio::test(start_paused = true)]
async fn unread_badge_follows_polls() {
    let server = Server::default().route("/ajax/notifications-count", &[(200, r#"{"count":0}"#), (200, r#"{"count":3}"#)]);
    let page = boot(&server);

    wait(30_100).await;
    assert!(!visible(&page, "badge"));

    wait(30_000).await;
    assert!(visible(&page, "badge"));
    assert_eq!(text(&page, "badge"), "3");
}

#[tokio::test(start_paused = true)]
async fn timestamps_rendered_at_boot() {
    let server = Server::default();
    let page = boot(&server);

    let posted = node(&page, "posted");
    assert_eq!(text(&page, "posted"), "2 hours ago");
    assert_eq!(page.page().read(|d| d.tooltip(posted).map(str::to_string)).as_deref(), Some("May 1, 2024 8:00 AM"));

    let edited = node(&page, "edited");
    assert_eq!(text(&page, "edited"), "edited");
    assert_eq!(page.page().read(|d| d.tooltip(edited).map(str::to_string)).as_deref(), Some("May 1, 2024 9:30 AM"));
}

#[tokio::test]
async fn page_local_widgets() {
    let server = Server::default();
    let page = boot(&server);

    assert!(fire(&page, EventKind::Click, "tag-btn").is_none());
    assert!(!visible(&page, "tags"));
    assert!(visible(&page, "tag-form"));
    fire(&page, EventKind::Click, "cancel-tag");
    assert!(visible(&page, "tags"));
    assert!(!visible(&page, "tag-form"));

    fire(&page, EventKind::Click, "delete-photo");
    let form = node(&page, "delete-form");
    assert_eq!(page.page().read(|d| d.data(form, "action").map(str::to_string)).as_deref(), Some("/delete/photo/9"));

    let share = node(&page, "share");
    assert_eq!(page.page().read(|d| d.tooltip(share).map(str::to_string)).as_deref(), Some("Share"));
    assert!(server.log.lock().unwrap().is_empty());
}
