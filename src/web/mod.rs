//! The reader and admin dashboard.
//!
//! Requests are turned into [`WebRequest`]s, handled one at a time by
//! [`Dashboard::handle`], and the resulting [`WebResponse`] is written back
//! through `tiny_http`. Admin actions use post/redirect/get with flash
//! messages carried in the session.

pub mod render;
pub mod session;

use std::collections::HashMap;
use std::io::{Cursor, Read as _};

use tiny_http::{Header, Method, Request, Response, Server};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::feed::FeedSource;
use crate::newsroom::{AnalysisStatus, FeedEdit, Newsroom};
use crate::report::Summarizer;

use render::{AdminTab, Chrome, View};
use session::{session_cookie, set_cookie_header, FlashLevel, Session, SessionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Other,
}

/// A request reduced to what the dashboard looks at.
#[derive(Debug, Clone)]
pub struct WebRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
    pub cookie: Option<String>,
}

impl WebRequest {
    pub fn get(target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method: HttpMethod::Get,
            path,
            query,
            form: HashMap::new(),
            cookie: None,
        }
    }

    pub fn post(path: &str, body: &str) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.to_string(),
            query: HashMap::new(),
            form: parse_urlencoded(body),
            cookie: None,
        }
    }

    pub fn with_cookie(mut self, session_id: &str) -> Self {
        self.cookie = Some(session_id.to_string());
        self
    }

    fn from_tiny(request: &mut Request) -> Result<Self> {
        let method = match request.method() {
            Method::Get | Method::Head => HttpMethod::Get,
            Method::Post => HttpMethod::Post,
            _ => HttpMethod::Other,
        };
        let (path, query) = split_target(request.url());

        let cookie = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Cookie"))
            .and_then(|h| session_cookie(h.value.as_str()))
            .map(str::to_string);

        let mut body = String::new();
        if method == HttpMethod::Post {
            request
                .as_reader()
                .read_to_string(&mut body)
                .map_err(|e| Error::Invalid(format!("Unreadable request body: {}", e)))?;
        }

        Ok(Self {
            method,
            path,
            query,
            form: parse_urlencoded(&body),
            cookie,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebBody {
    Html { status: u16, html: String },
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct WebResponse {
    pub body: WebBody,
    pub set_cookie: Option<String>,
}

impl WebResponse {
    fn html(status: u16, html: String) -> Self {
        Self { body: WebBody::Html { status, html }, set_cookie: None }
    }

    fn redirect(location: &str) -> Self {
        Self { body: WebBody::Redirect(location.to_string()), set_cookie: None }
    }

    pub fn status(&self) -> u16 {
        match &self.body {
            WebBody::Html { status, .. } => *status,
            WebBody::Redirect(_) => 303,
        }
    }

    pub fn html_body(&self) -> Option<&str> {
        match &self.body {
            WebBody::Html { html, .. } => Some(html),
            WebBody::Redirect(_) => None,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match &self.body {
            WebBody::Redirect(location) => Some(location),
            WebBody::Html { .. } => None,
        }
    }

    fn into_tiny(self) -> Response<Cursor<Vec<u8>>> {
        let (status, data, extra) = match self.body {
            WebBody::Html { status, html } => {
                (status, html.into_bytes(), header("Content-Type", "text/html; charset=utf-8"))
            }
            WebBody::Redirect(location) => (303, Vec::new(), header("Location", &location)),
        };

        let mut response = Response::from_data(data).with_status_code(status);
        if let Some(h) = extra {
            response = response.with_header(h);
        }
        if let Some(h) = self.set_cookie.and_then(|c| header("Set-Cookie", &c)) {
            response = response.with_header(h);
        }
        response
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(input.as_bytes())
        .into_owned()
        .collect()
}

fn split_target(target: &str) -> (String, HashMap<String, String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_urlencoded(query)),
        None => (target.to_string(), HashMap::new()),
    }
}

/// The dashboard: one newsroom, the admin credentials, and the sessions of
/// everyone currently looking at it.
pub struct Dashboard<S, M> {
    newsroom: Newsroom<S, M>,
    credentials: Credentials,
    sessions: SessionRegistry,
}

impl<S: FeedSource, M: Summarizer> Dashboard<S, M> {
    pub fn new(newsroom: Newsroom<S, M>, credentials: Credentials) -> Self {
        Self {
            newsroom,
            credentials,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn newsroom(&self) -> &Newsroom<S, M> {
        &self.newsroom
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub async fn handle(&mut self, request: WebRequest) -> WebResponse {
        let (session, created) = self.sessions.resolve(request.cookie.as_deref());
        let routes = Routes { newsroom: &self.newsroom, credentials: &self.credentials };

        if !session.visit_counted {
            routes.newsroom.record_visit().await;
            session.visit_counted = true;
        }

        debug!("{:?} {}", request.method, request.path);
        let mut response = routes.dispatch(&request, session).await;
        if created {
            response.set_cookie = Some(set_cookie_header(&session.id));
        }
        response
    }
}

struct Routes<'a, S, M> {
    newsroom: &'a Newsroom<S, M>,
    credentials: &'a Credentials,
}

impl<'a, S: FeedSource, M: Summarizer> Routes<'a, S, M> {
    async fn dispatch(&self, request: &WebRequest, session: &mut Session) -> WebResponse {
        let path = request.path.trim_end_matches('/');
        let path = if path.is_empty() { "/" } else { path };

        match (request.method, path) {
            (HttpMethod::Get, "/") | (HttpMethod::Get, "/newsroom") => {
                self.newsroom_page(request.query.get("date").map(String::as_str), session).await
            }
            (HttpMethod::Get, "/admin") => {
                let tab = AdminTab::from_query(request.query.get("tab").map(String::as_str));
                self.admin_page(tab, session).await
            }
            (HttpMethod::Post, "/admin/login") => {
                let password = request.form.get("password").map(String::as_str).unwrap_or("");
                self.login(password, session)
            }
            (HttpMethod::Post, "/admin/logout") => {
                session.authenticated = false;
                WebResponse::redirect("/")
            }
            (HttpMethod::Post, _) if path.starts_with("/admin/") && !session.authenticated => {
                WebResponse::redirect("/admin")
            }
            (HttpMethod::Post, "/admin/analysis") => self.run_analysis(session).await,
            (HttpMethod::Post, "/admin/feeds/add") => {
                let url = request.form.get("url").map(String::as_str).unwrap_or("");
                self.add_feed(url, session).await
            }
            (HttpMethod::Post, "/admin/feeds/remove") => {
                let url = request.form.get("url").map(String::as_str);
                let index = request.form.get("index").and_then(|i| i.parse::<usize>().ok());
                self.remove_feed(url, index, session).await
            }
            _ => WebResponse::html(404, self.page("Not found", View::Newsroom, session, Vec::new(), "<h1>Not found</h1>")),
        }
    }

    fn page(&self, title: &str, view: View, session: &mut Session, notices: Vec<String>, body: &str) -> String {
        let chrome = Chrome {
            view,
            model_name: self.newsroom.generator().model().model_name(),
            authenticated: session.authenticated,
            flashes: session.take_flashes(),
            notices,
        };
        render::layout(title, chrome, body)
    }

    async fn newsroom_page(&self, date: Option<&str>, session: &mut Session) -> WebResponse {
        let archive = self.newsroom.archive().await;
        let body = render::newsroom_body(&archive.doc, date);
        let notices = archive.notice.into_iter().collect();
        WebResponse::html(200, self.page("Newsroom", View::Newsroom, session, notices, &body))
    }

    async fn admin_page(&self, tab: AdminTab, session: &mut Session) -> WebResponse {
        if !session.authenticated {
            let body = render::login_body();
            return WebResponse::html(200, self.page("Admin", View::Admin, session, Vec::new(), &body));
        }

        let mut notices = Vec::new();
        let content = match tab {
            AdminTab::Analysis => {
                render::analysis_tab(self.newsroom.window_days(), session.last_run.take().as_deref())
            }
            AdminTab::Feeds => {
                let feeds = self.newsroom.feeds().await;
                notices.extend(feeds.notice);
                render::feeds_tab(&feeds.doc)
            }
            AdminTab::Stats => {
                let stats = self.newsroom.stats().await;
                notices.extend(stats.notice);
                render::stats_tab(&stats.doc)
            }
        };

        let body = render::admin_body(tab, &content);
        WebResponse::html(200, self.page("Admin", View::Admin, session, notices, &body))
    }

    fn login(&self, password: &str, session: &mut Session) -> WebResponse {
        if self.credentials.check_admin_password(password) {
            info!("Admin session {} authenticated", &session.id[..8.min(session.id.len())]);
            session.authenticated = true;
            return WebResponse::redirect("/admin");
        }

        warn!("Rejected admin login attempt");
        session.flash(FlashLevel::Error, "Incorrect password.");
        let body = render::login_body();
        WebResponse::html(200, self.page("Admin", View::Admin, session, Vec::new(), &body))
    }

    async fn run_analysis(&self, session: &mut Session) -> WebResponse {
        let outcome = self.newsroom.run_analysis().await;

        for notice in &outcome.notices {
            session.flash(FlashLevel::Warning, notice.clone());
        }
        match &outcome.status {
            AnalysisStatus::NoFeeds => {
                session.flash(FlashLevel::Warning, "No feeds configured.");
            }
            AnalysisStatus::Completed { date, articles, .. } => {
                session.flash(
                    FlashLevel::Success,
                    format!("Analysis complete: report for {} built from {} articles.", date, articles),
                );
            }
        }
        session.last_run = Some(outcome.steps);
        WebResponse::redirect("/admin?tab=analysis")
    }

    fn flash_sync_failure(&self, synced: Option<bool>, session: &mut Session) {
        if synced == Some(false) && !self.newsroom.store().is_local_only() {
            session.flash(FlashLevel::Warning, "Saved locally only; remote sync failed.");
        }
    }

    async fn add_feed(&self, url: &str, session: &mut Session) -> WebResponse {
        let change = self.newsroom.add_feed(url).await;
        if let Some(notice) = change.notice {
            session.flash(FlashLevel::Warning, notice);
        }

        match change.edit {
            FeedEdit::Added => session.flash(FlashLevel::Success, "Feed added!"),
            FeedEdit::Duplicate => session.flash(FlashLevel::Warning, "Feed already exists."),
            FeedEdit::Empty => session.flash(FlashLevel::Warning, "Please enter a URL."),
            FeedEdit::Invalid(reason) => session.flash(FlashLevel::Error, reason),
            FeedEdit::Removed(_) | FeedEdit::Missing => {}
        }
        self.flash_sync_failure(change.synced, session);
        WebResponse::redirect("/admin?tab=feeds")
    }

    /// The posted URL names the feed; the index is only used when a form
    /// carries no URL, since positions shift when the list changes.
    async fn remove_feed(&self, url: Option<&str>, index: Option<usize>, session: &mut Session) -> WebResponse {
        let url = url.map(str::trim).filter(|u| !u.is_empty());
        let change = match (url, index) {
            (Some(url), index) => {
                debug!("Removing feed {} (form index {:?})", url, index);
                self.newsroom.remove_feed(url).await
            }
            (None, Some(index)) => self.newsroom.remove_feed_at(index).await,
            (None, None) => {
                session.flash(FlashLevel::Error, "No feed selected.");
                return WebResponse::redirect("/admin?tab=feeds");
            }
        };
        if let Some(notice) = change.notice {
            session.flash(FlashLevel::Warning, notice);
        }
        match change.edit {
            FeedEdit::Removed(url) => session.flash(FlashLevel::Success, format!("Removed {}", url)),
            _ => session.flash(FlashLevel::Warning, "That feed is no longer in the list."),
        }
        self.flash_sync_failure(change.synced, session);
        WebResponse::redirect("/admin?tab=feeds")
    }
}

/// Run the dashboard on `bind` until the listener shuts down. Requests are
/// served one at a time on a blocking thread; async work is driven through
/// the current runtime.
pub async fn serve<S, M>(dashboard: Dashboard<S, M>, bind: &str) -> Result<()>
where
    S: FeedSource + 'static,
    M: Summarizer + 'static,
{
    let server = Server::http(bind).map_err(|e| Error::Server(format!("Failed to bind {}: {}", bind, e)))?;
    info!("Dashboard listening on http://{}", bind);

    let runtime = Handle::current();
    tokio::task::spawn_blocking(move || {
        let mut dashboard = dashboard;
        for mut request in server.incoming_requests() {
            let response = match WebRequest::from_tiny(&mut request) {
                Ok(web_request) => runtime.block_on(dashboard.handle(web_request)),
                Err(e) => WebResponse::html(400, render::escape(&e.to_string())),
            };
            if let Err(e) = request.respond(response.into_tiny()) {
                warn!("Failed to write response: {}", e);
            }
        }
    })
    .await
    .map_err(|e| Error::Server(format!("Request loop stopped: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secrets;
    use crate::error::Error;
    use crate::feed::ingestor::FeedIngestor;
    use crate::feed::{ParsedEntry, ParsedFeed};
    use crate::report::ReportGenerator;
    use crate::storage::{DocumentStore, LocalFiles, MemoryRemote};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct OneFeed;

    #[async_trait]
    impl FeedSource for OneFeed {
        async fn fetch_feed(&self, url: &str) -> Result<ParsedFeed> {
            if !url.starts_with("https://news.test/") {
                return Err(Error::FeedParse(format!("no feed at {}", url)));
            }
            Ok(ParsedFeed {
                title: "News".to_string(),
                description: None,
                link: None,
                entries: vec![ParsedEntry {
                    title: "Chip launch".to_string(),
                    link: "https://news.test/chip".to_string(),
                    summary: Some("A new chip".to_string()),
                    content: None,
                    published: Some(Utc::now() - Duration::hours(5)),
                    updated: None,
                }],
            })
        }
    }

    #[derive(Default)]
    struct CannedModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Summarizer for CannedModel {
        async fn generate_content(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            Ok("## Semiconductors\n\nChip launch [Link](https://news.test/chip)".to_string())
        }

        fn model_name(&self) -> &str {
            "canned-model"
        }
    }

    struct Harness {
        dashboard: Dashboard<OneFeed, Arc<CannedModel>>,
        remote: MemoryRemote,
        model: Arc<CannedModel>,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let (store, remote) = DocumentStore::in_memory(LocalFiles::new(dir.path()));
        let model = Arc::new(CannedModel::default());
        let newsroom = Newsroom::new(store, FeedIngestor::new(OneFeed), ReportGenerator::new(model.clone()), 3);

        let credentials = Secrets {
            github_token: Some("t".to_string()),
            repo_name: Some("owner/news".to_string()),
            gemini_api_key: Some("k".to_string()),
            admin_password: Some("hunter2".to_string()),
        }
        .require()
        .unwrap();

        Harness { dashboard: Dashboard::new(newsroom, credentials), remote, model, _dir: dir }
    }

    fn cookie_of(response: &WebResponse) -> String {
        let header = response.set_cookie.as_deref().expect("new session sets a cookie");
        session_cookie(header.split(';').next().unwrap()).unwrap().to_string()
    }

    async fn login(h: &mut Harness) -> String {
        let first = h.dashboard.handle(WebRequest::get("/")).await;
        let sid = cookie_of(&first);
        let response = h
            .dashboard
            .handle(WebRequest::post("/admin/login", "password=hunter2").with_cookie(&sid))
            .await;
        assert_eq!(response.location(), Some("/admin"));
        sid
    }

    #[tokio::test]
    async fn test_visit_counted_once_per_session() {
        let mut h = harness();

        let first = h.dashboard.handle(WebRequest::get("/")).await;
        let sid = cookie_of(&first);
        assert!(first.html_body().unwrap().contains("No news report has been generated yet"));

        let again = h.dashboard.handle(WebRequest::get("/newsroom").with_cookie(&sid)).await;
        assert!(again.set_cookie.is_none());

        let stats = h.dashboard.newsroom().stats().await.doc;
        assert_eq!(stats.total_views, 1);

        h.dashboard.handle(WebRequest::get("/")).await;
        let stats = h.dashboard.newsroom().stats().await.doc;
        assert_eq!(stats.total_views, 2);
    }

    #[tokio::test]
    async fn test_wrong_password_stays_on_login() {
        let mut h = harness();
        let response = h.dashboard.handle(WebRequest::post("/admin/login", "password=nope")).await;

        assert_eq!(response.status(), 200);
        let html = response.html_body().unwrap();
        assert!(html.contains("Incorrect password."));
        assert!(html.contains(r#"name="password""#));
    }

    #[tokio::test]
    async fn test_admin_actions_require_login() {
        let mut h = harness();
        let response = h
            .dashboard
            .handle(WebRequest::post("/admin/feeds/add", "url=https%3A%2F%2Fnews.test%2Frss"))
            .await;

        assert_eq!(response.location(), Some("/admin"));
        assert!(h.dashboard.newsroom().feeds().await.doc.is_empty());
    }

    #[tokio::test]
    async fn test_feed_management_flow() {
        let mut h = harness();
        let sid = login(&mut h).await;

        let add = WebRequest::post("/admin/feeds/add", "url=https%3A%2F%2Fnews.test%2Frss").with_cookie(&sid);
        h.dashboard.handle(add.clone()).await;
        let page = h.dashboard.handle(WebRequest::get("/admin?tab=feeds").with_cookie(&sid)).await;
        let html = page.html_body().unwrap();
        assert!(html.contains("Feed added!"));
        assert!(html.contains("https://news.test/rss"));

        h.dashboard.handle(add).await;
        let page = h.dashboard.handle(WebRequest::get("/admin?tab=feeds").with_cookie(&sid)).await;
        assert!(page.html_body().unwrap().contains("Feed already exists."));
        assert_eq!(h.dashboard.newsroom().feeds().await.doc.len(), 1);

        h.dashboard
            .handle(WebRequest::post("/admin/feeds/add", "url=+").with_cookie(&sid))
            .await;
        let page = h.dashboard.handle(WebRequest::get("/admin?tab=feeds").with_cookie(&sid)).await;
        assert!(page.html_body().unwrap().contains("Please enter a URL."));

        h.dashboard
            .handle(WebRequest::post("/admin/feeds/remove", "index=0").with_cookie(&sid))
            .await;
        assert!(h.dashboard.newsroom().feeds().await.doc.is_empty());

        let messages: Vec<_> = h
            .remote
            .commits()
            .into_iter()
            .map(|c| c.message)
            .filter(|m| !m.starts_with("Update stats"))
            .collect();
        assert_eq!(messages, vec!["Add feed URL", "Remove feed URL"]);
    }

    #[tokio::test]
    async fn test_remove_uses_posted_url_over_stale_index() {
        let mut h = harness();
        let sid = login(&mut h).await;
        h.dashboard.newsroom().add_feed("https://news.test/a").await;
        h.dashboard.newsroom().add_feed("https://news.test/b").await;

        // Rendered when b sat at position 0; a has since been added in front.
        let form = "index=0&url=https%3A%2F%2Fnews.test%2Fb";
        h.dashboard
            .handle(WebRequest::post("/admin/feeds/remove", form).with_cookie(&sid))
            .await;

        let feeds = h.dashboard.newsroom().feeds().await.doc;
        assert_eq!(feeds.urls(), ["https://news.test/a".to_string()]);
        let page = h.dashboard.handle(WebRequest::get("/admin?tab=feeds").with_cookie(&sid)).await;
        assert!(page.html_body().unwrap().contains("Removed https://news.test/b"));
    }

    #[tokio::test]
    async fn test_analysis_publishes_report() {
        let mut h = harness();
        let sid = login(&mut h).await;

        h.dashboard
            .handle(WebRequest::post("/admin/feeds/add", "url=https%3A%2F%2Fnews.test%2Frss").with_cookie(&sid))
            .await;
        let run = h
            .dashboard
            .handle(WebRequest::post("/admin/analysis", "").with_cookie(&sid))
            .await;
        assert_eq!(run.location(), Some("/admin?tab=analysis"));
        assert_eq!(h.model.prompts.lock().len(), 1);

        let log = h.dashboard.handle(WebRequest::get("/admin").with_cookie(&sid)).await;
        let html = log.html_body().unwrap();
        assert!(html.contains("Found 1 articles from the last 3 days."));
        assert!(html.contains("Analysis complete"));

        let newsroom = h.dashboard.handle(WebRequest::get("/").with_cookie(&sid)).await;
        let html = newsroom.html_body().unwrap();
        assert!(html.contains("<h2>Semiconductors</h2>"));
        assert!(html.contains("Powered by canned-model"));
    }

    #[tokio::test]
    async fn test_analysis_without_feeds() {
        let mut h = harness();
        let sid = login(&mut h).await;

        h.dashboard
            .handle(WebRequest::post("/admin/analysis", "").with_cookie(&sid))
            .await;
        let page = h.dashboard.handle(WebRequest::get("/admin").with_cookie(&sid)).await;

        assert!(page.html_body().unwrap().contains("No feeds configured."));
        assert!(h.model.prompts.lock().is_empty());
        assert!(h.dashboard.newsroom().archive().await.doc.is_empty());
    }

    #[tokio::test]
    async fn test_stats_tab_after_visits() {
        let mut h = harness();
        let sid = login(&mut h).await;

        let page = h.dashboard.handle(WebRequest::get("/admin?tab=stats").with_cookie(&sid)).await;
        let html = page.html_body().unwrap();
        assert!(html.contains(r#"<p class="metric">1</p>"#));
        assert!(html.contains("<polyline"));
    }

    #[tokio::test]
    async fn test_logout_and_unknown_route() {
        let mut h = harness();
        let sid = login(&mut h).await;

        let out = h.dashboard.handle(WebRequest::post("/admin/logout", "").with_cookie(&sid)).await;
        assert_eq!(out.location(), Some("/"));
        let admin = h.dashboard.handle(WebRequest::get("/admin").with_cookie(&sid)).await;
        assert!(admin.html_body().unwrap().contains(r#"name="password""#));

        let missing = h.dashboard.handle(WebRequest::get("/nowhere").with_cookie(&sid)).await;
        assert_eq!(missing.status(), 404);
    }

    #[test]
    fn test_split_target() {
        let (path, query) = split_target("/newsroom?date=2024-03-15&x=a%20b");
        assert_eq!(path, "/newsroom");
        assert_eq!(query.get("date").map(String::as_str), Some("2024-03-15"));
        assert_eq!(query.get("x").map(String::as_str), Some("a b"));
    }
}
