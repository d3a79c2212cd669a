//! Per-browser session state.
//!
//! A session is created on the first request that carries no known
//! `newsroom_session` cookie and dropped once it has been idle for
//! [`SESSION_TTL`]. The registry is owned by the request loop, so nothing
//! here needs locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "newsroom_session";
pub const SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl FlashLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub text: String,
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    /// Whether this session's visit has gone into the stats.
    pub visit_counted: bool,
    pub authenticated: bool,
    flashes: Vec<Flash>,
    /// Progress lines from the last analysis run, shown once.
    pub last_run: Option<Vec<String>>,
    last_seen: Instant,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            visit_counted: false,
            authenticated: false,
            flashes: Vec::new(),
            last_run: None,
            last_seen: Instant::now(),
        }
    }

    pub fn flash(&mut self, level: FlashLevel, text: impl Into<String>) {
        self.flashes.push(Flash { level, text: text.into() });
    }

    pub fn take_flashes(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.flashes)
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Random v4 UUID, 32 hex characters without hyphens.
    fn next_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Look up the session named by `cookie`, or start a new one. The flag
    /// is true when the session was just created.
    pub fn resolve(&mut self, cookie: Option<&str>) -> (&mut Session, bool) {
        self.prune(SESSION_TTL);

        let known = cookie
            .filter(|id| self.sessions.contains_key(*id))
            .map(str::to_string);
        let (id, created) = match known {
            Some(id) => (id, false),
            None => (Self::next_id(), true),
        };

        let session = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id));
        session.last_seen = Instant::now();
        (session, created)
    }

    pub fn prune(&mut self, ttl: Duration) {
        self.sessions.retain(|_, s| s.last_seen.elapsed() < ttl);
    }
}

/// Extract the session id from a `Cookie` header value.
pub fn session_cookie(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn set_cookie_header(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_then_reuse() {
        let mut registry = SessionRegistry::new();

        let (session, created) = registry.resolve(None);
        assert!(created);
        assert!(!session.visit_counted);
        session.visit_counted = true;
        let id = session.id.clone();

        let (session, created) = registry.resolve(Some(&id));
        assert!(!created);
        assert!(session.visit_counted);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_cookie_starts_fresh_session() {
        let mut registry = SessionRegistry::new();
        let (session, created) = registry.resolve(Some("forged"));
        assert!(created);
        assert_ne!(session.id, "forged");
    }

    #[test]
    fn test_ids_are_unique() {
        let mut registry = SessionRegistry::new();
        let a = registry.resolve(None).0.id.clone();
        let b = registry.resolve(None).0.id.clone();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_ids_do_not_follow_issue_order() {
        // Two registries issuing their first id must not agree.
        let first = SessionRegistry::new().resolve(None).0.id.clone();
        let other = SessionRegistry::new().resolve(None).0.id.clone();
        assert_ne!(first, other);

        let parsed = Uuid::parse_str(&first).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_prune_drops_idle_sessions() {
        let mut registry = SessionRegistry::new();
        registry.resolve(None);
        registry.prune(Duration::ZERO);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_flashes_are_taken_once() {
        let mut registry = SessionRegistry::new();
        let (session, _) = registry.resolve(None);
        session.flash(FlashLevel::Success, "Feed added!");

        assert_eq!(session.take_flashes().len(), 1);
        assert!(session.take_flashes().is_empty());
    }

    #[test]
    fn test_cookie_parsing() {
        assert_eq!(session_cookie("a=1; newsroom_session=abc; b=2"), Some("abc"));
        assert_eq!(session_cookie("newsroom_session="), None);
        assert_eq!(session_cookie("other=1"), None);
    }
}
