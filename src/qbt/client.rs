use super::backend::{select_backend, WebResponse, WebUiBackend};
use super::types::{Category, ConnectionState, FeedInfo, QbtError};
use crate::config::ConnectionSettings;
use crate::pathgen::{validate_save_path, FilesystemMode};
use crate::rules::RssRule;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Endpoints tried in order when listing RSS feeds; older servers lack `rss/items`
const FEED_ENDPOINTS: &[&str] = &["/rss/items", "/rss/rootItems", "/rss/tree"];

/// qBittorrent WebUI API v2 client
pub struct QbtClient {
    backend: Box<dyn WebUiBackend>,
    settings: ConnectionSettings,
    state: ConnectionState,
    filesystem_mode: FilesystemMode,
}

impl QbtClient {
    /// Create a client using the backend chosen by `settings.strategy`
    pub fn new(settings: &ConnectionSettings) -> Result<Self, QbtError> {
        let backend = select_backend(settings)?;
        Ok(Self::with_backend(settings, backend))
    }

    pub fn with_backend(settings: &ConnectionSettings, backend: Box<dyn WebUiBackend>) -> Self {
        debug!(backend = backend.name(), url = %settings.base_url(), "Created WebUI client");
        Self {
            backend,
            settings: settings.clone(),
            state: ConnectionState::Disconnected,
            filesystem_mode: FilesystemMode::default(),
        }
    }

    /// Filesystem rules used to vet save paths before upload
    pub fn with_filesystem_mode(mut self, mode: FilesystemMode) -> Self {
        self.filesystem_mode = mode;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Log in. On any failure the client is left disconnected.
    pub fn connect(&mut self) -> Result<(), QbtError> {
        if !self.settings.is_configured() {
            return Err(QbtError::NotConfigured);
        }

        self.state = ConnectionState::Authenticating;
        info!(
            url = %self.settings.base_url(),
            backend = self.backend.name(),
            "Logging in to qBittorrent"
        );

        let result = self.login();
        self.state = match &result {
            Ok(()) => ConnectionState::Connected,
            Err(e) => {
                warn!("Login failed: {}", e);
                self.backend.clear_session();
                ConnectionState::Disconnected
            }
        };
        result
    }

    fn login(&mut self) -> Result<(), QbtError> {
        let response = self.backend.post_form(
            "/auth/login",
            &[
                ("username", self.settings.username.as_str()),
                ("password", self.settings.password.as_str()),
            ],
        )?;

        let body = response.body.trim();
        if response.status == 403 {
            return Err(QbtError::Banned);
        }
        if body.eq_ignore_ascii_case("fails.") {
            return Err(QbtError::BadCredentials);
        }
        if !response.is_success() {
            return Err(http_error("/auth/login", &response));
        }
        if !body.eq_ignore_ascii_case("ok.") {
            return Err(QbtError::InvalidResponse {
                endpoint: "/auth/login".to_string(),
                message: format!("unexpected login reply '{}'", body),
            });
        }

        debug!(has_sid = response.sid.is_some(), "Login accepted");
        self.backend.set_session(response.sid);
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), QbtError> {
        if self.state == ConnectionState::Connected {
            Ok(())
        } else {
            Err(QbtError::NotConnected)
        }
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<WebResponse, QbtError> {
        self.ensure_connected()?;
        debug!(endpoint = %path, "GET");
        let response = self.backend.get(path, query)?;
        check_status(path, response)
    }

    fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<WebResponse, QbtError> {
        self.ensure_connected()?;
        debug!(endpoint = %path, "POST");
        let response = self.backend.post_form(path, form)?;
        check_status(path, response)
    }

    pub fn get_version(&self) -> Result<String, QbtError> {
        let response = self.get("/app/version", &[])?;
        Ok(response.body.trim().to_string())
    }

    pub fn get_preferences(&self) -> Result<Value, QbtError> {
        let response = self.get("/app/preferences", &[])?;
        parse_json("/app/preferences", &response.body)
    }

    /// All server rules, sorted by name. Malformed entries are skipped with a warning.
    pub fn get_rules(&self) -> Result<Vec<RssRule>, QbtError> {
        let response = self.get("/rss/rules", &[])?;
        let value = parse_json("/rss/rules", &response.body)?;

        let Value::Object(map) = value else {
            return Err(QbtError::InvalidResponse {
                endpoint: "/rss/rules".to_string(),
                message: "expected an object keyed by rule name".to_string(),
            });
        };

        let mut rules = Vec::with_capacity(map.len());
        for (name, def) in map {
            match RssRule::from_wire(&name, def) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!("Ignoring unreadable server rule '{}': {}", name, e),
            }
        }
        rules.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(count = rules.len(), "Fetched RSS rules");
        Ok(rules)
    }

    /// Create or replace a rule on the server
    pub fn set_rule(&self, rule: &RssRule) -> Result<(), QbtError> {
        let name = rule.name.trim();
        if name.is_empty() {
            return Err(QbtError::InvalidRule {
                name: rule.name.clone(),
                reason: "rule name is empty".to_string(),
            });
        }
        if let Err(e) = validate_save_path(&rule.save_path, self.filesystem_mode) {
            return Err(QbtError::InvalidRule {
                name: name.to_string(),
                reason: e.to_string(),
            });
        }

        let rule_def = rule.to_wire().to_string();
        self.post("/rss/setRule", &[("ruleName", name), ("ruleDef", &rule_def)])?;
        info!(name = %name, "Uploaded rule");
        Ok(())
    }

    pub fn remove_rule(&self, name: &str) -> Result<(), QbtError> {
        self.post("/rss/removeRule", &[("ruleName", name)])?;
        info!(name = %name, "Removed rule");
        Ok(())
    }

    pub fn get_categories(&self) -> Result<BTreeMap<String, Category>, QbtError> {
        let response = self.get("/torrents/categories", &[])?;
        let value = parse_json("/torrents/categories", &response.body)?;
        serde_json::from_value(value).map_err(|e| QbtError::InvalidResponse {
            endpoint: "/torrents/categories".to_string(),
            message: e.to_string(),
        })
    }

    /// Registered feeds, flattened from the RSS folder tree and sorted by path
    pub fn get_feeds(&self) -> Result<Vec<FeedInfo>, QbtError> {
        let mut last_error = None;

        for endpoint in FEED_ENDPOINTS {
            match self.get(endpoint, &[("withData", "false")]) {
                Ok(response) => {
                    let value = parse_json(endpoint, &response.body)?;
                    let mut feeds = Vec::new();
                    collect_feeds(&value, "", &mut feeds);
                    feeds.sort_by(|a, b| a.path.cmp(&b.path));
                    debug!(endpoint = %endpoint, count = feeds.len(), "Fetched RSS feeds");
                    return Ok(feeds);
                }
                Err(QbtError::Http { status, .. }) if status == 404 || status == 405 => {
                    debug!(endpoint = %endpoint, status, "Feed endpoint unavailable, trying next");
                    last_error = Some(QbtError::Http {
                        endpoint: endpoint.to_string(),
                        status,
                        message: "not supported by this server".to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(QbtError::NotConnected))
    }

    /// Register a feed. A feed that already exists counts as success.
    pub fn add_feed(&self, url: &str, path: Option<&str>) -> Result<(), QbtError> {
        let mut form = vec![("url", url)];
        if let Some(path) = path.filter(|p| !p.trim().is_empty()) {
            form.push(("path", path));
        }

        match self.post("/rss/addFeed", &form) {
            Ok(_) => {
                info!(url = %url, "Added RSS feed");
                Ok(())
            }
            Err(QbtError::Http { status: 409, .. }) => {
                debug!(url = %url, "Feed already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Log out and drop the session
    pub fn close(&mut self) -> Result<(), QbtError> {
        if self.state != ConnectionState::Connected {
            return Ok(());
        }

        let result = self
            .backend
            .post_form("/auth/logout", &[])
            .and_then(|response| check_status("/auth/logout", response))
            .map(|_| ());

        self.backend.clear_session();
        self.state = ConnectionState::Disconnected;
        debug!("Logged out");
        result
    }
}

fn http_error(endpoint: &str, response: &WebResponse) -> QbtError {
    let message = response.body.trim();
    QbtError::Http {
        endpoint: endpoint.to_string(),
        status: response.status,
        message: if message.is_empty() {
            "no details".to_string()
        } else {
            message.chars().take(200).collect()
        },
    }
}

fn check_status(endpoint: &str, response: WebResponse) -> Result<WebResponse, QbtError> {
    match response.status {
        200..=299 => Ok(response),
        403 => Err(QbtError::Forbidden),
        _ => Err(http_error(endpoint, &response)),
    }
}

fn parse_json(endpoint: &str, body: &str) -> Result<Value, QbtError> {
    serde_json::from_str(body).map_err(|e| QbtError::InvalidResponse {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// Walk the RSS tree: objects carrying a `url` are feeds, everything else is a folder
fn collect_feeds(node: &Value, prefix: &str, out: &mut Vec<FeedInfo>) {
    let Value::Object(map) = node else {
        return;
    };

    for (name, child) in map {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}\\{}", prefix, name)
        };

        match child {
            Value::Object(obj) => match obj.get("url").and_then(Value::as_str) {
                Some(url) => out.push(FeedInfo {
                    path,
                    url: url.to_string(),
                }),
                None => collect_feeds(child, &path, out),
            },
            // Very old servers list feeds as "name": "url"
            Value::String(url) => out.push(FeedInfo {
                path,
                url: url.clone(),
            }),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(String, Vec<(String, String)>)>>>;

    /// Scripted backend: replies are consumed in order, requests are logged
    struct ScriptedBackend {
        replies: RefCell<VecDeque<Result<WebResponse, QbtError>>>,
        log: Log,
        sid: Rc<RefCell<Option<String>>>,
    }

    impl ScriptedBackend {
        fn next(&self, path: &str, params: &[(&str, &str)]) -> Result<WebResponse, QbtError> {
            self.log.borrow_mut().push((
                path.to_string(),
                params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(reply(500, "script exhausted")))
        }
    }

    impl WebUiBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<WebResponse, QbtError> {
            self.next(path, query)
        }

        fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<WebResponse, QbtError> {
            self.next(path, form)
        }

        fn set_session(&mut self, sid: Option<String>) {
            *self.sid.borrow_mut() = sid;
        }

        fn clear_session(&mut self) {
            *self.sid.borrow_mut() = None;
        }
    }

    fn reply(status: u16, body: &str) -> WebResponse {
        WebResponse {
            status,
            body: body.to_string(),
            sid: None,
        }
    }

    fn client_with(
        replies: Vec<Result<WebResponse, QbtError>>,
    ) -> (QbtClient, Log, Rc<RefCell<Option<String>>>) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sid = Rc::new(RefCell::new(None));
        let backend = ScriptedBackend {
            replies: RefCell::new(replies.into()),
            log: log.clone(),
            sid: sid.clone(),
        };
        let client = QbtClient::with_backend(&ConnectionSettings::default(), Box::new(backend))
            .with_filesystem_mode(FilesystemMode::Posix);
        (client, log, sid)
    }

    fn login_ok() -> Result<WebResponse, QbtError> {
        Ok(WebResponse {
            status: 200,
            body: "Ok.".to_string(),
            sid: Some("s3cr3t".to_string()),
        })
    }

    #[test]
    fn test_connect_success() {
        let (mut client, log, sid) = client_with(vec![login_ok()]);

        client.connect().unwrap();
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(sid.borrow().as_deref(), Some("s3cr3t"));

        let log = log.borrow();
        assert_eq!(log[0].0, "/auth/login");
        assert!(log[0].1.contains(&("username".to_string(), "admin".to_string())));
    }

    #[test]
    fn test_connect_bad_credentials() {
        let (mut client, _, _) = client_with(vec![Ok(reply(200, "Fails."))]);
        assert!(matches!(client.connect(), Err(QbtError::BadCredentials)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_banned() {
        let (mut client, _, _) = client_with(vec![Ok(reply(403, "Forbidden"))]);
        assert!(matches!(client.connect(), Err(QbtError::Banned)));
    }

    #[test]
    fn test_connect_transport_error_leaves_disconnected() {
        let (mut client, _, _) = client_with(vec![Err(QbtError::Timeout)]);
        assert!(matches!(client.connect(), Err(QbtError::Timeout)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_requires_host() {
        let settings = ConnectionSettings {
            host: "  ".to_string(),
            ..Default::default()
        };
        let (_, log, _) = client_with(vec![]);
        let backend = ScriptedBackend {
            replies: RefCell::new(VecDeque::new()),
            log: log.clone(),
            sid: Rc::new(RefCell::new(None)),
        };
        let mut client = QbtClient::with_backend(&settings, Box::new(backend));
        assert!(matches!(client.connect(), Err(QbtError::NotConfigured)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_operations_require_connection() {
        let (client, log, _) = client_with(vec![]);
        assert!(matches!(client.get_version(), Err(QbtError::NotConnected)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_get_rules_parses_and_sorts() {
        let body = json!({
            "Zom 100": {"mustContain": "Zom 100", "enabled": true},
            "Apothecary": {"mustContain": "Kusuriya", "affectedFeeds": ["u"]},
            "Broken": {"mustContain": 5},
        })
        .to_string();
        let (mut client, _, _) = client_with(vec![login_ok(), Ok(reply(200, &body))]);
        client.connect().unwrap();

        let rules = client.get_rules().unwrap();
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Apothecary", "Zom 100"]);
    }

    #[test]
    fn test_set_rule_sends_rule_def() {
        let (mut client, log, _) = client_with(vec![login_ok(), Ok(reply(200, ""))]);
        client.connect().unwrap();

        let rule = RssRule {
            name: "Frieren".to_string(),
            must_contain: "Frieren".to_string(),
            save_path: "/data/Frieren".to_string(),
            ..Default::default()
        };
        client.set_rule(&rule).unwrap();

        let log = log.borrow();
        let (path, form) = &log[1];
        assert_eq!(path, "/rss/setRule");
        assert_eq!(form[0], ("ruleName".to_string(), "Frieren".to_string()));
        let def: Value = serde_json::from_str(&form[1].1).unwrap();
        assert_eq!(def["mustContain"], "Frieren");
        assert_eq!(def["savePath"], "/data/Frieren");
    }

    #[test]
    fn test_set_rule_refuses_bad_save_path() {
        let (mut client, log, _) = client_with(vec![login_ok()]);
        client.connect().unwrap();

        let rule = RssRule {
            name: "Escape".to_string(),
            must_contain: "x".to_string(),
            save_path: "/data/../etc".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            client.set_rule(&rule),
            Err(QbtError::InvalidRule { .. })
        ));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_get_feeds_falls_back() {
        let tree = json!({
            "SubsPlease": {"uid": "{1}", "url": "https://subsplease.org/rss/?r=1080"},
            "Anime": {
                "Erai": {"uid": "{2}", "url": "https://erai.example/rss"}
            }
        })
        .to_string();
        let (mut client, log, _) = client_with(vec![
            login_ok(),
            Ok(reply(404, "Not Found")),
            Ok(reply(200, &tree)),
        ]);
        client.connect().unwrap();

        let feeds = client.get_feeds().unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].path, "Anime\\Erai");
        assert_eq!(feeds[1].url, "https://subsplease.org/rss/?r=1080");
        assert_eq!(log.borrow()[2].0, "/rss/rootItems");
    }

    #[test]
    fn test_add_feed_conflict_is_success() {
        let (mut client, _, _) = client_with(vec![login_ok(), Ok(reply(409, "Feed exists"))]);
        client.connect().unwrap();
        assert!(client.add_feed("https://x/rss", None).is_ok());
    }

    #[test]
    fn test_get_categories() {
        let body = r#"{"Anime": {"name": "Anime", "savePath": "/data/anime"}}"#;
        let (mut client, _, _) = client_with(vec![login_ok(), Ok(reply(200, body))]);
        client.connect().unwrap();

        let categories = client.get_categories().unwrap();
        assert_eq!(categories["Anime"].save_path, "/data/anime");
    }

    #[test]
    fn test_expired_session_is_forbidden() {
        let (mut client, _, _) = client_with(vec![login_ok(), Ok(reply(403, "Forbidden"))]);
        client.connect().unwrap();
        assert!(matches!(client.get_version(), Err(QbtError::Forbidden)));
    }

    #[test]
    fn test_close_logs_out() {
        let (mut client, log, sid) = client_with(vec![login_ok(), Ok(reply(200, ""))]);
        client.connect().unwrap();
        client.close().unwrap();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(sid.borrow().is_none());
        assert_eq!(log.borrow()[1].0, "/auth/logout");

        // Closing twice is harmless
        client.close().unwrap();
        assert_eq!(log.borrow().len(), 2);
    }
}
