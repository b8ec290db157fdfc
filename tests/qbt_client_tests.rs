//! Client tests against a minimal in-process WebUI

use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use titles2qbt::config::{ConnectionSettings, Strategy};
use titles2qbt::qbt::{ping, sync_rules, QbtClient, QbtError};
use titles2qbt::rules::{DuplicatePolicy, RssRule, RuleSet};

#[derive(Debug, Clone)]
struct Request {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: String,
}

impl Request {
    fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }
}

struct Reply {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

fn reply(status: u16, body: &str) -> Reply {
    Reply {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

fn login_ok() -> Reply {
    Reply {
        status: 200,
        headers: vec![("Set-Cookie", "SID=abc123; HttpOnly; path=/".to_string())],
        body: "Ok.".to_string(),
    }
}

type Handler = dyn Fn(&Request) -> Reply + Send + Sync;

/// Serve `handler` on a random local port; returns the port and the request log
fn serve(handler: impl Fn(&Request) -> Reply + Send + Sync + 'static) -> (u16, Arc<Mutex<Vec<Request>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler: Arc<Handler> = Arc::new(handler);

    let thread_log = log.clone();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            handle(stream, handler.as_ref(), &thread_log);
        }
    });

    (port, log)
}

fn handle(stream: TcpStream, handler: &Handler, log: &Mutex<Vec<Request>>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();
    let path = target.split('?').next().unwrap_or_default().to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).unwrap();

    let request = Request {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    let reply = handler(&request);
    log.lock().unwrap().push(request);

    let mut response = format!(
        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(&reply.body);

    let mut stream = stream;
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn settings(port: u16, strategy: Strategy) -> ConnectionSettings {
    ConnectionSettings {
        host: "127.0.0.1".to_string(),
        port,
        username: "admin".to_string(),
        password: "secret".to_string(),
        timeout_secs: 5,
        strategy,
        ..ConnectionSettings::default()
    }
}

fn connected(port: u16, strategy: Strategy) -> QbtClient {
    let mut client = QbtClient::new(&settings(port, strategy)).unwrap();
    client.connect().unwrap();
    client
}

fn requests_to(log: &Mutex<Vec<Request>>, path: &str) -> Vec<Request> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|r| r.path == path)
        .cloned()
        .collect()
}

#[test]
fn test_login_posts_credentials() {
    let (port, log) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        _ => reply(404, ""),
    });

    connected(port, Strategy::Raw);

    let login = &requests_to(&log, "/api/v2/auth/login")[0];
    assert_eq!(login.method, "POST");
    let form = login.form();
    assert_eq!(form["username"], "admin");
    assert_eq!(form["password"], "secret");
    assert_eq!(
        login.headers.get("referer").map(String::as_str),
        Some(format!("http://127.0.0.1:{}/", port).as_str())
    );
}

#[test]
fn test_raw_backend_sends_session_cookie() {
    let (port, log) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/app/version" => reply(200, "v5.0.2"),
        _ => reply(404, ""),
    });

    let client = connected(port, Strategy::Raw);
    assert_eq!(client.get_version().unwrap(), "v5.0.2");

    let version = &requests_to(&log, "/api/v2/app/version")[0];
    assert_eq!(
        version.headers.get("cookie").map(String::as_str),
        Some("SID=abc123")
    );
}

#[cfg(feature = "session-cookies")]
#[test]
fn test_session_backend_keeps_cookie() {
    let (port, log) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/app/version" => reply(200, "v5.0.2"),
        _ => reply(404, ""),
    });

    let client = connected(port, Strategy::Session);
    client.get_version().unwrap();

    let version = &requests_to(&log, "/api/v2/app/version")[0];
    assert!(version
        .headers
        .get("cookie")
        .is_some_and(|c| c.contains("SID=abc123")));
}

#[cfg(feature = "session-cookies")]
#[test]
fn test_session_backend_forgets_cookie() {
    use titles2qbt::qbt::{SessionBackend, WebUiBackend};

    let (port, log) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/app/version" => reply(200, "v5.0.2"),
        _ => reply(404, ""),
    });

    let mut backend = SessionBackend::new(&settings(port, Strategy::Session)).unwrap();
    let login = backend
        .post_form("/auth/login", &[("username", "admin"), ("password", "secret")])
        .unwrap();
    backend.set_session(login.sid);
    backend.get("/app/version", &[]).unwrap();

    backend.clear_session();
    backend.get("/app/version", &[]).unwrap();

    let versions = requests_to(&log, "/api/v2/app/version");
    assert!(versions[0].headers.contains_key("cookie"));
    assert!(!versions[1].headers.contains_key("cookie"));
}

#[test]
fn test_login_bad_credentials() {
    let (port, _) = serve(|_| reply(200, "Fails."));

    let mut client = QbtClient::new(&settings(port, Strategy::Raw)).unwrap();
    let err = client.connect().unwrap_err();
    assert!(matches!(err, QbtError::BadCredentials));
    assert!(matches!(client.get_version(), Err(QbtError::NotConnected)));
}

#[test]
fn test_login_banned() {
    let (port, _) = serve(|_| reply(403, "Your IP address has been banned"));

    let mut client = QbtClient::new(&settings(port, Strategy::Raw)).unwrap();
    assert!(matches!(client.connect(), Err(QbtError::Banned)));
}

#[test]
fn test_get_rules_sorted() {
    let (port, _) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/rss/rules" => reply(
            200,
            r#"{
                "Frieren": {"enabled": true, "mustContain": "Frieren", "affectedFeeds": ["https://a/rss"]},
                "Dandadan": {"enabled": false, "mustContain": "Dandadan", "savePath": "/data/Dandadan"}
            }"#,
        ),
        _ => reply(404, ""),
    });

    let rules = connected(port, Strategy::Raw).get_rules().unwrap();
    let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Dandadan", "Frieren"]);
    assert!(!rules[0].enabled);
    assert_eq!(rules[0].save_path, "/data/Dandadan");
    assert_eq!(rules[1].affected_feeds, vec!["https://a/rss"]);
}

#[test]
fn test_set_rule_form() {
    let (port, log) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/rss/setRule" => reply(200, ""),
        _ => reply(404, ""),
    });

    let rule = RssRule {
        name: "Frieren".to_string(),
        must_contain: "Frieren".to_string(),
        save_path: "/data/anime/Frieren".to_string(),
        affected_feeds: vec!["https://a/rss".to_string()],
        ..Default::default()
    };
    connected(port, Strategy::Raw).set_rule(&rule).unwrap();

    let form = requests_to(&log, "/api/v2/rss/setRule")[0].form();
    assert_eq!(form["ruleName"], "Frieren");
    let def: Value = serde_json::from_str(&form["ruleDef"]).unwrap();
    assert_eq!(def["mustContain"], "Frieren");
    assert_eq!(def["savePath"], "/data/anime/Frieren");
    assert!(def.get("ruleName").is_none());
}

#[test]
fn test_add_feed_conflict_is_ok() {
    let (port, log) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/rss/addFeed" => reply(409, "Feed already exists"),
        _ => reply(404, ""),
    });

    connected(port, Strategy::Raw)
        .add_feed("https://subsplease.org/rss/?r=1080", Some("Anime"))
        .unwrap();

    let form = requests_to(&log, "/api/v2/rss/addFeed")[0].form();
    assert_eq!(form["url"], "https://subsplease.org/rss/?r=1080");
    assert_eq!(form["path"], "Anime");
}

#[test]
fn test_feeds_fall_back_to_older_endpoint() {
    let (port, _) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/rss/rootItems" => reply(
            200,
            r#"{"Anime": {"SubsPlease": {"uid": "{1}", "url": "https://subsplease.org/rss/?r=1080"}}}"#,
        ),
        _ => reply(404, ""),
    });

    let feeds = connected(port, Strategy::Raw).get_feeds().unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].path, "Anime\\SubsPlease");
    assert_eq!(feeds[0].url, "https://subsplease.org/rss/?r=1080");
}

#[test]
fn test_get_preferences() {
    let (port, _) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/app/preferences" => reply(
            200,
            r#"{"save_path": "/downloads/", "rss_auto_downloading_enabled": true}"#,
        ),
        _ => reply(404, ""),
    });

    let prefs = connected(port, Strategy::Raw).get_preferences().unwrap();
    assert_eq!(prefs["save_path"], "/downloads/");
    assert_eq!(prefs["rss_auto_downloading_enabled"], true);
}

#[test]
fn test_expired_session_is_forbidden() {
    let (port, _) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        _ => reply(403, "Forbidden"),
    });

    let client = connected(port, Strategy::Raw);
    assert!(matches!(client.get_rules(), Err(QbtError::Forbidden)));
}

#[test]
fn test_sync_continues_after_failed_rule() {
    let (port, log) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/rss/rules" => reply(
            200,
            r#"{"Attack on Titan": {"enabled": true, "mustContain": "Attack on Titan"}}"#,
        ),
        "/api/v2/rss/setRule" if req.form()["ruleName"] == "Dandadan" => {
            reply(500, "Internal Server Error")
        }
        "/api/v2/rss/setRule" => reply(200, ""),
        _ => reply(404, ""),
    });

    let rules: RuleSet = ["attack on titan", "Dandadan", "Frieren"]
        .iter()
        .map(|name| RssRule {
            name: name.to_string(),
            must_contain: name.to_string(),
            ..Default::default()
        })
        .collect();

    let client = connected(port, Strategy::Raw);
    let report = sync_rules(&client, &rules, DuplicatePolicy::Overwrite).unwrap();

    assert_eq!(report.created, vec!["Frieren"]);
    assert_eq!(report.updated, vec!["Attack on Titan"]);
    assert_eq!(report.uploaded(), 2);
    assert!(report.has_failures());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "Dandadan");
    assert!(matches!(report.failed[0].1, QbtError::Http { status: 500, .. }));

    let uploaded: Vec<String> = requests_to(&log, "/api/v2/rss/setRule")
        .iter()
        .map(|r| r.form()["ruleName"].clone())
        .collect();
    assert_eq!(uploaded.len(), 3);
    assert!(uploaded.contains(&"Attack on Titan".to_string()));
    assert!(!uploaded.contains(&"attack on titan".to_string()));
}

#[test]
fn test_ping_reports_version() {
    let (port, log) = serve(|req| match req.path.as_str() {
        "/api/v2/auth/login" => login_ok(),
        "/api/v2/app/version" => reply(200, "v4.6.7"),
        "/api/v2/auth/logout" => reply(200, ""),
        _ => reply(404, ""),
    });

    let status = ping(&settings(port, Strategy::Raw)).unwrap();
    assert_eq!(status, "Connected - version v4.6.7");
    assert_eq!(requests_to(&log, "/api/v2/auth/logout").len(), 1);
}

#[test]
fn test_connection_refused() {
    let mut client = QbtClient::new(&settings(1, Strategy::Raw)).unwrap();
    let err = client.connect().unwrap_err();
    assert!(matches!(err, QbtError::Refused(_)), "got {:?}", err);
}

#[test]
fn test_unresponsive_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            held.push(stream);
            thread::sleep(Duration::from_millis(10));
        }
    });

    let mut config = settings(port, Strategy::Raw);
    config.timeout_secs = 1;
    let mut client = QbtClient::new(&config).unwrap();
    assert!(matches!(client.connect(), Err(QbtError::Timeout)));
}
