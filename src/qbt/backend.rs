//! HTTP transports for the WebUI. Both speak the same API and differ only in
//! how the `SID` session cookie is carried.

use super::types::QbtError;
use crate::config::{ConnectionSettings, Strategy};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{COOKIE, ORIGIN, REFERER, SET_COOKIE};
use std::fs;
use tracing::{debug, trace, warn};

const USER_AGENT: &str = concat!("titles2qbt/", env!("CARGO_PKG_VERSION"));
const SID_COOKIE: &str = "SID";

/// A completed HTTP exchange
#[derive(Debug, Clone)]
pub struct WebResponse {
    pub status: u16,
    pub body: String,
    /// Session id from a `Set-Cookie: SID=...` header, if the server sent one
    pub sid: Option<String>,
}

impl WebResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used by [`QbtClient`](super::QbtClient)
pub trait WebUiBackend {
    fn name(&self) -> &'static str;

    /// GET `/api/v2{path}`
    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<WebResponse, QbtError>;

    /// POST a url-encoded form to `/api/v2{path}`
    fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<WebResponse, QbtError>;

    /// Record the session obtained from login
    fn set_session(&mut self, sid: Option<String>);

    /// Forget any session, after logout or a failed login
    fn clear_session(&mut self);
}

/// State shared by both backends
struct Http {
    client: Client,
    base_url: String,
    target: String,
}

impl Http {
    fn new(settings: &ConnectionSettings, cookie_store: bool) -> Result<Self, QbtError> {
        let mut builder = Client::builder()
            .timeout(settings.timeout())
            .connect_timeout(settings.timeout())
            .gzip(true)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!settings.verify_ssl);

        if let Some(ca_path) = &settings.ca_cert {
            let pem = fs::read(ca_path).map_err(|e| {
                QbtError::Client(format!("cannot read CA certificate {:?}: {}", ca_path, e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| QbtError::Client(format!("invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        #[cfg(feature = "session-cookies")]
        {
            builder = builder.cookie_store(cookie_store);
        }
        #[cfg(not(feature = "session-cookies"))]
        let _ = cookie_store;

        let client = builder
            .build()
            .map_err(|e| QbtError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url(),
            target: format!("{}:{}", settings.host.trim(), settings.port),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2{}", self.base_url, path)
    }

    /// qBittorrent's CSRF check wants Referer/Origin matching the WebUI
    fn decorate(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(REFERER, format!("{}/", self.base_url))
            .header(ORIGIN, &self.base_url)
    }

    fn send(&self, request: RequestBuilder) -> Result<WebResponse, QbtError> {
        let response = request
            .send()
            .map_err(|e| QbtError::from_transport(e, &self.target))?;

        let status = response.status().as_u16();
        let sid = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(parse_sid);

        let body = response
            .text()
            .map_err(|e| QbtError::from_transport(e, &self.target))?;

        trace!(status, bytes = body.len(), "WebUI response");
        Ok(WebResponse { status, body, sid })
    }
}

/// Extract the session id from one `Set-Cookie` header value
pub fn parse_sid(set_cookie: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.trim() == SID_COOKIE && !value.trim().is_empty() {
        Some(value.trim().to_string())
    } else {
        None
    }
}

/// Lets reqwest's cookie store carry the session
#[cfg(feature = "session-cookies")]
pub struct SessionBackend {
    http: Http,
    settings: ConnectionSettings,
}

#[cfg(feature = "session-cookies")]
impl SessionBackend {
    pub fn new(settings: &ConnectionSettings) -> Result<Self, QbtError> {
        Ok(Self {
            http: Http::new(settings, true)?,
            settings: settings.clone(),
        })
    }
}

#[cfg(feature = "session-cookies")]
impl WebUiBackend for SessionBackend {
    fn name(&self) -> &'static str {
        "session"
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<WebResponse, QbtError> {
        let request = self.http.client.get(self.http.url(path)).query(query);
        self.http.send(self.http.decorate(request))
    }

    fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<WebResponse, QbtError> {
        let request = self.http.client.post(self.http.url(path)).form(form);
        self.http.send(self.http.decorate(request))
    }

    fn set_session(&mut self, sid: Option<String>) {
        // The cookie jar already holds whatever the server set
        debug!(has_sid = sid.is_some(), "Session backend logged in");
    }

    fn clear_session(&mut self) {
        // reqwest cannot empty a cookie store, so start over with a fresh client
        match Http::new(&self.settings, true) {
            Ok(http) => {
                self.http = http;
                debug!("Session backend cookies cleared");
            }
            Err(e) => warn!("Could not reset the session cookie store: {}", e),
        }
    }
}

/// Plain client; the `SID` cookie is captured at login and sent by hand
pub struct RawBackend {
    http: Http,
    sid: Option<String>,
}

impl RawBackend {
    pub fn new(settings: &ConnectionSettings) -> Result<Self, QbtError> {
        Ok(Self {
            http: Http::new(settings, false)?,
            sid: None,
        })
    }

    fn with_sid(&self, request: RequestBuilder) -> RequestBuilder {
        let request = self.http.decorate(request);
        match &self.sid {
            Some(sid) => request.header(COOKIE, format!("{}={}", SID_COOKIE, sid)),
            None => request,
        }
    }
}

impl WebUiBackend for RawBackend {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<WebResponse, QbtError> {
        let request = self.http.client.get(self.http.url(path)).query(query);
        self.http.send(self.with_sid(request))
    }

    fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<WebResponse, QbtError> {
        let request = self.http.client.post(self.http.url(path)).form(form);
        self.http.send(self.with_sid(request))
    }

    fn set_session(&mut self, sid: Option<String>) {
        debug!(has_sid = sid.is_some(), "Raw backend logged in");
        self.sid = sid;
    }

    fn clear_session(&mut self) {
        self.sid = None;
    }
}

/// Pick the transport for `connection.strategy`
pub fn select_backend(settings: &ConnectionSettings) -> Result<Box<dyn WebUiBackend>, QbtError> {
    match settings.strategy {
        #[cfg(feature = "session-cookies")]
        Strategy::Auto | Strategy::Session => Ok(Box::new(SessionBackend::new(settings)?)),
        #[cfg(not(feature = "session-cookies"))]
        Strategy::Session => {
            warn!("Session strategy requested but cookie support is not compiled in, using raw");
            Ok(Box::new(RawBackend::new(settings)?))
        }
        #[cfg(not(feature = "session-cookies"))]
        Strategy::Auto => Ok(Box::new(RawBackend::new(settings)?)),
        Strategy::Raw => Ok(Box::new(RawBackend::new(settings)?)),
    }
}
