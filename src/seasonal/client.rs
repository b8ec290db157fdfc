use super::types::{ScheduledShow, SeasonalError};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

const SUBSPLEASE_BASE_URL: &str = "https://subsplease.org";
const SCHEDULE_PATH: &str = "/api/?f=schedule&tz=UTC";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!(
    "titles2qbt/",
    env!("CARGO_PKG_VERSION"),
    " (qBittorrent RSS rule generator)"
);

/// Anything that can list the shows airing this season
pub trait ScheduleSource {
    fn fetch_schedule(&self) -> Result<Vec<ScheduledShow>, SeasonalError>;
}

/// Client for the public SubsPlease release schedule
pub struct SubsPleaseClient {
    client: Client,
    base_url: String,
}

impl SubsPleaseClient {
    pub fn new() -> Result<Self, SeasonalError> {
        Self::with_base_url(SUBSPLEASE_BASE_URL)
    }

    /// Point the client at another host serving the same API
    pub fn with_base_url(base_url: &str) -> Result<Self, SeasonalError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SeasonalError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ScheduleSource for SubsPleaseClient {
    fn fetch_schedule(&self) -> Result<Vec<ScheduledShow>, SeasonalError> {
        let url = format!("{}{}", self.base_url, SCHEDULE_PATH);
        info!("Fetching release schedule from {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()?;
        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(SeasonalError::Status(status.as_u16()));
        }

        let body = response.text()?;
        parse_schedule(&body, &self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    schedule: BTreeMap<String, Vec<RawShow>>,
}

#[derive(Debug, Deserialize)]
struct RawShow {
    #[serde(default)]
    title: String,
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    aired: Option<bool>,
}

/// Parse a schedule body of the form `{"schedule": {"Monday": [{title, page, ...}]}}`.
///
/// Titles are trimmed and deduplicated; relative page and image links are made
/// absolute against `base_url`.
pub fn parse_schedule(body: &str, base_url: &str) -> Result<Vec<ScheduledShow>, SeasonalError> {
    let response: ScheduleResponse =
        serde_json::from_str(body).map_err(|e| SeasonalError::InvalidResponse(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut shows = Vec::new();

    for (day, raw_shows) in response.schedule {
        for raw in raw_shows {
            let title = raw.title.trim();
            if title.is_empty() || !seen.insert(title.to_string()) {
                continue;
            }

            shows.push(ScheduledShow {
                title: title.to_string(),
                page_url: raw
                    .page
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| absolute(base_url, &format!("/shows/{}/", p.trim()))),
                image_url: raw
                    .image_url
                    .filter(|i| !i.trim().is_empty())
                    .map(|i| absolute(base_url, i.trim())),
                air_day: Some(day.clone()),
                air_time: raw.time,
                aired: raw.aired,
            });
        }
    }

    if shows.is_empty() {
        return Err(SeasonalError::NoTitles);
    }

    debug!("Parsed {} shows from schedule", shows.len());
    Ok(shows)
}

fn absolute(base_url: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else if link.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), link)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), link)
    }
}
