//! Preview which feed items a set of rules would download

use crate::rules::RssRule;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const FEED_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed: {0}")]
    Network(String),

    #[error("Feed returned HTTP {0}")]
    Status(u16),

    #[error("Failed to parse feed at position {position}: {message}")]
    Parse { position: u64, message: String },
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Network(err.to_string())
    }
}

/// Download an RSS or Atom feed and return its item titles in feed order
pub fn fetch_feed_titles(url: &str) -> Result<Vec<String>, FeedError> {
    let client = Client::builder()
        .timeout(FEED_TIMEOUT)
        .gzip(true)
        .user_agent(concat!("titles2qbt/", env!("CARGO_PKG_VERSION")))
        .build()?;

    info!("Fetching feed {}", url);
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status(status.as_u16()));
    }

    let body = response.text()?;
    parse_feed_titles(&body)
}

/// Titles of `<item>` (RSS) and `<entry>` (Atom) elements
pub fn parse_feed_titles(xml: &str) -> Result<Vec<String>, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut titles = Vec::new();
    let mut buf = Vec::new();
    let mut in_item = false;
    let mut in_title = false;
    let mut current = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"item" | b"entry" => {
                    in_item = true;
                    current.clear();
                }
                b"title" if in_item => in_title = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_title => {
                current.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::CData(e)) if in_title => {
                current.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"title" => in_title = false,
                b"item" | b"entry" => {
                    in_item = false;
                    let title = current.trim();
                    if !title.is_empty() {
                        titles.push(title.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FeedError::Parse {
                    position: reader.buffer_position(),
                    message: e.to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    debug!("Parsed {} feed items", titles.len());
    Ok(titles)
}

/// Feed items one rule would pick up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatches {
    pub rule_name: String,
    pub enabled: bool,
    pub matched: Vec<String>,
}

/// Evaluate every rule against every title
pub fn preview_matches<'a>(
    rules: impl IntoIterator<Item = &'a RssRule>,
    titles: &[String],
) -> Vec<RuleMatches> {
    rules
        .into_iter()
        .map(|rule| RuleMatches {
            rule_name: rule.name.clone(),
            enabled: rule.enabled,
            matched: titles
                .iter()
                .filter(|title| rule.matches(title))
                .cloned()
                .collect(),
        })
        .collect()
}
