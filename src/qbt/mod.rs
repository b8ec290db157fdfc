//! qBittorrent WebUI client

mod backend;
mod client;
mod sync;
mod types;

#[cfg(feature = "session-cookies")]
pub use backend::SessionBackend;
pub use backend::{parse_sid, select_backend, RawBackend, WebResponse, WebUiBackend};
pub use client::QbtClient;
pub use sync::{ping, plan_sync, sync_rules, SyncAction, SyncEntry, SyncReport};
pub use types::{Category, ConnectionState, FeedInfo, QbtError};
