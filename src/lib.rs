pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod feedcheck;
pub mod logging;
pub mod output;
pub mod pathgen;
pub mod progress;
pub mod qbt;
pub mod rules;
pub mod season;
pub mod seasonal;
pub mod validator;
pub mod workspace;

pub use error::{AppError, ExitCode};
pub use pathgen::{normalize_title, FilesystemMode, NormalizedTitle};
pub use qbt::{QbtClient, QbtError};
pub use rules::{DuplicatePolicy, RssRule, RuleSet, RuleTemplate};
pub use season::{Season, SeasonContext};
pub use workspace::{TitleEntry, Workspace};
