use crate::pathgen::FilesystemMode;
use crate::rules::io::ExportFormat;
use crate::rules::DuplicatePolicy;
use crate::season::Season;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "titles2qbt")]
#[command(author, version, long_about = None)]
#[command(about = "Turn anime title lists into qBittorrent RSS auto-download rules")]
pub struct Args {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file [default: <config dir>/titles2qbt/config.toml]
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Cache file [default: <cache dir>/titles2qbt/cache.json]
    #[arg(long, value_name = "FILE", global = true)]
    pub cache: Option<PathBuf>,

    /// Also append log output to this file
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate rules from titles and export them or push them to qBittorrent
    Generate(GenerateArgs),

    /// Check a rule or title file and report problems per entry
    Import {
        file: PathBuf,
    },

    /// Upload the rules in an export file to qBittorrent
    Sync {
        file: PathBuf,

        /// What to do when a rule name already exists on the server
        #[arg(long, value_name = "POLICY", default_value = "skip")]
        on_duplicate: DuplicatePolicy,

        /// Show what would be uploaded without changing anything
        #[arg(short, long)]
        dry: bool,
    },

    /// Change many rules in an export file at once
    Edit(EditArgs),

    /// Manage rules on the server
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// List download categories
    Categories {
        /// Use the list saved from the last successful lookup
        #[arg(long)]
        cached: bool,
    },

    /// List RSS feeds
    Feeds {
        /// Use the list saved from the last successful lookup
        #[arg(long)]
        cached: bool,
    },

    /// Subscribe qBittorrent to an RSS feed
    AddFeed {
        url: String,

        /// Folder path inside the RSS tree, e.g. "Anime\SubsPlease"
        #[arg(long)]
        path: Option<String>,
    },

    /// Check the connection settings by logging in
    Ping,

    /// List titles airing in a season
    Seasonal {
        #[command(flatten)]
        season: SeasonArgs,

        /// Ignore the cache and fetch the schedule again
        #[arg(long)]
        refresh: bool,
    },

    /// Find the seasonal title that best matches a name
    Match {
        query: String,

        #[command(flatten)]
        season: SeasonArgs,
    },

    /// Show how titles become folder names
    Check {
        #[arg(required = true)]
        titles: Vec<String>,

        /// Only check this filesystem
        #[arg(long, value_name = "MODE")]
        mode: Option<FilesystemMode>,
    },

    /// Show which items of a live feed the rules in a file would download
    Preview {
        file: PathBuf,

        #[arg(long, value_name = "URL")]
        feed_url: String,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// List recently used files
    Recent {
        /// Forget the list
        #[arg(long)]
        clear: bool,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct SeasonArgs {
    /// Season (winter, spring, summer, fall) [default: current]
    #[arg(long)]
    pub season: Option<Season>,

    /// Year [default: current]
    #[arg(long)]
    pub year: Option<i32>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Titles to create rules for
    pub titles: Vec<String>,

    /// Read titles from a file (extension export, JSON list or one per line)
    #[arg(short, long, value_name = "FILE")]
    pub file: Vec<PathBuf>,

    /// Read titles from the clipboard
    #[arg(long)]
    pub clipboard: bool,

    /// Use the titles airing this season
    #[arg(long)]
    pub seasonal: bool,

    #[command(flatten)]
    pub season: SeasonArgs,

    /// Write rules to this file
    #[arg(short, long, value_name = "FILE", conflicts_with = "sync")]
    pub output: Option<PathBuf>,

    /// Upload rules to qBittorrent
    #[arg(long)]
    pub sync: bool,

    /// Layout of the written file
    #[arg(long, default_value = "array")]
    pub format: ExportFormat,

    /// What to do when a rule name is already taken
    #[arg(long, value_name = "POLICY", default_value = "skip")]
    pub on_duplicate: DuplicatePolicy,

    /// Add to the rules already in --output instead of replacing them
    #[arg(long, requires = "output")]
    pub merge: bool,

    /// Match with a regular expression built from each title
    #[arg(long)]
    pub regex: bool,

    #[arg(long)]
    pub category: Option<String>,

    /// Base directory; season and title folders are added below it
    #[arg(long, value_name = "PATH")]
    pub save_path: Option<String>,

    /// Feed URL the rules apply to (repeatable)
    #[arg(long = "feed", value_name = "URL")]
    pub feeds: Vec<String>,

    /// Add matched torrents paused
    #[arg(long)]
    pub paused: bool,

    /// Create the rules disabled
    #[arg(long)]
    pub disabled: bool,

    /// Show the rules without writing or uploading them
    #[arg(short, long)]
    pub dry: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct EditArgs {
    pub file: PathBuf,

    /// Only rules whose name contains this text
    #[arg(long, value_name = "TEXT")]
    pub only: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// New base directory; season and title folders are kept
    #[arg(long, value_name = "PATH")]
    pub save_path: Option<String>,

    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    #[arg(long)]
    pub disable: bool,

    /// Add matched torrents paused
    #[arg(long, conflicts_with = "no_paused")]
    pub paused: bool,

    /// Add matched torrents started
    #[arg(long)]
    pub no_paused: bool,

    /// Replace the feed list (repeatable)
    #[arg(long = "feed", value_name = "URL")]
    pub feeds: Vec<String>,

    #[arg(long, value_name = "TEXT")]
    pub must_not_contain: Option<String>,

    /// Delete a rule by name (repeatable)
    #[arg(long, value_name = "NAME")]
    pub remove: Vec<String>,

    /// Delete every rule
    #[arg(long)]
    pub clear: bool,

    /// Rewrite the file even if some entries could not be read (they are dropped)
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List rules on the server
    List,

    /// Delete rules from the server
    Remove {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Delete every rule on the server
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the active settings (password hidden)
    Show,

    /// Print the config file location
    Path,

    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Change one setting, e.g. `config set connection.port 8081`
    Set { key: String, value: String },
}
