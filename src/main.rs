use clap::Parser;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use titles2qbt::cache::{CacheConfig, CacheStore};
use titles2qbt::cli::{
    Args, Command, ConfigCommand, EditArgs, GenerateArgs, RulesCommand, SeasonArgs,
};
use titles2qbt::config::{default_config_path, AppConfig, ConfigError, ConnectionMode};
use titles2qbt::error::AppError;
use titles2qbt::feedcheck::{fetch_feed_titles, preview_matches};
use titles2qbt::logging;
use titles2qbt::output::{
    display_categories, display_check, display_feeds, display_import_report, display_preview,
    display_rule_issues, display_rules, display_seasonal, display_sync_plan, display_sync_report,
};
use titles2qbt::pathgen::{normalize_title, FilesystemMode};
use titles2qbt::progress::Progress;
use titles2qbt::qbt::{ping, plan_sync, sync_rules, Category, FeedInfo, QbtClient};
use titles2qbt::rules::io::{
    export_rules, load_import_file, parse_title_source, read_rules_file, write_rules_file,
    ImportedFile, RuleImport,
};
use titles2qbt::rules::{DuplicatePolicy, InsertOutcome, RuleIssue, RuleSet, RuleTemplate};
use titles2qbt::season::SeasonContext;
use titles2qbt::seasonal::{find_match, SeasonalFetcher, SeasonalTitles, SubsPleaseClient};
use titles2qbt::workspace::{BulkEdit, TitleEntry, Workspace};
use tracing::{debug, error, info, warn};

fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    if let Err(e) = logging::init(args.verbose, args.log_file.as_deref()) {
        eprintln!("Warning: cannot open log file: {}", e);
        let _ = logging::init(args.verbose, None);
    }

    if let Err(e) = run(args) {
        error!("{}", e);
        eprintln!("\nError: {}", e.detailed_message());
        std::process::exit(e.exit_code().into());
    }
}

/// Settings and file locations shared by every command
struct Context {
    config: AppConfig,
    config_path: Option<PathBuf>,
    cache_path: Option<PathBuf>,
    progress: Progress,
}

impl Context {
    fn new(args: &Args) -> Self {
        let config_path = args.config.clone().or_else(default_config_path);
        let mut config = match &config_path {
            Some(path) => AppConfig::load(path),
            None => AppConfig::default(),
        };
        config.apply_env();

        Self {
            config,
            config_path,
            cache_path: args.cache.clone(),
            progress: Progress::new(args.verbose > 0),
        }
    }

    fn cache(&self) -> CacheStore {
        let config = match &self.cache_path {
            Some(path) => CacheConfig::at(path),
            None => CacheConfig::for_user().unwrap_or_else(|| {
                CacheConfig::at(std::env::temp_dir().join("titles2qbt-cache.json"))
            }),
        };
        CacheStore::load(config)
    }

    /// Put `path` at the top of the recent files list
    fn remember(&self, path: &Path) {
        let mut cache = self.cache();
        cache.push_recent(path);
        if let Err(e) = cache.save() {
            warn!("Failed to save cache: {}", e);
        }
    }

    fn filesystem_mode(&self) -> FilesystemMode {
        self.config.ui.filesystem_mode
    }

    /// Log in to qBittorrent with the configured connection
    fn connect(&mut self) -> Result<QbtClient, AppError> {
        if self.config.connection.mode == ConnectionMode::Offline {
            return Err(AppError::InvalidArguments(
                "connection.mode is offline; run `titles2qbt config set connection.mode online` \
                 to talk to qBittorrent"
                    .to_string(),
            ));
        }

        let mut client =
            QbtClient::new(&self.config.connection)?.with_filesystem_mode(self.filesystem_mode());

        self.progress.step(&format!(
            "Connecting to {}",
            self.config.connection.base_url()
        ));
        debug!(backend = client.backend_name(), "Using WebUI backend");
        match client.connect() {
            Ok(()) => self.progress.done(),
            Err(e) => {
                self.progress.failed();
                return Err(e.into());
            }
        }
        Ok(client)
    }
}

fn close(mut client: QbtClient) {
    if let Err(e) = client.close() {
        debug!("Logout failed: {}", e);
    }
}

fn display_error(e: io::Error) -> AppError {
    AppError::Other(format!("Failed to display output: {}", e))
}

fn run(args: Args) -> Result<(), AppError> {
    let mut ctx = Context::new(&args);

    match args.command {
        Command::Generate(generate) => run_generate(&mut ctx, generate),
        Command::Import { file } => run_import(&mut ctx, &file),
        Command::Sync {
            file,
            on_duplicate,
            dry,
        } => run_sync(&mut ctx, &file, on_duplicate, dry),
        Command::Edit(edit) => run_edit(&mut ctx, edit),
        Command::Rules { command } => run_rules(&mut ctx, command),
        Command::Categories { cached } => run_categories(&mut ctx, cached),
        Command::Feeds { cached } => run_feeds(&mut ctx, cached),
        Command::AddFeed { url, path } => {
            let client = ctx.connect()?;
            let result = client.add_feed(&url, path.as_deref());
            close(client);
            result?;
            ctx.progress.success(&format!("Feed added: {}", url));
            Ok(())
        }
        Command::Ping => run_ping(&mut ctx),
        Command::Seasonal { season, refresh } => run_seasonal(&mut ctx, &season, refresh),
        Command::Match { query, season } => run_match(&mut ctx, &query, &season),
        Command::Check { titles, mode } => run_check(&titles, mode),
        Command::Preview { file, feed_url } => run_preview(&mut ctx, &file, &feed_url),
        Command::Config { command } => run_config(&ctx, command),
        Command::Recent { clear } => run_recent(&ctx, clear),
    }
}

#[cfg(feature = "clipboard")]
fn read_clipboard() -> Result<String, AppError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| AppError::Clipboard(e.to_string()))?;
    clipboard
        .get_text()
        .map_err(|e| AppError::Clipboard(e.to_string()))
}

#[cfg(not(feature = "clipboard"))]
fn read_clipboard() -> Result<String, AppError> {
    Err(AppError::Clipboard(
        "this build has no clipboard support".to_string(),
    ))
}

fn season_requested(season: &SeasonArgs) -> bool {
    season.season.is_some() || season.year.is_some()
}

fn fetch_seasonal(
    ctx: &mut Context,
    season: &SeasonContext,
    refresh: bool,
) -> Result<SeasonalTitles, AppError> {
    let mut cache = ctx.cache();
    let source = SubsPleaseClient::new()?;

    ctx.progress.step(&format!("Loading titles for {}", season));
    let result = SeasonalFetcher::new(source, &mut cache).get_titles(season, refresh);
    match &result {
        Ok(titles) => {
            ctx.progress.done();
            if titles.stale {
                ctx.progress
                    .warn("Schedule unavailable; showing cached titles that may be out of date");
            } else if titles.from_cache && !refresh {
                ctx.progress
                    .note("Using the cached schedule; pass --refresh to fetch it again");
            }
        }
        Err(_) => ctx.progress.failed(),
    }
    Ok(result?)
}

/// Gather titles from arguments, files, the clipboard and the seasonal schedule
fn collect_titles(
    ctx: &mut Context,
    generate: &GenerateArgs,
    season: &SeasonContext,
) -> Result<Vec<TitleEntry>, AppError> {
    let mut titles: Vec<TitleEntry> = generate
        .titles
        .iter()
        .map(|t| TitleEntry::new(t.as_str()))
        .collect();

    for path in &generate.file {
        let content = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let import = parse_title_source(&content).map_err(|e| AppError::import(path, e))?;
        for warning in &import.warnings {
            ctx.progress
                .warn(&format!("{}: skipped {}", path.display(), warning));
        }
        info!(file = %path.display(), count = import.titles.len(), "Read titles");
        titles.extend(import.titles);
        ctx.remember(path);
    }

    if generate.clipboard {
        let content = read_clipboard()?;
        let import = parse_title_source(&content).map_err(|e| AppError::import("clipboard", e))?;
        for warning in &import.warnings {
            ctx.progress.warn(&format!("clipboard: skipped {}", warning));
        }
        titles.extend(import.titles);
    }

    if generate.seasonal {
        let seasonal = fetch_seasonal(ctx, season, false)?;
        titles.extend(seasonal.entries.into_iter().map(|entry| TitleEntry {
            display_title: entry.title.clone(),
            source_title: entry.title,
            source_id: None,
            page_url: entry.page_url,
            image_url: entry.image_url,
        }));
    }

    Ok(titles)
}

/// Errors found by rule validation, keyed by rule name; warnings are only shown
fn check_rules(progress: &mut Progress, rules: &RuleSet, mode: FilesystemMode) -> Result<(), AppError> {
    let mut errors: BTreeMap<String, Vec<RuleIssue>> = BTreeMap::new();

    for rule in rules.iter() {
        let (hard, soft): (Vec<_>, Vec<_>) =
            rule.validate(mode).into_iter().partition(RuleIssue::is_error);
        for issue in soft {
            debug!(name = %rule.name, "{}", issue);
        }
        if !hard.is_empty() {
            errors.insert(rule.name.clone(), hard);
        }
    }

    if errors.is_empty() {
        return Ok(());
    }

    if let Err(e) = display_rule_issues(&errors, &mut io::stderr()) {
        warn!(error = %e, "Could not print rule issues");
    }
    progress.warn("Fix the rules above (or use `titles2qbt edit`) and try again");

    Err(AppError::Validation {
        context: format!("{} rule(s) are invalid", errors.len()),
        issues: errors
            .iter()
            .flat_map(|(name, issues)| issues.iter().map(move |i| format!("{}: {}", name, i)))
            .collect(),
    })
}

fn run_generate(ctx: &mut Context, generate: GenerateArgs) -> Result<(), AppError> {
    let season = SeasonContext::resolve(generate.season.season, generate.season.year);
    let season_folder = generate.seasonal || season_requested(&generate.season);

    let titles = collect_titles(ctx, &generate, &season)?;
    if titles.is_empty() {
        return Err(AppError::NoTitles);
    }

    let mut template = RuleTemplate::from_config(&ctx.config);
    if generate.regex {
        template.use_regex = true;
    }
    if let Some(category) = &generate.category {
        template.category = category.clone();
    }
    if let Some(save_path) = &generate.save_path {
        template.save_path_base = save_path.clone();
    }
    if !generate.feeds.is_empty() {
        template.feeds = generate.feeds.clone();
    }
    if generate.paused {
        template.add_paused = Some(true);
    }
    if generate.disabled {
        template.enabled = false;
    }

    let mut workspace = Workspace::new();
    if generate.merge {
        if let Some(output) = generate.output.as_ref().filter(|p| p.exists()) {
            let existing = read_rules_file(output).map_err(|e| AppError::import(output, e))?;
            report_import_warnings(&mut ctx.progress, output, &existing);
            workspace.merge_rules(existing.rules, DuplicatePolicy::Skip);
        }
    }

    let report = workspace.add_titles(
        &titles,
        season_folder.then_some(&season),
        &template,
        generate.on_duplicate,
    );
    display_import_report(&report, &mut io::stderr()).map_err(display_error)?;

    let rules = workspace.rules();
    if rules.is_empty() {
        return Err(AppError::NoTitles);
    }

    if generate.dry {
        let mut stdout = io::stdout().lock();
        if generate.sync {
            let client = ctx.connect()?;
            let server_rules = client.get_rules();
            close(client);
            let plan = plan_sync(&server_rules?, rules, generate.on_duplicate);
            display_sync_plan(&plan, &mut stdout).map_err(display_error)?;
        } else {
            display_rules(rules.iter(), &mut stdout).map_err(display_error)?;
        }
        return Ok(());
    }

    check_rules(&mut ctx.progress, rules, template.filesystem_mode)?;

    if let Some(output) = &generate.output {
        write_rules_file(output, rules, generate.format).map_err(|e| AppError::import(output, e))?;
        ctx.remember(output);
        ctx.progress.success(&format!(
            "Wrote {} rule(s) to {}",
            rules.len(),
            output.display()
        ));
        return Ok(());
    }

    if generate.sync {
        return upload(ctx, rules, generate.on_duplicate);
    }

    let json = serde_json::to_string_pretty(&export_rules(rules, generate.format))
        .map_err(|e| AppError::Other(format!("Failed to serialize rules: {}", e)))?;
    writeln!(io::stdout(), "{}", json).map_err(display_error)?;
    Ok(())
}

fn upload(ctx: &mut Context, rules: &RuleSet, policy: DuplicatePolicy) -> Result<(), AppError> {
    let client = ctx.connect()?;
    let result = sync_rules(&client, rules, policy);
    close(client);
    let report = result?;

    display_sync_report(&report, &mut io::stdout()).map_err(display_error)?;

    if report.has_failures() {
        return Err(AppError::PartialFailure {
            failed: report.failed.len(),
            total: rules.len(),
        });
    }
    Ok(())
}

fn report_import_warnings(progress: &mut Progress, path: &Path, import: &RuleImport) {
    for warning in &import.warnings {
        progress.warn(&format!("{}: skipped {}", path.display(), warning));
    }
}

/// Rules from `file` in a workspace, the import warnings and the duplicate names left out
fn load_rules(
    ctx: &mut Context,
    file: &Path,
    policy: DuplicatePolicy,
) -> Result<(Workspace, RuleImport, Vec<String>), AppError> {
    let mut import = read_rules_file(file).map_err(|e| AppError::import(file, e))?;
    report_import_warnings(&mut ctx.progress, file, &import);
    ctx.remember(file);

    let mut workspace = Workspace::new();
    let report = workspace.merge_rules(std::mem::take(&mut import.rules), policy);
    for name in &report.skipped {
        ctx.progress
            .warn(&format!("Duplicate rule name in file, kept the first: {}", name));
    }
    Ok((workspace, import, report.skipped))
}

fn run_import(ctx: &mut Context, file: &Path) -> Result<(), AppError> {
    let imported = load_import_file(file).map_err(|e| AppError::import(file, e))?;
    ctx.remember(file);
    let mut stdout = io::stdout().lock();

    let mut duplicates = Vec::new();
    let (usable, warnings) = match imported {
        ImportedFile::Rules(import) => {
            let mut rules = RuleSet::new();
            for rule in import.rules {
                let name = rule.name.clone();
                if !matches!(rules.insert(rule, DuplicatePolicy::Skip), Ok(InsertOutcome::Inserted)) {
                    duplicates.push(name);
                }
            }
            writeln!(stdout, "{}: rule file", file.display()).map_err(display_error)?;
            display_rules(rules.iter(), &mut stdout).map_err(display_error)?;

            let mut issues = BTreeMap::new();
            for rule in rules.iter() {
                let found = rule.validate(ctx.filesystem_mode());
                if !found.is_empty() {
                    issues.insert(rule.name.clone(), found);
                }
            }
            if !issues.is_empty() {
                writeln!(stdout, "\nIssues:").map_err(display_error)?;
                display_rule_issues(&issues, &mut stdout).map_err(display_error)?;
            }
            (rules.len(), import.warnings)
        }
        ImportedFile::Titles(import) => {
            writeln!(stdout, "{}: title list", file.display()).map_err(display_error)?;
            for (i, title) in import.titles.iter().enumerate() {
                writeln!(stdout, "  {}. {}", i + 1, title.display_title).map_err(display_error)?;
            }
            writeln!(stdout, "\n{} title(s)", import.titles.len()).map_err(display_error)?;
            (import.titles.len(), import.warnings)
        }
    };

    if !warnings.is_empty() || !duplicates.is_empty() {
        writeln!(stdout, "\nSkipped entries:").map_err(display_error)?;
        for warning in &warnings {
            writeln!(stdout, "  - {}", warning).map_err(display_error)?;
        }
        for name in &duplicates {
            writeln!(stdout, "  - duplicate rule name '{}', kept the first", name)
                .map_err(display_error)?;
        }
    }

    if usable == 0 {
        return Err(AppError::Validation {
            context: format!("No usable entries in {}", file.display()),
            issues: warnings.iter().map(|w| w.to_string()).collect(),
        });
    }
    Ok(())
}

fn run_sync(ctx: &mut Context, file: &Path, policy: DuplicatePolicy, dry: bool) -> Result<(), AppError> {
    let (workspace, _, _) = load_rules(ctx, file, DuplicatePolicy::Skip)?;
    let rules = workspace.rules();
    if rules.is_empty() {
        return Err(AppError::Validation {
            context: format!("No valid rules in {}", file.display()),
            issues: Vec::new(),
        });
    }

    if dry {
        let client = ctx.connect()?;
        let server_rules = client.get_rules();
        close(client);
        let plan = plan_sync(&server_rules?, rules, policy);
        return display_sync_plan(&plan, &mut io::stdout()).map_err(display_error);
    }

    check_rules(&mut ctx.progress, rules, ctx.config.ui.filesystem_mode)?;
    upload(ctx, rules, policy)
}

fn run_edit(ctx: &mut Context, edit: EditArgs) -> Result<(), AppError> {
    let (mut workspace, import, duplicates) = load_rules(ctx, &edit.file, DuplicatePolicy::Skip)?;

    let bulk = BulkEdit {
        only: edit.only.clone(),
        category: edit.category.clone(),
        save_path_base: edit.save_path.clone(),
        enabled: match (edit.enable, edit.disable) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        add_paused: match (edit.paused, edit.no_paused) {
            (true, _) => Some(Some(true)),
            (_, true) => Some(Some(false)),
            _ => None,
        },
        feeds: (!edit.feeds.is_empty()).then(|| edit.feeds.clone()),
        must_not_contain: edit.must_not_contain.clone(),
    };

    if bulk.is_empty() && edit.remove.is_empty() && !edit.clear {
        return Err(AppError::InvalidArguments(
            "Nothing to change; pass at least one of --category, --save-path, --enable, \
             --disable, --paused, --no-paused, --feed, --must-not-contain, --remove or --clear"
                .to_string(),
        ));
    }

    // Rewriting the file would drop every entry that did not load
    if !edit.force && (!import.warnings.is_empty() || !duplicates.is_empty()) {
        let mut issues: Vec<String> = import.warnings.iter().map(|w| w.to_string()).collect();
        issues.extend(duplicates.iter().map(|name| format!("duplicate rule name '{}'", name)));
        return Err(AppError::Validation {
            context: format!(
                "{} entr{} in {} would be lost on rewrite; fix them or pass --force",
                issues.len(),
                if issues.len() == 1 { "y" } else { "ies" },
                edit.file.display()
            ),
            issues,
        });
    }

    let mut removed = 0usize;
    if edit.clear {
        removed = workspace.rules().len();
        workspace.clear();
    }
    for name in &edit.remove {
        if workspace.remove(name) {
            removed += 1;
        } else {
            ctx.progress.warn(&format!("No rule named '{}'", name));
        }
    }

    let edited = if bulk.is_empty() {
        0
    } else {
        workspace.bulk_edit(&bulk, ctx.filesystem_mode())
    };

    write_rules_file(&edit.file, workspace.rules(), import.format)
        .map_err(|e| AppError::import(&edit.file, e))?;

    let mut summary = format!("Updated {} rule(s)", edited);
    if removed > 0 {
        summary.push_str(&format!(", removed {}", removed));
    }
    ctx.progress
        .success(&format!("{} in {}", summary, edit.file.display()));
    Ok(())
}

fn run_rules(ctx: &mut Context, command: RulesCommand) -> Result<(), AppError> {
    if let RulesCommand::Clear { yes: false } = command {
        return Err(AppError::InvalidArguments(
            "Refusing to delete every rule on the server without --yes".to_string(),
        ));
    }

    let client = ctx.connect()?;
    let result = match command {
        RulesCommand::List => client.get_rules().map_err(AppError::from).and_then(|rules| {
            display_rules(rules.iter(), &mut io::stdout()).map_err(display_error)
        }),
        RulesCommand::Remove { names } => remove_rules(&mut ctx.progress, &client, &names),
        RulesCommand::Clear { .. } => match client.get_rules() {
            Ok(rules) => {
                let names: Vec<String> = rules.into_iter().map(|r| r.name).collect();
                remove_rules(&mut ctx.progress, &client, &names)
            }
            Err(e) => Err(e.into()),
        },
    };
    close(client);
    result
}

fn remove_rules(progress: &mut Progress, client: &QbtClient, names: &[String]) -> Result<(), AppError> {
    let mut failed = 0usize;
    for (i, name) in names.iter().enumerate() {
        match client.remove_rule(name) {
            Ok(()) => progress.rule_progress(i + 1, names.len(), name, "removed"),
            Err(e) => {
                warn!(name = %name, "Remove failed: {}", e);
                progress.rule_progress(i + 1, names.len(), name, &format!("failed: {}", e));
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(AppError::PartialFailure {
            failed,
            total: names.len(),
        });
    }
    progress.success(&format!("Removed {} rule(s)", names.len()));
    Ok(())
}

fn run_categories(ctx: &mut Context, cached: bool) -> Result<(), AppError> {
    let categories: BTreeMap<String, Category> = if cached {
        ctx.cache()
            .categories()
            .iter()
            .map(|(name, save_path)| {
                (
                    name.clone(),
                    Category {
                        name: name.clone(),
                        save_path: save_path.clone(),
                    },
                )
            })
            .collect()
    } else {
        let client = ctx.connect()?;
        let result = client.get_categories();
        close(client);
        let categories = result?;

        let mut cache = ctx.cache();
        cache.set_categories(
            categories
                .values()
                .map(|c| (c.name.clone(), c.save_path.clone()))
                .collect(),
        );
        if let Err(e) = cache.save() {
            warn!("Failed to save cache: {}", e);
        }
        categories
    };

    display_categories(&categories, &mut io::stdout()).map_err(display_error)
}

fn run_feeds(ctx: &mut Context, cached: bool) -> Result<(), AppError> {
    let feeds: Vec<FeedInfo> = if cached {
        ctx.cache()
            .feeds()
            .iter()
            .map(|(path, url)| FeedInfo {
                path: path.clone(),
                url: url.clone(),
            })
            .collect()
    } else {
        let client = ctx.connect()?;
        let result = client.get_feeds();
        close(client);
        let feeds = result?;

        let mut cache = ctx.cache();
        cache.set_feeds(
            feeds
                .iter()
                .map(|f| (f.path.clone(), f.url.clone()))
                .collect(),
        );
        if let Err(e) = cache.save() {
            warn!("Failed to save cache: {}", e);
        }
        feeds
    };

    display_feeds(&feeds, &mut io::stdout()).map_err(display_error)
}

fn run_ping(ctx: &mut Context) -> Result<(), AppError> {
    if ctx.config.connection.mode == ConnectionMode::Offline {
        println!("Offline mode; not connecting");
        return Ok(());
    }

    ctx.progress.step(&format!(
        "Connecting to {}",
        ctx.config.connection.base_url()
    ));
    match ping(&ctx.config.connection) {
        Ok(status) => {
            ctx.progress.done();
            println!("{}", status);
            Ok(())
        }
        Err(e) => {
            ctx.progress.failed();
            Err(e.into())
        }
    }
}

fn run_seasonal(ctx: &mut Context, season: &SeasonArgs, refresh: bool) -> Result<(), AppError> {
    let season = SeasonContext::resolve(season.season, season.year);
    let titles = fetch_seasonal(ctx, &season, refresh)?;
    display_seasonal(&titles, ctx.config.ui.time_24h, &mut io::stdout()).map_err(display_error)
}

fn run_match(ctx: &mut Context, query: &str, season: &SeasonArgs) -> Result<(), AppError> {
    let season = SeasonContext::resolve(season.season, season.year);
    let titles = fetch_seasonal(ctx, &season, false)?;

    match find_match(query, &titles.entries) {
        Some(entry) => {
            println!("{}", entry.title);
            Ok(())
        }
        None => Err(AppError::Other(format!(
            "No {} title matches '{}'",
            season, query
        ))),
    }
}

fn run_check(titles: &[String], mode: Option<FilesystemMode>) -> Result<(), AppError> {
    let modes = match mode {
        Some(mode) => vec![mode],
        None => vec![FilesystemMode::Posix, FilesystemMode::Windows],
    };

    let mut stdout = io::stdout().lock();
    for title in titles {
        let results: Vec<_> = modes
            .iter()
            .map(|mode| (*mode, normalize_title(title, *mode, true)))
            .collect();
        display_check(title, &results, &mut stdout).map_err(display_error)?;
    }
    Ok(())
}

fn run_preview(ctx: &mut Context, file: &Path, feed_url: &str) -> Result<(), AppError> {
    let (workspace, _, _) = load_rules(ctx, file, DuplicatePolicy::Skip)?;

    ctx.progress.step("Reading feed");
    let titles = match fetch_feed_titles(feed_url) {
        Ok(titles) => {
            ctx.progress.done();
            titles
        }
        Err(e) => {
            ctx.progress.failed();
            return Err(e.into());
        }
    };

    let matches = preview_matches(workspace.rules().iter(), &titles);
    display_preview(&matches, titles.len(), &mut io::stdout()).map_err(display_error)
}

fn run_config(ctx: &Context, command: ConfigCommand) -> Result<(), AppError> {
    match command {
        ConfigCommand::Show => {
            print!("{}", ctx.config.redacted().to_toml_string()?);
            Ok(())
        }
        ConfigCommand::Path => {
            let path = ctx.config_path.as_ref().ok_or(ConfigError::NoConfigDir)?;
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Init { force } => {
            let path = ctx.config_path.as_ref().ok_or(ConfigError::NoConfigDir)?;
            if path.exists() && !force {
                return Err(ConfigError::AlreadyExists(path.clone()).into());
            }
            AppConfig::default().save(path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            let path = ctx.config_path.as_ref().ok_or(ConfigError::NoConfigDir)?;
            // Re-read the file so environment overrides are not persisted
            let mut config = AppConfig::load(path);
            config.set_value(&key, &value)?;
            config.save(path)?;
            println!("{} updated in {}", key, path.display());
            Ok(())
        }
    }
}

fn run_recent(ctx: &Context, clear: bool) -> Result<(), AppError> {
    let mut cache = ctx.cache();
    if clear {
        cache.clear_recent();
        cache.save()?;
        println!("Recent files cleared");
        return Ok(());
    }

    if cache.recent_files().is_empty() {
        println!("No recent files");
    }
    for path in cache.recent_files() {
        println!("{}", path);
    }
    Ok(())
}
