use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use themetool_core::builder::{Prompter, TagPolicy};
use themetool_core::catalog::{AddonRecord, Keyed, ThemeRecord, repo_url};
use themetool_core::config::{DEFAULT_USER_AGENT, ThemetoolConfig, load_config};
use themetool_core::github::{GithubClient, RepoMetadataSource};
use themetool_core::macros::TagMacros;
use themetool_core::reconcile::{find_missing, find_orphaned, sync_summary};
use themetool_core::session::{SessionOptions, run_session};
use themetool_core::store::{RecordStore, list_backups, prune_backups};
use themetool_core::validate::{
    BatchOptions, HttpProbe, Severity, TagRules, UrlProbe, Violation, validate_batch,
    validate_official_record,
};

#[derive(Debug, Parser)]
#[command(
    name = "themetool",
    version,
    about = "Maintenance CLI for the Obsidian community theme tag catalog"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", default_value = "themetool.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Compare the official and addon lists")]
    Status,
    #[command(about = "Build addon entries for themes missing from the addon list")]
    Process(ProcessArgs),
    #[command(about = "List addon entries no longer present in the official list")]
    Orphans,
    #[command(name = "clean-orphans", about = "Remove orphaned addon entries")]
    CleanOrphans(CleanOrphansArgs),
    #[command(about = "Validate list schemas, tags and screenshot URLs")]
    Validate(ValidateArgs),
    #[command(about = "Export a report of themes missing from the addon list")]
    Report(ReportArgs),
    #[command(about = "Inspect or prune store backups")]
    Backups(BackupsArgs),
    #[command(about = "Manage tag shorthand macros")]
    Macros(MacrosArgs),
    #[command(about = "Show GitHub metadata for one repo")]
    Info(InfoArgs),
}

#[derive(Debug, Args)]
struct ProcessArgs {
    #[arg(long, help = "Build entries from defaults without prompting")]
    auto: bool,
    #[arg(long, value_name = "N", help = "Process at most N missing themes")]
    limit: Option<usize>,
}

#[derive(Debug, Args)]
struct CleanOrphansArgs {
    #[arg(long, help = "Remove without asking for confirmation")]
    yes: bool,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[arg(long, help = "Validate only the official list")]
    official: bool,
    #[arg(long, help = "Validate only the addon list")]
    addon: bool,
    #[arg(long, help = "Probe screenshot URLs for reachability")]
    urls: bool,
    #[arg(long, value_name = "N", help = "Worker threads for the addon batch")]
    concurrency: Option<usize>,
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[arg(value_name = "PATH", help = "Write the report here instead of stdout")]
    path: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct BackupsArgs {
    #[command(subcommand)]
    command: BackupsSubcommand,
}

#[derive(Debug, Subcommand)]
enum BackupsSubcommand {
    List,
    Prune {
        #[arg(long, value_name = "N")]
        days: u64,
        #[arg(long, value_name = "N", default_value_t = 1)]
        keep: usize,
    },
}

#[derive(Debug, Args)]
struct MacrosArgs {
    #[command(subcommand)]
    command: MacrosSubcommand,
}

#[derive(Debug, Subcommand)]
enum MacrosSubcommand {
    List,
    Set { key: String, expansion: String },
    Remove { key: String },
}

#[derive(Debug, Args)]
struct InfoArgs {
    repo: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Status => run_status(&config),
        Commands::Process(args) => run_process(&config, args),
        Commands::Orphans => run_orphans(&config),
        Commands::CleanOrphans(args) => run_clean_orphans(&config, args),
        Commands::Validate(args) => run_validate(&config, args),
        Commands::Report(args) => run_report(&config, args),
        Commands::Backups(BackupsArgs { command }) => match command {
            BackupsSubcommand::List => run_backups_list(&config),
            BackupsSubcommand::Prune { days, keep } => run_backups_prune(&config, days, keep),
        },
        Commands::Macros(MacrosArgs { command }) => match command {
            MacrosSubcommand::List => run_macros_list(&config),
            MacrosSubcommand::Set { key, expansion } => run_macros_set(&config, &key, &expansion),
            MacrosSubcommand::Remove { key } => run_macros_remove(&config, &key),
        },
        Commands::Info(InfoArgs { repo }) => run_info(&config, &repo),
    }
}

struct StdinPrompter {
    interrupted: Arc<AtomicBool>,
}

impl StdinPrompter {
    fn new(interrupted: Arc<AtomicBool>) -> Self {
        Self { interrupted }
    }
}

impl Prompter for StdinPrompter {
    fn say(&mut self, line: &str) {
        println!("{line}");
    }

    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Ok(None);
        }
        print!("{prompt}");
        io::stdout().flush().context("failed to flush stdout")?;
        let mut line = String::new();
        let read = io::stdin()
            .read_line(&mut line)
            .context("failed to read stdin")?;
        if read == 0 || self.interrupted.load(Ordering::SeqCst) {
            println!();
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Install a Ctrl-C handler that requests a clean stop; a second Ctrl-C
/// terminates immediately.
fn install_interrupt_flag() -> Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        println!();
        println!("interrupt received, stopping after the current record");
    })
    .context("failed to install interrupt handler")?;
    Ok(interrupted)
}

fn stores(config: &ThemetoolConfig) -> (RecordStore, RecordStore) {
    let backup_dir = config.backup_dir();
    (
        RecordStore::new(config.official_path(), &backup_dir),
        RecordStore::new(config.addon_path(), &backup_dir),
    )
}

fn run_status(config: &ThemetoolConfig) -> Result<()> {
    let (official_store, addon_store) = stores(config);
    let official: Vec<ThemeRecord> = official_store
        .load()
        .context("failed to load official theme list")?;
    let addon: Vec<AddonRecord> = addon_store
        .load()
        .context("failed to load addon theme list")?;

    let summary = sync_summary(&official, &addon);
    println!("official: {}", summary.total_official);
    println!("addon: {}", summary.total_addon);
    println!("missing: {}", summary.missing);
    println!("orphaned: {}", summary.orphaned);
    println!("sync: {:.1}%", summary.sync_percentage);
    if summary.unkeyable_official > 0 || summary.unkeyable_addon > 0 {
        println!(
            "unkeyable: {} official, {} addon",
            summary.unkeyable_official, summary.unkeyable_addon
        );
    }
    if summary.duplicate_official > 0 || summary.duplicate_addon > 0 {
        println!(
            "duplicates: {} official, {} addon",
            summary.duplicate_official, summary.duplicate_addon
        );
    }
    Ok(())
}

fn run_process(config: &ThemetoolConfig, args: ProcessArgs) -> Result<()> {
    let (official_store, addon_store) = stores(config);
    let macros = TagMacros::load(&config.tag_macros_path())?;
    let interrupted = install_interrupt_flag()?;
    let options = SessionOptions {
        auto: args.auto,
        limit: args.limit,
        policy: TagPolicy {
            add_minimalistic: config.add_minimalistic(),
        },
        interrupted: Some(interrupted.clone()),
    };

    let mut prompter = StdinPrompter::new(interrupted);
    let report = run_session(&official_store, &addon_store, &macros, &options, &mut prompter)?;

    if report.missing == 0 {
        println!("already in sync, nothing to process");
    }
    println!("processed: {}", report.processed);
    println!("skipped: {}", report.skipped);
    println!("errors: {}", report.errors);
    for detail in &report.error_details {
        println!("  - {detail}");
    }
    if report.aborted {
        println!("aborted: session stopped early, completed work is saved");
    }
    Ok(())
}

fn run_orphans(config: &ThemetoolConfig) -> Result<()> {
    let (official_store, addon_store) = stores(config);
    let official: Vec<ThemeRecord> = official_store
        .load()
        .context("failed to load official theme list")?;
    let addon: Vec<AddonRecord> = addon_store
        .load()
        .context("failed to load addon theme list")?;

    let orphaned = find_orphaned(&official, &addon);
    println!("orphaned: {}", orphaned.len());
    for record in &orphaned {
        println!("  - {}", record.key().unwrap_or("<no repo>"));
    }
    Ok(())
}

fn run_clean_orphans(config: &ThemetoolConfig, args: CleanOrphansArgs) -> Result<()> {
    let (official_store, addon_store) = stores(config);
    let official: Vec<ThemeRecord> = official_store
        .load()
        .context("failed to load official theme list")?;
    let addon: Vec<AddonRecord> = addon_store
        .load()
        .context("failed to load addon theme list")?;

    let orphaned: BTreeSet<String> = find_orphaned(&official, &addon)
        .iter()
        .filter_map(|record| record.key().map(str::to_string))
        .collect();
    if orphaned.is_empty() {
        println!("orphaned: 0, nothing to remove");
        return Ok(());
    }

    for repo in &orphaned {
        println!("  - {repo}");
    }
    if !args.yes {
        let mut prompter = StdinPrompter::new(Arc::new(AtomicBool::new(false)));
        let answer = prompter
            .ask(&format!("Remove {} orphaned entries? (y/n): ", orphaned.len()))?
            .unwrap_or_default();
        if !answer.eq_ignore_ascii_case("y") && !answer.eq_ignore_ascii_case("yes") {
            println!("removed: 0 (cancelled)");
            return Ok(());
        }
    }

    let before = addon.len();
    let kept: Vec<AddonRecord> = addon
        .into_iter()
        .filter(|record| match record.key() {
            Some(key) => !orphaned.contains(key),
            None => true,
        })
        .collect();
    addon_store
        .save(&kept, true)
        .context("failed to save addon theme list")?;
    println!("removed: {}", before - kept.len());
    println!("remaining: {}", kept.len());
    Ok(())
}

fn run_validate(config: &ThemetoolConfig, args: ValidateArgs) -> Result<()> {
    let (official_store, addon_store) = stores(config);
    let check_official = args.official || !args.addon;
    let check_addon = args.addon || !args.official;
    let mut errors = 0usize;
    let mut warnings = 0usize;

    if check_official {
        let official: Vec<ThemeRecord> = official_store
            .load()
            .context("failed to load official theme list")?;
        for (index, record) in official.iter().enumerate() {
            let violations = validate_official_record(record);
            if violations.is_empty() {
                continue;
            }
            let key = record
                .key()
                .map(str::to_string)
                .unwrap_or_else(|| format!("entry_{index}"));
            for violation in &violations {
                print_violation("official", &key, violation, &mut errors, &mut warnings);
            }
        }
    }

    if check_addon {
        let addon: Vec<AddonRecord> = addon_store
            .load()
            .context("failed to load addon theme list")?;
        let probe = if args.urls {
            Some(HttpProbe::new(
                Duration::from_millis(config.url_timeout_ms()),
                DEFAULT_USER_AGENT,
            )?)
        } else {
            None
        };
        let options = BatchOptions {
            rules: TagRules {
                min_tags: config.min_tags(),
                max_tags: config.max_tags(),
            },
            max_side_screenshots: config.max_side_screenshots(),
            known_tags: None,
            probe: probe.as_ref().map(|probe| probe as &dyn UrlProbe),
        };
        let workers = args.concurrency.unwrap_or_else(|| config.concurrency());
        let results = validate_batch(&addon, &options, workers);
        for (key, violations) in &results {
            for violation in violations {
                print_violation("addon", key, violation, &mut errors, &mut warnings);
            }
        }
    }

    println!("errors: {errors}");
    println!("warnings: {warnings}");
    Ok(())
}

fn print_violation(
    list: &str,
    key: &str,
    violation: &Violation,
    errors: &mut usize,
    warnings: &mut usize,
) {
    let label = match violation.severity {
        Severity::Error => {
            *errors += 1;
            "error"
        }
        Severity::Warning => {
            *warnings += 1;
            "warning"
        }
    };
    println!("{label}: {list} {key} [{}] {}", violation.field, violation.message);
}

fn run_report(config: &ThemetoolConfig, args: ReportArgs) -> Result<()> {
    let (official_store, addon_store) = stores(config);
    let official: Vec<ThemeRecord> = official_store
        .load()
        .context("failed to load official theme list")?;
    let addon: Vec<AddonRecord> = addon_store
        .load()
        .context("failed to load addon theme list")?;

    let missing = find_missing(&official, &addon);
    let mut report = format!("themes missing from the addon list: {}\n", missing.len());
    for record in &missing {
        report.push_str(&format!(
            "- {} ({} by {})\n",
            record.key().unwrap_or("<no repo>"),
            record.display_name(),
            record.display_author()
        ));
    }

    match args.path {
        Some(path) => {
            fs::write(&path, report)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("report written: {}", path.display());
        }
        None => print!("{report}"),
    }
    Ok(())
}

fn run_backups_list(config: &ThemetoolConfig) -> Result<()> {
    let backups = list_backups(&config.backup_dir())?;
    println!("backups: {}", backups.len());
    for backup in &backups {
        println!("  - {} ({} bytes)", backup.file_name, backup.size_bytes);
    }
    Ok(())
}

fn run_backups_prune(config: &ThemetoolConfig, days: u64, keep: usize) -> Result<()> {
    let report = prune_backups(&config.backup_dir(), days, keep)?;
    println!("removed: {}", report.removed);
    println!("kept: {}", report.kept);
    for error in &report.errors {
        println!("  - {error}");
    }
    Ok(())
}

fn run_macros_list(config: &ThemetoolConfig) -> Result<()> {
    let macros = TagMacros::load(&config.tag_macros_path())?;
    println!("macros: {}", macros.len());
    for (key, expansion) in macros.iter() {
        println!("  {key}: {expansion}");
    }
    Ok(())
}

fn run_macros_set(config: &ThemetoolConfig, key: &str, expansion: &str) -> Result<()> {
    let path = config.tag_macros_path();
    let mut macros = TagMacros::load(&path)?;
    macros.set(key, expansion);
    macros.save(&path)?;
    println!("set: {key} -> {expansion}");
    Ok(())
}

fn run_macros_remove(config: &ThemetoolConfig, key: &str) -> Result<()> {
    let path = config.tag_macros_path();
    let mut macros = TagMacros::load(&path)?;
    if !macros.remove(key) {
        println!("not found: {key}");
        return Ok(());
    }
    macros.save(&path)?;
    println!("removed: {key}");
    Ok(())
}

fn run_info(config: &ThemetoolConfig, repo: &str) -> Result<()> {
    let token = std::env::var("THEMETOOL_GITHUB_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty());
    let client = GithubClient::new(
        Duration::from_millis(config.github_timeout_ms()),
        DEFAULT_USER_AGENT,
        token,
    )?;
    let metadata = client.fetch(repo);
    println!("repo: {}", metadata.repo);
    println!("url: {}", repo_url(repo));
    println!("description: {}", metadata.description);
    println!("created: {}", metadata.created_at);
    println!("stars: {}", metadata.stars);
    println!("archived: {}", metadata.archived);
    Ok(())
}
