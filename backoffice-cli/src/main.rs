mod config;

use anyhow::{Context, anyhow};
use backoffice_core::ToolError;
use backoffice_core::adapters::{
    DirPackage, HttpCatalog, JsonFileCatalog, StaticReviewers, SystemClock, UrlManifestFetcher,
};
use backoffice_core::check::{run_check_tool, run_staged_test, run_test};
use backoffice_core::collection::generate_collection_json;
use backoffice_core::index::run_index;
use backoffice_core::pipeline::{partial_if_failed, run_wipe};
use backoffice_core::ports::CatalogSource;
use backoffice_core::staging::Staging;
use backoffice_core::summarize::run_summarize;
use backoffice_core::validate::validate_format;
use backoffice_core::{CommandToolCheck, ManifestCache};
use backoffice_render::{render_chat_md, render_log_md};
use backoffice_reports::ToolIdentity;
use backoffice_store::FsStore;
use backoffice_types::collection::CollectionMode;
use backoffice_types::versions::{StageNumber, VersionLabel, staged_label};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use config::{ConfigMerger, MergedConfig, Overrides};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "backoffice",
    version,
    about = "Stage, test, review and publish community model packages."
)]
struct Cli {
    /// Config file (default: ./backoffice.toml when present).
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Directory backing the store.
    #[arg(long, global = true, env = "BACKOFFICE_ROOT")]
    root: Option<Utf8PathBuf>,

    /// API token for the catalog service.
    #[arg(long, global = true, env = "BACKOFFICE_CATALOG_TOKEN", hide_env_values = true)]
    catalog_token: Option<String>,

    /// HTTP timeout in seconds.
    #[arg(long, global = true, env = "HTTP_TIMEOUT")]
    http_timeout: Option<u64>,

    /// Link to the CI run, recorded in status and log entries.
    #[arg(long, global = true, env = "RUN_URL")]
    run_url: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild index.json from the catalog and scaffold report directories.
    Index(IndexArgs),
    /// Recompute every compatibility summary and the overview.
    Summarize,
    /// Upload an unpacked package directory as the next staged version.
    Stage(StageArgs),
    /// Validate a version's manifest and write a format report.
    #[command(alias = "validate_format")]
    ValidateFormat(VersionArgs),
    /// Run a tool check for one indexed or staged version.
    Test(TestArgs),
    /// Run a tool check over every indexed version that has no report yet.
    #[command(alias = "check_tool")]
    CheckTool(CheckToolArgs),
    /// Mark a staged version as tested and waiting for a reviewer.
    #[command(alias = "await_review")]
    AwaitReview(VersionArgs),
    /// Ask for changes to the latest staged version.
    #[command(alias = "request_changes")]
    RequestChanges(RequestChangesArgs),
    /// Accept and publish the latest staged version.
    Publish(ReviewerArgs),
    /// Delete everything below a sandbox or testing prefix.
    Wipe(WipeArgs),
    /// Write collection.json (or collection_draft.json).
    #[command(alias = "generate_collection_json")]
    GenerateCollectionJson(CollectionArgs),
    /// Append a message to a version's log and print the log.
    Log(LogArgs),
    /// Print a version's chat, optionally adding a message first.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct IndexArgs {
    /// Read the catalog from a JSON listing instead of the catalog service.
    #[arg(long)]
    catalog_file: Option<Utf8PathBuf>,
}

#[derive(Debug, Args)]
struct StageArgs {
    id: String,
    package_dir: Utf8PathBuf,
}

#[derive(Debug, Args)]
struct VersionArgs {
    id: String,
    /// `staged/<n>`, a publish number, or a catalog version.
    version: String,
}

#[derive(Debug, Args)]
struct ToolArgs {
    #[arg(long)]
    tool: String,

    #[arg(long)]
    tool_version: String,
}

#[derive(Debug, Args)]
struct TestArgs {
    id: String,
    version: String,

    #[command(flatten)]
    tool: ToolArgs,

    /// Program and arguments; the manifest path is appended.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Debug, Args)]
struct CheckToolArgs {
    #[command(flatten)]
    tool: ToolArgs,

    /// Only check resources whose id starts with this.
    #[arg(long, default_value = "")]
    id_prefix: String,

    /// Program and arguments; the manifest path is appended.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Debug, Args)]
struct ReviewerArgs {
    id: String,

    #[arg(long)]
    reviewer: String,
}

#[derive(Debug, Args)]
struct RequestChangesArgs {
    id: String,

    #[arg(long)]
    reviewer: String,

    #[arg(long)]
    reason: String,
}

#[derive(Debug, Args)]
struct WipeArgs {
    /// Store prefix to wipe (default: the whole store).
    subfolder: Option<String>,
}

#[derive(Debug, Args)]
struct CollectionArgs {
    #[arg(long, value_enum, default_value = "published")]
    mode: ModeArg,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    Published,
    Draft,
}

impl From<ModeArg> for CollectionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Published => CollectionMode::Published,
            ModeArg::Draft => CollectionMode::Draft,
        }
    }
}

#[derive(Debug, Args)]
struct LogArgs {
    id: String,
    version: String,
    message: String,
}

#[derive(Debug, Args)]
struct ChatArgs {
    id: String,
    version: String,

    #[arg(long, default_value = "backoffice")]
    author: String,

    #[arg(long)]
    message: Option<String>,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn real_main() -> Result<(), ToolError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file_config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_or_default(Utf8Path::new(".")).context("load backoffice.toml")?,
    };
    let merged = ConfigMerger::new(file_config).merge(Overrides {
        root: cli.root,
        catalog_token: cli.catalog_token,
        http_timeout_secs: cli.http_timeout,
        run_url: cli.run_url,
    });
    debug!(
        "merged config: root={}, reports_root={}, collection_root={}, tools={:?}",
        merged.root,
        merged.settings.reports_root,
        merged.settings.collection_root,
        merged.settings.tools.keys().collect::<Vec<_>>()
    );

    let store = FsStore::new(merged.root.clone());
    match cli.cmd {
        Command::Index(args) => cmd_index(&merged, &store, args),
        Command::Summarize => cmd_summarize(&merged, &store),
        Command::Stage(args) => cmd_stage(&merged, &store, args),
        Command::ValidateFormat(args) => cmd_validate_format(&merged, &store, args),
        Command::Test(args) => cmd_test(&merged, &store, args),
        Command::CheckTool(args) => cmd_check_tool(&merged, &store, args),
        Command::AwaitReview(args) => cmd_await_review(&merged, &store, args),
        Command::RequestChanges(args) => cmd_request_changes(&merged, &store, args),
        Command::Publish(args) => cmd_publish(&merged, &store, args),
        Command::Wipe(args) => cmd_wipe(&store, args),
        Command::GenerateCollectionJson(args) => cmd_generate_collection_json(&merged, &store, args),
        Command::Log(args) => cmd_log(&merged, &store, args),
        Command::Chat(args) => cmd_chat(&merged, &store, args),
    }
}

fn cmd_index(merged: &MergedConfig, store: &FsStore, args: IndexArgs) -> Result<(), ToolError> {
    let catalog: Box<dyn CatalogSource> = match args.catalog_file.or(merged.catalog.file.clone()) {
        Some(path) => Box::new(JsonFileCatalog::new(path)),
        None => Box::new(HttpCatalog::new(merged.catalog.clone())),
    };
    let fetcher = manifest_fetcher(merged);

    let outcome = run_index(
        &merged.settings,
        store,
        catalog.as_ref(),
        &fetcher,
        &SystemClock,
    )?;
    println!(
        "indexed {} resource(s): {} created, {} reinitialized, {} unchanged, {} failed",
        outcome.index.total,
        outcome.created,
        outcome.reinitialized,
        outcome.unchanged,
        outcome.failed()
    );
    if outcome.missing > 0 {
        error!("catalog listing is incomplete: {} resource(s) missing", outcome.missing);
    }
    partial_if_failed(outcome.failed() + outcome.missing)
}

fn cmd_summarize(merged: &MergedConfig, store: &FsStore) -> Result<(), ToolError> {
    let outcome = run_summarize(&merged.settings, store)?;
    for failure in &outcome.failures {
        error!(resource = %failure.id, version = %failure.version, "{}", failure.message);
    }
    println!(
        "summarized {} version(s), {} summary file(s) changed",
        outcome.summarized, outcome.written
    );
    partial_if_failed(outcome.failures.len())
}

fn cmd_stage(merged: &MergedConfig, store: &FsStore, args: StageArgs) -> Result<(), ToolError> {
    let reviewers = StaticReviewers::new(merged.reviewers.clone());
    let staging = Staging::new(&merged.settings, store, &reviewers, &SystemClock);
    let package = DirPackage::new(args.package_dir);

    let outcome = staging.stage(&args.id, &package)?;
    for n in &outcome.superseded {
        info!(resource = %args.id, "{} superseded", staged_label(*n));
    }
    println!("{} {}: {}", args.id, staged_label(outcome.number), outcome.state);
    Ok(())
}

fn cmd_validate_format(
    merged: &MergedConfig,
    store: &FsStore,
    args: VersionArgs,
) -> Result<(), ToolError> {
    let outcome = validate_format(&merged.settings, store, &SystemClock, &args.id, &args.version)?;
    println!("{}: {}", outcome.report.status, outcome.path);
    Ok(())
}

fn cmd_test(merged: &MergedConfig, store: &FsStore, args: TestArgs) -> Result<(), ToolError> {
    let check = command_check(merged, &args.tool, &args.command)?;
    let (_tmp, mut cache) = manifest_cache()?;

    let path = match VersionLabel::parse(&args.version) {
        Some(VersionLabel::Staged(n)) => {
            let reviewers = StaticReviewers::new(merged.reviewers.clone());
            let staging = Staging::new(&merged.settings, store, &reviewers, &SystemClock);
            run_staged_test(
                &merged.settings,
                store,
                &staging,
                &check,
                &mut cache,
                &args.id,
                n,
            )?
        }
        _ => run_test(
            &merged.settings,
            store,
            &check,
            &manifest_fetcher(merged),
            &mut cache,
            &args.id,
            &args.version,
        )?,
    };
    println!("{path}");
    Ok(())
}

fn cmd_check_tool(
    merged: &MergedConfig,
    store: &FsStore,
    args: CheckToolArgs,
) -> Result<(), ToolError> {
    let check = command_check(merged, &args.tool, &args.command)?;
    let fetcher = manifest_fetcher(merged);
    let (_tmp, mut cache) = manifest_cache()?;

    let run = run_check_tool(
        &merged.settings,
        store,
        &check,
        &fetcher,
        &mut cache,
        &args.id_prefix,
    )?;
    for failure in &run.failures {
        error!(resource = %failure.id, version = %failure.version, "{}", failure.message);
    }
    println!(
        "wrote {} report(s), {} already present, {} failed",
        run.written.len(),
        run.existing,
        run.failures.len()
    );
    partial_if_failed(run.failures.len())
}

fn cmd_await_review(
    merged: &MergedConfig,
    store: &FsStore,
    args: VersionArgs,
) -> Result<(), ToolError> {
    let reviewers = StaticReviewers::new(merged.reviewers.clone());
    let staging = Staging::new(&merged.settings, store, &reviewers, &SystemClock);
    let n = parse_staged(&args.version)?;

    let record = staging.await_review(&args.id, n)?;
    println!("{} {}: {}", args.id, staged_label(n), record.status.name);
    Ok(())
}

fn cmd_request_changes(
    merged: &MergedConfig,
    store: &FsStore,
    args: RequestChangesArgs,
) -> Result<(), ToolError> {
    let reviewers = StaticReviewers::new(merged.reviewers.clone());
    let staging = Staging::new(&merged.settings, store, &reviewers, &SystemClock);

    let record = staging.request_changes(&args.id, &args.reviewer, &args.reason)?;
    println!("{}: {}", args.id, record.status.name);
    Ok(())
}

fn cmd_publish(merged: &MergedConfig, store: &FsStore, args: ReviewerArgs) -> Result<(), ToolError> {
    let reviewers = StaticReviewers::new(merged.reviewers.clone());
    let staging = Staging::new(&merged.settings, store, &reviewers, &SystemClock);

    let outcome = staging.publish(&args.id, &args.reviewer)?;
    println!(
        "{} {} published as {}",
        args.id,
        staged_label(outcome.stage_number),
        outcome.publish_number
    );
    Ok(())
}

fn cmd_wipe(store: &FsStore, args: WipeArgs) -> Result<(), ToolError> {
    let location = run_wipe(store, args.subfolder.as_deref().unwrap_or_default())?;
    println!("wiped {location}");
    Ok(())
}

fn cmd_generate_collection_json(
    merged: &MergedConfig,
    store: &FsStore,
    args: CollectionArgs,
) -> Result<(), ToolError> {
    let outcome = generate_collection_json(&merged.settings, store, args.mode.into())?;
    println!(
        "{} entries written to {}",
        outcome.collection.collection.len(),
        outcome.key
    );
    partial_if_failed(outcome.failed.len())
}

fn cmd_log(merged: &MergedConfig, store: &FsStore, args: LogArgs) -> Result<(), ToolError> {
    let label = parse_label(&args.version)?;
    let reviewers = StaticReviewers::new(merged.reviewers.clone());
    let staging = Staging::new(&merged.settings, store, &reviewers, &SystemClock);

    staging.append_log(&args.id, label, args.message, None)?;
    print!("{}", render_log_md(&staging.log(&args.id, label)?));
    Ok(())
}

fn cmd_chat(merged: &MergedConfig, store: &FsStore, args: ChatArgs) -> Result<(), ToolError> {
    let label = parse_label(&args.version)?;
    let reviewers = StaticReviewers::new(merged.reviewers.clone());
    let staging = Staging::new(&merged.settings, store, &reviewers, &SystemClock);

    if let Some(message) = args.message {
        staging.append_chat(&args.id, label, &args.author, message)?;
    }
    print!("{}", render_chat_md(&staging.chat(&args.id, label)?));
    Ok(())
}

fn parse_label(version: &str) -> anyhow::Result<VersionLabel> {
    VersionLabel::parse(version)
        .ok_or_else(|| anyhow!("'{version}' is neither staged/<n> nor a publish number"))
}

/// `staged/<n>` or a bare `<n>`.
fn parse_staged(version: &str) -> anyhow::Result<StageNumber> {
    match VersionLabel::parse(version) {
        Some(VersionLabel::Staged(n) | VersionLabel::Published(n)) => Ok(n),
        None => Err(anyhow!("'{version}' is not a staged version")),
    }
}

fn manifest_fetcher(merged: &MergedConfig) -> UrlManifestFetcher {
    UrlManifestFetcher::new(merged.catalog.token.clone(), merged.catalog.http_timeout_secs)
}

/// Manifest cache in a temporary directory removed when the guard drops.
fn manifest_cache() -> anyhow::Result<(tempfile::TempDir, ManifestCache)> {
    let tmp = tempfile::Builder::new()
        .prefix("backoffice-manifests")
        .tempdir()
        .context("create manifest cache dir")?;
    let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .map_err(|p| anyhow!("non-utf8 temp dir {}", p.display()))?;
    Ok((tmp, ManifestCache::new(dir)))
}

fn command_check(
    merged: &MergedConfig,
    tool: &ToolArgs,
    command: &[String],
) -> anyhow::Result<CommandToolCheck> {
    let identity = ToolIdentity::new(&tool.tool, &tool.tool_version).context("invalid tool")?;
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("no check command given"))?;
    Ok(CommandToolCheck::new(identity, program, args.to_vec())
        .with_applicable_types(merged.settings.applicable_types(&tool.tool)))
}
