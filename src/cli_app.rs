//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use homescreen_layout::core::config::Config;
use homescreen_layout::grid::GridGeometry;
use homescreen_layout::loader::{
    BindEvent, ItemRequest, LayoutCallbacks, LoadSummary, LoaderDeps, LoaderPipeline, PipelineSettings,
    RecordingCallbacks, RowOutcome, RowValidator, StaticServices, UiExecutor, check_placement,
};
use homescreen_layout::logger::{
    ActivityEvent, ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger,
};
use homescreen_layout::migration::{GridMigration, MigrationPolicy};
use homescreen_layout::model::{ComponentName, Container, Item, ScreenId};
use homescreen_layout::store::{LayoutStore, SqliteStore};

/// Home-screen Layout: inspect, repair, and migrate launcher workspace databases.
#[derive(Debug, Parser)]
#[command(
    name = "hsl",
    author,
    version,
    about = "Home-screen Layout - launcher workspace tooling",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override the layout database path.
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Report what a load would delete or repair, without writing.
    Check(CheckArgs),
    /// Run the full loader: validate, persist repairs, migrate, and bind.
    Load(LoadArgs),
    /// Move the layout to a different grid size.
    Migrate(MigrateArgs),
    /// Place apps into the first free cells.
    Add(AddArgs),
    /// View configuration state.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct CheckArgs {
    /// Also list the items that survive.
    #[arg(long)]
    items: bool,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct LoadArgs {
    /// Print every bound item grouped by container.
    #[arg(long)]
    items: bool,
}

#[derive(Debug, Clone, Args, Serialize)]
struct MigrateArgs {
    /// Destination columns.
    #[arg(long)]
    columns: u32,
    /// Destination rows.
    #[arg(long)]
    rows: u32,
    /// Destination hotseat slots (defaults to the configured count).
    #[arg(long)]
    hotseat: Option<u32>,
    /// Compute the result without writing it.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Args, Serialize)]
struct AddArgs {
    /// Components to add, as `package/class`.
    #[arg(required = true, value_name = "COMPONENT")]
    components: Vec<String>,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ConfigArgs {
    /// Config subcommand.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Check(args) => run_check(cli, args),
        Command::Load(args) => run_load(cli, args),
        Command::Migrate(args) => run_migrate(cli, args),
        Command::Add(args) => run_add(cli, args),
        Command::Config(args) => run_config(cli, args),
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config =
        Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))?;
    if let Some(db) = &cli.db {
        config.paths.database.clone_from(db);
    }
    Ok(config)
}

fn open_store(config: &Config) -> Result<SqliteStore, CliError> {
    let store = SqliteStore::open(&config.paths.database, config.grid.columns).map_err(|e| {
        CliError::Runtime(format!(
            "open layout database {}: {e}",
            config.paths.database.display()
        ))
    })?;
    Ok(store)
}

/// Activity logger for the duration of one command.
struct CommandLogger {
    handle: ActivityLoggerHandle,
    join: Option<JoinHandle<()>>,
}

impl CommandLogger {
    fn start(config: &Config) -> Self {
        if !config.logging.enabled {
            return Self {
                handle: ActivityLoggerHandle::disabled(),
                join: None,
            };
        }
        match spawn_logger(ActivityLoggerConfig::from_config(config)) {
            Ok((handle, join)) => Self {
                handle,
                join: Some(join),
            },
            Err(e) => {
                eprintln!("[HSL-CLI] activity log disabled: {e}");
                Self {
                    handle: ActivityLoggerHandle::disabled(),
                    join: None,
                }
            }
        }
    }

    fn finish(self) {
        self.handle.shutdown();
        if let Some(join) = self.join {
            let _ = join.join();
        }
    }
}

/// A pipeline over the configured database with recording callbacks and an
/// inline UI executor.
struct CliPipeline {
    pipeline: LoaderPipeline,
    callbacks: Arc<RecordingCallbacks>,
}

fn spawn_pipeline(config: &Config, logger: &CommandLogger) -> Result<CliPipeline, CliError> {
    let store = open_store(config)?;
    let report = store.schema_report();
    if report.upgraded() {
        logger.handle.send(ActivityEvent::SchemaUpgraded {
            from: report.from_version,
            to: report.to_version,
            reset: report.reset,
        });
    }

    let settings = PipelineSettings::from_config(config);
    let callbacks = Arc::new(RecordingCallbacks::new());
    let pipeline = LoaderPipeline::spawn(
        settings,
        LoaderDeps {
            store: Box::new(store),
            services: Arc::new(StaticServices::permissive()),
            callbacks: Arc::clone(&callbacks) as Arc<dyn LayoutCallbacks>,
            ui: UiExecutor::inline(),
            logger: logger.handle.clone(),
        },
    )
    .map_err(|e| CliError::Runtime(e.to_string()))?;
    Ok(CliPipeline {
        pipeline,
        callbacks,
    })
}

/// Load and wait. Returns the summary, failing if the load failed.
fn load_and_wait(p: &CliPipeline) -> Result<LoadSummary, CliError> {
    p.pipeline
        .start_load()
        .and_then(|_| p.pipeline.sync())
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let summary = p
        .pipeline
        .last_load()
        .ok_or_else(|| CliError::Runtime("load did not run".to_string()))?;
    if let Some(error) = &summary.error {
        return Err(CliError::Runtime(format!("load failed: {error}")));
    }
    Ok(summary)
}

fn run_check(cli: &Cli, args: &CheckArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mut store = open_store(&config)?;
    let rows = store
        .read_rows()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let grid = store
        .grid_state()
        .map_err(|e| CliError::Runtime(e.to_string()))?
        .unwrap_or(config.grid);

    let services = StaticServices::permissive();
    let validator = RowValidator::new(&services);
    let mut accepted = Vec::with_capacity(rows.len());
    let mut deleted = Vec::new();
    let mut repaired = Vec::new();
    for row in &rows {
        match validator.process(row) {
            RowOutcome::Accept(item) => accepted.push(item),
            RowOutcome::Repair { item, repair } => {
                repaired.push(json!({ "id": item.id.0, "repair": repair.as_str() }));
                accepted.push(item);
            }
            RowOutcome::Delete(item) => deleted.push(item),
        }
    }
    let placement = check_placement(accepted, &grid);
    deleted.extend(placement.deleted);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Layout check: {}", config.paths.database.display());
            println!("  Grid: {grid}");
            println!("  Rows: {}", rows.len());
            println!("  Kept: {}", placement.kept.len());
            println!("  Repairs: {}", repaired.len());
            println!("  Deletions: {}", deleted.len());
            for d in &deleted {
                println!("    - item {} ({})", d.id, d.reason.as_str());
            }
            if args.items {
                print_items_human(&placement.kept);
            }
        }
        OutputMode::Json => {
            let mut payload = json!({
                "command": "check",
                "database": config.paths.database.to_string_lossy(),
                "grid": grid,
                "rows": rows.len(),
                "kept": placement.kept.len(),
                "repaired": repaired,
                "deleted": deleted,
            });
            if args.items {
                payload["items"] = serde_json::to_value(&placement.kept)?;
            }
            write_json_line(&payload)?;
        }
    }

    if deleted.is_empty() {
        Ok(())
    } else {
        Err(CliError::Partial(format!(
            "{} rows would be deleted on next load",
            deleted.len()
        )))
    }
}

fn run_load(cli: &Cli, args: &LoadArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let logger = CommandLogger::start(&config);
    let started = Instant::now();
    let result = spawn_pipeline(&config, &logger).and_then(|p| {
        let summary = load_and_wait(&p)?;
        let items = p.pipeline.snapshot();
        let screens = p.pipeline.with_model(|m| m.screens());
        let broadcasts = p
            .callbacks
            .events()
            .into_iter()
            .filter(|e| matches!(e, BindEvent::Broadcast(_)))
            .count();
        Ok((summary, items, screens, broadcasts))
    });
    logger.finish();
    let (summary, items, screens, broadcasts) = result?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Loaded {} items in {} ms", summary.items, started.elapsed().as_millis());
            println!("  Screens: {}", format_screens(&screens));
            println!("  Repaired: {}", summary.repaired);
            println!("  Deleted: {}", summary.deleted.len());
            if let Some(mode) = summary.migration {
                println!("  Migrated to {} ({})", config.grid, mode.as_str());
            }
            println!("  Installer broadcasts: {broadcasts}");
            if args.items {
                print_items_human(&items);
            }
        }
        OutputMode::Json => {
            let mut payload = json!({
                "command": "load",
                "summary": summary,
                "screens": screens,
                "broadcasts": broadcasts,
            });
            if args.items {
                payload["items"] = serde_json::to_value(&items)?;
            }
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_migrate(cli: &Cli, args: &MigrateArgs) -> Result<(), CliError> {
    if args.columns == 0 || args.rows == 0 {
        return Err(CliError::User(
            "--columns and --rows must be at least 1".to_string(),
        ));
    }
    let config = load_config(cli)?;
    let dest = GridGeometry::new(
        args.columns,
        args.rows,
        args.hotseat.unwrap_or(config.grid.hotseat_slots),
    );

    if args.dry_run {
        return run_migrate_dry(cli, &config, dest);
    }

    let logger = CommandLogger::start(&config);
    let result = spawn_pipeline(&config, &logger).and_then(|p| {
        let before = load_and_wait(&p)?;
        let source = p.pipeline.with_model(|m| m.geometry());
        p.pipeline
            .request_migration(dest)
            .and_then(|()| p.pipeline.sync())
            .map_err(|e| CliError::Runtime(e.to_string()))?;
        let after = p.pipeline.with_model(|m| (m.geometry(), m.len(), m.screens()));
        Ok((before.items, source, after))
    });
    logger.finish();
    let (items_before, source, (geometry, items_after, screens)) = result?;

    if geometry != dest {
        return Err(CliError::Runtime(format!(
            "migration to {dest} was not applied; see the activity log"
        )));
    }
    // Later loads build the pipeline from the config grid, so it has to follow.
    let config_path = &config.paths.config_file;
    write_grid_to_config(config_path, dest)?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Migrated {source} -> {dest}");
            println!("  Items: {items_before} -> {items_after}");
            println!("  Screens: {}", format_screens(&screens));
            println!("  Config updated: {}", config_path.display());
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "migrate",
                "from": source,
                "to": dest,
                "items_before": items_before,
                "items_after": items_after,
                "screens": screens,
                "config": config_path.to_string_lossy(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

/// Rewrite the `[grid]` table of the config file, keeping every other key.
fn write_grid_to_config(config_path: &Path, grid: GridGeometry) -> Result<(), CliError> {
    let mut toml_value: toml::Value = if config_path.exists() {
        let raw = std::fs::read_to_string(config_path)
            .map_err(|e| CliError::Runtime(format!("read config: {e}")))?;
        toml::from_str(&raw).map_err(|e| CliError::Runtime(format!("parse config: {e}")))?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };
    let toml::Value::Table(root) = &mut toml_value else {
        return Err(CliError::Runtime(format!(
            "config {} is not a TOML table",
            config_path.display()
        )));
    };
    let section = root
        .entry("grid")
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    let toml::Value::Table(section) = section else {
        return Err(CliError::User("config key 'grid' is not a table".to_string()));
    };
    section.insert("columns".to_string(), toml::Value::Integer(i64::from(grid.columns)));
    section.insert("rows".to_string(), toml::Value::Integer(i64::from(grid.rows)));
    section.insert(
        "hotseat_slots".to_string(),
        toml::Value::Integer(i64::from(grid.hotseat_slots)),
    );

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::Runtime(format!("create config dir: {e}")))?;
    }
    let toml_str = toml::to_string_pretty(&toml_value)
        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
    std::fs::write(config_path, toml_str)
        .map_err(|e| CliError::Runtime(format!("write config: {e}")))
}

fn run_migrate_dry(cli: &Cli, config: &Config, dest: GridGeometry) -> Result<(), CliError> {
    let mut store = open_store(config)?;
    let rows = store
        .read_rows()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let source = store
        .grid_state()
        .map_err(|e| CliError::Runtime(e.to_string()))?
        .unwrap_or(config.grid);

    let services = StaticServices::permissive();
    let validator = RowValidator::new(&services);
    let items: Vec<Item> = rows
        .iter()
        .filter_map(|row| validator.process(row).item().cloned())
        .collect();
    let items = check_placement(items, &source).kept;

    let outcome = GridMigration::new(MigrationPolicy::from_config(&config.migration))
        .migrate(&items, source, dest)
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Dry run: {source} -> {dest}");
            println!("  Mode: {}", outcome.mode.as_str());
            println!("  Items: {}", outcome.items.len());
            println!("  Moved: {}", outcome.moved);
            println!("  Hotseat overflow: {}", outcome.hotseat_overflow.len());
            print_items_human(&outcome.items);
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "migrate",
                "dry_run": true,
                "from": source,
                "to": dest,
                "mode": outcome.mode,
                "moved": outcome.moved,
                "hotseat_overflow": outcome.hotseat_overflow.iter().map(|id| id.0).collect::<Vec<_>>(),
                "items": outcome.items,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_add(cli: &Cli, args: &AddArgs) -> Result<(), CliError> {
    let requests = parse_components(&args.components)?
        .into_iter()
        .map(ItemRequest::app)
        .collect::<Vec<_>>();
    let config = load_config(cli)?;
    let logger = CommandLogger::start(&config);
    let result = spawn_pipeline(&config, &logger).and_then(|p| {
        load_and_wait(&p)?;
        p.pipeline
            .add_items_and_wait(requests)
            .map_err(|e| CliError::Runtime(e.to_string()))
    });
    logger.finish();
    let added = result?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "Added {} items ({} skipped as duplicates)",
                added.len(),
                added.skipped
            );
            if !added.new_screens.is_empty() {
                println!("  New screens: {}", format_screens(&added.new_screens));
            }
            print_items_human(&added.items());
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "add",
                "added": added.items(),
                "skipped": added.skipped,
                "new_screens": added.new_screens,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn parse_components(raw: &[String]) -> Result<Vec<ComponentName>, CliError> {
    raw.iter()
        .map(|s| {
            ComponentName::unflatten(s)
                .ok_or_else(|| CliError::User(format!("invalid component (want pkg/class): {s}")))
        })
        .collect()
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Grid: {}", config.grid);
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(e.to_string()))
            }
        },
    }
}

fn format_screens(screens: &[ScreenId]) -> String {
    if screens.is_empty() {
        return "none".to_string();
    }
    screens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_items_human(items: &[Item]) {
    let mut sorted: Vec<&Item> = items.iter().collect();
    sorted.sort_by_key(|i| (container_order(&i.container), i.cell_y, i.cell_x, i.rank, i.id));
    for item in sorted {
        let place = match item.container {
            Container::Desktop(screen) => format!(
                "screen {screen} @ {},{} {}x{}",
                item.cell_x, item.cell_y, item.span_x, item.span_y
            ),
            Container::Hotseat(slot) => format!("hotseat slot {slot}"),
            Container::Folder(folder) => format!("folder {folder} rank {}", item.rank),
        };
        println!(
            "    [{}] {:<16} {:<28} {}",
            item.id,
            item.kind.label(),
            place,
            item.title.as_deref().unwrap_or("")
        );
    }
}

fn container_order(container: &Container) -> (u8, i64) {
    match container {
        Container::Desktop(screen) => (0, i64::from(screen.0)),
        Container::Hotseat(_) => (1, 0),
        Container::Folder(folder) => (2, folder.0),
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("HSL_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn migrate_args_parse() {
        let cli = Cli::try_parse_from([
            "hsl", "--db", "/tmp/x.db", "migrate", "--columns", "5", "--rows", "6", "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.db.as_deref(), Some(std::path::Path::new("/tmp/x.db")));
        let Command::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        assert_eq!((args.columns, args.rows, args.hotseat), (5, 6, None));
        assert!(args.dry_run);
    }

    #[test]
    fn grid_rewrite_keeps_other_config_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[grid]\ncolumns = 5\nrows = 5\nhotseat_slots = 5\n\n[broadcast]\nmax_items = 12\n",
        )
        .unwrap();

        write_grid_to_config(&path, GridGeometry::new(4, 6, 3)).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.grid, GridGeometry::new(4, 6, 3));
        assert_eq!(config.broadcast.max_items, 12);
    }

    #[test]
    fn add_requires_components() {
        assert!(Cli::try_parse_from(["hsl", "add"]).is_err());
        let parsed = parse_components(&["com.mail/.Inbox".to_string()]).unwrap();
        assert_eq!(parsed[0].class, "com.mail.Inbox");
        assert!(matches!(
            parse_components(&["nonsense".to_string()]),
            Err(CliError::User(_))
        ));
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        assert_eq!(
            resolve_output_mode(false, Some("auto"), true),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn exit_codes_are_distinct_per_class() {
        assert_eq!(CliError::User(String::new()).exit_code(), 1);
        assert_eq!(CliError::Runtime(String::new()).exit_code(), 2);
        assert_eq!(CliError::Partial(String::new()).exit_code(), 4);
    }

    #[test]
    fn screens_format() {
        assert_eq!(format_screens(&[]), "none");
        assert_eq!(format_screens(&[ScreenId(0), ScreenId(2)]), "0, 2");
    }
}
