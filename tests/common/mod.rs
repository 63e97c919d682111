#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use homescreen_layout::grid::GridGeometry;
use homescreen_layout::loader::{
    LayoutCallbacks, LoaderDeps, LoaderPipeline, PipelineSettings, RecordingCallbacks,
    StaticServices, SystemServices, UiExecutor,
};
use homescreen_layout::logger::ActivityLoggerHandle;
use homescreen_layout::migration::MigrationPolicy;
use homescreen_layout::model::{ComponentName, ScreenId, UserSerial};
use homescreen_layout::store::{
    CONTAINER_HOTSEAT, ITEM_TYPE_APPWIDGET, ITEM_TYPE_FOLDER, LayoutStore, PersistedRow,
};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_hsl") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "hsl.exe" } else { "hsl" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve hsl binary path for integration test"),
    }
}

/// Run the CLI and keep a log of the invocation next to the temp dir.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("hsl-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute hsl command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Temp directory with a config file whose paths all point inside it.
pub struct TestEnvironment {
    pub dir: tempfile::TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.root().join("launcher.db")
    }

    pub fn log_path(&self) -> PathBuf {
        self.root().join("activity.jsonl")
    }

    /// Write a config for `grid` and return its path.
    pub fn write_config(&self, grid: GridGeometry) -> PathBuf {
        let path = self.root().join("config.toml");
        let contents = format!(
            "[grid]\ncolumns = {}\nrows = {}\nhotseat_slots = {}\n\n\
             [paths]\ndatabase = \"{}\"\nactivity_log = \"{}\"\n",
            grid.columns,
            grid.rows,
            grid.hotseat_slots,
            self.db_path().display(),
            self.log_path().display(),
        );
        fs::write(&path, contents).expect("write config");
        path
    }
}

pub const MAIL: &str = "com.example.mail";
pub const CHAT: &str = "com.example.chat";
pub const CLOCK: &str = "com.example.clock";

pub fn component(package: &str) -> ComponentName {
    ComponentName::new(package, format!("{package}.Main"))
}

fn intent_for(package: &str) -> String {
    format!("#Intent;component={package}/.Main;end")
}

pub fn app_row(id: i64, package: &str, screen: i64, x: i64, y: i64) -> PersistedRow {
    PersistedRow {
        id,
        screen,
        cell_x: x,
        cell_y: y,
        intent: Some(intent_for(package)),
        title: Some(package.to_string()),
        ..PersistedRow::default()
    }
}

pub fn hotseat_row(id: i64, package: &str, slot: i64) -> PersistedRow {
    PersistedRow {
        container: CONTAINER_HOTSEAT,
        screen: slot,
        rank: slot,
        ..app_row(id, package, 0, 0, 0)
    }
}

pub fn folder_row(id: i64, screen: i64, x: i64, y: i64) -> PersistedRow {
    PersistedRow {
        id,
        screen,
        cell_x: x,
        cell_y: y,
        item_type: ITEM_TYPE_FOLDER,
        title: Some("Folder".to_string()),
        ..PersistedRow::default()
    }
}

pub fn folder_child_row(id: i64, package: &str, folder: i64, rank: i64) -> PersistedRow {
    PersistedRow {
        container: folder,
        screen: 0,
        rank,
        ..app_row(id, package, 0, 0, 0)
    }
}

pub fn widget_row(
    id: i64,
    package: &str,
    screen: i64,
    x: i64,
    y: i64,
    span_x: i64,
    span_y: i64,
) -> PersistedRow {
    PersistedRow {
        id,
        screen,
        cell_x: x,
        cell_y: y,
        span_x,
        span_y,
        item_type: ITEM_TYPE_APPWIDGET,
        app_widget_id: id + 1000,
        app_widget_provider: Some(format!("{package}/.Widget")),
        ..PersistedRow::default()
    }
}

/// A 1×1 app row for every cell of `screen`, ids starting at `first_id`.
pub fn full_screen_rows(first_id: i64, screen: i64, grid: GridGeometry) -> Vec<PersistedRow> {
    let mut rows = Vec::new();
    let mut id = first_id;
    for y in 0..i64::from(grid.rows) {
        for x in 0..i64::from(grid.columns) {
            rows.push(app_row(id, MAIL, screen, x, y));
            id += 1;
        }
    }
    rows
}

/// Services where the mail, chat, and clock packages are installed for the
/// primary user.
pub fn installed_services() -> StaticServices {
    StaticServices::new()
        .with_app(component(MAIL), UserSerial::PRIMARY)
        .with_app(component(CHAT), UserSerial::PRIMARY)
        .with_widget_provider(
            ComponentName::new(CLOCK, format!("{CLOCK}.Widget")),
            UserSerial::PRIMARY,
        )
}

pub fn settings(grid: GridGeometry) -> PipelineSettings {
    PipelineSettings {
        geometry: grid,
        first_page_screen: ScreenId(0),
        bind_idle_timeout: Duration::from_millis(50),
        storage_retries: 1,
        task_queue_capacity: 16,
        migration: MigrationPolicy::default(),
        broadcast_enabled: true,
        broadcast_max_items: 70,
    }
}

pub struct Harness {
    pub pipeline: LoaderPipeline,
    pub callbacks: Arc<RecordingCallbacks>,
    pub ui: UiExecutor,
}

pub fn spawn_pipeline(
    settings: PipelineSettings,
    store: impl LayoutStore + 'static,
    services: impl SystemServices + 'static,
    ui: UiExecutor,
) -> Harness {
    let callbacks = Arc::new(RecordingCallbacks::new());
    let pipeline = LoaderPipeline::spawn(
        settings,
        LoaderDeps {
            store: Box::new(store),
            services: Arc::new(services),
            callbacks: Arc::clone(&callbacks) as Arc<dyn LayoutCallbacks>,
            ui: ui.clone(),
            logger: ActivityLoggerHandle::disabled(),
        },
    )
    .expect("spawn loader");
    Harness {
        pipeline,
        callbacks,
        ui,
    }
}
