//! CLI smoke tests against a temp database.

mod common;

use homescreen_layout::grid::GridGeometry;
use homescreen_layout::store::{LayoutStore, SqliteStore, WriteBatch};
use serde_json::Value;

use common::{CHAT, MAIL};

const GRID: GridGeometry = GridGeometry::new(4, 4, 4);

fn seed(env: &common::TestEnvironment) {
    let mut store = SqliteStore::open(&env.db_path(), GRID.columns).unwrap();
    let mut batch = WriteBatch::new();
    batch.upsert(common::app_row(1, MAIL, 0, 0, 0));
    batch.upsert(common::app_row(2, CHAT, 0, 3, 3));
    batch.upsert(common::folder_row(3, 1, 0, 0));
    store.apply(&batch).unwrap();
    store.set_grid_state(GRID).unwrap();
}

fn json_line(stdout: &str) -> Value {
    let line = stdout.lines().last().expect("json output");
    serde_json::from_str(line).expect("valid json")
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "log: {}",
        result.log_path.display()
    );
    assert!(result.stdout.contains("migrate"));
}

#[test]
fn config_validate_reports_hash() {
    let env = common::TestEnvironment::new();
    let config = env.write_config(GRID);
    let result = common::run_cli_case(
        "config_validate_reports_hash",
        &["--config", config.to_str().unwrap(), "--json", "config", "validate"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["valid"], true);
    assert!(payload["hash"].as_str().is_some());
}

#[test]
fn check_reports_pending_deletions_with_partial_exit() {
    let env = common::TestEnvironment::new();
    let config = env.write_config(GRID);
    seed(&env);
    let result = common::run_cli_case(
        "check_reports_pending_deletions",
        &["--config", config.to_str().unwrap(), "--json", "check"],
    );
    assert_eq!(result.status.code(), Some(4), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["rows"], 3);
    assert_eq!(payload["deleted"][0]["id"], 3);
    assert_eq!(payload["deleted"][0]["reason"], "empty_folder");
}

#[test]
fn migrate_dry_run_leaves_database_untouched() {
    let env = common::TestEnvironment::new();
    let config = env.write_config(GRID);
    seed(&env);
    let result = common::run_cli_case(
        "migrate_dry_run",
        &[
            "--config",
            config.to_str().unwrap(),
            "--json",
            "migrate",
            "--columns",
            "3",
            "--rows",
            "3",
            "--dry-run",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["dry_run"], true);
    assert_eq!(payload["mode"], "in_place");

    let mut store = SqliteStore::open(&env.db_path(), GRID.columns).unwrap();
    assert_eq!(store.grid_state().unwrap(), Some(GRID));
}

#[test]
fn load_then_migrate_rewrites_the_grid() {
    let env = common::TestEnvironment::new();
    let config = env.write_config(GRID);
    seed(&env);
    let cfg = config.to_str().unwrap();

    let load = common::run_cli_case("load_before_migrate", &["--config", cfg, "--json", "load"]);
    assert!(load.status.success(), "log: {}", load.log_path.display());
    let payload = json_line(&load.stdout);
    assert_eq!(payload["summary"]["items"], 2);

    let migrate = common::run_cli_case(
        "migrate_applies",
        &["--config", cfg, "--json", "migrate", "--columns", "3", "--rows", "3"],
    );
    assert!(migrate.status.success(), "log: {}", migrate.log_path.display());
    let migrated = GridGeometry::new(3, 3, 4);
    {
        let mut store = SqliteStore::open(&env.db_path(), GRID.columns).unwrap();
        assert_eq!(store.grid_state().unwrap(), Some(migrated));
    }
    assert!(env.log_path().exists(), "activity log written");

    let reload = common::run_cli_case("load_after_migrate", &["--config", cfg, "--json", "load"]);
    assert!(reload.status.success(), "log: {}", reload.log_path.display());
    let payload = json_line(&reload.stdout);
    assert_eq!(payload["summary"]["items"], 2);
    assert!(payload["summary"]["migration"].is_null(), "grid flipped back: {payload}");

    let mut store = SqliteStore::open(&env.db_path(), GRID.columns).unwrap();
    assert_eq!(store.grid_state().unwrap(), Some(migrated));
}
