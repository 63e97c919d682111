//! Background loader.
//!
//! One named worker thread owns the store and is the only writer of the
//! layout model. Requests reach it through a bounded crossbeam channel and
//! run strictly in order. Results reach the UI through [`UiExecutor`] posts
//! that re-check the load generation, so a superseded load never binds.
//!
//! A load runs: read rows → validate → placement check → persist repairs
//! and deletions → grid migration if the stored grid differs → publish the
//! model → bind the first page → wait for the UI → bind the rest →
//! first-screen broadcast.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::{HslError, Result};
use crate::grid::GridGeometry;
use crate::logger::{ActivityEvent, ActivityLoggerHandle};
use crate::migration::{GridMigration, MigrationOutcome, MigrationPolicy, ReflowMode, needs_migration};
use crate::model::{Container, Item, ItemId, LayoutModel, ScreenId};
use crate::store::{LayoutStore, PersistedRow, WriteBatch};

use super::add_items::{AddWorkspaceItemsTask, AddedItems, ItemRequest};
use super::broadcast::build_payloads;
use super::callbacks::{BindPhase, LayoutCallbacks, UiExecutor};
use super::placement::check_placement;
use super::services::SystemServices;
use super::validator::{DeletedItem, RowOutcome, RowValidator};

/// Tuning for [`LoaderPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Geometry the workspace is shown in. A stored layout for any other
    /// geometry is migrated on load.
    pub geometry: GridGeometry,
    pub first_page_screen: ScreenId,
    pub bind_idle_timeout: Duration,
    /// Extra attempts after a retryable storage failure.
    pub storage_retries: u32,
    pub task_queue_capacity: usize,
    pub migration: MigrationPolicy,
    pub broadcast_enabled: bool,
    pub broadcast_max_items: usize,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            geometry: config.grid,
            first_page_screen: ScreenId(config.loader.first_page_screen),
            bind_idle_timeout: Duration::from_millis(config.loader.bind_idle_timeout_ms),
            storage_retries: config.loader.storage_retries,
            task_queue_capacity: config.loader.task_queue_capacity,
            migration: MigrationPolicy::from_config(&config.migration),
            broadcast_enabled: config.broadcast.enabled,
            broadcast_max_items: config.broadcast.max_items,
        }
    }
}

/// What the worker is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderState {
    Idle,
    Loading,
    Validating,
    Migrating,
    Binding,
}

/// Outcome of the most recent load that ran to completion or failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub generation: u64,
    pub items: usize,
    pub repaired: usize,
    pub deleted: Vec<DeletedItem>,
    pub migration: Option<ReflowMode>,
    pub duration_ms: u64,
    /// Set when the load failed.
    pub error: Option<String>,
}

/// Collaborators handed to the worker thread.
pub struct LoaderDeps {
    pub store: Box<dyn LayoutStore>,
    pub services: Arc<dyn SystemServices>,
    pub callbacks: Arc<dyn LayoutCallbacks>,
    pub ui: UiExecutor,
    pub logger: ActivityLoggerHandle,
}

enum Task {
    Load {
        generation: u64,
    },
    Migrate {
        dest: GridGeometry,
    },
    AddItems {
        task: AddWorkspaceItemsTask,
        reply: Option<Sender<Result<AddedItems>>>,
    },
    Sync(Sender<()>),
    Shutdown,
}

struct Shared {
    model: Mutex<LayoutModel>,
    state: Mutex<LoaderState>,
    generation: AtomicU64,
    last_load: Mutex<Option<LoadSummary>>,
}

/// Handle to the loader worker.
pub struct LoaderPipeline {
    tx: Sender<Task>,
    shared: Arc<Shared>,
    join: Option<JoinHandle<()>>,
}

impl LoaderPipeline {
    /// Start the worker thread. Nothing is loaded until [`Self::start_load`].
    pub fn spawn(settings: PipelineSettings, deps: LoaderDeps) -> Result<Self> {
        let (tx, rx) = bounded::<Task>(settings.task_queue_capacity.max(1));
        let shared = Arc::new(Shared {
            model: Mutex::new(LayoutModel::new(settings.geometry)),
            state: Mutex::new(LoaderState::Idle),
            generation: AtomicU64::new(0),
            last_load: Mutex::new(None),
        });

        let worker = Worker {
            geometry: settings.geometry,
            settings,
            shared: Arc::clone(&shared),
            store: deps.store,
            services: deps.services,
            callbacks: deps.callbacks,
            ui: deps.ui,
            logger: deps.logger,
            loaded: false,
        };
        let join = thread::Builder::new()
            .name("hsl-loader".to_string())
            .spawn(move || worker.run(&rx))
            .map_err(|e| HslError::Runtime {
                details: format!("failed to spawn loader thread: {e}"),
            })?;

        Ok(Self {
            tx,
            shared,
            join: Some(join),
        })
    }

    /// Begin a new load, superseding any load still in flight.
    /// Returns the new generation.
    pub fn start_load(&self) -> Result<u64> {
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.send(Task::Load { generation })?;
        Ok(generation)
    }

    /// Switch the workspace to another grid, persisting the migrated layout.
    pub fn request_migration(&self, dest: GridGeometry) -> Result<()> {
        if dest.is_degenerate() {
            return Err(HslError::InvalidConfig {
                details: format!("cannot migrate to a grid without cells: {dest}"),
            });
        }
        self.send(Task::Migrate { dest })
    }

    /// Queue items for placement. Results arrive via `bind_items_added`.
    pub fn add_items(&self, requests: Vec<ItemRequest>) -> Result<()> {
        self.send(Task::AddItems {
            task: AddWorkspaceItemsTask::new(requests),
            reply: None,
        })
    }

    /// Queue items and wait for the placement result.
    pub fn add_items_and_wait(&self, requests: Vec<ItemRequest>) -> Result<AddedItems> {
        let (reply, rx) = bounded(1);
        self.send(Task::AddItems {
            task: AddWorkspaceItemsTask::new(requests),
            reply: Some(reply),
        })?;
        rx.recv().map_err(|_| HslError::ChannelClosed {
            component: "loader-reply",
        })?
    }

    /// Block until every task queued before this call has finished.
    pub fn sync(&self) -> Result<()> {
        let (reply, rx) = bounded(1);
        self.send(Task::Sync(reply))?;
        rx.recv().map_err(|_| HslError::ChannelClosed {
            component: "loader-reply",
        })
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn state(&self) -> LoaderState {
        *self.shared.state.lock()
    }

    /// Copy of every item in the current model.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Item> {
        self.shared.model.lock().snapshot()
    }

    /// Read the model under its lock.
    pub fn with_model<R>(&self, f: impl FnOnce(&LayoutModel) -> R) -> R {
        f(&*self.shared.model.lock())
    }

    #[must_use]
    pub fn last_load(&self) -> Option<LoadSummary> {
        self.shared.last_load.lock().clone()
    }

    /// Stop the worker after the tasks already queued.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        let _ = self.tx.send(Task::Shutdown);
        join.join().map_err(|_| HslError::Runtime {
            details: "loader thread panicked".to_string(),
        })
    }

    fn send(&self, task: Task) -> Result<()> {
        self.tx.send(task).map_err(|_| HslError::ChannelClosed {
            component: "loader",
        })
    }
}

impl Drop for LoaderPipeline {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

struct Worker {
    settings: PipelineSettings,
    /// Geometry of the published model.
    geometry: GridGeometry,
    shared: Arc<Shared>,
    store: Box<dyn LayoutStore>,
    services: Arc<dyn SystemServices>,
    callbacks: Arc<dyn LayoutCallbacks>,
    ui: UiExecutor,
    logger: ActivityLoggerHandle,
    /// Whether the model reflects the store. Writes are refused until then.
    loaded: bool,
}

impl Worker {
    fn run(mut self, rx: &Receiver<Task>) {
        while let Ok(task) = rx.recv() {
            match task {
                Task::Load { generation } => self.run_load(generation),
                Task::Migrate { dest } => self.run_migration(dest),
                Task::AddItems { task, reply } => {
                    let result = self.run_add(&task);
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
                Task::Sync(reply) => {
                    let _ = reply.send(());
                }
                Task::Shutdown => break,
            }
            self.set_state(LoaderState::Idle);
        }
    }

    fn set_state(&self, state: LoaderState) {
        *self.shared.state.lock() = state;
    }

    fn current_generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.current_generation() != generation
    }

    /// Run a storage call, retrying retryable failures.
    fn with_retry<T>(
        &mut self,
        op: &'static str,
        mut f: impl FnMut(&mut dyn LayoutStore) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match f(self.store.as_mut()) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.settings.storage_retries => {
                    attempt += 1;
                    eprintln!(
                        "[HSL-LOADER] {op} failed ({err}), retry {attempt}/{}",
                        self.settings.storage_retries
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Post a callback that only runs if `generation` is still current.
    fn post_guarded(
        &self,
        generation: u64,
        f: impl FnOnce(&dyn LayoutCallbacks) + Send + 'static,
    ) {
        let shared = Arc::clone(&self.shared);
        let callbacks = Arc::clone(&self.callbacks);
        self.ui.post(move || {
            if shared.generation.load(Ordering::Acquire) == generation {
                f(callbacks.as_ref());
            }
        });
    }

    fn run_load(&mut self, generation: u64) {
        if self.is_stale(generation) {
            return;
        }
        let started = Instant::now();
        self.set_state(LoaderState::Loading);
        self.logger.send(ActivityEvent::LoadStarted { generation });

        match self.load(generation) {
            Ok(Some(mut summary)) => {
                summary.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                self.logger.send(ActivityEvent::LoadCompleted {
                    generation,
                    items: summary.items,
                    repaired: summary.repaired,
                    deleted: summary.deleted.len(),
                    duration_ms: summary.duration_ms,
                });
                *self.shared.last_load.lock() = Some(summary);
            }
            Ok(None) => {}
            Err(err) => self.fail_load(generation, err),
        }
    }

    /// Returns `None` when a newer load superseded this one.
    fn load(&mut self, generation: u64) -> Result<Option<LoadSummary>> {
        let rows = self.with_retry("read rows", |s| s.read_rows())?;
        let stored_grid = self.with_retry("read grid state", |s| s.grid_state())?;
        if self.is_stale(generation) {
            return Ok(None);
        }

        self.set_state(LoaderState::Validating);
        let layout_grid = stored_grid.unwrap_or(self.geometry);
        let mut summary = LoadSummary {
            generation,
            ..LoadSummary::default()
        };
        let mut accepted = Vec::with_capacity(rows.len());
        let mut batch = WriteBatch::new();
        {
            let validator = RowValidator::new(self.services.as_ref());
            for row in &rows {
                if self.is_stale(generation) {
                    return Ok(None);
                }
                match validator.process(row) {
                    RowOutcome::Accept(item) => accepted.push(item),
                    RowOutcome::Repair { item, repair } => {
                        batch.upsert(PersistedRow::from_item(&item));
                        self.logger.send(ActivityEvent::ItemRepaired {
                            id: item.id.0,
                            repair: repair.as_str().to_string(),
                        });
                        summary.repaired += 1;
                        accepted.push(item);
                    }
                    RowOutcome::Delete(deleted) => summary.deleted.push(deleted),
                }
            }
        }

        let placement = check_placement(accepted, &layout_grid);
        summary.deleted.extend(placement.deleted);
        for deleted in &summary.deleted {
            batch.delete(deleted.id.0);
            self.logger.send(ActivityEvent::ItemDeleted {
                id: deleted.id.0,
                reason: deleted.reason.as_str().to_string(),
            });
        }
        if !batch.is_empty()
            && let Err(err) = self.with_retry("persist validation", |s| s.apply(&batch))
        {
            eprintln!(
                "[HSL-LOADER] could not persist {} validation changes: {err}",
                batch.len()
            );
            self.logger.send(ActivityEvent::error(&err));
        }
        let mut items = placement.kept;

        let dest = self.geometry;
        if needs_migration(stored_grid, dest) {
            self.set_state(LoaderState::Migrating);
            let outcome = GridMigration::new(self.settings.migration).migrate(&items, layout_grid, dest)?;
            let rows: Vec<PersistedRow> = outcome.items.iter().map(PersistedRow::from_item).collect();
            self.with_retry("persist migration", |s| s.replace_all(&rows, dest))?;
            self.log_migration(layout_grid, dest, &outcome);
            summary.migration = Some(outcome.mode);
            items = outcome.items;
        } else if stored_grid.is_none()
            && let Err(err) = self.with_retry("record grid", |s| s.set_grid_state(dest))
        {
            eprintln!("[HSL-LOADER] could not record grid {dest}: {err}");
            self.logger.send(ActivityEvent::error(&err));
        }

        let max_id = self.with_retry("read max id", |s| s.max_item_id())?;
        let mut model = LayoutModel::from_items(dest, items)?;
        model.seed_max_item_id(max_id);
        if self.is_stale(generation) {
            return Ok(None);
        }
        summary.items = model.len();
        *self.shared.model.lock() = model;
        self.loaded = true;

        self.set_state(LoaderState::Binding);
        self.bind_all(generation, summary.deleted.clone());
        self.post_broadcast(generation);
        Ok(Some(summary))
    }

    fn fail_load(&mut self, generation: u64, err: HslError) {
        eprintln!("[HSL-LOADER] load {generation} failed: {err}");
        {
            let mut model = self.shared.model.lock();
            let max_id = model.max_item_id();
            *model = LayoutModel::new(self.geometry);
            model.seed_max_item_id(max_id);
        }
        self.loaded = false;
        self.logger.send(ActivityEvent::LoadFailed {
            generation,
            code: err.code().to_string(),
            message: err.to_string(),
        });
        *self.shared.last_load.lock() = Some(LoadSummary {
            generation,
            error: Some(err.to_string()),
            ..LoadSummary::default()
        });
        self.post_guarded(generation, move |cb| cb.load_failed(&err));
    }

    fn bind_all(&self, generation: u64, deleted: Vec<DeletedItem>) {
        let (screens, first_page, rest) = {
            let model = self.shared.model.lock();
            let screens = model.screens();
            let first = if screens.contains(&self.settings.first_page_screen) {
                self.settings.first_page_screen
            } else {
                screens.first().copied().unwrap_or(ScreenId(0))
            };
            split_first_page(&model.snapshot(), first, screens)
        };

        self.post_guarded(generation, move |cb| {
            if !deleted.is_empty() {
                cb.items_deleted(&deleted);
            }
            cb.bind_screens(&screens);
            cb.bind_items(&first_page, BindPhase::FirstPage);
        });
        if !self.ui.wait_for_idle(self.settings.bind_idle_timeout) {
            eprintln!(
                "[HSL-LOADER] UI not idle after {} ms, binding remaining items",
                self.settings.bind_idle_timeout.as_millis()
            );
        }
        if self.is_stale(generation) {
            return;
        }
        self.post_guarded(generation, move |cb| {
            cb.bind_items(&rest, BindPhase::Remaining);
            cb.finish_binding();
        });
    }

    fn post_broadcast(&self, generation: u64) {
        if !self.settings.broadcast_enabled {
            return;
        }
        let items = self.shared.model.lock().snapshot();
        let payloads = build_payloads(
            &items,
            self.settings.first_page_screen,
            self.services.as_ref(),
            self.settings.broadcast_max_items,
        );
        if payloads.is_empty() {
            return;
        }
        self.post_guarded(generation, move |cb| cb.first_screen_broadcast(&payloads));
    }

    fn run_migration(&mut self, dest: GridGeometry) {
        if dest == self.geometry {
            return;
        }
        if !self.loaded {
            // Nothing published yet; the next load migrates from the stored grid.
            self.geometry = dest;
            let _ = self.shared.model.lock().replace_all(dest, Vec::new());
            return;
        }
        self.set_state(LoaderState::Migrating);
        let source = self.geometry;
        let items = self.shared.model.lock().snapshot();

        let outcome = match GridMigration::new(self.settings.migration).migrate(&items, source, dest) {
            Ok(outcome) => outcome,
            Err(err) => {
                eprintln!("[HSL-MIGRATION] migration {source} -> {dest} failed: {err}");
                self.logger.send(ActivityEvent::error(&err));
                return;
            }
        };
        let rows: Vec<PersistedRow> = outcome.items.iter().map(PersistedRow::from_item).collect();
        if let Err(err) = self.with_retry("persist migration", |s| s.replace_all(&rows, dest)) {
            eprintln!("[HSL-MIGRATION] could not persist migration to {dest}: {err}");
            self.logger.send(ActivityEvent::error(&err));
            return;
        }
        if let Err(err) = self.shared.model.lock().replace_all(dest, outcome.items.clone()) {
            eprintln!("[HSL-MIGRATION] migrated layout rejected by model: {err}");
            self.logger.send(ActivityEvent::error(&err));
            return;
        }
        self.geometry = dest;
        self.log_migration(source, dest, &outcome);

        self.set_state(LoaderState::Binding);
        let generation = self.current_generation();
        self.bind_all(generation, Vec::new());
    }

    fn log_migration(&self, source: GridGeometry, dest: GridGeometry, outcome: &MigrationOutcome) {
        self.logger.send(ActivityEvent::GridMigrated {
            from: source.to_string(),
            to: dest.to_string(),
            mode: outcome.mode.as_str().to_string(),
            moved: outcome.moved,
            hotseat_overflow: outcome.hotseat_overflow.len(),
        });
    }

    fn run_add(&mut self, task: &AddWorkspaceItemsTask) -> Result<AddedItems> {
        if !self.loaded {
            return Err(HslError::Runtime {
                details: "cannot add items before the workspace has loaded".to_string(),
            });
        }
        let added = task.plan(&self.shared.model.lock());
        if added.is_empty() {
            return Ok(added);
        }

        let batch = added.write_batch();
        if let Err(err) = self.with_retry("persist added items", |s| s.apply(&batch)) {
            eprintln!("[HSL-LOADER] could not persist {} added items: {err}", added.len());
            self.logger.send(ActivityEvent::error(&err));
            return Err(err);
        }
        AddWorkspaceItemsTask::commit(&mut self.shared.model.lock(), &added)?;
        self.logger.send(ActivityEvent::ItemsAdded {
            count: added.len(),
            new_screens: added.new_screens.len(),
        });

        let new_screens = added.new_screens.clone();
        let not_animated = added.not_animated.clone();
        let animated = added.animated.clone();
        self.post_guarded(self.current_generation(), move |cb| {
            cb.bind_items_added(&new_screens, &not_animated, &animated);
        });
        Ok(added)
    }
}

/// Split items into the first page (the chosen screen, the hotseat, and
/// folders on either) and everything else.
fn split_first_page(
    items: &[Item],
    first: ScreenId,
    screens: Vec<ScreenId>,
) -> (Vec<ScreenId>, Vec<Item>, Vec<Item>) {
    let on_first_page = |item: &Item| match item.container {
        Container::Desktop(screen) => screen == first,
        Container::Hotseat(_) => true,
        Container::Folder(_) => false,
    };
    let first_folders: HashSet<ItemId> = items
        .iter()
        .filter(|i| i.is_folder() && on_first_page(i))
        .map(|i| i.id)
        .collect();
    let (first_page, rest): (Vec<Item>, Vec<Item>) = items.iter().cloned().partition(|i| {
        on_first_page(i) || i.folder().is_some_and(|f| first_folders.contains(&f))
    });
    (screens, first_page, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::callbacks::{BindEvent, RecordingCallbacks};
    use crate::loader::services::StaticServices;
    use crate::model::{ComponentName, UserSerial};
    use crate::store::{CONTAINER_HOTSEAT, MemoryStore};

    fn settings() -> PipelineSettings {
        PipelineSettings {
            geometry: GridGeometry::new(4, 4, 4),
            first_page_screen: ScreenId(0),
            bind_idle_timeout: Duration::from_millis(20),
            storage_retries: 1,
            task_queue_capacity: 16,
            migration: MigrationPolicy::default(),
            broadcast_enabled: true,
            broadcast_max_items: 70,
        }
    }

    fn mail_row(id: i64, screen: i64, x: i64) -> PersistedRow {
        PersistedRow {
            id,
            screen,
            cell_x: x,
            intent: Some("#Intent;component=com.mail/.Inbox;end".to_string()),
            ..PersistedRow::default()
        }
    }

    fn services() -> Arc<StaticServices> {
        Arc::new(
            StaticServices::new()
                .with_app(ComponentName::new("com.mail", "com.mail.Inbox"), UserSerial::PRIMARY),
        )
    }

    fn spawn(
        store: MemoryStore,
        ui: UiExecutor,
    ) -> (LoaderPipeline, Arc<RecordingCallbacks>) {
        let callbacks = Arc::new(RecordingCallbacks::new());
        let pipeline = LoaderPipeline::spawn(
            settings(),
            LoaderDeps {
                store: Box::new(store),
                services: services(),
                callbacks: Arc::clone(&callbacks) as Arc<dyn LayoutCallbacks>,
                ui,
                logger: ActivityLoggerHandle::disabled(),
            },
        )
        .unwrap();
        (pipeline, callbacks)
    }

    #[test]
    fn load_binds_first_page_then_the_rest() {
        let mut hotseat = mail_row(3, 0, 0);
        hotseat.container = CONTAINER_HOTSEAT;
        let store = MemoryStore::with_rows(
            vec![mail_row(1, 0, 0), mail_row(2, 1, 0), hotseat],
            Some(GridGeometry::new(4, 4, 4)),
        );
        let (pipeline, callbacks) = spawn(store, UiExecutor::inline());
        pipeline.start_load().unwrap();
        pipeline.sync().unwrap();

        let events = callbacks.events();
        assert_eq!(events[0], BindEvent::Screens(vec![ScreenId(0), ScreenId(1)]));
        let BindEvent::Items { items, phase } = &events[1] else {
            panic!("expected first page, got {:?}", events[1]);
        };
        assert_eq!(*phase, BindPhase::FirstPage);
        let ids: Vec<i64> = items.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        let BindEvent::Items { items, phase } = &events[2] else {
            panic!("expected remaining items, got {:?}", events[2]);
        };
        assert_eq!(*phase, BindPhase::Remaining);
        assert_eq!(items.len(), 1);
        assert_eq!(events[3], BindEvent::Finished);
        assert_eq!(pipeline.state(), LoaderState::Idle);
        assert_eq!(pipeline.last_load().unwrap().items, 3);
        pipeline.shutdown().unwrap();
    }

    #[test]
    fn persistent_read_failure_reports_load_failed() {
        let store = MemoryStore::with_rows(vec![mail_row(1, 0, 0)], None);
        store.fail_next_reads(5);
        let (pipeline, callbacks) = spawn(store.clone(), UiExecutor::inline());
        pipeline.start_load().unwrap();
        pipeline.sync().unwrap();

        assert!(pipeline.snapshot().is_empty());
        assert_eq!(store.read_attempts(), 2, "one retry after the first failure");
        assert!(matches!(
            callbacks.events().as_slice(),
            [BindEvent::LoadFailed { code: "HSL-2102", .. }]
        ));
        assert!(pipeline.last_load().unwrap().error.is_some());
    }

    #[test]
    fn single_read_failure_is_retried() {
        let store = MemoryStore::with_rows(vec![mail_row(1, 0, 0)], None);
        store.fail_next_reads(1);
        let (pipeline, _callbacks) = spawn(store, UiExecutor::inline());
        pipeline.start_load().unwrap();
        pipeline.sync().unwrap();
        assert_eq!(pipeline.snapshot().len(), 1);
    }

    #[test]
    fn superseded_load_never_binds() {
        let store = MemoryStore::with_rows(vec![mail_row(1, 0, 0)], None);
        let ui = UiExecutor::queued();
        let (pipeline, callbacks) = spawn(store, ui.clone());
        pipeline.start_load().unwrap();
        let second = pipeline.start_load().unwrap();
        pipeline.sync().unwrap();
        ui.run_pending();

        assert_eq!(second, 2);
        let screens = callbacks
            .events()
            .iter()
            .filter(|e| matches!(e, BindEvent::Screens(_)))
            .count();
        assert_eq!(screens, 1, "only the newest load binds");
        assert_eq!(
            callbacks
                .events()
                .iter()
                .filter(|e| **e == BindEvent::Finished)
                .count(),
            1
        );
    }

    #[test]
    fn add_before_load_is_refused() {
        let (pipeline, _callbacks) = spawn(MemoryStore::new(), UiExecutor::inline());
        let err = pipeline
            .add_items_and_wait(vec![ItemRequest::app(ComponentName::new("com.mail", "com.mail.Inbox"))])
            .unwrap_err();
        assert_eq!(err.code(), "HSL-3900");
    }

    #[test]
    fn migration_to_a_grid_without_cells_is_refused() {
        let (pipeline, _callbacks) = spawn(MemoryStore::new(), UiExecutor::inline());
        let err = pipeline
            .request_migration(GridGeometry::new(0, 4, 4))
            .unwrap_err();
        assert_eq!(err.code(), "HSL-1001");
    }

    #[test]
    fn split_keeps_first_screen_folder_children_together() {
        let folder = Item::new(ItemId(1), Container::Desktop(ScreenId(0)), crate::model::ItemKind::Folder);
        let child = Item::new(
            ItemId(2),
            Container::Folder(ItemId(1)),
            crate::model::ItemKind::Folder,
        );
        let far = Item::new(ItemId(3), Container::Desktop(ScreenId(1)), crate::model::ItemKind::Folder);
        let (_, first, rest) = split_first_page(
            &[folder, child, far],
            ScreenId(0),
            vec![ScreenId(0), ScreenId(1)],
        );
        assert_eq!(first.len(), 2);
        assert_eq!(rest.len(), 1);
    }
}
