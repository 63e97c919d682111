//! Activity logging off the hot path.
//!
//! A dedicated thread owns the [`JsonlWriter`]. The loader and CLI send
//! [`ActivityEvent`]s through a bounded crossbeam channel with `try_send`, so
//! a slow disk never stalls loading; overflow is counted and reported as a
//! warning line.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::config::Config;
use crate::core::errors::{HslError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Something worth a line in the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    LoadStarted {
        generation: u64,
    },
    LoadCompleted {
        generation: u64,
        items: usize,
        repaired: usize,
        deleted: usize,
        duration_ms: u64,
    },
    LoadFailed {
        generation: u64,
        code: String,
        message: String,
    },
    ItemDeleted {
        id: i64,
        reason: String,
    },
    ItemRepaired {
        id: i64,
        repair: String,
    },
    ItemsAdded {
        count: usize,
        new_screens: usize,
    },
    GridMigrated {
        from: String,
        to: String,
        mode: String,
        moved: usize,
        hotseat_overflow: usize,
    },
    SchemaUpgraded {
        from: i64,
        to: i64,
        reset: bool,
    },
    Error {
        code: String,
        message: String,
    },
    /// Stops the logger thread after flushing.
    Shutdown,
}

impl ActivityEvent {
    /// Error event built from an [`HslError`].
    #[must_use]
    pub fn error(err: &HslError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Cheap, cloneable sender side of the activity log.
#[derive(Debug, Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// A handle whose events go nowhere.
    #[must_use]
    pub fn disabled() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue an event without blocking. A full channel drops the event.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

/// Settings for [`spawn_logger`].
#[derive(Debug, Clone)]
pub struct ActivityLoggerConfig {
    pub jsonl: JsonlConfig,
    pub channel_capacity: usize,
}

impl ActivityLoggerConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            jsonl: JsonlConfig::from_config(&config.paths, &config.logging),
            channel_capacity: config.logging.channel_capacity,
        }
    }
}

/// Start the logger thread.
///
/// The thread runs until [`ActivityLoggerHandle::shutdown`] is called or every
/// handle is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let join = thread::Builder::new()
        .name("hsl-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config.jsonl, &dropped))
        .map_err(|e| HslError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, jsonl: JsonlConfig, dropped: &AtomicU64) {
    let mut writer = JsonlWriter::open(jsonl);

    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.count = Some(lost);
            warn.details = Some(format!("{lost} activity events dropped under back-pressure"));
            writer.write_entry(&warn);
        }
        if event == ActivityEvent::Shutdown {
            break;
        }
        writer.write_entry(&to_log_entry(&event));
    }

    writer.flush();
    writer.fsync();
}

fn to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::LoadStarted { generation } => {
            let mut e = LogEntry::new(EventType::LoadStart, Severity::Info);
            e.generation = Some(*generation);
            e
        }
        ActivityEvent::LoadCompleted {
            generation,
            items,
            repaired,
            deleted,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::LoadComplete, Severity::Info);
            e.generation = Some(*generation);
            e.count = Some(*items as u64);
            e.duration_ms = Some(*duration_ms);
            e.details = Some(format!("repaired={repaired} deleted={deleted}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::LoadFailed {
            generation,
            code,
            message,
        } => {
            let mut e = LogEntry::new(EventType::LoadFailed, Severity::Error);
            e.generation = Some(*generation);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::ItemDeleted { id, reason } => {
            let mut e = LogEntry::new(EventType::ItemDeleted, Severity::Info);
            e.item_id = Some(*id);
            e.reason = Some(reason.clone());
            e
        }
        ActivityEvent::ItemRepaired { id, repair } => {
            let mut e = LogEntry::new(EventType::ItemRepaired, Severity::Info);
            e.item_id = Some(*id);
            e.reason = Some(repair.clone());
            e
        }
        ActivityEvent::ItemsAdded { count, new_screens } => {
            let mut e = LogEntry::new(EventType::ItemsAdded, Severity::Info);
            e.count = Some(*count as u64);
            e.details = Some(format!("new_screens={new_screens}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::GridMigrated {
            from,
            to,
            mode,
            moved,
            hotseat_overflow,
        } => {
            let mut e = LogEntry::new(EventType::GridMigrated, Severity::Info);
            e.grid = Some(to.clone());
            e.reason = Some(mode.clone());
            e.count = Some(*moved as u64);
            e.details = Some(format!("from={from} hotseat_overflow={hotseat_overflow}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::SchemaUpgraded { from, to, reset } => {
            let severity = if *reset {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new(EventType::SchemaUpgraded, severity);
            e.details = Some(format!("from=v{from} to=v{to} reset={reset}"));
            e.ok = Some(!reset);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Error);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::LoadComplete, Severity::Info),
    }
}
