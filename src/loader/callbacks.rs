//! UI-facing bind protocol and the executor that marshals binds onto the UI
//! thread.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::errors::HslError;
use crate::model::{Item, ScreenId};

use super::broadcast::FirstScreenBroadcast;
use super::validator::DeletedItem;

/// Which part of the workspace a `bind_items` call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindPhase {
    /// The first visible page and the hotseat, bound before anything else.
    FirstPage,
    Remaining,
}

/// Receiver of model changes. Every method runs on the UI executor.
pub trait LayoutCallbacks: Send + Sync {
    fn bind_screens(&self, screens: &[ScreenId]);

    fn bind_items(&self, items: &[Item], phase: BindPhase);

    fn finish_binding(&self) {}

    /// Items placed by an add task. Items on screens that were new or empty
    /// come in `not_animated`.
    fn bind_items_added(&self, new_screens: &[ScreenId], not_animated: &[Item], animated: &[Item]);

    fn items_deleted(&self, deleted: &[DeletedItem]);

    fn load_failed(&self, error: &HslError);

    fn first_screen_broadcast(&self, _payloads: &[FirstScreenBroadcast]) {}
}

/// One callback as it was received.
#[derive(Debug, Clone, PartialEq)]
pub enum BindEvent {
    Screens(Vec<ScreenId>),
    Items { items: Vec<Item>, phase: BindPhase },
    Finished,
    ItemsAdded {
        new_screens: Vec<ScreenId>,
        not_animated: Vec<Item>,
        animated: Vec<Item>,
    },
    Deleted(Vec<DeletedItem>),
    LoadFailed { code: &'static str, message: String },
    Broadcast(Vec<FirstScreenBroadcast>),
}

/// Callbacks that record everything they receive.
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    events: Mutex<Vec<BindEvent>>,
}

impl RecordingCallbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<BindEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Every item bound by load binds, in bind order.
    #[must_use]
    pub fn bound_items(&self) -> Vec<Item> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BindEvent::Items { items, .. } => Some(items.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn push(&self, event: BindEvent) {
        self.events.lock().push(event);
    }
}

impl LayoutCallbacks for RecordingCallbacks {
    fn bind_screens(&self, screens: &[ScreenId]) {
        self.push(BindEvent::Screens(screens.to_vec()));
    }

    fn bind_items(&self, items: &[Item], phase: BindPhase) {
        self.push(BindEvent::Items {
            items: items.to_vec(),
            phase,
        });
    }

    fn finish_binding(&self) {
        self.push(BindEvent::Finished);
    }

    fn bind_items_added(&self, new_screens: &[ScreenId], not_animated: &[Item], animated: &[Item]) {
        self.push(BindEvent::ItemsAdded {
            new_screens: new_screens.to_vec(),
            not_animated: not_animated.to_vec(),
            animated: animated.to_vec(),
        });
    }

    fn items_deleted(&self, deleted: &[DeletedItem]) {
        self.push(BindEvent::Deleted(deleted.to_vec()));
    }

    fn load_failed(&self, error: &HslError) {
        self.push(BindEvent::LoadFailed {
            code: error.code(),
            message: error.to_string(),
        });
    }

    fn first_screen_broadcast(&self, payloads: &[FirstScreenBroadcast]) {
        self.push(BindEvent::Broadcast(payloads.to_vec()));
    }
}

type UiTask = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct UiQueue {
    tasks: VecDeque<UiTask>,
    /// Posted but not yet finished, including the task currently running.
    outstanding: usize,
}

struct UiShared {
    queue: Mutex<UiQueue>,
    idle: Condvar,
    inline: bool,
}

/// Serial executor standing in for the UI thread.
///
/// In queued mode the owner of the UI thread drains it with
/// [`UiExecutor::run_pending`]. In inline mode tasks run immediately on the
/// posting thread.
#[derive(Clone)]
pub struct UiExecutor {
    shared: Arc<UiShared>,
}

impl std::fmt::Debug for UiExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiExecutor")
            .field("inline", &self.shared.inline)
            .field("outstanding", &self.shared.queue.lock().outstanding)
            .finish()
    }
}

impl UiExecutor {
    fn with_mode(inline: bool) -> Self {
        Self {
            shared: Arc::new(UiShared {
                queue: Mutex::new(UiQueue::default()),
                idle: Condvar::new(),
                inline,
            }),
        }
    }

    #[must_use]
    pub fn queued() -> Self {
        Self::with_mode(false)
    }

    #[must_use]
    pub fn inline() -> Self {
        Self::with_mode(true)
    }

    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        if self.shared.inline {
            task();
            return;
        }
        let mut queue = self.shared.queue.lock();
        queue.tasks.push_back(Box::new(task));
        queue.outstanding += 1;
    }

    /// Run every queued task in FIFO order, including tasks posted while
    /// draining. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.shared.queue.lock().tasks.pop_front();
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
            let mut queue = self.shared.queue.lock();
            queue.outstanding = queue.outstanding.saturating_sub(1);
            if queue.outstanding == 0 {
                self.shared.idle.notify_all();
            }
        }
        ran
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().outstanding
    }

    /// Block until every posted task has finished or `timeout` elapses.
    /// Returns whether the executor went idle.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        while queue.outstanding > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.shared.idle.wait_for(&mut queue, deadline - now);
        }
        true
    }
}
