//! Loading the persisted layout into the live model and keeping it current:
//! row validation, placement checks, the background worker, item insertion,
//! and the first-screen installer broadcast.

pub mod add_items;
pub mod broadcast;
pub mod callbacks;
pub mod pipeline;
pub mod placement;
pub mod services;
pub mod validator;

pub use add_items::{AddWorkspaceItemsTask, AddedItems, ItemRequest};
pub use broadcast::{FirstScreenBroadcast, build_payloads};
pub use callbacks::{BindEvent, BindPhase, LayoutCallbacks, RecordingCallbacks, UiExecutor};
pub use pipeline::{LoadSummary, LoaderDeps, LoaderPipeline, LoaderState, PipelineSettings};
pub use placement::{PlacementReport, check_placement};
pub use services::{InstallSession, StaticServices, SystemServices};
pub use validator::{DeleteReason, DeletedItem, Repair, RowOutcome, RowValidator};
