//! Tunegrab core: task records, the status state machine and view-model helpers.
mod item;
mod task;
mod view_model;

pub use item::ItemDescriptor;
pub use task::{Status, TaskRecord};
pub use view_model::{truncate, BatchSummary, ELLIPSIS};
