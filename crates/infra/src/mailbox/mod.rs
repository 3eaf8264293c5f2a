//! Mailbox draft creation.
//!
//! Drafts are rendered in batches on the job queue; see [`BatchDispatcher`].

pub mod dispatcher;
pub mod screen;

pub use dispatcher::{BatchDispatcher, BatchFailure, DispatchError, RenderBatchJob};
pub use screen::ScreenValues;
