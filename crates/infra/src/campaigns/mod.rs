//! Campaign services over the stores: line reconciliation, progress and sending.

pub mod progress;
pub mod reconciler;
pub mod sender;

pub use progress::{CampaignOverview, ProgressAggregator};
pub use reconciler::{LineReconciler, ReconcileError};
pub use sender::{CampaignSender, LineFailure, SendError, SendReport};
