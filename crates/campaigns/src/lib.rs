//! Campaign domain module (bulk templated mail campaigns).
//!
//! This crate contains the business rules for campaigns, their per-recipient
//! lines and mailbox entries, implemented purely as deterministic domain logic
//! (no IO, no job execution, no storage).

pub mod batch;
pub mod campaign;
pub mod domain;
pub mod line;
pub mod mail;
pub mod progress;
pub mod record;
pub mod state;
pub mod template;

pub use batch::{IntegrityError, partition, verify_partition};
pub use campaign::{Campaign, DeliveryChannel};
pub use domain::{CompareOp, Domain, Expr, PredicateError};
pub use line::{CampaignLine, LineTarget};
pub use mail::{Certification, CertificationState, Folder, Mail, Recipients};
pub use progress::{LineProgress, Progress};
pub use record::{Record, RecordRef};
pub use state::DeliveryState;
pub use template::Template;
