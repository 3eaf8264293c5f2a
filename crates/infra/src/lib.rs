//! Infrastructure layer: stores, job queue, rendering, dispatch, delivery.

pub mod campaigns;
pub mod config;
pub mod error;
pub mod jobs;
pub mod mailbox;
pub mod records;
pub mod render;
pub mod signing;
pub mod storage;

pub use config::MailcampConfig;
pub use error::{ConfigurationError, DeliveryError};
