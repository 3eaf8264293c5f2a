//! `mailcamp-core`: shared building blocks for the campaign domain.
//!
//! This crate contains **pure** primitives (identifiers, entity markers, the
//! domain error model). No storage, no job execution, no network.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CampaignId, CampaignLineId, MailId, RecordId, TemplateId};
pub use value_object::ValueObject;
