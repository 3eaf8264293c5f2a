//! Error types shared across infra components.

use thiserror::Error;

use mailcamp_core::{DomainError, TemplateId};

use crate::render::RenderError;
use crate::signing::TransportError;
use crate::storage::StoreError;

/// Wiring problem: unknown model, missing template, bad setting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no record store registered for model `{0}`")]
    UnknownModel(String),

    #[error("template {0} does not exist")]
    MissingTemplate(TemplateId),

    #[error("invalid value for {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

/// Per-line send failure. Recorded on the line, never aborts sibling lines.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no recipients specified")]
    MissingRecipients,

    #[error("certified delivery is not configured")]
    CertifiedUnavailable,

    #[error("certified delivery rejected: {0}")]
    Rejected(String),

    #[error("audit trail {0} has no certificates")]
    NoCertificates(String),

    #[error("invalid attachment `{name}`: {reason}")]
    InvalidAttachment { name: String, reason: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
