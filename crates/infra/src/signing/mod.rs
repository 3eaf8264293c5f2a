//! Certified delivery through a document-signing service.
//!
//! The service itself is a seam ([`SigningService`]); [`CertifiedMailer`]
//! builds requests for it and records receipts on mailbox entries.

pub mod certified;
pub mod client;

pub use certified::{CertifiedMailer, CertifiedMessage, CertifiedOutcome, parse_body_html};
pub use client::{
    Attachment, Certificate, CertifiedEmail, CreateEmailParams, CreateEmailRequest, CreateEmailResponse,
    SigningRecipient, SigningService, TransportError,
};
