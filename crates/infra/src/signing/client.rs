use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The signing service could not be reached or answered garbage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("signing service unavailable: {0}")]
    Unavailable(String),

    #[error("signing service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode signing service response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRecipient {
    pub name: String,
    pub email: String,
}

impl SigningRecipient {
    /// Recipient named after its own address.
    pub fn from_address(address: impl Into<String>) -> Self {
        let email = address.into();
        Self {
            name: email.clone(),
            email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEmailParams {
    /// Secondary recipients keyed by lowercase header (`cc`, `bcc`).
    pub recipients: BTreeMap<String, Vec<SigningRecipient>>,
    #[serde(rename = "type")]
    pub request_type: String,
}

/// File sent along with a certified email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEmailRequest {
    pub files: Vec<Attachment>,
    pub recipients: Vec<SigningRecipient>,
    pub subject: String,
    pub body: String,
    pub params: CreateEmailParams,
}

/// Reply to `create_email`. Application errors arrive here, not as `Err`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEmailResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedEmail {
    #[serde(default)]
    pub certificates: Vec<Certificate>,
}

/// Third-party certified email / audit trail service.
pub trait SigningService: Send + Sync {
    fn create_email(&self, request: &CreateEmailRequest) -> Result<CreateEmailResponse, TransportError>;

    /// `Ok(None)` when the service knows no such email.
    fn get_email(&self, audit_id: &str) -> Result<Option<CertifiedEmail>, TransportError>;

    fn download_audit_trail(&self, audit_id: &str, certificate_id: &str) -> Result<Vec<u8>, TransportError>;
}

impl<S> SigningService for Arc<S>
where
    S: SigningService + ?Sized,
{
    fn create_email(&self, request: &CreateEmailRequest) -> Result<CreateEmailResponse, TransportError> {
        (**self).create_email(request)
    }

    fn get_email(&self, audit_id: &str) -> Result<Option<CertifiedEmail>, TransportError> {
        (**self).get_email(audit_id)
    }

    fn download_audit_trail(&self, audit_id: &str, certificate_id: &str) -> Result<Vec<u8>, TransportError> {
        (**self).download_audit_trail(audit_id, certificate_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_serialize_type_field() {
        let mut recipients = BTreeMap::new();
        recipients.insert("cc".to_string(), vec![SigningRecipient::from_address("cc@example.com")]);
        let params = CreateEmailParams {
            recipients,
            request_type: "open_document".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({
                "recipients": {"cc": [{"name": "cc@example.com", "email": "cc@example.com"}]},
                "type": "open_document"
            })
        );
    }

    #[test]
    fn error_response_decodes_without_id() {
        let response: CreateEmailResponse =
            serde_json::from_value(json!({"error": "E1", "error_message": "quota exceeded"})).unwrap();
        assert_eq!(response.id, None);
        assert_eq!(response.error_message.as_deref(), Some("quota exceeded"));

        let email: CertifiedEmail = serde_json::from_value(json!({})).unwrap();
        assert!(email.certificates.is_empty());
    }
}
