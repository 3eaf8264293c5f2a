use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{info, warn};

use mailcamp_campaigns::{Mail, Recipients};
use mailcamp_core::MailId;

use super::client::{
    Attachment, CreateEmailParams, CreateEmailRequest, SigningRecipient, SigningService,
};
use crate::error::DeliveryError;
use crate::storage::{EntityStore, StoreError};

/// Content handed to the certified mailer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertifiedMessage {
    /// Mailbox entry that receives the receipt.
    pub mail_id: Option<MailId>,
    pub recipients: Recipients,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    /// File name to base64 content.
    pub attachments: BTreeMap<String, String>,
}

impl CertifiedMessage {
    pub fn from_mail(mail: &Mail) -> Self {
        Self {
            mail_id: Some(mail.id),
            recipients: mail.recipients.clone(),
            subject: mail.subject.clone(),
            body_text: mail.body_text.clone(),
            body_html: mail.body_html.clone(),
            attachments: mail.attachments.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertifiedOutcome {
    /// Accepted; receipt stored on the mail.
    Processed { signature_id: String },
    /// Accepted, but there was no mail to record the receipt on.
    Unrecorded,
    /// The service refused the email. Carries its message.
    Rejected(String),
}

/// HTML body for the signing service.
///
/// Prefers `html`; plain text that does not already look like markup gets
/// its newlines turned into `<br/>`.
pub fn parse_body_html(html: Option<&str>, text: &str) -> String {
    let body = html.filter(|h| !h.is_empty()).unwrap_or(text);
    let looks_like_markup = body.trim_start().starts_with('<');
    if !body.trim().is_empty() && !looks_like_markup && !body.contains("<br/>") && !body.contains("<br>") {
        return body.replace('\n', "<br/>");
    }
    body.to_string()
}

pub struct CertifiedMailer {
    client: Arc<dyn SigningService>,
    mails: Arc<dyn EntityStore<MailId, Mail>>,
    request_type: String,
}

impl CertifiedMailer {
    pub fn new(
        client: Arc<dyn SigningService>,
        mails: Arc<dyn EntityStore<MailId, Mail>>,
        request_type: impl Into<String>,
    ) -> Self {
        Self {
            client,
            mails,
            request_type: request_type.into(),
        }
    }

    /// Submit a certified email.
    ///
    /// Missing recipients fail before any network call. Transport failures are
    /// errors; an application-level rejection is returned as
    /// [`CertifiedOutcome::Rejected`].
    pub fn send(&self, message: CertifiedMessage) -> Result<CertifiedOutcome, DeliveryError> {
        if message.recipients.to.is_empty() {
            return Err(DeliveryError::MissingRecipients);
        }

        let request = self.build_request(&message)?;
        let response = self.client.create_email(&request)?;

        let mut outcome = CertifiedOutcome::Unrecorded;
        if let (Some(signature_id), Some(mail_id)) = (response.id.as_ref(), message.mail_id) {
            let mut mail = self
                .mails
                .get(&mail_id)?
                .ok_or_else(|| StoreError::NotFound(format!("mail {mail_id}")))?;
            mail.mark_certified(signature_id.clone());
            self.mails.upsert(mail_id, mail)?;

            info!(mail_id = %mail_id, signature_id = %signature_id, "certified email processed");
            outcome = CertifiedOutcome::Processed {
                signature_id: signature_id.clone(),
            };
        }

        if let Some(error) = response.error {
            let reason = response.error_message.unwrap_or(error);
            warn!(mail_id = ?message.mail_id, reason = %reason, "certified email rejected");
            return Ok(CertifiedOutcome::Rejected(reason));
        }
        Ok(outcome)
    }

    /// Audit trail document of a certified email (the last certificate's).
    pub fn audit_trail(&self, audit_id: &str) -> Result<Vec<u8>, DeliveryError> {
        let certificates = self
            .client
            .get_email(audit_id)?
            .map(|email| email.certificates)
            .unwrap_or_default();

        let mut document = None;
        for certificate_id in certificates.iter().filter_map(|c| c.id.as_deref()) {
            document = Some(self.client.download_audit_trail(audit_id, certificate_id)?);
        }
        document.ok_or_else(|| DeliveryError::NoCertificates(audit_id.to_string()))
    }

    fn build_request(&self, message: &CertifiedMessage) -> Result<CreateEmailRequest, DeliveryError> {
        let mut secondary: BTreeMap<String, Vec<SigningRecipient>> = BTreeMap::new();
        for (header, addresses) in [("cc", &message.recipients.cc), ("bcc", &message.recipients.bcc)] {
            if !addresses.is_empty() {
                secondary.insert(
                    header.to_string(),
                    addresses.iter().cloned().map(SigningRecipient::from_address).collect(),
                );
            }
        }

        let files = message
            .attachments
            .iter()
            .map(|(name, data)| {
                let content = STANDARD.decode(data).map_err(|e| DeliveryError::InvalidAttachment {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Attachment {
                    name: name.replace('/', ""),
                    content,
                })
            })
            .collect::<Result<Vec<_>, DeliveryError>>()?;

        Ok(CreateEmailRequest {
            files,
            recipients: message
                .recipients
                .to
                .iter()
                .cloned()
                .map(SigningRecipient::from_address)
                .collect(),
            subject: message.subject.clone(),
            body: parse_body_html(message.body_html.as_deref(), &message.body_text),
            params: CreateEmailParams {
                recipients: secondary,
                request_type: self.request_type.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;

    use crate::signing::{Certificate, CertifiedEmail, CreateEmailResponse, TransportError};
    use crate::storage::InMemoryEntityStore;

    #[derive(Default)]
    struct FakeSigning {
        requests: Mutex<Vec<CreateEmailRequest>>,
        response: CreateEmailResponse,
        certificates: Vec<Certificate>,
        down: bool,
    }

    impl SigningService for FakeSigning {
        fn create_email(&self, request: &CreateEmailRequest) -> Result<CreateEmailResponse, TransportError> {
            if self.down {
                return Err(TransportError::Unavailable("connection refused".into()));
            }
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }

        fn get_email(&self, _: &str) -> Result<Option<CertifiedEmail>, TransportError> {
            Ok(Some(CertifiedEmail {
                certificates: self.certificates.clone(),
            }))
        }

        fn download_audit_trail(&self, _: &str, certificate_id: &str) -> Result<Vec<u8>, TransportError> {
            Ok(format!("trail-{certificate_id}").into_bytes())
        }
    }

    fn setup(signing: Arc<FakeSigning>) -> (CertifiedMailer, Arc<InMemoryEntityStore<MailId, Mail>>, MailId) {
        let mails = Arc::new(InMemoryEntityStore::<MailId, Mail>::new());
        let mut mail = Mail::draft(MailId::new(), "sales@example.com", "Invoice 2024/001", Utc::now());
        mail.recipients = Recipients {
            to: vec!["ada@example.com".into()],
            cc: vec!["cc@example.com".into()],
            bcc: vec![],
        };
        mail.body_text = "line one\nline two".into();
        let mail_id = mail.id;
        mails.upsert(mail_id, mail).unwrap();
        (
            CertifiedMailer::new(signing, mails.clone(), "open_document"),
            mails,
            mail_id,
        )
    }

    #[test]
    fn body_prefers_html_and_converts_plain_newlines() {
        assert_eq!(parse_body_html(Some("<p>hi</p>"), "ignored"), "<p>hi</p>");
        assert_eq!(parse_body_html(None, "a\nb"), "a<br/>b");
        assert_eq!(parse_body_html(Some(""), "a\nb"), "a<br/>b");
        assert_eq!(parse_body_html(None, "a<br>\nb"), "a<br>\nb");
        assert_eq!(parse_body_html(None, "  <div>\n</div>"), "  <div>\n</div>");
        assert_eq!(parse_body_html(None, ""), "");
    }

    #[test]
    fn accepted_email_stores_receipt() {
        let signing = Arc::new(FakeSigning {
            response: CreateEmailResponse {
                id: Some("sig-1".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        let (mailer, mails, mail_id) = setup(signing.clone());
        let mut message = CertifiedMessage::from_mail(&mails.get(&mail_id).unwrap().unwrap());
        message
            .attachments
            .insert("INV/2024/001.pdf".into(), STANDARD.encode(b"%PDF"));

        let outcome = mailer.send(message).unwrap();

        assert_eq!(
            outcome,
            CertifiedOutcome::Processed {
                signature_id: "sig-1".into()
            }
        );
        let certification = mails.get(&mail_id).unwrap().unwrap().certification.unwrap();
        assert_eq!(certification.signature_id, "sig-1");
        assert_eq!(certification.state, mailcamp_campaigns::CertificationState::EmailProcessed);

        let requests = signing.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.body, "line one<br/>line two");
        assert_eq!(request.files[0].name, "INV2024001.pdf");
        assert_eq!(request.files[0].content, b"%PDF");
        assert_eq!(request.params.request_type, "open_document");
        assert_eq!(request.params.recipients["cc"][0].email, "cc@example.com");
        assert!(!request.params.recipients.contains_key("bcc"));
    }

    #[test]
    fn application_error_is_returned_as_data() {
        let signing = Arc::new(FakeSigning {
            response: CreateEmailResponse {
                id: None,
                error: Some("E42".into()),
                error_message: Some("invalid recipient".into()),
            },
            ..Default::default()
        });
        let (mailer, mails, mail_id) = setup(signing);
        let message = CertifiedMessage::from_mail(&mails.get(&mail_id).unwrap().unwrap());

        assert_eq!(
            mailer.send(message).unwrap(),
            CertifiedOutcome::Rejected("invalid recipient".into())
        );
        assert!(mails.get(&mail_id).unwrap().unwrap().certification.is_none());
    }

    #[test]
    fn missing_recipients_fail_before_the_network() {
        let signing = Arc::new(FakeSigning::default());
        let (mailer, _, _) = setup(signing.clone());

        let err = mailer.send(CertifiedMessage::default()).unwrap_err();
        assert!(matches!(err, DeliveryError::MissingRecipients));
        assert!(signing.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn transport_failure_is_an_error() {
        let signing = Arc::new(FakeSigning {
            down: true,
            ..Default::default()
        });
        let (mailer, mails, mail_id) = setup(signing);
        let message = CertifiedMessage::from_mail(&mails.get(&mail_id).unwrap().unwrap());

        assert!(matches!(
            mailer.send(message),
            Err(DeliveryError::Transport(TransportError::Unavailable(_)))
        ));
    }

    #[test]
    fn bad_attachment_encoding_is_rejected() {
        let (mailer, _, _) = setup(Arc::new(FakeSigning::default()));
        let mut message = CertifiedMessage {
            recipients: Recipients::only_to(["ada@example.com"]),
            ..Default::default()
        };
        message.attachments.insert("a.pdf".into(), "not base64!".into());

        assert!(matches!(
            mailer.send(message),
            Err(DeliveryError::InvalidAttachment { name, .. }) if name == "a.pdf"
        ));
    }

    #[test]
    fn audit_trail_returns_last_certificate_document() {
        let signing = Arc::new(FakeSigning {
            certificates: vec![Certificate { id: Some("c1".into()) }, Certificate { id: Some("c2".into()) }],
            ..Default::default()
        });
        let (mailer, _, _) = setup(signing);
        assert_eq!(mailer.audit_trail("audit-1").unwrap(), b"trail-c2");

        let (empty, _, _) = setup(Arc::new(FakeSigning::default()));
        assert!(matches!(
            empty.audit_trail("audit-2"),
            Err(DeliveryError::NoCertificates(id)) if id == "audit-2"
        ));
    }
}
