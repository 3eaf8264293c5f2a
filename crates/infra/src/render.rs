//! Template rendering seam and the handlebars-backed renderer.

use std::collections::BTreeMap;
use std::sync::Arc;

use handlebars::Handlebars;
use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use tracing::debug;

use mailcamp_campaigns::{RecordRef, Recipients, Template};
use mailcamp_core::TemplateId;

use crate::error::ConfigurationError;
use crate::records::{ReadError, RecordStoreRegistry};
use crate::storage::{EntityStore, StoreError};

/// Message content rendered for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMail {
    pub reference: RecordRef,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub recipients: Recipients,
    /// File name to base64 content, copied from the template.
    pub attachments: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template {0} not found")]
    TemplateNotFound(TemplateId),

    #[error("record {0} not found")]
    RecordNotFound(RecordRef),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("template error: {0}")]
    Template(String),

    /// Renderer output not aligned with the requested references.
    #[error("renderer returned {actual} messages for {expected} records")]
    Misaligned { expected: usize, actual: usize },
}

impl From<ReadError> for RenderError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Configuration(e) => Self::Configuration(e),
            ReadError::Store(e) => Self::Store(e),
        }
    }
}

/// Renders a template against target records.
///
/// Output is aligned by index with `refs`. Implementations should amortize
/// per-template work over the whole slice.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template_id: TemplateId, refs: &[RecordRef]) -> Result<Vec<RenderedMail>, RenderError>;
}

impl<R> TemplateRenderer for Arc<R>
where
    R: TemplateRenderer + ?Sized,
{
    fn render(&self, template_id: TemplateId, refs: &[RecordRef]) -> Result<Vec<RenderedMail>, RenderError> {
        (**self).render(template_id, refs)
    }
}

const SUBJECT: &str = "subject";
const BODY_TEXT: &str = "body_text";
const BODY_HTML: &str = "body_html";
const TO: &str = "to";
const CC: &str = "cc";
const BCC: &str = "bcc";

/// Handlebars renderer over the template store and record registry.
///
/// Each call loads and compiles the template once, then renders every record
/// with the context `{ "object": <fields>, "model": .., "id": .. }`. Output is
/// not HTML-escaped; bodies are authored as markup already.
pub struct HandlebarsRenderer {
    templates: Arc<dyn EntityStore<TemplateId, Template>>,
    records: Arc<RecordStoreRegistry>,
}

impl HandlebarsRenderer {
    pub fn new(
        templates: Arc<dyn EntityStore<TemplateId, Template>>,
        records: Arc<RecordStoreRegistry>,
    ) -> Self {
        Self { templates, records }
    }

    fn compile(template: &Template) -> Result<Handlebars<'static>, RenderError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        let mut parts = vec![
            (SUBJECT, template.subject.as_str()),
            (BODY_TEXT, template.body_text.as_str()),
            (TO, template.def_to.as_str()),
        ];
        if let Some(html) = &template.body_html {
            parts.push((BODY_HTML, html.as_str()));
        }
        if let Some(cc) = &template.def_cc {
            parts.push((CC, cc.as_str()));
        }
        if let Some(bcc) = &template.def_bcc {
            parts.push((BCC, bcc.as_str()));
        }

        for (name, source) in parts {
            registry
                .register_template_string(name, source)
                .map_err(|e| RenderError::Template(format!("{name}: {e}")))?;
        }
        Ok(registry)
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, template_id: TemplateId, refs: &[RecordRef]) -> Result<Vec<RenderedMail>, RenderError> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let template = self
            .templates
            .get(&template_id)?
            .ok_or(RenderError::TemplateNotFound(template_id))?;
        let registry = Self::compile(&template)?;

        debug!(template_id = %template_id, records = refs.len(), "rendering template");

        refs.iter()
            .map(|reference| {
                let record = self
                    .records
                    .read(reference)?
                    .ok_or_else(|| RenderError::RecordNotFound(reference.clone()))?;

                let mut object = record.fields;
                object.insert("id".to_string(), JsonValue::String(record.id.to_string()));
                let context = json!({
                    "object": object,
                    "model": reference.model,
                    "id": record.id.to_string(),
                });

                let render = |name: &str| -> Result<Option<String>, RenderError> {
                    if !registry.has_template(name) {
                        return Ok(None);
                    }
                    registry
                        .render(name, &context)
                        .map(Some)
                        .map_err(|e| RenderError::Template(format!("{name}: {e}")))
                };
                let addresses = |name: &str| -> Result<Vec<String>, RenderError> {
                    Ok(render(name)?
                        .map(|expr| Recipients::split_addresses(&expr))
                        .unwrap_or_default())
                };

                Ok(RenderedMail {
                    reference: reference.clone(),
                    subject: render(SUBJECT)?.unwrap_or_default(),
                    body_text: render(BODY_TEXT)?.unwrap_or_default(),
                    body_html: render(BODY_HTML)?,
                    recipients: Recipients {
                        to: addresses(TO)?,
                        cc: addresses(CC)?,
                        bcc: addresses(BCC)?,
                    },
                    attachments: template.attachments.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{InMemoryRecordStore, RecordStore};
    use crate::storage::InMemoryEntityStore;

    fn fixture() -> (HandlebarsRenderer, Arc<InMemoryRecordStore>, TemplateId) {
        let partners = Arc::new(InMemoryRecordStore::new("res.partner"));
        let registry = RecordStoreRegistry::new().with_store(partners.clone());

        let templates = Arc::new(InMemoryEntityStore::<TemplateId, Template>::new());
        let template_id = TemplateId::new();
        templates
            .upsert(
                template_id,
                Template::new(template_id, "welcome")
                    .with_model("res.partner")
                    .with_subject("Hello {{object.name}}")
                    .with_body_text("Dear {{object.name}},\nwelcome.")
                    .with_body_html("<p>Dear <b>{{object.name}}</b></p>")
                    .with_to("{{object.email}}; billing@example.com"),
            )
            .unwrap();

        (
            HandlebarsRenderer::new(templates, Arc::new(registry)),
            partners,
            template_id,
        )
    }

    fn partner(store: &InMemoryRecordStore, name: &str, email: &str) -> RecordRef {
        let mut fields = serde_json::Map::new();
        fields.insert("name".into(), json!(name));
        fields.insert("email".into(), json!(email));
        RecordRef::new("res.partner", store.create(fields).unwrap())
    }

    #[test]
    fn renders_each_record_in_order() {
        let (renderer, partners, template_id) = fixture();
        let ada = partner(&partners, "Ada", "ada@example.com");
        let bob = partner(&partners, "Bob & Co", "bob@example.com");

        let rendered = renderer.render(template_id, &[bob.clone(), ada.clone()]).unwrap();

        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].reference, bob);
        assert_eq!(rendered[0].subject, "Hello Bob & Co");
        assert_eq!(rendered[0].body_html.as_deref(), Some("<p>Dear <b>Bob & Co</b></p>"));
        assert_eq!(rendered[1].body_text, "Dear Ada,\nwelcome.");
        assert_eq!(
            rendered[1].recipients.to,
            vec!["ada@example.com".to_string(), "billing@example.com".to_string()]
        );
        assert!(rendered[1].recipients.cc.is_empty());
    }

    #[test]
    fn missing_record_fails_the_whole_call() {
        let (renderer, partners, template_id) = fixture();
        let ada = partner(&partners, "Ada", "ada@example.com");
        let ghost = RecordRef::new("res.partner", mailcamp_core::RecordId::new());

        let err = renderer.render(template_id, &[ada, ghost.clone()]).unwrap_err();
        assert!(matches!(err, RenderError::RecordNotFound(r) if r == ghost));
    }

    #[test]
    fn unknown_template_and_model_are_reported() {
        let (renderer, partners, template_id) = fixture();
        let ada = partner(&partners, "Ada", "ada@example.com");

        let missing = TemplateId::new();
        assert!(matches!(
            renderer.render(missing, &[ada]),
            Err(RenderError::TemplateNotFound(id)) if id == missing
        ));

        let stray = RecordRef::new("res.users", mailcamp_core::RecordId::new());
        assert!(matches!(
            renderer.render(template_id, &[stray]),
            Err(RenderError::Configuration(ConfigurationError::UnknownModel(_)))
        ));
    }

    #[test]
    fn empty_input_renders_nothing() {
        let (renderer, _, _) = fixture();
        // Not even the template lookup happens.
        assert!(renderer.render(TemplateId::new(), &[]).unwrap().is_empty());
    }
}
