use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mailcamp_core::{Entity, TemplateId};

/// Mail template.
///
/// Subject and bodies are rendered per target record by the template renderer;
/// `model` is the record model the template is written against. A template
/// without a model cannot drive automatic recipient discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub model: Option<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    /// Default `To` expression (rendered like the body).
    pub def_to: String,
    pub def_cc: Option<String>,
    pub def_bcc: Option<String>,
    /// Files sent with every message: file name to base64 content.
    #[serde(default)]
    pub attachments: BTreeMap<String, String>,
}

impl Template {
    pub fn new(id: TemplateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            model: None,
            subject: String::new(),
            body_text: String::new(),
            body_html: None,
            def_to: String::new(),
            def_cc: None,
            def_bcc: None,
            attachments: BTreeMap::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_body_text(mut self, body: impl Into<String>) -> Self {
        self.body_text = body.into();
        self
    }

    pub fn with_body_html(mut self, body: impl Into<String>) -> Self {
        self.body_html = Some(body.into());
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.def_to = to.into();
        self
    }

    pub fn with_attachment(mut self, name: impl Into<String>, base64: impl Into<String>) -> Self {
        self.attachments.insert(name.into(), base64.into());
        self
    }

    /// Model name, treating an empty string like no model.
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().filter(|m| !m.trim().is_empty())
    }
}

impl Entity for Template {
    type Id = TemplateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
