//! Batch render-and-create pipeline.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use mailcamp_campaigns::{IntegrityError, Mail, RecordRef, partition};
use mailcamp_core::{MailId, TemplateId};

use super::screen::ScreenValues;
use crate::error::DeliveryError;
use crate::jobs::{JobError, JobHandle, JobQueue, join_all};
use crate::render::{RenderError, TemplateRenderer};
use crate::storage::EntityStore;

/// One batch that produced no drafts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub error: JobError,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid screen values: {0}")]
    InvalidScreenValues(String),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("failed to submit batch job: {0}")]
    Submit(JobError),

    /// Some batches failed; drafts of the completed ones exist but are not returned.
    #[error("{} render batch(es) failed, {completed} completed ({created} drafts created)", .failures.len())]
    PartialFailure {
        failures: Vec<BatchFailure>,
        completed: usize,
        created: usize,
    },
}

/// Arguments of one render batch job, moved into the job by value.
#[derive(Debug, Clone)]
pub struct RenderBatchJob {
    pub batch_index: usize,
    pub template_id: TemplateId,
    pub refs: Vec<RecordRef>,
    pub screen_vals: ScreenValues,
}

impl RenderBatchJob {
    /// Render the batch once and store one draft per reference, in order.
    pub fn run(
        self,
        renderer: &dyn TemplateRenderer,
        mails: &dyn EntityStore<MailId, Mail>,
    ) -> Result<Vec<MailId>, DeliveryError> {
        let rendered = renderer.render(self.template_id, &self.refs)?;
        if rendered.len() != self.refs.len() {
            return Err(RenderError::Misaligned {
                expected: self.refs.len(),
                actual: rendered.len(),
            }
            .into());
        }

        let mut ids = Vec::with_capacity(rendered.len());
        for message in rendered {
            let mut mail = Mail::draft(MailId::new(), &self.screen_vals.account, message.subject, Utc::now());
            mail.body_text = message.body_text;
            mail.body_html = message.body_html;
            mail.recipients = self.screen_vals.apply_overrides(message.recipients);
            mail.attachments = message.attachments;
            mail.reference = Some(message.reference);

            ids.push(mail.id);
            mails.upsert(mail.id, mail)?;
        }

        debug!(batch = self.batch_index, drafts = ids.len(), "render batch stored");
        Ok(ids)
    }
}

/// Fans draft creation out to the job queue in render batches.
pub struct BatchDispatcher<Q: JobQueue> {
    queue: Arc<Q>,
    renderer: Arc<dyn TemplateRenderer>,
    mails: Arc<dyn EntityStore<MailId, Mail>>,
    queue_name: String,
}

impl<Q: JobQueue> BatchDispatcher<Q> {
    pub fn new(
        queue: Arc<Q>,
        renderer: Arc<dyn TemplateRenderer>,
        mails: Arc<dyn EntityStore<MailId, Mail>>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            renderer,
            mails,
            queue_name: queue_name.into(),
        }
    }

    /// Create one draft per reference and return their ids in `refs` order.
    ///
    /// Blocks until every submitted batch job has finished. Any failed batch
    /// turns the whole call into [`DispatchError::PartialFailure`].
    pub fn save_to_mailbox(
        &self,
        refs: &[RecordRef],
        screen_vals: &ScreenValues,
    ) -> Result<Vec<MailId>, DispatchError> {
        screen_vals.validate()?;
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let batches = partition(refs)?;
        info!(
            queue = %self.queue_name,
            records = refs.len(),
            batches = batches.len(),
            "dispatching render batches"
        );

        let mut handles: Vec<JobHandle<Vec<MailId>>> = Vec::with_capacity(batches.len());
        for (batch_index, batch) in batches.into_iter().enumerate() {
            let job = RenderBatchJob {
                batch_index,
                template_id: screen_vals.template_id,
                refs: batch,
                screen_vals: screen_vals.clone(),
            };
            let renderer = self.renderer.clone();
            let mails = self.mails.clone();

            match self
                .queue
                .submit(&self.queue_name, move || job.run(renderer.as_ref(), mails.as_ref()))
            {
                Ok(handle) => {
                    debug!(batch = batch_index, job_id = %handle.id(), "render batch submitted");
                    handles.push(handle);
                }
                Err(e) => {
                    // Already submitted jobs cannot be cancelled; wait them out.
                    join_all(handles);
                    return Err(DispatchError::Submit(e));
                }
            }
        }

        let mut ids = Vec::with_capacity(refs.len());
        let mut failures = Vec::new();
        let mut completed = 0;
        for (batch_index, outcome) in join_all(handles).into_iter().enumerate() {
            match outcome.result {
                Ok(batch_ids) => {
                    completed += 1;
                    ids.extend(batch_ids);
                }
                Err(error) => {
                    warn!(batch = batch_index, job_id = %outcome.id, error = %error, "render batch failed");
                    failures.push(BatchFailure { batch_index, error });
                }
            }
        }

        if !failures.is_empty() {
            return Err(DispatchError::PartialFailure {
                failures,
                completed,
                created: ids.len(),
            });
        }
        if ids.len() != refs.len() {
            return Err(IntegrityError {
                expected: refs.len(),
                actual: ids.len(),
            }
            .into());
        }

        info!(queue = %self.queue_name, drafts = ids.len(), "render batches joined");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use mailcamp_campaigns::{Folder, Recipients};
    use mailcamp_core::RecordId;

    use crate::jobs::{JobQueueConfig, LocalJobQueue};
    use crate::render::RenderedMail;
    use crate::storage::InMemoryEntityStore;

    /// Records every call; sleeps on the first reference so later batches finish first.
    #[derive(Default)]
    struct ScriptedRenderer {
        calls: Mutex<Vec<usize>>,
        slow: Option<RecordRef>,
        broken: Option<RecordRef>,
    }

    impl TemplateRenderer for ScriptedRenderer {
        fn render(&self, _: TemplateId, refs: &[RecordRef]) -> Result<Vec<RenderedMail>, RenderError> {
            self.calls.lock().unwrap().push(refs.len());
            if self.slow.as_ref().is_some_and(|s| refs.contains(s)) {
                thread::sleep(Duration::from_millis(100));
            }
            if let Some(broken) = self.broken.as_ref().filter(|b| refs.contains(b)) {
                return Err(RenderError::RecordNotFound(broken.clone()));
            }
            Ok(refs
                .iter()
                .map(|r| RenderedMail {
                    reference: r.clone(),
                    subject: format!("about {r}"),
                    body_text: "body".into(),
                    body_html: None,
                    recipients: Recipients::only_to(["someone@example.com"]),
                    attachments: Default::default(),
                })
                .collect())
        }
    }

    fn refs(n: usize) -> Vec<RecordRef> {
        (0..n).map(|_| RecordRef::new("res.partner", RecordId::new())).collect()
    }

    fn dispatcher(
        renderer: Arc<ScriptedRenderer>,
    ) -> (BatchDispatcher<LocalJobQueue>, Arc<InMemoryEntityStore<MailId, Mail>>) {
        let queue = Arc::new(LocalJobQueue::start(JobQueueConfig::default().with_workers(4)).unwrap());
        let mails = Arc::new(InMemoryEntityStore::<MailId, Mail>::new());
        let dispatcher = BatchDispatcher::new(queue, renderer, mails.clone(), "poweremail");
        (dispatcher, mails)
    }

    fn screen() -> ScreenValues {
        ScreenValues::new(TemplateId::new(), "sales@example.com")
    }

    #[test]
    fn five_refs_render_twice_and_keep_input_order() {
        let targets = refs(5);
        let renderer = Arc::new(ScriptedRenderer {
            slow: Some(targets[0].clone()),
            ..Default::default()
        });
        let (dispatcher, mails) = dispatcher(renderer.clone());

        let ids = dispatcher.save_to_mailbox(&targets, &screen()).unwrap();

        assert_eq!(ids.len(), 5);
        let mut calls = renderer.calls.lock().unwrap().clone();
        calls.sort_unstable();
        assert_eq!(calls, vec![2, 3]);

        for (id, target) in ids.iter().zip(&targets) {
            let mail = mails.get(id).unwrap().unwrap();
            assert_eq!(mail.reference.as_ref(), Some(target));
            assert_eq!(mail.folder, Folder::Drafts);
            assert_eq!(mail.account, "sales@example.com");
        }
    }

    #[test]
    fn screen_overrides_reach_the_drafts() {
        let renderer = Arc::new(ScriptedRenderer::default());
        let (dispatcher, mails) = dispatcher(renderer);

        let ids = dispatcher
            .save_to_mailbox(&refs(2), &screen().with_to("override@example.com"))
            .unwrap();

        let mail = mails.get(&ids[0]).unwrap().unwrap();
        assert_eq!(mail.recipients.to, vec!["override@example.com".to_string()]);
    }

    #[test]
    fn failed_batch_is_reported_not_dropped() {
        let targets = refs(7);
        let renderer = Arc::new(ScriptedRenderer {
            broken: Some(targets[4].clone()),
            ..Default::default()
        });
        let (dispatcher, _) = dispatcher(renderer.clone());

        let err = dispatcher.save_to_mailbox(&targets, &screen()).unwrap_err();

        // Batches: [0..3], [3..5], [5..7]; the broken ref lives in batch 1.
        match err {
            DispatchError::PartialFailure {
                failures,
                completed,
                created,
            } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].batch_index, 1);
                assert!(matches!(failures[0].error, JobError::Failed(_)));
                assert_eq!(completed, 2);
                assert_eq!(created, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The barrier waited for every batch.
        assert_eq!(renderer.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn invalid_screen_values_submit_nothing() {
        let renderer = Arc::new(ScriptedRenderer::default());
        let (dispatcher, _) = dispatcher(renderer.clone());

        let err = dispatcher
            .save_to_mailbox(&refs(3), &ScreenValues::new(TemplateId::new(), ""))
            .unwrap_err();

        assert!(matches!(err, DispatchError::InvalidScreenValues(_)));
        assert!(renderer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn no_refs_no_jobs() {
        let renderer = Arc::new(ScriptedRenderer::default());
        let (dispatcher, _) = dispatcher(renderer.clone());

        assert!(dispatcher.save_to_mailbox(&[], &screen()).unwrap().is_empty());
        assert!(renderer.calls.lock().unwrap().is_empty());
    }
}
