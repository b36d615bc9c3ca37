//! Classification Pipeline
//!
//! Turns the media index into the set of meme images:
//!
//! ```text
//! list candidates ─► chunk into batches ─► recognize batch in parallel ─► drop blank text ─► publish batch
//!                                     ▲                                                           │
//!                                     └────────────────────── next batch ◄────────────────────────┘
//! ```
//!
//! Batches run one after another. Within a batch every image is recognized on
//! its own task, and the survivors are published in a single call once the
//! whole batch has resolved, in candidate order. A cancelled scan aborts the
//! outstanding tasks and drops the partial batch.

use crate::error::PipelineError;
use crate::media::MediaIndex;
use crate::models::ImageRecord;
use crate::recognition::TextRecognitionClient;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Counts for a finished scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Images returned by the media index
    pub candidates: usize,
    /// Images that had text and were published
    pub published: usize,
    /// Batches processed
    pub batches: usize,
}

pub struct ClassificationPipeline {
    media: Arc<dyn MediaIndex>,
    recognizer: TextRecognitionClient,
    batch_size: usize,
}

impl ClassificationPipeline {
    /// Create a pipeline; a batch size of 0 is treated as 1
    pub fn new(
        media: Arc<dyn MediaIndex>,
        recognizer: TextRecognitionClient,
        batch_size: usize,
    ) -> Self {
        Self {
            media,
            recognizer,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run one scan, calling `publish` once per batch that has survivors
    pub async fn scan<F>(
        &self,
        cancel: &CancellationToken,
        mut publish: F,
    ) -> Result<ScanSummary, PipelineError>
    where
        F: FnMut(Vec<ImageRecord>) + Send,
    {
        let candidates = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = self.media.list_candidates() => result?,
        };

        let mut summary = ScanSummary {
            candidates: candidates.len(),
            ..ScanSummary::default()
        };

        if candidates.is_empty() {
            tracing::info!("No candidates to classify");
            return Ok(summary);
        }

        tracing::info!(
            candidates = candidates.len(),
            batch_size = self.batch_size,
            "Starting classification"
        );

        for (index, batch) in candidates.chunks(self.batch_size).enumerate() {
            let survivors = self.classify_batch(batch, cancel).await?;
            summary.batches += 1;

            tracing::debug!(
                batch = index,
                size = batch.len(),
                survivors = survivors.len(),
                "Batch classified"
            );

            if survivors.is_empty() {
                continue;
            }
            summary.published += survivors.len();
            publish(survivors);
        }

        tracing::info!(
            candidates = summary.candidates,
            published = summary.published,
            batches = summary.batches,
            "Classification complete"
        );
        Ok(summary)
    }

    /// Recognize every image of a batch concurrently and keep those with text
    async fn classify_batch(
        &self,
        batch: &[ImageRecord],
        cancel: &CancellationToken,
    ) -> Result<Vec<ImageRecord>, PipelineError> {
        let mut tasks = JoinSet::new();

        for (slot, record) in batch.iter().cloned().enumerate() {
            let recognizer = self.recognizer.clone();
            tasks.spawn(async move {
                let text = recognizer.recognize(&record.location).await;
                (slot, record.with_ocr_text(text))
            });
        }

        // Slots keep candidate order regardless of completion order
        let mut tagged: Vec<Option<ImageRecord>> = vec![None; batch.len()];

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    tracing::info!(outstanding = tasks.len(), "Scan cancelled, discarding batch");
                    return Err(PipelineError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((slot, record))) => tagged[slot] = Some(record),
                    Some(Err(e)) => {
                        // A panicked recognition counts as no text
                        tracing::warn!(error = %e, "Recognition task failed");
                    }
                    None => break,
                }
            }
        }

        Ok(tagged
            .into_iter()
            .flatten()
            .filter(ImageRecord::has_text)
            .collect())
    }
}
