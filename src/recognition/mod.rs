//! Text recognition
//!
//! The engine reports faults; the client swallows them. A corrupt or
//! unreadable image is indistinguishable from an image without text, so a
//! single failure never aborts a batch.

mod command;

pub use command::CommandEngine;

use crate::error::RecognitionError;
use crate::models::LocationHandle;
use async_trait::async_trait;
use std::sync::Arc;

/// An on-device OCR engine
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    async fn recognize(&self, location: &LocationHandle) -> Result<String, RecognitionError>;
}

/// Never-failing front for a [`RecognitionEngine`]
#[derive(Clone)]
pub struct TextRecognitionClient {
    engine: Arc<dyn RecognitionEngine>,
}

impl TextRecognitionClient {
    pub fn new(engine: Arc<dyn RecognitionEngine>) -> Self {
        Self { engine }
    }

    /// Recognized text, or an empty string if the engine failed
    pub async fn recognize(&self, location: &LocationHandle) -> String {
        match self.engine.recognize(location).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(location = %location, error = %e, "Recognition failed, treating as no text");
                String::new()
            }
        }
    }
}
