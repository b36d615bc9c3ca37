//! OCR through an external command-line engine (tesseract by default)
//!
//! Runs `<command> <image> stdout -l <languages>` and reads the text from stdout.

use super::RecognitionEngine;
use crate::config::SifterConfig;
use crate::error::RecognitionError;
use crate::models::LocationHandle;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    languages: String,
    root: PathBuf,
    timeout: Duration,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, languages: impl Into<String>, root: PathBuf) -> Self {
        Self {
            program: program.into(),
            languages: languages.into(),
            root,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &SifterConfig) -> Self {
        Self::new(
            config.ocr_command.clone(),
            config.ocr_languages.clone(),
            config.library_root.clone(),
        )
        .with_timeout(Duration::from_secs(config.ocr_timeout_secs))
    }
}

#[async_trait]
impl RecognitionEngine for CommandEngine {
    async fn recognize(&self, location: &LocationHandle) -> Result<String, RecognitionError> {
        let path = self.root.join(location.as_str());
        if !path.is_file() {
            return Err(RecognitionError::NotFound(location.to_string()));
        }

        let mut command = Command::new(&self.program);
        command
            .arg(&path)
            .arg("stdout")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if !self.languages.is_empty() {
            command.arg("-l").arg(&self.languages);
        }

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => return Err(RecognitionError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            return Err(RecognitionError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(location = %location, chars = text.len(), "Recognized text");
        Ok(text)
    }
}
