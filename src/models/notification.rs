use serde::{Deserialize, Serialize};

/// One-shot outcome message for a finished scan or move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    ScanCompleted { found: usize },
    ScanFailed { reason: String },
    Moved { count: usize },
    MoveFailed { reason: String },
}

impl Notification {
    /// Text shown to the user
    pub fn message(&self) -> String {
        match self {
            Notification::ScanCompleted { found: 0 } => "No memes found".to_string(),
            Notification::ScanCompleted { found } => format!("Scan complete: {} memes found", found),
            Notification::ScanFailed { reason } => format!("Scan failed: {}", reason),
            Notification::Moved { count } => format!("Archived {} memes", count),
            Notification::MoveFailed { reason } => format!("Move failed: {}", reason),
        }
    }
}
