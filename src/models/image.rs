use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of an image, assigned by the media index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a stored image, usable for reading, recognizing and moving it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationHandle(String);

impl LocationHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image from the library, optionally tagged with its recognized text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: ImageId,
    pub location: LocationHandle,
    pub display_name: String,
    /// Seconds since the unix epoch
    pub date_added: i64,
    #[serde(default)]
    pub ocr_text: String,
}

impl ImageRecord {
    /// Create an untagged candidate record
    pub fn new(
        id: ImageId,
        location: LocationHandle,
        display_name: impl Into<String>,
        date_added: i64,
    ) -> Self {
        Self {
            id,
            location,
            display_name: display_name.into(),
            date_added,
            ocr_text: String::new(),
        }
    }

    /// Tag the record with the text recognized at classification time
    pub fn with_ocr_text(self, ocr_text: impl Into<String>) -> Self {
        Self {
            ocr_text: ocr_text.into(),
            ..self
        }
    }

    /// Whether the record qualifies as a meme (non-blank text)
    pub fn has_text(&self) -> bool {
        !self.ocr_text.trim().is_empty()
    }

    /// First non-empty line of the recognized text
    pub fn headline(&self) -> &str {
        self.ocr_text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }
}
