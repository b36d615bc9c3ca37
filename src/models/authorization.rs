use super::LocationHandle;
use crate::error::BrokerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest batch a single write-access request may cover.
/// Larger requests exceed the platform transaction limit and fail outright.
pub const MAX_AUTHORIZATION_BATCH: usize = 50;

/// A pending user-facing grant of write access for a bounded batch of images
///
/// Created by the relocation engine, consumed exactly once by the
/// presentation layer, which answers granted or denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub id: Uuid,
    pub handles: Vec<LocationHandle>,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationRequest {
    /// Create a request, refusing batches above [`MAX_AUTHORIZATION_BATCH`]
    pub fn new(handles: Vec<LocationHandle>) -> Result<Self, BrokerError> {
        if handles.len() > MAX_AUTHORIZATION_BATCH {
            return Err(BrokerError::BatchTooLarge {
                requested: handles.len(),
                limit: MAX_AUTHORIZATION_BATCH,
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            handles,
            created_at: Utc::now(),
        })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn covers(&self, handle: &LocationHandle) -> bool {
        self.handles.contains(handle)
    }
}
