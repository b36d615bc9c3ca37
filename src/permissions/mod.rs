//! Write-access escalation
//!
//! When moves are refused the relocation engine asks the broker for one
//! batched grant. The broker either says "proceed" (`None`) or hands back an
//! [`AuthorizationRequest`] the presentation layer must show to the user.

mod fs_broker;

pub use fs_broker::FsPermissionBroker;

use crate::error::BrokerError;
use crate::models::{AuthorizationRequest, LocationHandle};
use async_trait::async_trait;

#[async_trait]
pub trait PermissionBroker: Send + Sync {
    /// Request write access for at most 50 handles
    async fn request_write_access(
        &self,
        handles: &[LocationHandle],
    ) -> Result<Option<AuthorizationRequest>, BrokerError>;
}
