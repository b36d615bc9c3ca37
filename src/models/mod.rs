//! Data contracts shared by the pipeline, the relocation engine and the session.

mod authorization;
mod image;
mod notification;

pub use authorization::{AuthorizationRequest, MAX_AUTHORIZATION_BATCH};
pub use image::{ImageId, ImageRecord, LocationHandle};
pub use notification::Notification;
