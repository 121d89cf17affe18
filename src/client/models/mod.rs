//! Avalab API data models
//!
//! Request and response bodies, organized by resource type.

mod auth;
mod avatar;
mod user;

pub use auth::{GrantType, TokenRequest, TokenResponse};
pub use avatar::{Empty, PrepareAvatarRequest, PrepareAvatarResponse, RegisterLoraRequest};
pub use user::{Subscription, UserProfile};
