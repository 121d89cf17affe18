//! API trait definitions split by responsibility
//!
//! - [`AuthApi`] - OAuth token exchange
//! - [`AvatarApi`] - Profile and avatar upload operations
//!
//! The [`AvalabApi`](super::AvalabApi) super-trait combines both.

mod auth;
mod avatar;

pub use auth::AuthApi;
pub use avatar::AvatarApi;
