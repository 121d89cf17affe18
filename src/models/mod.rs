//! Display models for CLI output
//!
//! Converts API and packaging types into CLI-friendly rows.

pub mod display;

pub use display::{AvatarDisplay, ProfileDisplay, UploadDisplay};
