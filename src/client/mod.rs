//! Avalab API client

pub mod api;
mod avalab;
#[cfg(test)]
pub mod mock;
pub mod models;
mod request;

pub use api::{AuthApi, AvatarApi};
pub use avalab::AvalabClient;
#[cfg(test)]
pub use mock::MockAvalabClient;
pub use request::ProgressFn;

/// Complete Avalab API surface.
///
/// Blanket-implemented for every type providing both sub-traits, so callers
/// can take `&dyn AvalabApi` without caring about the concrete client.
pub trait AvalabApi: AuthApi + AvatarApi {}

impl<T: AuthApi + AvatarApi> AvalabApi for T {}
