//! Registry data plane: bearer token exchange, catalog, tags and manifests.

mod client;
mod models;

pub use client::RegistryClient;
pub use models::{BearerTokenPair, Scope};

#[cfg(test)]
pub(crate) use client::testing;
