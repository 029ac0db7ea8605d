//! Explorer for Azure container registries.
//!
//! The [`tree`] module exposes a lazily expanded tree of registries,
//! repositories and tagged images. Every expansion derives registry-scoped
//! bearer tokens from the signed-in account's directory token (see
//! [`registry::RegistryClient::acquire_tokens`]); nothing is cached between
//! expansions.

pub mod account;
pub mod error;
pub mod management;
pub mod registry;
pub mod settings;
pub mod tree;

pub use error::{ExplorerError, Result};
