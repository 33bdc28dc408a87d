//! LLM provider catalog for Agentry
//!
//! Agentry never talks to a provider directly; the execution engine does.
//! What the runtime does own is the catalog of known providers and the
//! models each one accepts, which configuration validation checks against.

pub mod registry;

pub use registry::{find_provider, ProviderName, ProviderSpec, PROVIDER_REGISTRY};
