//! # railcheck-runtime
//!
//! Async provider gateways and the demo dispatcher for Railcheck.
//!
//! This crate is the live half of the project: it sends rail demo prompts
//! to a model provider, feeds the responses through the validators in
//! `railcheck-core`, and records every run in an append-only history.
//!
//! ## Important
//!
//! `railcheck-core` stays fully offline and deterministic. Everything that
//! touches the network lives here, and all of it is optional: enable the
//! `gemini` and/or `openai` features to compile the real gateways.
//!
//! ## Example
//!
//! ```rust,ignore
//! use railcheck_runtime::{Dispatcher, GeminiGateway};
//! use railcheck_core::{Rail, RequestContext};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(GeminiGateway::from_env()?);
//! let dispatcher = Dispatcher::builder().gateway(gateway).build()?;
//!
//! // Blank prompt: the rail's default demo prompt is used.
//! let ctx = RequestContext::new(Rail::InvalidSql, "", "gemini", "gemini-1.5-pro-latest");
//! let entry = dispatcher.run_demo(&ctx).await;
//! println!("{}", railcheck_core::format_entry(&entry));
//! ```

use thiserror::Error;

use railcheck_core::ConfigError;

pub mod config;
pub mod dispatcher;
pub mod history;
pub mod models;
pub mod prompts;
pub mod providers;

pub use config::RuntimeConfig;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use history::HistoryLog;
pub use models::ModelCatalog;
pub use providers::{
    GatewayError, GenerationRequest, ModelDescriptor, ModelList, ProviderGateway,
    ProviderRegistry,
};

#[cfg(feature = "gemini")]
pub use providers::GeminiGateway;
#[cfg(feature = "openai")]
pub use providers::OpenAiGateway;

/// Errors from runtime setup.
///
/// Once a dispatcher is built, runs do not error: provider failures are
/// recovered into Fail verdicts inside [`Dispatcher::run_demo`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
