//! ResearchTwin: research footprint aggregation and S-Index scoring service.
//!
//! The aggregation core lives in [`twin_core`]. This crate adds what a
//! deployment needs around it:
//! - **Configuration**: TOML config with `dirs` default paths ([`config`])
//! - **Storage**: SQLite researcher registry and durable source cache ([`store`])
//! - **Service**: the [`service::TwinService`] facade (`GetContext`, `Discover`, chat)
//! - **Answers**: OpenAI-compatible answer generation ([`answer`])
//! - **HTTP**: a thin axum API ([`api`])

pub mod answer;
pub mod api;
pub mod config;
pub mod error;
pub mod paths;
pub mod service;
pub mod store;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError, StoreError};
pub use service::TwinService;
