//! Core of the listing moderation pipeline.
//!
//! Persists moderation tasks (`TaskStore`), shields the store behind two
//! best-effort caches (`PredictionCache`, `TaskCache`), publishes and
//! consumes moderation requests over a message bus (`BusProducer`), and
//! scores listings with an in-process classifier (`Scorer`). The four
//! service functions in [`service`] compose these seams into the
//! enqueue/worker/read/closure flows; [`api`] exposes them over HTTP.
#![warn(rust_2018_idioms, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![forbid(unsafe_code)]

pub mod api;
pub mod bus;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod scorer;
pub mod service;
pub mod state;
pub mod store;

mod test_support;

pub use config::{AppConfig, CONFIG};
pub use error::{ModeraError, Result};
pub use state::AppState;
