pub mod agriculture;
pub mod assessment;
pub mod config;
pub mod error;
pub mod handlers;
pub mod intent;
pub mod location;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod service;
pub mod session;
pub mod synth;
pub mod transcription;
pub mod transport;
pub mod weather;

pub use crate::config::Config;
pub use crate::error::{AdvisorError, Result};
pub use crate::service::AdvisorService;
