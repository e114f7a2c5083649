//! Client for the studio video-generation backend.
//!
//! Provides the HTTP API wrapper, the [`JobController`] that drives one
//! generation job from submission to a terminal status, and the
//! [`ArtifactCatalog`] that mirrors the backend's list of finished videos.
//!
//! The controller and the catalog only talk to the backend through the
//! [`JobBackend`] trait, so tests can substitute an in-memory fake.

pub mod api;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod events;
pub mod hook;
pub mod poller;

pub use api::{ApiError, StudioApi};
pub use backend::JobBackend;
pub use catalog::{ArtifactCatalog, CatalogError};
pub use config::{ClientConfig, ConfigError};
pub use controller::{ControllerError, ControllerPhase, ControllerSnapshot, JobController};
pub use events::JobEvent;
pub use hook::TerminalHook;
pub use poller::PollPolicy;
