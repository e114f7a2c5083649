//! Domain types shared by the studio client and CLI.
//!
//! Nothing in this crate performs I/O. It defines the request the user
//! submits, the status payload the backend reports while a job runs, the
//! artifact listing, and the validation rules applied before anything is
//! sent over the wire.

pub mod artifact;
pub mod error;
pub mod job;
pub mod polling;
pub mod request;
pub mod types;

pub use artifact::Artifact;
pub use error::CoreError;
pub use job::{JobHandle, JobState, JobStatus};
pub use request::{JobRequest, Language, TargetDuration};
