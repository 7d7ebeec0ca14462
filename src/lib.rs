//! AWS config container for cdflow2 releases.
//!
//! Before a release is built, cdflow2 asks the config container to check the
//! release configuration and to hand each build the environment it needs:
//!
//! 1. resolve the team that owns the release,
//! 2. validate `config.params` and the caller environment,
//! 3. assemble per-build environments (AWS credentials, ECR repository and tag),
//! 4. check that the release bucket, terraform state bucket and locks table exist.
//!
//! Any failure ends up as `Success: false` in the response, with the reason
//! written to the error stream.

pub mod aws;
pub mod config;
pub mod credentials;
pub mod environment;
pub mod handler;
pub mod request;
pub mod resources;
pub mod team;
pub mod validate;

#[cfg(test)]
pub(crate) mod fakes;

pub use handler::{Collaborators, Handler};
pub use request::{BuildRequirement, ConfigureReleaseRequest, ConfigureReleaseResponse, Need};
