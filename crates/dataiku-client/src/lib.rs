//! Dataiku DSS client entry points.
//!
//! This crate wraps the DSS public REST API (`{host}/public/api`) behind a
//! small set of handles: [`DssClient`] for instance-level calls and
//! [`Project`], [`Dataset`], [`Recipe`], [`Scenario`] and [`Job`] for the
//! objects inside a project. Responses are kept as `serde_json::Value`
//! because DSS definitions are large and loosely typed; consumers pick the
//! fields they need.
//!
//! Requests go through the [`Transport`] trait so tests can swap the HTTP
//! stack for [`test_utils::MockTransport`].

#![deny(warnings)]

pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod http;
pub mod job;
pub mod project;
pub mod recipe;
pub mod scenario;
pub mod test_utils;
pub mod transport;

pub use client::DssClient;
pub use config::ClientConfig;
pub use dataset::{Dataset, Sample, BUILD_MODES};
pub use error::{Error, Result};
pub use job::{Job, JobResult};
pub use project::Project;
pub use recipe::{Recipe, RecipeCreation, RecipeOutput};
pub use scenario::{Scenario, TriggerFire};
pub use transport::{ApiRequest, Transport};
