//! esl-jenkins — the CI server operations es-logger depends on.
//!
//! [`JenkinsApi`] is the seam: [`JenkinsClient`] talks to a real server
//! over its JSON API, [`MockJenkins`] serves canned data in tests.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;

pub use api::{JenkinsApi, job_url_path};
pub use client::JenkinsClient;
pub use config::JenkinsConfig;
pub use error::{JenkinsError, JenkinsResult};
pub use mock::MockJenkins;
