use crate::environment::DOCKER_AUTH_PREFIX;
use std::collections::BTreeMap;
use thiserror::Error;

/// A single reason the input configuration is unusable.
#[derive(Error, Debug, PartialEq)]
pub enum Problem {
    #[error(
        "cdflow.yaml: error - config.params.default_region must be a non-empty string, got {0}"
    )]
    DefaultRegion(String),

    #[error(
        "cdflow.yaml: error - config.params.default_region must be set, \
         no AWS region configured"
    )]
    NoRegion,

    #[error("environment: {0} is set but empty")]
    EmptyDockerAuth(String),
}

/// Checks the caller's config and environment before anything is looked up in AWS.
pub trait InputValidator: Send + Sync {
    /// Every problem found. An empty list means the input is valid.
    fn validate(
        &self,
        config: &BTreeMap<String, serde_json::Value>,
        env: &BTreeMap<String, String>,
    ) -> Vec<Problem>;
}

#[derive(Debug, Default, Clone)]
pub struct ConfigValidator {
    /// Region used when config.params.default_region is absent.
    pub fallback_region: Option<String>,
}

impl ConfigValidator {
    pub fn new(fallback_region: Option<String>) -> Self {
        Self { fallback_region }
    }
}

impl InputValidator for ConfigValidator {
    fn validate(
        &self,
        config: &BTreeMap<String, serde_json::Value>,
        env: &BTreeMap<String, String>,
    ) -> Vec<Problem> {
        let mut problems = vec![];

        match config.get("default_region") {
            Some(serde_json::Value::String(region)) if !region.is_empty() => {}
            None | Some(serde_json::Value::Null) => {
                if self.fallback_region.is_none() {
                    problems.push(Problem::NoRegion);
                }
            }
            Some(other) => problems.push(Problem::DefaultRegion(other.to_string())),
        }

        problems.extend(
            env.iter()
                .filter(|(key, value)| key.starts_with(DOCKER_AUTH_PREFIX) && value.is_empty())
                .map(|(key, _)| Problem::EmptyDockerAuth(key.clone())),
        );

        problems
    }
}
