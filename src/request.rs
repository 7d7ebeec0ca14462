use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Environment of a single build, variable name to value.
pub type BuildEnv = BTreeMap<String, String>;

/// Sent by cdflow2 before a release is built.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigureReleaseRequest {
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub commit: String,
    /// Environment of the caller, including `CDFLOW2_DOCKER_AUTH_*` entries.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// `config.params` from cdflow.yaml. Values are opaque to us.
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub release_requirements: BTreeMap<String, BuildRequirement>,
}

impl ConfigureReleaseRequest {
    /// String value of a config parameter, if it is set and is a string.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|value| value.as_str())
    }
}

/// What a single build needs from the config container.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BuildRequirement {
    #[serde(default)]
    pub needs: Vec<Need>,
}

/// A capability tag declared by a build.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum Need {
    /// Container registry credentials and location.
    Ecr,
    Unsupported(String),
}

impl From<String> for Need {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "ecr" => Need::Ecr,
            _ => Need::Unsupported(tag),
        }
    }
}

impl From<&str> for Need {
    fn from(tag: &str) -> Self {
        Need::from(tag.to_string())
    }
}

impl From<Need> for String {
    fn from(need: Need) -> Self {
        need.to_string()
    }
}

impl Display for Need {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Need::Ecr => f.write_str("ecr"),
            Need::Unsupported(tag) => f.write_str(tag),
        }
    }
}

/// Returned to cdflow2. `success` is the only pass/fail signal; everything
/// else about a failure has already been written to the error stream.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigureReleaseResponse {
    pub success: bool,
    #[serde(default)]
    pub additional_metadata: BTreeMap<String, String>,
    /// Build ID to that build's environment.
    #[serde(default)]
    pub env: BTreeMap<String, BuildEnv>,
}

impl Default for ConfigureReleaseResponse {
    fn default() -> Self {
        Self {
            success: true,
            additional_metadata: BTreeMap::new(),
            env: BTreeMap::new(),
        }
    }
}
