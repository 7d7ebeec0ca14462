use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../default.toml");

/// File name looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "cdflow-config.toml";

#[derive(Error, Debug)]
pub enum Error {
    #[error("read {path}: {err}")]
    ReadFile {
        err: std::io::Error,
        path: String,
    },

    #[error("parse {path}: {err}")]
    Parse {
        err: toml::de::Error,
        path: String,
    },
}

/// A cdflow-config.toml file.
#[serde_inline_default]
#[derive(Deserialize, Debug, Clone)]
pub struct File {
    pub description: Option<String>,
    #[serde_inline_default("cdflow2 setup".to_string())]
    pub setup_command: String,
    #[serde(default = "Default::default")]
    pub resources: Resources,
    #[serde(default = "Default::default")]
    pub aws: Aws,
    #[serde(default = "Default::default")]
    pub team: Team,
}

impl Default for File {
    fn default() -> Self {
        // The default config is compiled into the program, so
        // make sure to test default() to catch panics compile-time.
        toml::from_str(DEFAULT_CONFIG).unwrap()
    }
}

impl File {
    /// Read a user configuration file. Anything the file leaves out
    /// gets the same value as in the built-in configuration.
    pub fn from_user_config_file(path: &str) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path).map_err(|err| Error::ReadFile {
            err,
            path: path.to_string(),
        })?;
        toml::from_str(&data).map_err(|err| Error::Parse {
            err,
            path: path.to_string(),
        })
    }
}

/// Naming conventions of the infrastructure created by `cdflow2 setup`.
#[serde_inline_default]
#[derive(Deserialize, Debug, Clone)]
pub struct Resources {
    #[serde_inline_default("cdflow2-release-".to_string())]
    pub release_bucket_prefix: String,
    #[serde_inline_default("cdflow2-tfstate-".to_string())]
    pub tfstate_bucket_prefix: String,
    #[serde_inline_default("cdflow2-tflocks".to_string())]
    pub tflocks_table: String,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            release_bucket_prefix: "cdflow2-release-".to_string(),
            tfstate_bucket_prefix: "cdflow2-tfstate-".to_string(),
            tflocks_table: "cdflow2-tflocks".to_string(),
        }
    }
}

#[serde_inline_default]
#[derive(Deserialize, Debug, Clone)]
pub struct Aws {
    /// Path or name of the AWS command line tool.
    #[serde_inline_default("aws".to_string())]
    pub cli: String,
    pub default_region: Option<String>,
}

impl Default for Aws {
    fn default() -> Self {
        Self {
            cli: "aws".to_string(),
            default_region: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Team {
    /// Used when the request does not name a team.
    pub default: Option<String>,
}
