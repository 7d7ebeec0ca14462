use async_trait::async_trait;
use std::process::ExitStatus;
use thiserror::Error;

pub mod cli;

#[derive(Error, Debug)]
pub enum Error {
    #[error("aws {command} exited with {status}: {stderr}")]
    Exec {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("deserialize output of aws {command}: {err}")]
    Deserialize {
        command: String,
        err: serde_json::Error,
    },

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// Object storage bucket listing.
#[async_trait]
pub trait BucketLister: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<String>, Error>;
}

/// Existence of the table used for Terraform state locking.
#[async_trait]
pub trait LockTable: Send + Sync {
    async fn table_exists(&self, name: &str) -> Result<bool, Error>;
}

/// Container registry lookup.
#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// URI of the component's repository, or `None` if it has not been created.
    async fn repository_uri(&self, component: &str) -> Result<Option<String>, Error>;
}

/// First listed bucket whose name follows the `prefix` naming convention.
///
/// Buckets created by setup carry a random suffix, so only the prefix is known.
pub fn find_bucket<'a>(buckets: &'a [String], prefix: &str) -> Option<&'a str> {
    buckets
        .iter()
        .map(String::as_str)
        .find(|name| name.starts_with(prefix) && name.len() > prefix.len())
}
