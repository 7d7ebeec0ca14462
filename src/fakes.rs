//! In-memory fakes for the AWS and team capabilities (testing only).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::aws::{self, BucketLister, ContainerRegistry, LockTable};
use crate::credentials::{self, CredentialProvider, Credentials};
use crate::request::ConfigureReleaseRequest;
use crate::team::{self, TeamResolver};

fn failure(message: &str) -> aws::Error {
    aws::Error::IOError(std::io::Error::new(std::io::ErrorKind::Other, message.to_string()))
}

// ---------------------------------------------------------------------------
// FakeCredentials
// ---------------------------------------------------------------------------

/// Counts how many times credentials were requested.
#[derive(Debug, Clone)]
pub struct FakeCredentials {
    access_key_id: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeCredentials {
    pub fn ok(access_key_id: &str) -> Self {
        Self {
            access_key_id: Some(access_key_id.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            access_key_id: None,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn credentials(&self) -> Result<Credentials, credentials::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.access_key_id {
            Some(access_key_id) => Ok(Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: "secret".to_string(),
                session_token: "session".to_string(),
            }),
            None => Err(credentials::Error::Deserialize(500, "no credentials".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeAws
// ---------------------------------------------------------------------------

/// Buckets, tables and repositories held in memory.
#[derive(Debug, Clone, Default)]
pub struct FakeAws {
    /// `None` makes bucket listing fail.
    pub buckets: Option<Vec<String>>,
    pub tables: Vec<String>,
    /// Component to repository URI. An empty URI is returned as-is.
    pub repositories: BTreeMap<String, String>,
    /// Components whose registry lookup fails.
    pub broken_repositories: Vec<String>,
    list_calls: Arc<AtomicUsize>,
    table_calls: Arc<AtomicUsize>,
}

impl FakeAws {
    /// All resources created by setup are present.
    pub fn complete() -> Self {
        Self {
            buckets: Some(vec![
                "cdflow2-release-abc".to_string(),
                "cdflow2-tfstate-def".to_string(),
            ]),
            tables: vec!["cdflow2-tflocks".to_string()],
            ..Default::default()
        }
    }

    /// Only `buckets` exist; no tables or repositories.
    pub fn with_buckets(buckets: &[&str]) -> Self {
        Self {
            buckets: Some(buckets.iter().map(|bucket| bucket.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn with_repository(mut self, component: &str, uri: &str) -> Self {
        self.repositories.insert(component.to_string(), uri.to_string());
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn table_calls(&self) -> usize {
        self.table_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BucketLister for FakeAws {
    async fn list_buckets(&self) -> Result<Vec<String>, aws::Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.buckets.clone().ok_or_else(|| failure("access denied listing buckets"))
    }
}

#[async_trait]
impl LockTable for FakeAws {
    async fn table_exists(&self, name: &str) -> Result<bool, aws::Error> {
        self.table_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.iter().any(|table| table == name))
    }
}

#[async_trait]
impl ContainerRegistry for FakeAws {
    async fn repository_uri(&self, component: &str) -> Result<Option<String>, aws::Error> {
        if self.broken_repositories.iter().any(|broken| broken == component) {
            return Err(failure("access denied describing repositories"));
        }
        Ok(self.repositories.get(component).cloned())
    }
}

// ---------------------------------------------------------------------------
// FakeTeams
// ---------------------------------------------------------------------------

/// Resolves a fixed set of team identifiers to names.
#[derive(Debug, Clone, Default)]
pub struct FakeTeams {
    pub teams: BTreeMap<String, String>,
}

impl FakeTeams {
    pub fn with(id: &str, name: &str) -> Self {
        Self {
            teams: BTreeMap::from([(id.to_string(), name.to_string())]),
        }
    }
}

impl TeamResolver for FakeTeams {
    fn resolve(&self, request: &ConfigureReleaseRequest) -> Result<String, team::Error> {
        let id = request.config_str("team").ok_or(team::Error::Missing)?;
        self.teams
            .get(id)
            .cloned()
            .ok_or_else(|| team::Error::Invalid(id.to_string()))
    }
}
