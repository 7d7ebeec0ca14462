use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} credentials not configured")]
    NotConfigured(&'static str),

    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("code: {0}, body: {1}")]
    Deserialize(u16, String),

    #[error("aws cli: {0}")]
    Cli(#[from] crate::aws::Error),

    #[error("unable to find AWS credentials: {}", .0.join("; "))]
    NoCredentials(Vec<String>),

    #[error("unable to determine AWS region, set config.params.default_region")]
    NoRegion,
}

/// Temporary or long-lived AWS access keys.
#[derive(Clone, PartialEq, Default)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Empty for long-lived keys.
    pub session_token: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

/// Credentials paired with the region every build should talk to.
#[derive(Clone, Debug, PartialEq)]
pub struct CredentialSet {
    pub credentials: Credentials,
    pub region: String,
}

/// Source of the ambient AWS credentials of this process.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Result<Credentials, Error>;
}

/// Retrieve credentials once and pair them with `region`.
pub async fn resolve_credentials(
    provider: &dyn CredentialProvider,
    region: Option<&str>,
) -> Result<CredentialSet, Error> {
    let region = match region {
        Some(region) if !region.is_empty() => region.to_string(),
        _ => return Err(Error::NoRegion),
    };
    let credentials = provider.credentials().await?;
    debug!("Resolved AWS credentials {} in {region}", credentials.access_key_id);
    Ok(CredentialSet { credentials, region })
}

/// Region from the standard AWS environment variables, in SDK precedence order.
pub fn ambient_region() -> Option<String> {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|region| !region.is_empty())
}

/// Static keys from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentProvider {
    vars: BTreeMap<String, String>,
}

impl EnvironmentProvider {
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars
                .into_iter()
                .filter(|(key, _)| key.starts_with("AWS_"))
                .collect(),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).filter(|value| !value.is_empty()).cloned()
    }
}

#[async_trait]
impl CredentialProvider for EnvironmentProvider {
    async fn credentials(&self) -> Result<Credentials, Error> {
        match (self.var("AWS_ACCESS_KEY_ID"), self.var("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Credentials {
                access_key_id,
                secret_access_key,
                session_token: self.var("AWS_SESSION_TOKEN").unwrap_or_default(),
            }),
            (_, _) => Err(Error::NotConfigured("environment")),
        }
    }
}

/// Credentials served by the ECS/EKS container credentials endpoint.
#[derive(Debug, Clone)]
pub struct ContainerProvider {
    pub endpoint: String,
    pub authorization: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentialsResponse {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: String,
    expiration: Option<DateTime<Utc>>,
}

impl ContainerProvider {
    const ECS_ENDPOINT: &'static str = "http://169.254.170.2";

    pub fn try_new_from_env() -> Option<Self> {
        let authorization = std::env::var("AWS_CONTAINER_AUTHORIZATION_TOKEN").ok();
        let full_uri = std::env::var("AWS_CONTAINER_CREDENTIALS_FULL_URI").ok();
        let relative_uri = std::env::var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI").ok();

        match (full_uri, relative_uri) {
            (Some(endpoint), _) => Some(Self { endpoint, authorization }),
            (None, Some(path)) => Some(Self {
                endpoint: format!("{}{path}", Self::ECS_ENDPOINT),
                authorization,
            }),
            (None, None) => None,
        }
    }
}

#[async_trait]
impl CredentialProvider for ContainerProvider {
    async fn credentials(&self) -> Result<Credentials, Error> {
        debug!("Fetching container credentials from {}", self.endpoint);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()?;

        let mut request = client.get(&self.endpoint);
        if let Some(authorization) = &self.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }
        let resp = request.send().await?;

        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;

        let parsed: ContainerCredentialsResponse = match serde_json::from_slice(&bytes) {
            Ok(parsed) => parsed,
            Err(_) => {
                let body = String::from_utf8_lossy(&bytes);
                return Err(Error::Deserialize(status, body.to_string()));
            }
        };
        if let Some(expiration) = parsed.expiration {
            debug!("Container credentials expire at {expiration}");
            if expiration <= Utc::now() {
                warn!("Container credentials expired at {expiration}");
            }
        }
        Ok(Credentials {
            access_key_id: parsed.access_key_id,
            secret_access_key: parsed.secret_access_key,
            session_token: parsed.token,
        })
    }
}

/// Tries each provider in turn. Providers that are not configured are skipped.
pub struct ChainProvider {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainProvider {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl CredentialProvider for ChainProvider {
    async fn credentials(&self) -> Result<Credentials, Error> {
        let mut attempts = vec![];
        for provider in &self.providers {
            match provider.credentials().await {
                Ok(credentials) => return Ok(credentials),
                Err(Error::NotConfigured(source)) => {
                    debug!("Skipping {source} credentials, not configured")
                }
                Err(err) => {
                    debug!("Credential provider failed: {err}");
                    attempts.push(err.to_string());
                }
            }
        }
        Err(Error::NoCredentials(attempts))
    }
}
