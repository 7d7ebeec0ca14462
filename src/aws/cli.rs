//! AWS capabilities backed by the `aws` command line tool.
use crate::aws::{BucketLister, ContainerRegistry, Error, LockTable};
use crate::credentials::{self, CredentialProvider, Credentials};
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::process::Stdio;

#[derive(Debug, Clone)]
pub struct AwsCli {
    pub program: String,
    pub region: Option<String>,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self {
            program: "aws".to_string(),
            region: None,
        }
    }
}

/// Result of a lookup that treats a specific AWS error code as absence.
enum Outcome<T> {
    Found(T),
    NotFound,
}

impl AwsCli {
    pub fn new(program: impl Into<String>, region: Option<String>) -> Self {
        Self {
            program: program.into(),
            region,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, Error> {
        let command = args.join(" ");
        debug!("Running aws {command}");

        let mut process = tokio::process::Command::new(&self.program);
        if let Some(region) = &self.region {
            process.arg("--region").arg(region);
        }
        let output = process
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(Error::Exec {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, Error> {
        let stdout = self.run(args).await?;
        serde_json::from_slice(&stdout).map_err(|err| Error::Deserialize {
            command: args.join(" "),
            err,
        })
    }

    /// Like `json`, but maps the AWS error code `not_found` to `Outcome::NotFound`.
    async fn json_or_not_found<T: DeserializeOwned>(
        &self,
        args: &[&str],
        not_found: &str,
    ) -> Result<Outcome<T>, Error> {
        match self.json(args).await {
            Ok(value) => Ok(Outcome::Found(value)),
            Err(Error::Exec { stderr, .. }) if stderr.contains(not_found) => {
                debug!("aws {} reported {not_found}", args.join(" "));
                Ok(Outcome::NotFound)
            }
            Err(err) => Err(err),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketsOutput {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Bucket {
    name: String,
}

#[async_trait]
impl BucketLister for AwsCli {
    async fn list_buckets(&self) -> Result<Vec<String>, Error> {
        let output: ListBucketsOutput = self
            .json(&["s3api", "list-buckets", "--output", "json"])
            .await?;
        Ok(output.buckets.into_iter().map(|bucket| bucket.name).collect())
    }
}

#[async_trait]
impl LockTable for AwsCli {
    async fn table_exists(&self, name: &str) -> Result<bool, Error> {
        let outcome: Outcome<serde_json::Value> = self
            .json_or_not_found(
                &["dynamodb", "describe-table", "--table-name", name, "--output", "json"],
                "ResourceNotFoundException",
            )
            .await?;
        Ok(matches!(outcome, Outcome::Found(_)))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeRepositoriesOutput {
    #[serde(default)]
    repositories: Vec<Repository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    repository_uri: String,
}

#[async_trait]
impl ContainerRegistry for AwsCli {
    async fn repository_uri(&self, component: &str) -> Result<Option<String>, Error> {
        let outcome: Outcome<DescribeRepositoriesOutput> = self
            .json_or_not_found(
                &[
                    "ecr",
                    "describe-repositories",
                    "--repository-names",
                    component,
                    "--output",
                    "json",
                ],
                "RepositoryNotFoundException",
            )
            .await?;
        Ok(match outcome {
            Outcome::Found(output) => output
                .repositories
                .into_iter()
                .map(|repository| repository.repository_uri)
                .find(|uri| !uri.is_empty()),
            Outcome::NotFound => None,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExportedCredentials {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    session_token: String,
}

#[async_trait]
impl CredentialProvider for AwsCli {
    async fn credentials(&self) -> Result<Credentials, credentials::Error> {
        let exported: ExportedCredentials = self
            .json(&["configure", "export-credentials", "--format", "process"])
            .await?;
        Ok(Credentials {
            access_key_id: exported.access_key_id,
            secret_access_key: exported.secret_access_key,
            session_token: exported.session_token,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const FAKE_AWS: &str = r#"#!/bin/sh
case "$*" in
  *"s3api list-buckets"*)
    echo '{"Buckets":[{"Name":"cdflow2-release-abc"},{"Name":"other"}]}' ;;
  *"describe-table --table-name cdflow2-tflocks"*)
    echo '{"Table":{"TableName":"cdflow2-tflocks"}}' ;;
  *"describe-table"*)
    echo "An error occurred (ResourceNotFoundException) in DescribeTable" >&2
    exit 254 ;;
  *"describe-repositories --repository-names svc"*)
    echo '{"repositories":[{"repositoryUri":"123.dkr/svc"}]}' ;;
  *"describe-repositories --repository-names broken"*)
    echo "An error occurred (AccessDeniedException)" >&2
    exit 254 ;;
  *"describe-repositories"*)
    echo "An error occurred (RepositoryNotFoundException)" >&2
    exit 254 ;;
  *"export-credentials"*)
    echo '{"Version":1,"AccessKeyId":"AKIA","SecretAccessKey":"s","SessionToken":"t"}' ;;
  *)
    echo "unknown command: $*" >&2
    exit 1 ;;
esac
"#;

    fn fake_aws(dir: &tempfile::TempDir) -> AwsCli {
        let path = dir.path().join("aws");
        std::fs::write(&path, FAKE_AWS).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        AwsCli::new(path.to_str().unwrap(), Some("eu-west-1".into()))
    }

    #[tokio::test]
    async fn list_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let buckets = fake_aws(&dir).list_buckets().await.unwrap();
        assert_eq!(buckets, vec!["cdflow2-release-abc".to_string(), "other".to_string()]);
    }

    #[tokio::test]
    async fn table_exists() {
        let dir = tempfile::tempdir().unwrap();
        let aws = fake_aws(&dir);
        assert!(aws.table_exists("cdflow2-tflocks").await.unwrap());
        assert!(!aws.table_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn repository_uri() {
        let dir = tempfile::tempdir().unwrap();
        let aws = fake_aws(&dir);
        assert_eq!(aws.repository_uri("svc").await.unwrap(), Some("123.dkr/svc".into()));
        assert_eq!(aws.repository_uri("other").await.unwrap(), None);
        assert!(matches!(
            aws.repository_uri("broken").await,
            Err(Error::Exec { stderr, .. }) if stderr.contains("AccessDeniedException")
        ));
    }

    #[tokio::test]
    async fn export_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = fake_aws(&dir).credentials().await.unwrap();
        assert_eq!(credentials.access_key_id, "AKIA");
        assert_eq!(credentials.session_token, "t");
    }

    #[tokio::test]
    async fn missing_program() {
        let aws = AwsCli::new("/nonexistent/aws", None);
        assert!(matches!(aws.list_buckets().await, Err(Error::IOError(_))));
    }
}
