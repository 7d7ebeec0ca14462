use crate::aws::{self, ContainerRegistry};
use crate::credentials::{self, resolve_credentials, CredentialProvider, CredentialSet};
use crate::request::{
    BuildEnv, BuildRequirement, ConfigureReleaseRequest, ConfigureReleaseResponse, Need,
};
use log::{debug, info};
use thiserror::Error;
use tokio::sync::OnceCell;

/// Caller environment entries with this prefix are handed to every build that needs ECR.
pub const DOCKER_AUTH_PREFIX: &str = "CDFLOW2_DOCKER_AUTH_";

pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const AWS_REGION: &str = "AWS_REGION";
pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const ECR_REPOSITORY: &str = "ECR_REPOSITORY";
pub const ECR_TAG: &str = "ECR_TAG";

#[derive(Error, Debug)]
pub enum Error {
    #[error("unable to get AWS credentials: {0}")]
    Credentials(#[from] credentials::Error),

    #[error("unable to look up ECR repository for component {component}: {err}")]
    RegistryLookup {
        component: String,
        err: aws::Error,
    },

    #[error(
        "ECR repository for component {component} does not exist, \
         please run `{setup_command}` first"
    )]
    RegistryMissing {
        component: String,
        setup_command: String,
    },

    #[error("unable to satisfy need {need:?} for build {build:?}")]
    UnsupportedNeed { need: String, build: String },
}

/// Builds the environment of every build in a release.
pub struct Assembler<'a> {
    pub registry: &'a dyn ContainerRegistry,
    pub credentials: &'a dyn CredentialProvider,
    /// Region handed to builds alongside the credentials.
    pub region: Option<&'a str>,
    pub setup_command: &'a str,
}

impl Assembler<'_> {
    /// Fill `response.env` for every build in the request.
    ///
    /// Each build's map is registered in the response before its needs are
    /// resolved, so a failed build leaves its partial environment behind.
    /// The first failure aborts the whole release.
    pub async fn assemble(
        &self,
        request: &ConfigureReleaseRequest,
        response: &mut ConfigureReleaseResponse,
    ) -> Result<(), Error> {
        // Resolved on first use, shared by every build.
        let credentials = OnceCell::new();

        for (build_id, requirement) in &request.release_requirements {
            let env = response.env.entry(build_id.clone()).or_default();
            self.assemble_build(build_id, requirement, request, &credentials, env)
                .await?;
        }
        Ok(())
    }

    async fn assemble_build(
        &self,
        build_id: &str,
        requirement: &BuildRequirement,
        request: &ConfigureReleaseRequest,
        credentials: &OnceCell<CredentialSet>,
        env: &mut BuildEnv,
    ) -> Result<(), Error> {
        for need in &requirement.needs {
            match need {
                Need::Ecr => self.ecr(build_id, request, credentials, env).await?,
                Need::Unsupported(tag) => {
                    return Err(Error::UnsupportedNeed {
                        need: tag.clone(),
                        build: build_id.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    async fn ecr(
        &self,
        build_id: &str,
        request: &ConfigureReleaseRequest,
        credentials: &OnceCell<CredentialSet>,
        env: &mut BuildEnv,
    ) -> Result<(), Error> {
        let credential_set = credentials
            .get_or_try_init(|| resolve_credentials(self.credentials, self.region))
            .await?;
        set_aws_environment_variables(env, credential_set);
        set_docker_auth_variables(env, &request.env);

        let component = &request.component;
        let uri = self
            .registry
            .repository_uri(component)
            .await
            .map_err(|err| Error::RegistryLookup {
                component: component.clone(),
                err,
            })?
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| Error::RegistryMissing {
                component: component.clone(),
                setup_command: self.setup_command.to_string(),
            })?;

        info!("Build {build_id} will push to {uri}");
        env.insert(ECR_REPOSITORY.to_string(), uri);
        env.insert(ECR_TAG.to_string(), format!("{build_id}-{}", request.version));
        Ok(())
    }
}

fn set_aws_environment_variables(env: &mut BuildEnv, set: &CredentialSet) {
    env.insert(AWS_ACCESS_KEY_ID.to_string(), set.credentials.access_key_id.clone());
    env.insert(AWS_SECRET_ACCESS_KEY.to_string(), set.credentials.secret_access_key.clone());
    env.insert(AWS_SESSION_TOKEN.to_string(), set.credentials.session_token.clone());
    // depending on the SDK one of these will be used
    env.insert(AWS_REGION.to_string(), set.region.clone()); // java & go
    env.insert(AWS_DEFAULT_REGION.to_string(), set.region.clone()); // python, node, etc.
}

fn set_docker_auth_variables<'a>(
    env: &mut BuildEnv,
    caller_env: impl IntoIterator<Item = (&'a String, &'a String)>,
) {
    for (key, value) in caller_env {
        if key.starts_with(DOCKER_AUTH_PREFIX) {
            debug!("Passing {key} through to build");
            env.insert(key.clone(), value.clone());
        }
    }
}
