use crate::aws::cli::AwsCli;
use crate::aws::{BucketLister, ContainerRegistry, LockTable};
use crate::config;
use crate::credentials::{
    ChainProvider, ContainerProvider, CredentialProvider, EnvironmentProvider,
};
use crate::environment::Assembler;
use crate::request::{ConfigureReleaseRequest, ConfigureReleaseResponse};
use crate::resources::check_resources;
use crate::team::{ConfigTeamResolver, TeamResolver};
use crate::validate::{ConfigValidator, InputValidator};
use log::{debug, info, warn};
use std::fmt::Display;
use std::io::Write;

/// Everything the handler asks questions of.
pub struct Collaborators {
    pub teams: Box<dyn TeamResolver>,
    pub validator: Box<dyn InputValidator>,
    pub credentials: Box<dyn CredentialProvider>,
    pub buckets: Box<dyn BucketLister>,
    pub locks: Box<dyn LockTable>,
    pub registry: Box<dyn ContainerRegistry>,
}

impl Collaborators {
    /// Collaborators backed by the process environment and the `aws` command line tool.
    pub fn aws(settings: &config::File, region: Option<String>) -> Self {
        let cli = AwsCli::new(settings.aws.cli.clone(), region.clone());

        let mut providers: Vec<Box<dyn CredentialProvider>> =
            vec![Box::new(EnvironmentProvider::from_process())];
        if let Some(container) = ContainerProvider::try_new_from_env() {
            providers.push(Box::new(container));
        }
        providers.push(Box::new(cli.clone()));

        Self {
            teams: Box::new(ConfigTeamResolver::new(settings.team.default.clone())),
            validator: Box::new(ConfigValidator::new(region)),
            credentials: Box::new(ChainProvider::new(providers)),
            buckets: Box::new(cli.clone()),
            locks: Box::new(cli.clone()),
            registry: Box::new(cli),
        }
    }
}

/// Answers cdflow2's configure-release request. Diagnostics for the
/// operator go to `error_stream`; the response only says whether it worked.
pub struct Handler<W: Write> {
    settings: config::File,
    collaborators: Collaborators,
    /// Region used when the request does not set config.params.default_region.
    fallback_region: Option<String>,
    error_stream: W,
}

impl<W: Write> Handler<W> {
    pub fn new(
        settings: config::File,
        collaborators: Collaborators,
        fallback_region: Option<String>,
        error_stream: W,
    ) -> Self {
        Self {
            settings,
            collaborators,
            fallback_region,
            error_stream,
        }
    }

    pub fn error_stream(&self) -> &W {
        &self.error_stream
    }

    /// Runs before the release to provide and check config.
    ///
    /// Team, input validation, build environments and AWS resources are
    /// checked in that order; the first failing stage ends the request.
    pub async fn configure_release(
        &mut self,
        request: &ConfigureReleaseRequest,
    ) -> ConfigureReleaseResponse {
        let mut response = ConfigureReleaseResponse::default();

        let team = match self.collaborators.teams.resolve(request) {
            Ok(team) => team,
            Err(err) => {
                self.report(err);
                response.success = false;
                return response;
            }
        };
        info!("Team resolved: {team}");
        response.additional_metadata.insert("team".to_string(), team);

        let problems = self
            .collaborators
            .validator
            .validate(&request.config, &request.env);
        if !problems.is_empty() {
            debug!("{} input configuration problems", problems.len());
            for problem in problems {
                self.report(problem);
            }
            response.success = false;
            return response;
        }

        let region = request
            .config_str("default_region")
            .or(self.fallback_region.as_deref());
        let assembler = Assembler {
            registry: self.collaborators.registry.as_ref(),
            credentials: self.collaborators.credentials.as_ref(),
            region,
            setup_command: &self.settings.setup_command,
        };
        let assembled = assembler.assemble(request, &mut response).await;
        if let Err(err) = assembled {
            self.report(err);
            response.success = false;
            return response;
        }
        debug!("Environments assembled for {} builds", response.env.len());

        if !self.check_aws_resources().await {
            response.success = false;
        }
        response
    }

    /// Checks that the release bucket, terraform state bucket and terraform
    /// locks table are present, writing every problem to the error stream.
    pub async fn check_aws_resources(&mut self) -> bool {
        self.write_error_stream(format_args!("Checking AWS resources...\n\n"));

        let checked = check_resources(
            &self.settings.resources,
            self.collaborators.buckets.as_ref(),
            self.collaborators.locks.as_ref(),
        )
        .await;

        match checked {
            Ok(report) => {
                let written = report.write_to(&mut self.error_stream, &self.settings.setup_command);
                if let Err(err) = written {
                    warn!("unable to write to error stream: {err}");
                }
                report.is_ok()
            }
            Err(err) => {
                self.write_error_stream(format_args!("{err}\n\n"));
                false
            }
        }
    }

    fn report(&mut self, message: impl Display) {
        self.write_error_stream(format_args!("{message}\n"));
    }

    fn write_error_stream(&mut self, args: std::fmt::Arguments<'_>) {
        if let Err(err) = self.error_stream.write_fmt(args) {
            warn!("unable to write to error stream: {err}");
        }
    }
}
