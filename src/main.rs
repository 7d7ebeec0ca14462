/// cdflow2 AWS config container
use cdflow_config_aws::config::{self, DEFAULT_CONFIG_FILE};
use cdflow_config_aws::credentials::ambient_region;
use cdflow_config_aws::{Collaborators, ConfigureReleaseRequest, Handler};
use clap::{Parser, Subcommand};
use log::{debug, error, info};
use std::io::Read;
use thiserror::Error;

/// Check AWS resources and provide build environments for cdflow2 releases.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long)]
    config: Option<String>,

    /// AWS region to use when the request does not set config.params.default_region.
    #[arg(long)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Read a configure-release request as JSON and print the response as JSON.
    ConfigureRelease {
        /// Read the request from this file instead of standard input.
        #[arg(long)]
        request: Option<String>,
    },
    /// Check that the release bucket, terraform state bucket and locks table exist.
    CheckResources,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration file: {0}")]
    Config(#[from] config::Error),

    #[error("read request: {0}")]
    ReadRequest(#[from] std::io::Error),

    #[error("parse request: {0}")]
    ParseRequest(#[from] serde_json::Error),

    #[error("write response: {0}")]
    WriteResponse(serde_json::Error),

    #[error("AWS resources missing")]
    ResourcesMissing,
}

/// Read the configuration file, or the built-in defaults.
///
/// If a configuration file name is not set explicitly, this function will
/// detect whether a config file with the default file name exists in the
/// working directory. If it does, it is used implicitly.
fn read_config(args: &Cli) -> Result<config::File, Error> {
    let config_file = match &args.config {
        None => {
            if std::fs::metadata(DEFAULT_CONFIG_FILE)
                .map(|metadata| metadata.is_file())
                .unwrap_or(false)
            {
                Some(DEFAULT_CONFIG_FILE.to_string())
            } else {
                None
            }
        }
        Some(c) => Some(c.clone()),
    };

    Ok(if let Some(config_file) = config_file {
        debug!("Reading configuration from {config_file}");
        config::File::from_user_config_file(&config_file)?
    } else {
        config::File::default()
    })
}

fn read_request(path: Option<&str>) -> Result<ConfigureReleaseRequest, Error> {
    let data = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut data = String::new();
            std::io::stdin().read_to_string(&mut data)?;
            data
        }
    };
    Ok(serde_json::from_str(&data)?)
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            error!("fatal: {}", err.to_string());
            std::process::exit(1)
        }
    }
}

async fn run() -> Result<(), Error> {
    env_logger::init();

    let args = Cli::parse();
    let settings = read_config(&args)?;
    let fallback_region = args
        .region
        .clone()
        .or_else(|| settings.aws.default_region.clone())
        .or_else(ambient_region);

    match &args.command {
        Commands::ConfigureRelease { request } => {
            let request = read_request(request.as_deref())?;
            info!("Configuring release {} of {}", request.version, request.component);

            let region = request
                .config_str("default_region")
                .map(str::to_string)
                .or(fallback_region.clone());
            let collaborators = Collaborators::aws(&settings, region);
            let mut handler =
                Handler::new(settings, collaborators, fallback_region, std::io::stderr());

            let response = handler.configure_release(&request).await;
            let output = serde_json::to_string(&response).map_err(Error::WriteResponse)?;
            println!("{output}");
            Ok(())
        }
        Commands::CheckResources => {
            let collaborators = Collaborators::aws(&settings, fallback_region.clone());
            let mut handler =
                Handler::new(settings, collaborators, fallback_region, std::io::stderr());
            if handler.check_aws_resources().await {
                Ok(())
            } else {
                Err(Error::ResourcesMissing)
            }
        }
    }
}
