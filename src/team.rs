use crate::request::ConfigureReleaseRequest;
use log::debug;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("cdflow.yaml: error - config.params.team must be set")]
    Missing,

    #[error("cdflow.yaml: error - config.params.team must be a string, got {0}")]
    NotAString(String),

    #[error("cdflow.yaml: error - config.params.team {0:?} is not a valid team name")]
    Invalid(String),
}

/// Turns the team a release asks for into the team name recorded in its metadata.
pub trait TeamResolver: Send + Sync {
    fn resolve(&self, request: &ConfigureReleaseRequest) -> Result<String, Error>;
}

/// Reads the team from `config.params.team`, falling back to the request's team
/// field and then to the configured default team.
#[derive(Debug, Default, Clone)]
pub struct ConfigTeamResolver {
    pub default_team: Option<String>,
}

impl ConfigTeamResolver {
    pub fn new(default_team: Option<String>) -> Self {
        Self { default_team }
    }
}

impl TeamResolver for ConfigTeamResolver {
    fn resolve(&self, request: &ConfigureReleaseRequest) -> Result<String, Error> {
        match request.config.get("team") {
            Some(serde_json::Value::String(team)) => validate_name(team),
            Some(serde_json::Value::Null) | None if !request.team.is_empty() => {
                debug!("config.params.team not set, using request team {}", request.team);
                validate_name(&request.team)
            }
            Some(serde_json::Value::Null) | None => match &self.default_team {
                Some(team) => {
                    debug!("No team in request, using configured default team {team}");
                    validate_name(team)
                }
                None => Err(Error::Missing),
            },
            Some(other) => Err(Error::NotAString(other.to_string())),
        }
    }
}

fn validate_name(team: &str) -> Result<String, Error> {
    if team.is_empty() || team.chars().any(char::is_whitespace) {
        return Err(Error::Invalid(team.to_string()));
    }
    Ok(team.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_with_team(team: serde_json::Value) -> ConfigureReleaseRequest {
        let mut request = ConfigureReleaseRequest::default();
        request.config.insert("team".into(), team);
        request
    }

    #[test]
    fn resolves_config_team() {
        let resolver = ConfigTeamResolver::default();
        assert_eq!(resolver.resolve(&request_with_team(json!("teamA"))), Ok("teamA".into()));
    }

    #[test]
    fn falls_back_to_request_team() {
        let mut request = ConfigureReleaseRequest::default();
        request.team = "teamB".into();
        assert_eq!(ConfigTeamResolver::default().resolve(&request), Ok("teamB".into()));
    }

    #[test]
    fn request_team_beats_default_team() {
        let resolver = ConfigTeamResolver::new(Some("platform".into()));
        assert_eq!(resolver.resolve(&request_with_team(json!("payments"))), Ok("payments".into()));

        let mut request = ConfigureReleaseRequest::default();
        request.team = "teamB".into();
        assert_eq!(resolver.resolve(&request), Ok("teamB".into()));
    }

    #[test]
    fn default_team_when_request_has_none() {
        let resolver = ConfigTeamResolver::new(Some("platform".into()));
        assert_eq!(resolver.resolve(&ConfigureReleaseRequest::default()), Ok("platform".into()));
        assert_eq!(resolver.resolve(&request_with_team(json!(null))), Ok("platform".into()));
    }

    #[test]
    fn missing_team() {
        let resolver = ConfigTeamResolver::default();
        assert_eq!(resolver.resolve(&ConfigureReleaseRequest::default()), Err(Error::Missing));
        assert_eq!(resolver.resolve(&request_with_team(json!(null))), Err(Error::Missing));
    }

    #[test]
    fn rejects_non_string_and_invalid_names() {
        let resolver = ConfigTeamResolver::default();
        assert_eq!(
            resolver.resolve(&request_with_team(json!(["a"]))),
            Err(Error::NotAString("[\"a\"]".into()))
        );
        assert_eq!(
            resolver.resolve(&request_with_team(json!("team a"))),
            Err(Error::Invalid("team a".into()))
        );
        assert_eq!(resolver.resolve(&request_with_team(json!(""))), Err(Error::Invalid("".into())));
    }
}
