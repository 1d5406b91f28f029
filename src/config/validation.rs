//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.
//! Issuer and audience are required: a service that cannot check them must
//! not start.

use super::Config;
use crate::auth::is_asymmetric;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("auth.issuer is required (or set DROPOFF_AUTH_ISSUER)")]
    MissingIssuer,
    #[error("auth.audience is required (or set DROPOFF_AUTH_AUDIENCE)")]
    MissingAudience,
    #[error("auth.issuer must be an http(s) URL, got '{0}'")]
    InvalidIssuer(String),
    #[error("auth.algorithms must not be empty")]
    NoAlgorithms,
    #[error("auth.algorithms must only list asymmetric algorithms, got {0}")]
    SymmetricAlgorithm(String),
    #[error("auth.jwks_refresh_per_minute must be at least 1")]
    InvalidRefreshRate,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("seed grant for subject '{0}' is incomplete")]
    IncompleteSeedGrant(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let auth = &config.auth;

    if auth.issuer.is_empty() {
        errors.push(ValidationError::MissingIssuer);
    } else if !(auth.issuer.starts_with("https://") || auth.issuer.starts_with("http://")) {
        errors.push(ValidationError::InvalidIssuer(auth.issuer.clone()));
    }
    if auth.audience.is_empty() {
        errors.push(ValidationError::MissingAudience);
    }

    if auth.algorithms.is_empty() {
        errors.push(ValidationError::NoAlgorithms);
    }
    for alg in &auth.algorithms {
        if !is_asymmetric(*alg) {
            errors.push(ValidationError::SymmetricAlgorithm(format!("{alg:?}")));
        }
    }
    if auth.jwks_refresh_per_minute == 0 {
        errors.push(ValidationError::InvalidRefreshRate);
    }

    if let Some(ref db) = config.database
        && db.path != ":memory:"
    {
        let db_path = Path::new(&db.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(db.path.clone()));
        }
    }

    for grant in &config.seed.grants {
        if grant.subject.is_empty() || grant.name.is_empty() || grant.point.is_empty() {
            errors.push(ValidationError::IncompleteSeedGrant(grant.subject.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r#"
[listen]
address = "127.0.0.1:8000"

[auth]
issuer = "https://idp.example"
audience = "myapp"
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config: Config = toml::from_str(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_issuer_and_audience_both_reported() {
        let toml = r#"
[listen]
address = "127.0.0.1:8000"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingIssuer)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingAudience)));
    }

    #[test]
    fn test_env_supplied_issuer_satisfies_validation() {
        let toml = r#"
[listen]
address = "127.0.0.1:8000"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.apply_env_overrides(|key| match key {
            "DROPOFF_AUTH_ISSUER" => Some("https://idp.example".to_string()),
            "DROPOFF_AUTH_AUDIENCE" => Some("myapp".to_string()),
            _ => None,
        });
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_non_http_issuer_fails() {
        let toml = r#"
[listen]
address = "127.0.0.1:8000"

[auth]
issuer = "idp.example"
audience = "myapp"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidIssuer(_))));
    }

    #[test]
    fn test_symmetric_algorithm_fails() {
        let toml = r#"
[listen]
address = "127.0.0.1:8000"

[auth]
issuer = "https://idp.example"
audience = "myapp"
algorithms = ["RS256", "HS256"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::SymmetricAlgorithm(_)));
    }

    #[test]
    fn test_missing_database_dir_fails() {
        let toml = r#"
[listen]
address = "127.0.0.1:8000"

[database]
path = "/nonexistent/dir/dropoff.db"

[auth]
issuer = "https://idp.example"
audience = "myapp"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DatabasePathInvalid(_))));
    }

    #[test]
    fn test_incomplete_seed_grant_fails() {
        let toml = r#"
[listen]
address = "127.0.0.1:8000"

[auth]
issuer = "https://idp.example"
audience = "myapp"

[[seed.grants]]
subject = "abc"
name = "Fidalgo"
point = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::IncompleteSeedGrant(ref s) if s == "abc"));
    }
}
