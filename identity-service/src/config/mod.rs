use jsonwebtoken::Algorithm;
use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// `None` runs the service on the in-memory store (dev only).
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Signing configuration for the two token kinds.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub algorithm: Algorithm,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_minutes: i64,
}

pub const DEFAULT_ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 30;
pub const DEFAULT_REFRESH_TOKEN_EXPIRY_MINUTES: i64 = 60 * 24 * 7;
/// Upper bound for either lifetime (ten years).
pub const MAX_TOKEN_EXPIRY_MINUTES: i64 = 60 * 24 * 365 * 10;

impl JwtConfig {
    /// HS256 with the default expirations.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: SecretString::new(access_secret.into()),
            refresh_secret: SecretString::new(refresh_secret.into()),
            algorithm: Algorithm::HS256,
            access_token_expiry_minutes: DEFAULT_ACCESS_TOKEN_EXPIRY_MINUTES,
            refresh_token_expiry_minutes: DEFAULT_REFRESH_TOKEN_EXPIRY_MINUTES,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        let access = self.access_secret.expose_secret();
        let refresh = self.refresh_secret.expose_secret();

        if access.is_empty() || refresh.is_empty() {
            return Err(config_error("JWT secrets must not be empty"));
        }

        if access == refresh {
            return Err(config_error(
                "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ",
            ));
        }

        if !(1..=MAX_TOKEN_EXPIRY_MINUTES).contains(&self.access_token_expiry_minutes) {
            return Err(config_error(&format!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be between 1 and {}",
                MAX_TOKEN_EXPIRY_MINUTES
            )));
        }

        if !(1..=MAX_TOKEN_EXPIRY_MINUTES).contains(&self.refresh_token_expiry_minutes) {
            return Err(config_error(&format!(
                "JWT_REFRESH_TOKEN_EXPIRY_MINUTES must be between 1 and {}",
                MAX_TOKEN_EXPIRY_MINUTES
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwaggerMode {
    Public,
    Disabled,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let database = match env::var("DATABASE_URL") {
            Ok(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            }),
            Err(_) if is_prod => {
                return Err(config_error(
                    "DATABASE_URL is required in production but not set",
                ))
            }
            Err(_) => None,
        };

        let config = IdentityConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database,
            jwt: JwtConfig {
                // Secrets never have a default, not even in dev.
                access_secret: SecretString::new(get_env("JWT_ACCESS_SECRET", None, is_prod)?),
                refresh_secret: SecretString::new(get_env("JWT_REFRESH_SECRET", None, is_prod)?),
                algorithm: parse_algorithm(&get_env("JWT_ALGORITHM", Some("HS256"), is_prod)?)?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "30",
                    is_prod,
                )?,
                refresh_token_expiry_minutes: parse_env(
                    "JWT_REFRESH_TOKEN_EXPIRY_MINUTES",
                    "10080",
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        self.jwt.validate()?;

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error(
                    "Wildcard CORS origin not allowed in production",
                ));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger is publicly accessible in production");
            }
        }

        Ok(())
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

/// Only the HMAC family is accepted: both token kinds sign with shared secrets.
fn parse_algorithm(value: &str) -> Result<Algorithm, AppError> {
    match value.to_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(AppError::ConfigError(anyhow::anyhow!(
            "Unsupported JWT_ALGORITHM: {}",
            other
        ))),
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config(jwt: JwtConfig) -> IdentityConfig {
        IdentityConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "identity-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: None,
            jwt,
            security: SecurityConfig {
                allowed_origins: vec!["*".to_string()],
            },
            swagger: SwaggerConfig {
                enabled: SwaggerMode::Public,
            },
        }
    }

    #[test]
    fn jwt_defaults_match_issuance_policy() {
        let jwt = JwtConfig::new("access", "refresh");
        assert_eq!(jwt.algorithm, Algorithm::HS256);
        assert_eq!(jwt.access_token_expiry_minutes, 30);
        assert_eq!(jwt.refresh_token_expiry_minutes, 7 * 24 * 60);
    }

    #[test]
    fn identical_secrets_are_rejected() {
        let config = dev_config(JwtConfig::new("same", "same"));
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let config = dev_config(JwtConfig::new("", "refresh"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_expiry_is_rejected() {
        let mut jwt = JwtConfig::new("access", "refresh");
        jwt.access_token_expiry_minutes = 0;
        assert!(dev_config(jwt).validate().is_err());
    }

    #[test]
    fn oversized_expiry_is_rejected() {
        let mut jwt = JwtConfig::new("access", "refresh");
        jwt.refresh_token_expiry_minutes = i64::MAX;
        assert!(matches!(
            dev_config(jwt).validate(),
            Err(AppError::ConfigError(_))
        ));

        let mut jwt = JwtConfig::new("access", "refresh");
        jwt.access_token_expiry_minutes = MAX_TOKEN_EXPIRY_MINUTES;
        assert!(dev_config(jwt).validate().is_ok());
    }

    #[test]
    fn wildcard_cors_only_rejected_in_prod() {
        let mut config = dev_config(JwtConfig::new("access", "refresh"));
        assert!(config.validate().is_ok());

        config.environment = Environment::Prod;
        assert!(config.validate().is_err());
    }

    #[test]
    fn only_hmac_algorithms_parse() {
        assert_eq!(parse_algorithm("hs512").unwrap(), Algorithm::HS512);
        assert!(parse_algorithm("RS256").is_err());
        assert!(parse_algorithm("none").is_err());
    }

    #[test]
    fn get_env_falls_back_to_default_outside_prod() {
        let key = "IDENTITY_SERVICE_TEST_UNSET_VARIABLE";
        assert_eq!(get_env(key, Some("fallback"), false).unwrap(), "fallback");
        assert!(get_env(key, None, false).is_err());
        assert!(get_env(key, Some("fallback"), true).is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let jwt = JwtConfig::new("super-secret-access", "super-secret-refresh");
        let rendered = format!("{:?}", jwt);
        assert!(!rendered.contains("super-secret"));
    }
}
