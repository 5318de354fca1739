use crate::cli::Cli;
use crate::error::BienestarError;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Top-level service configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub bind_host: String,
    pub bind_port: u16,
    pub retry_delay: Duration,
    pub login_attempts: u32,
}

/// Connection target for the welfare database.
#[derive(Debug)]
pub struct DatabaseConfig {
    pub driver: String,
    pub username: String,
    pub password: SecretString,
    pub host: String,
    pub database: String,
    pub port: u16,
    pub login_timeout_secs: u32,
    pub call_timeout_secs: Option<u64>,
}

// SecretString does not implement Clone; rebuild it explicitly.
impl Clone for DatabaseConfig {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            username: self.username.clone(),
            password: SecretString::from(self.password.expose_secret().to_string()),
            host: self.host.clone(),
            database: self.database.clone(),
            port: self.port,
            login_timeout_secs: self.login_timeout_secs,
            call_timeout_secs: self.call_timeout_secs,
        }
    }
}

impl DatabaseConfig {
    /// The same target with different credentials (the login path).
    pub fn with_credentials(&self, username: &str, password: &str) -> Self {
        let mut target = self.clone();
        target.username = username.to_string();
        target.password = SecretString::from(password.to_string());
        target
    }
}

/// Build the runtime configuration from parsed arguments.
pub fn from_cli(cli: Cli) -> Result<AppConfig, BienestarError> {
    for (name, value) in [
        ("DRIVER", &cli.driver),
        ("USERNAME", &cli.username),
        ("HOST", &cli.host),
        ("DATABASE", &cli.database),
    ] {
        if value.trim().is_empty() {
            return Err(BienestarError::Config {
                message: format!("{} must not be empty", name),
            });
        }
    }
    if cli.port == 0 {
        return Err(BienestarError::Config {
            message: "PORT cannot be 0".to_string(),
        });
    }
    if cli.login_attempts == 0 {
        return Err(BienestarError::Config {
            message: "BIENESTAR_LOGIN_ATTEMPTS cannot be 0".to_string(),
        });
    }

    Ok(AppConfig {
        database: DatabaseConfig {
            driver: cli.driver,
            username: cli.username,
            password: SecretString::from(cli.password),
            host: cli.host,
            database: cli.database,
            port: cli.port,
            login_timeout_secs: cli.login_timeout,
            call_timeout_secs: cli.call_timeout,
        },
        bind_host: cli.bind_host,
        bind_port: cli.bind_port,
        retry_delay: Duration::from_secs(cli.retry_delay),
        login_attempts: cli.login_attempts,
    })
}
