use bienestar::cli::Cli;
use bienestar::config;
use clap::Parser;
use secrecy::ExposeSecret;
use std::sync::Mutex;

// --- Env var test infrastructure ---

/// Every variable the gateway reads; cleared before each guarded test so
/// host environment leakage cannot change outcomes.
const ALL_VARS: &[&str] = &[
    "DRIVER",
    "USERNAME",
    "PASSWORD",
    "HOST",
    "DATABASE",
    "PORT",
    "BIENESTAR_BIND_HOST",
    "BIENESTAR_BIND_PORT",
    "BIENESTAR_RETRY_DELAY",
    "BIENESTAR_LOGIN_ATTEMPTS",
    "BIENESTAR_LOGIN_TIMEOUT",
    "BIENESTAR_CALL_TIMEOUT",
];

/// Static mutex to serialize tests that touch process env vars.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// RAII guard that clears the gateway's env vars, sets the given ones, and
/// removes them again on Drop. Holds the ENV_MUTEX lock for its lifetime.
struct EnvGuard {
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl EnvGuard {
    fn new(vars: &[(&str, &str)]) -> Self {
        let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        for key in ALL_VARS {
            // SAFETY: env var access is serialized by ENV_MUTEX
            unsafe {
                std::env::remove_var(key);
            }
        }
        for (key, val) in vars {
            // SAFETY: env var access is serialized by ENV_MUTEX
            unsafe {
                std::env::set_var(key, val);
            }
        }
        EnvGuard { _lock: lock }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in ALL_VARS {
            // SAFETY: env var access is serialized by ENV_MUTEX
            unsafe {
                std::env::remove_var(key);
            }
        }
    }
}

const BASE_VARS: &[(&str, &str)] = &[
    ("DRIVER", "MySQL ODBC 9.0 Unicode Driver"),
    ("USERNAME", "bienestar_svc"),
    ("PASSWORD", "s3cret"),
    ("HOST", "db.campus.edu"),
    ("DATABASE", "bienestar"),
    ("PORT", "3306"),
];

#[test]
fn test_config_from_env() {
    let _guard = EnvGuard::new(BASE_VARS);

    let cli = Cli::parse_from(["bienestar"]);
    let config = config::from_cli(cli).unwrap();

    assert_eq!(config.database.driver, "MySQL ODBC 9.0 Unicode Driver");
    assert_eq!(config.database.username, "bienestar_svc");
    assert_eq!(config.database.password.expose_secret(), "s3cret");
    assert_eq!(config.database.host, "db.campus.edu");
    assert_eq!(config.database.database, "bienestar");
    assert_eq!(config.database.port, 3306);

    // Service-local defaults
    assert_eq!(config.bind_host, "0.0.0.0");
    assert_eq!(config.bind_port, 8000);
    assert_eq!(config.retry_delay.as_secs(), 5);
    assert_eq!(config.login_attempts, 3);
    assert_eq!(config.database.login_timeout_secs, 30);
    assert_eq!(config.database.call_timeout_secs, None);
}

#[test]
fn test_missing_database_vars_are_fatal() {
    let _guard = EnvGuard::new(&[]);
    let result = Cli::try_parse_from(["bienestar"]);
    assert!(result.is_err());
}

#[test]
fn test_service_knobs_from_env() {
    let mut vars = BASE_VARS.to_vec();
    vars.extend_from_slice(&[
        ("BIENESTAR_BIND_PORT", "9090"),
        ("BIENESTAR_RETRY_DELAY", "1"),
        ("BIENESTAR_LOGIN_ATTEMPTS", "5"),
        ("BIENESTAR_CALL_TIMEOUT", "60"),
    ]);
    let _guard = EnvGuard::new(&vars);

    let cli = Cli::parse_from(["bienestar"]);
    let config = config::from_cli(cli).unwrap();
    assert_eq!(config.bind_port, 9090);
    assert_eq!(config.retry_delay.as_secs(), 1);
    assert_eq!(config.login_attempts, 5);
    assert_eq!(config.database.call_timeout_secs, Some(60));
}

#[test]
fn test_cli_flags_override_env() {
    let _guard = EnvGuard::new(BASE_VARS);

    let cli = Cli::parse_from(["bienestar", "--host", "replica.campus.edu", "--bind-port", "8080"]);
    let config = config::from_cli(cli).unwrap();
    assert_eq!(config.database.host, "replica.campus.edu");
    assert_eq!(config.bind_port, 8080);
}

#[test]
fn test_empty_host_rejected() {
    let _guard = EnvGuard::new(BASE_VARS);

    let mut cli = Cli::parse_from(["bienestar"]);
    cli.host = "  ".to_string();
    let err = config::from_cli(cli).unwrap_err().to_string();
    assert!(err.contains("HOST"), "Got: {}", err);
}

#[test]
fn test_zero_login_attempts_rejected() {
    let _guard = EnvGuard::new(BASE_VARS);

    let mut cli = Cli::parse_from(["bienestar"]);
    cli.login_attempts = 0;
    assert!(config::from_cli(cli).is_err());
}

#[test]
fn test_with_credentials_swaps_only_the_account() {
    let _guard = EnvGuard::new(BASE_VARS);

    let cli = Cli::parse_from(["bienestar"]);
    let config = config::from_cli(cli).unwrap();
    let login = config.database.with_credentials("estudiante", "clave123");

    assert_eq!(login.username, "estudiante");
    assert_eq!(login.password.expose_secret(), "clave123");
    assert_eq!(login.host, config.database.host);
    assert_eq!(login.database, config.database.database);
    assert_eq!(login.port, config.database.port);
}
