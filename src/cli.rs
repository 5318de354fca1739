use clap::Parser;

/// Command-line and environment surface for the gateway.
///
/// The six database variables keep the names the deployment already uses;
/// service-local knobs carry a `BIENESTAR_` prefix. A missing database
/// variable is fatal at startup.
#[derive(Parser, Debug)]
#[command(
    name = "bienestar",
    about = "HTTP gateway for the student-welfare stored procedures"
)]
pub struct Cli {
    /// ODBC driver name, e.g. "MySQL ODBC 9.0 Unicode Driver"
    #[arg(long, env = "DRIVER")]
    pub driver: String,

    /// Database account for the shared service connection
    #[arg(long, env = "USERNAME")]
    pub username: String,

    /// Password for the shared service connection
    #[arg(long, env = "PASSWORD")]
    pub password: String,

    /// Database host
    #[arg(long, env = "HOST")]
    pub host: String,

    /// Database (schema) name
    #[arg(long, env = "DATABASE")]
    pub database: String,

    /// Database port
    #[arg(long, env = "PORT")]
    pub port: u16,

    /// Address the HTTP server binds
    #[arg(long, env = "BIENESTAR_BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: String,

    /// Port the HTTP server binds
    #[arg(long, env = "BIENESTAR_BIND_PORT", default_value_t = 8000)]
    pub bind_port: u16,

    /// Seconds between attempts while opening the shared connection
    #[arg(long, env = "BIENESTAR_RETRY_DELAY", default_value_t = 5)]
    pub retry_delay: u64,

    /// Connection attempts allowed on the login path
    #[arg(long, env = "BIENESTAR_LOGIN_ATTEMPTS", default_value_t = 3)]
    pub login_attempts: u32,

    /// ODBC login timeout in seconds
    #[arg(long, env = "BIENESTAR_LOGIN_TIMEOUT", default_value_t = 30)]
    pub login_timeout: u32,

    /// Per-call statement timeout in seconds (unset: no timeout)
    #[arg(long, env = "BIENESTAR_CALL_TIMEOUT")]
    pub call_timeout: Option<u64>,
}
