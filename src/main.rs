use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use bienestar::cli::Cli;
use bienestar::config;
use bienestar::connection::{ConnectionManager, RetryPolicy};
use bienestar::driver::odbc::OdbcDriver;
use bienestar::routes::{self, LoginTarget};
use clap::Parser;
use log::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (optional, ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::from_cli(cli)?;
    info!(
        "starting bienestar v{} for {}:{}/{}",
        env!("CARGO_PKG_VERSION"),
        config.database.host,
        config.database.port,
        config.database.database
    );

    // The service has nothing useful to do without a database: block here
    // until the shared connection is up.
    let database = config.database.clone();
    let manager = web::Data::new(
        ConnectionManager::connect(
            move || OdbcDriver::connect(&database),
            RetryPolicy::Unbounded {
                delay: config.retry_delay,
            },
        )
        .await
        .context("establishing the shared database connection")?,
    );

    let login_target = web::Data::new(LoginTarget {
        database: config.database.clone(),
        attempts: config.login_attempts,
        delay: config.retry_delay,
    });

    let bind = (config.bind_host.clone(), config.bind_port);
    info!("listening on {}:{}", bind.0, bind.1);

    let manager_for_server = manager.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(manager_for_server.clone())
            .app_data(login_target.clone())
            .configure(routes::configure)
    })
    .bind(bind)?
    .run()
    .await?;

    manager.shutdown().await;
    info!("shutdown complete");
    Ok(())
}
