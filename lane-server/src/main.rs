//! Secretlane workspaces HTTP service

use actix_web::{App, HttpServer};
use clap::Parser;
use color_eyre::Result;
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::config::{Config, LogFormat};
use crate::model::Model;
use crate::opt::Opt;
use crate::service::Settings;

mod config;
mod model;
mod opt;
mod service;

/// Initializes tracing collection
fn setup_tracing(config: config::Logging) -> Result<()> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let filter_layer = config
        .filters
        .into_iter()
        .fold(filter_layer, |layer, filter| layer.add_directive(filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Opt {
        config: config_file,
    } = Opt::parse();

    // Missing `.env` is fine, the variables may come from the actual environment
    let dotenv = dotenvy::dotenv().ok();
    let config = Config::load(&config_file)?;

    setup_tracing(config.logging.clone())?;
    color_eyre::install()?;

    info!(
        config = ?config_file,
        ?dotenv,
        dialect = ?config.database.dialect,
        "Tracing initialized, setting up a service"
    );

    let model = Model::with_config(&config).await?;
    let service_config = service::configure(Settings::from(&config), model);
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(service_config.clone())
    })
    .bind(config.host)?
    .run()
    .await?;

    info!("Service stopped, tearing down");
    Ok(())
}
