use std::env;
use std::process;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use rocket::{
    figment::{
        providers::{Format, Toml},
        Figment, Profile,
    },
    Config,
};
use thumbcache::api;
use thumbcache::config::AppConfig;
use thumbcache::images::HttpSourceFetcher;
use thumbcache::ThumbnailService;

#[rocket::main]
async fn main() {
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Load config
    let mut figment = Figment::from(Config::default())
        .merge(Toml::file("App.toml").nested());

    if let Ok(path) = env::var("THUMBNAILS_PATH") {
        figment = figment.merge(("thumbnails.path", path));
    }

    if let Ok(host_url) = env::var("THUMBNAILS_HOST_URL") {
        figment = figment.merge(("thumbnails.host_url", host_url));
    }

    figment = figment.select(Profile::from_env_or("APP_PROFILE", "default"));

    let config = match figment.extract::<AppConfig>() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    info!("Configuration loaded successfully");

    let fetcher = match HttpSourceFetcher::new(config.thumbnails.host_url.clone(), config.timeout) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create source fetcher: {}", e);
            process::exit(1);
        }
    };

    let service = ThumbnailService::from_config(&config.thumbnails, Arc::new(fetcher));
    info!(
        "Thumbnail cache at {} with sizes: {}",
        config.thumbnails.path.display(),
        config.thumbnails.size_table().labels().join(", ")
    );

    info!(
        "Starting thumbnail service on {}:{}",
        config.address, config.port
    );

    if let Err(e) = api::build_rocket(figment, service, config.thumbnails.max_age)
        .launch()
        .await
    {
        error!("Server error: {}", e);
        process::exit(1);
    }
}
