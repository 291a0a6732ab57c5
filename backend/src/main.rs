mod analysis;
mod config;
mod providers;
mod routes;
mod upload;

#[cfg(test)]
mod test_support;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use analysis::analysis_service::AnalysisService;
use config::AppConfig;
use routes::configure_routes;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;
    config.log_provider_status();
    log::info!(
        "Upstream provider timeout: {}s",
        config.upstream_timeout.as_secs()
    );

    let analysis_service = AnalysisService::new(&config).map_err(|e| {
        log::error!("Failed to build provider HTTP client: {}", e);
        io::Error::other(e.to_string())
    })?;

    log::info!("Starting server on {}", config.bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(analysis_service.clone()))
            .configure(configure_routes)
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
