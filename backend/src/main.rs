use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use backend::classifier::ClassificationClient;
use backend::config::AppConfig;
use backend::provider::GeminiProvider;
use backend::routes::configure_routes;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return Err(std::io::Error::other(format!("Configuration error: {}", e)));
        }
    };
    log::info!("Loaded configuration: {:?}", config);

    let provider = match GeminiProvider::new(&config) {
        Ok(provider) => provider,
        Err(e) => {
            log::error!("Failed to build provider client: {}", e);
            return Err(std::io::Error::other(format!("Provider setup failed: {}", e)));
        }
    };
    let client = ClassificationClient::new(Arc::new(provider));

    match &config.static_dir {
        Some(dir) => log::info!("Serving static files from {}", dir),
        None => log::info!("STATIC_DIR not set, serving API only"),
    }

    let bind_address = config.bind_address();
    log::info!("Starting server on {} (model {})", bind_address, client.model());

    let static_dir = config.static_dir.clone();
    let config = web::Data::new(config);
    let client = web::Data::new(client);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(client.clone())
            .app_data(config.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
