use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tempo::config::AppConfig;
use tempo::middleware::auth::Authentication;
use tempo::{routes, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let port = config.port;
    let app_state = Arc::new(AppState::new(config));

    info!("Listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(Authentication {
                app_config: Arc::new(app_state.config.clone()),
            })
            .configure(routes::configure(app_state.clone()))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
