use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;

use tasks_app::auth::AuthMiddleware;
use tasks_app::cache::TaskCache;
use tasks_app::config::Config;
use tasks_app::routes::{self, health};
use tasks_app::state::AppState;
use tasks_app::store::{MemoryStore, PgStore};

async fn build_state(config: &Config) -> io::Result<AppState> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            store
                .init_schema()
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            log::info!("Connected to PostgreSQL");
            Ok(AppState::new(Arc::new(store), config))
        }
        None => {
            log::warn!("DATABASE_URL not set, data is kept in memory only");
            Ok(AppState::new(Arc::new(MemoryStore::new()), config))
        }
    }
}

/// Drops stale listings so idle users do not pin memory.
fn spawn_cache_purge(cache: Arc<dyn TaskCache>, period: std::time::Duration) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired().await;
            if purged > 0 {
                log::debug!("purged {} expired task listings", purged);
            }
        }
    });
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let state = build_state(&config).await?;
    if !config.cache_ttl.is_zero() {
        spawn_cache_purge(state.cache.clone(), config.cache_ttl);
    }

    log::info!("Starting server at {}", config.server_url());
    let data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            )
    })
    .bind(config.bind_address())?
    .run()
    .await
}
