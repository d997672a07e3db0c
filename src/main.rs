use std::{str::FromStr, time::Duration};

use actix_web::{
    http::Method,
    middleware,
    web::{self, Data},
    App, HttpResponse, HttpServer, Responder,
};
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    SqlitePool,
};

mod auth;
mod config;
mod db;
mod errors;
mod routes;
mod structs;
#[cfg(test)]
mod test_support;
mod utils;
mod validation;

use config::Config;
use errors::AppError;
use utils::Credentials;
use validation::Rules;

#[derive(Debug, Clone)]
pub struct AppState {
    db_pool: SqlitePool,
    credentials: Credentials,
    rules: Rules,
}

async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .read_only(false)
        .busy_timeout(Duration::from_secs(5));

    let db_pool = SqlitePool::connect_with(opts).await?;
    sqlx::migrate!().run(&db_pool).await?;
    Ok(db_pool)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("FATAL: invalid configuration: {}", e);
        e
    })?;

    let db_pool = connect(&config.database_url).await.map_err(|e| {
        log::error!("FATAL: cannot open {}: {}", config.database_url, e);
        e
    })?;

    info!("Database migrated successfully");

    let state = Data::new(AppState {
        db_pool,
        credentials: config.credentials,
        rules: config.rules,
    });

    info!(
        "Starting HTTP server on http://{}:{}/",
        config.bind_address, config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
            // enable logger - always register Actix Web Logger middleware last
            .wrap(middleware::Logger::default())
            .default_service(web::to(default_handler))
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}

async fn default_handler(req_method: Method) -> Result<impl Responder, AppError> {
    match req_method {
        Method::GET => Err(AppError::NotFound),
        _ => Ok(HttpResponse::MethodNotAllowed().finish()),
    }
}
