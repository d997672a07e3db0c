//! Helpers shared by the store and route tests.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::{utils::Credentials, validation::Rules, AppState};

pub const USERNAME: &str = "inventory";
pub const PASSWORD: &str = "correct horse battery staple";

/// A private in-memory database with the migrations applied.
///
/// The pool keeps exactly one connection alive for its whole life, since the
/// database disappears with the last connection.
pub async fn memory_pool() -> SqlitePool {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("memory url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await
        .expect("open in-memory database");
    sqlx::migrate!().run(&pool).await.expect("migrate");
    pool
}

pub fn state(pool: SqlitePool) -> AppState {
    AppState {
        db_pool: pool,
        credentials: Credentials::new(USERNAME, PASSWORD),
        rules: Rules::default(),
    }
}

pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub fn valid_auth() -> (&'static str, String) {
    ("Authorization", basic_auth(USERNAME, PASSWORD))
}

/// Ids of the rows [`seed`] creates.
#[derive(Debug, Clone, Copy)]
pub struct Seeded {
    pub user: i64,
    pub location: i64,
    pub hardware: i64,
    pub rack: i64,
    pub stock: i64,
}

/// One user, location, hardware type and rack, plus a stock slot holding ten
/// of that hardware.
pub async fn seed(pool: &SqlitePool) -> Seeded {
    let user: i64 = sqlx::query_scalar("INSERT INTO \"user\" (email) VALUES ('seed@example.com') RETURNING id")
        .fetch_one(pool)
        .await
        .expect("seed user");
    let location: i64 = sqlx::query_scalar(
        "INSERT INTO location (name, width, height) VALUES ('Lab', 10, 10) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("seed location");
    let hardware: i64 =
        sqlx::query_scalar("INSERT INTO hardware (name) VALUES ('DE10-Lite') RETURNING id")
            .fetch_one(pool)
            .await
            .expect("seed hardware");
    let rack: i64 = sqlx::query_scalar(
        "INSERT INTO rack (location, width, height, x, y) VALUES ($1, 2, 2, 0, 0) RETURNING id",
    )
    .bind(location)
    .fetch_one(pool)
    .await
    .expect("seed rack");
    let stock: i64 = sqlx::query_scalar(
        "INSERT INTO stock (hardware, rack, rack_position, count) VALUES ($1, $2, 1, 10) RETURNING id",
    )
    .bind(hardware)
    .bind(rack)
    .fetch_one(pool)
    .await
    .expect("seed stock");

    Seeded {
        user,
        location,
        hardware,
        rack,
        stock,
    }
}
