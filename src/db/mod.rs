use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::http::Status;
use rocket::outcome::{try_outcome, Outcome};
use rocket::request::{self, FromRequest};
use rocket::{Request, State};
use std::ops::{Deref, DerefMut};
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::*;

pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// The backend every model in the crate is written against.
pub type Connection = SqliteConnection;

// An alias to the type for a pool of Diesel SQLite connections.
pub type Pool = r2d2::Pool<ConnectionManager<Connection>>;

pub struct DbConnection(pub r2d2::PooledConnection<ConnectionManager<Connection>>);

/// Per-connection pragmas. SQLite leaves foreign keys off unless asked.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<Connection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut Connection) -> ::std::result::Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Attempts to retrieve a single connection from the managed database pool. If
/// no pool is currently managed, fails with an `InternalServerError` status. If
/// no connections are available, fails with a `ServiceUnavailable` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let pool = try_outcome!(request.guard::<&State<Pool>>().await);
        match pool.get() {
            Ok(conn) => Outcome::Success(DbConnection(conn)),
            Err(e) => {
                warn!(error = %e, "no database connection available");
                Outcome::Error((Status::ServiceUnavailable, ()))
            }
        }
    }
}

// For the convenience of using an &DbConnection as an &SqliteConnection.
impl Deref for DbConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

pub fn init_pool(config: &Config) -> Result<Pool> {
    let manager = ConnectionManager::<Connection>::new(config.database_url.as_str());
    let pool = r2d2::Pool::builder()
        .max_size(config.pool_size)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: 5000,
        }))
        .build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &Pool) -> Result<()> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| ErrorKind::Migration(e.to_string()))?;
    if !applied.is_empty() {
        info!(count = applied.len(), "applied pending migrations");
    }
    Ok(())
}
