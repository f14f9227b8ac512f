#![forbid(unsafe_code)]

use sqlx::{Pool, Postgres};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::time::Duration;

use log::{info, error};
use crate::utils::config::DbSettings;
use crate::utils::errors::Errors;

// Database constants.
const POOL_ACQUIRE_TIMEOUT_SECS: u64 = 5;

// See the migrations directory for the database schema definition.  The
// migrations are compiled into the binary.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

// ---------------------------------------------------------------------------
// init_db:
// ---------------------------------------------------------------------------
/** Connect to Postgres, create the connection pool and bring the schema up
 * to date.  Called once at startup; any failure is fatal to the server.
 */
pub async fn init_db(settings: &DbSettings, min_connections: u32, max_connections: u32)
-> Result<Pool<Postgres>, Errors> {

    // Should look like this: "postgres://hello@localhost:5432/hello_db"
    let url = format!("postgres://{}@{}:{}/{}",
                      settings.user, settings.host, settings.port, settings.name);

    let options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .password(&settings.password)
        .database(&settings.name)
        .ssl_mode(PgSslMode::Disable);

    // Create the database connection pool.  A slow or unreachable database
    // fails acquisition instead of stalling requests indefinitely.
    let db = match PgPoolOptions::new()
        .min_connections(min_connections)
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(POOL_ACQUIRE_TIMEOUT_SECS))
        .connect_with(options).await
    {
        Ok(db) => db,
        Err(e) => {
            let msg = Errors::DbConnection(url, e.to_string());
            error!("{}", msg);
            return Err(msg);
        }
    };
    info!("Connection to database {} established", url);

    // Run the migrations.
    info!("Applying migrations...");
    match MIGRATOR.run(&db).await {
        Ok(_) => info!("Migration success"),
        Err(e) => {
            let msg = Errors::DbMigration(e.to_string());
            error!("{}", msg);
            db.close().await;
            return Err(msg);
        }
    }

    Ok(db)
}
