#![forbid(unsafe_code)]

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn, LevelFilter};
use poem::listener::TcpListener;
use poem::Endpoint;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;

// Hello Utilities
use crate::utils::config::{init_hello_dirs, init_log, init_runtime_context, HELLO_ARGS};
use crate::utils::db_init::init_db;
use crate::utils::errors::Errors;
use crate::utils::hello_utils::LocalClock;
use crate::utils::store::PgStore;

// Modules
mod api;
mod utils;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "HelloServer"; // for poem logging
const STORE_CLOSE_SECS : u64 = 5;

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> ExitCode {
    // Announce ourselves.
    println!("Starting hello_server!");

    match run().await {
        Ok(_) => {
            info!("hello_server exiting normally.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Nothing reaches the console if the failure preceded logging.
            if log::max_level() == LevelFilter::Off {
                eprintln!("FATAL: {:#}", e);
            }
            error!("FATAL: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// run:
// ---------------------------------------------------------------------------
/** Initialize every subsystem, serve until a termination signal arrives and
 * release the database pool.
 */
async fn run() -> Result<()> {
    // --------------- Initialize Server --------------
    let hello_dirs = init_hello_dirs(&HELLO_ARGS).context("Unable to initialize data directories")?;
    if HELLO_ARGS.create_dirs_only {
        println!("Data directories created under {}.", hello_dirs.root_dir);
        return Ok(());
    }

    // Configure our log.
    init_log(&hello_dirs)?;

    // Read the configuration file and the required database variables.
    let ctx = init_runtime_context(hello_dirs)?;
    info!("{}", Errors::InputParms(format!("{:#?}", ctx)));

    // Log build info.
    print_version_info();

    // Connect and migrate.  The pool lives until shutdown.
    let config = &ctx.parms.config;
    let db = init_db(&ctx.db_settings, config.db_min_connections, config.db_max_connections).await?;
    let store = Arc::new(PgStore::new(db));

    // --------------- Main Loop Set Up ---------------
    let server_url = format!("http://{}:{}", config.http_addr, config.http_port);
    let app = api::make_app(store.clone(), Arc::new(LocalClock), config.greeting_mode,
                            &config.title, &server_url);
    let addr = format!("{}:{}", config.http_addr, config.http_port);
    info!("App is ready to accept connections on {}!", addr);

    // ------------------ Main Loop -------------------
    let result = serve(app, addr, wait_for_signal(),
                       Duration::from_secs(config.shutdown_grace_secs),
                       Duration::from_secs(config.http_idle_timeout_secs)).await;

    // Release the database whether or not shutdown was clean.  Connections
    // still held by abandoned requests must not keep the process alive.
    if !close_within(store.close(), Duration::from_secs(STORE_CLOSE_SECS)).await {
        warn!("Database pool did not close within {} seconds.", STORE_CLOSE_SECS);
    }
    result
}

// ---------------------------------------------------------------------------
// serve:
// ---------------------------------------------------------------------------
/** Run the server until the shutdown future completes.  After that no new
 * connections are accepted and in-flight requests get the grace period to
 * finish; running past it is an error.  Keep-alive connections idle longer
 * than idle_timeout are closed.
 */
async fn serve(app: impl Endpoint + 'static, addr: String, shutdown: impl Future<Output = ()>,
               grace: Duration, idle_timeout: Duration) -> Result<()> {
    let (signal_tx, signal_rx) = oneshot::channel::<()>();
    let shutdown = async move {
        shutdown.await;
        info!("Gracefully shutting down the app...");
        let _ = signal_tx.send(());
    };

    let server = poem::Server::new(TcpListener::bind(addr))
        .name(SERVER_NAME)
        .idle_timeout(idle_timeout)
        .run_with_graceful_shutdown(app, shutdown, None);
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => res.context("HTTP server failed")?,
        _ = signal_rx => {
            match tokio::time::timeout(grace, &mut server).await {
                Ok(res) => res.context("HTTP server failed during shutdown")?,
                Err(_) => return Err(Errors::ShutdownTimeout(grace.as_secs()).into()),
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// close_within:
// ---------------------------------------------------------------------------
/// Returns false if `close` was abandoned after `limit`.
async fn close_within(close: impl Future<Output = ()>, limit: Duration) -> bool {
    tokio::time::timeout(limit, close).await.is_ok()
}

// ---------------------------------------------------------------------------
// wait_for_signal:
// ---------------------------------------------------------------------------
async fn wait_for_signal() {
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut s) => { s.recv().await; }
            Err(e) => {
                error!("Unable to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT."),
        _ = terminate => info!("Received SIGTERM."),
    }
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    // Log build info.
    info!("{}.", format!("\n*** Running HELLO_SERVER={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}",
                        api::version::SERVER_VERSION,
                        env!("GIT_BRANCH"),
                        env!("GIT_COMMIT_SHORT"),
                        env!("GIT_DIRTY"),
                        env!("SOURCE_TIMESTAMP"),
                        env!("RUSTC_VERSION")),
    );
}
