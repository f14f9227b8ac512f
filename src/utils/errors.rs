#![forbid(unsafe_code)]

use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("hello_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Inaccessible logger configuration file.
    #[error("Unable to initialize Log4rs using configuration: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    #[error("Required environment variable is not set: {}", .0)]
    MissingEnvVar(String),

    #[error("Invalid value for environment variable {}: {}", .0, .1)]
    InvalidEnvVar(String, String),

    #[error("Data directory error: {}", .0)]
    DirectoryError(String),

    #[error("Unable to connect to database {}: {}", .0, .1)]
    DbConnection(String, String),

    #[error("Database migration failed: {}", .0)]
    DbMigration(String),

    #[error("Unable to parse date '{}', expected YYYY-MM-DD: {}", .0, .1)]
    DateFormat(String, String),

    #[error("In-flight requests did not finish within {} seconds of shutdown", .0)]
    ShutdownTimeout(u64),
}

/// Errors raised by a user record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("NOT_FOUND: no user named {}", .0)]
    NotFound(String),

    #[error("Database unreachable: {}", .0)]
    Connection(#[source] sqlx::Error),

    #[error("Unable to insert user {}: {}", .0, .1)]
    Write(String, #[source] sqlx::Error),
}
