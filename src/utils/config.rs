#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use serde::Deserialize;
use std::{env, fmt, fs, path::Path};
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;
use structopt::StructOpt;

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

// Hello Utilities
use crate::utils::{hello_utils, errors::Errors};
use crate::utils::greeting::GreetingMode;

use super::hello_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_HELLO_ROOT_DIR   : &str = "HELLO_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.hello_server";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml";  // relative to config dir
const HELLO_CONFIG_FILE    : &str = "/hello.toml";  // relative to config dir
const DEFAULT_LOG_PATTERN  : &str = "{d(%Y-%m-%dT%H:%M:%S%.3f%z)} {l} {M} - {m}{n}";

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "0.0.0.0";
const DEFAULT_HTTP_PORT    : u16  = 80;
const DEFAULT_GRACE_SECS   : u64  = 5;
const DEFAULT_IDLE_SECS    : u64  = 60;

// Database connection pool.
const DEFAULT_MIN_CONNECTIONS: u32 = 2;
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

// Required database environment variables.
pub const ENV_DB_HOST      : &str = "DB_HOST";
pub const ENV_DB_PORT      : &str = "DB_PORT";
pub const ENV_DB_USER      : &str = "DB_USER";
pub const ENV_DB_NAME      : &str = "DB_NAME";
pub const ENV_DB_PASSWORD  : &str = "DB_PASSWORD";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments before anything else is initialized in main.
lazy_static! {
    pub static ref HELLO_ARGS: HelloArgs = init_hello_args();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// HelloDirs:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct HelloDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// HelloArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "hello_args", about = "Command line arguments for Hello Server.")]
pub struct HelloArgs {
    /// Specify the server's root data directory.
    ///
    /// This directory contains the config and logs subdirectories.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the HELLO_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root_dir command line argument,
    ///
    ///   3. Otherwise, ~/.hello_server
    ///
    #[structopt(short, long)]
    pub create_dirs_only: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
/** Everything read at startup.  The database pool itself is not part of the
 * context; it is owned by the store handed to the API structs.
 */
#[derive(Debug)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub db_settings: DbSettings,
    pub hello_dirs: HelloDirs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub shutdown_grace_secs: u64,
    pub http_idle_timeout_secs: u64,
    pub greeting_mode: GreetingMode,
    pub db_min_connections: u32,
    pub db_max_connections: u32,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Hello Server".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            shutdown_grace_secs: DEFAULT_GRACE_SECS,
            http_idle_timeout_secs: DEFAULT_IDLE_SECS,
            greeting_mode: GreetingMode::default(),
            db_min_connections: DEFAULT_MIN_CONNECTIONS,
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

// ---------------------------------------------------------------------------
// DbSettings:
// ---------------------------------------------------------------------------
/** Database connection settings.  These come only from the environment and
 * every one of them is required.
 */
#[derive(Clone)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub name: String,
    pub password: String,
}

impl DbSettings {
    /// Read the settings from the process environment.
    pub fn from_env() -> Result<Self, Errors> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the settings through a lookup function.  Unset and empty
    /// values are both treated as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Errors>
    where F: Fn(&str) -> Option<String>
    {
        let required = |key: &str| -> Result<String, Errors> {
            match lookup(key) {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(Errors::MissingEnvVar(key.to_string())),
            }
        };

        let host = required(ENV_DB_HOST)?;
        let port_str = required(ENV_DB_PORT)?;
        let user = required(ENV_DB_USER)?;
        let name = required(ENV_DB_NAME)?;
        let password = required(ENV_DB_PASSWORD)?;

        let port = port_str.trim().parse::<u16>()
            .map_err(|e| Errors::InvalidEnvVar(ENV_DB_PORT.to_string(), format!("{}: {}", port_str, e)))?;

        Ok(DbSettings {host, port, user, name, password})
    }
}

// The password never reaches the log.
impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("name", &self.name)
            .field("password", &"********")
            .finish()
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_hello_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_hello_args() -> HelloArgs {
    let args = HelloArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_hello_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories, creating them if necessary. */
pub fn init_hello_dirs(args: &HelloArgs) -> Result<HelloDirs, Errors> {
    // Initialize the mistrust object.
    let mistrust = get_mistrust()?;

    // Check that each path is absolute and is a directory with the
    // proper permission assign if it exists.  If it doesn't exist,
    // create it.
    let root_dir = get_root_dir(args);
    check_hello_dir(&root_dir, "root directory", &mistrust)?;

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_hello_dir(&config_dir, "config directory", &mistrust)?;

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_hello_dir(&logs_dir, "logs directory", &mistrust)?;

    // Package up and return the directories.
    Ok(HelloDirs {root_dir, config_dir, logs_dir})
}

// ---------------------------------------------------------------------------
// check_hello_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 */
fn check_hello_dir(dir: &str, msgname: &str, mistrust: &Mistrust) -> Result<(), Errors> {
    // Get the path object.
    let path = Path::new(dir);
    if !path.is_absolute() {
        return Err(Errors::DirectoryError(format!("The {} path must be absolute: {}", msgname, dir)));
    }
    if path.exists() {
        // Make sure the path represents a directory.
        if !path.is_dir() {
            return Err(Errors::DirectoryError(format!("The {} path must be a directory: {}", msgname, dir)));
        }

        // Make sure the directory had rwx for owner only.
        let perm = path.metadata()?.permissions().mode();
        if perm & 0o777 != 0o700 {
            return Err(Errors::DirectoryError(format!("The {} path must have 0o700 permissions: {}", msgname, dir)));
        }
    } else {
        // Create the directory with the correct permissions.
        mistrust.make_directory(path)
            .map_err(|e| Errors::DirectoryError(format!("Make directory error for {:?}: {}", path, e)))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Result<Mistrust, Errors> {
    Mistrust::builder()
        .ignore_prefix(get_absolute_path("~"))
        .trust_group(0)
        .build()
        .map_err(|e| Errors::DirectoryError(format!("Mistrust configuration error: {}", e)))
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir(args: &HelloArgs) -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_HELLO_ROOT_DIR).unwrap_or_else(
        |_| {
            match args.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    // Canonicalize the path.
    get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the config directory's log4rs.yml.  When that file
 * doesn't exist we log to stdout at info level.  Returns a description of
 * the configuration used.
 */
pub fn init_log(dirs: &HelloDirs) -> Result<String, Errors> {
    let logconfig = dirs.config_dir.clone() + LOG4RS_CONFIG_FILE;
    if Path::new(&logconfig).exists() {
        if let Err(e) = log4rs::init_file(&logconfig, Default::default()) {
            println!("{}", e);
            return Err(Errors::Log4rsInitialization(logconfig));
        }
        info!("Log4rs initialized using: {}", logconfig);
        return Ok(logconfig);
    }

    // Fall back to a console logger.
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))
        .map_err(|e| Errors::Log4rsInitialization(format!("default console config: {}", e)))?;
    log4rs::init_config(config)
        .map_err(|e| Errors::Log4rsInitialization(format!("default console config: {}", e)))?;

    let desc = "default console logger".to_string();
    info!("Log4rs initialized using: {} ({} not found)", desc, logconfig);
    Ok(desc)
}

/// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config directory.  If the file doesn't exist the defaults are used.
 */
fn get_parms(dirs: &HelloDirs) -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = dirs.config_dir.clone() + HELLO_CONFIG_FILE;

    // Read the cofiguration file.
    let config_file_abs = hello_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            info!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    let config = parse_config(&contents, &config_file_abs)?;
    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
fn parse_config(contents: &str, config_file: &str) -> Result<Config> {
    let config : Config = match toml::from_str(contents) {
        Ok(c)  => c,
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file.to_string()), e);
            error!("{}", msg);
            return Result::Err(anyhow!(msg));
        }
    };

    if config.db_min_connections > config.db_max_connections {
        let msg = format!("{}\n   db_min_connections ({}) exceeds db_max_connections ({})",
                          Errors::TOMLParseError(config_file.to_string()),
                          config.db_min_connections, config.db_max_connections);
        error!("{}", msg);
        return Result::Err(anyhow!(msg));
    }

    Ok(config)
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
/** Read the configuration file and the database environment variables.
 * Either failing aborts startup.
 */
pub fn init_runtime_context(hello_dirs: HelloDirs) -> Result<RuntimeCtx> {
    let parms = get_parms(&hello_dirs)?;
    let db_settings = DbSettings::from_env()?;
    Ok(RuntimeCtx {parms, db_settings, hello_dirs})
}
