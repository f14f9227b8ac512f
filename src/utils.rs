#![forbid(unsafe_code)]

pub mod config;
pub mod db_init;
pub mod db_statements;
pub mod db_types;
pub mod errors;
pub mod greeting;
pub mod hello_utils;
pub mod store;
