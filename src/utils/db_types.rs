// This file contains the database structs and related definitions.
#![forbid(unsafe_code)]

use sqlx::postgres::PgRow;
use sqlx::Row;

// ---------------------------------------------------------------------------
// users:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub date_of_birth: String,
}

/// A user record before the database assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub name: String,
    pub date_of_birth: String,
}

impl User {
    pub fn new(id: i32, name: String, date_of_birth: String) -> Self {
        User {id, name, date_of_birth}
    }

    /// Map a row selected with the GET_USER_BY_NAME column order.
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(User::new(row.try_get(0)?, row.try_get(1)?, row.try_get(2)?))
    }
}

impl UserInput {
    pub fn new(name: String, date_of_birth: String) -> Self {
        UserInput {name, date_of_birth}
    }
}
