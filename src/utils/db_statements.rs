// This file contains all SQL statements issued by the server.
#![forbid(unsafe_code)]

// ========================= users table =========================
pub const INSERT_USER: &str = concat!(
    "INSERT INTO users (name, date_of_birth) ",
    "VALUES ($1, $2)",
);

// Names are not unique.  Without an ORDER BY, which of several rows
// sharing a name comes back is up to the query planner.
pub const GET_USER_BY_NAME: &str = concat!(
    "SELECT id, name, date_of_birth ",
    "FROM users WHERE name = $1 LIMIT 1",
);

// ========================= liveness =========================
pub const PING: &str = "SELECT 1";
