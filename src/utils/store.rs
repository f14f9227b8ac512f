#![forbid(unsafe_code)]

use async_trait::async_trait;
use log::info;
use sqlx::{Pool, Postgres};

use crate::utils::db_statements::{GET_USER_BY_NAME, INSERT_USER, PING};
use crate::utils::db_types::{User, UserInput};
use crate::utils::errors::StoreError;

// ***************************************************************************
//                                 UserStore
// ***************************************************************************
/** Persistence for user records.  Implementations are shared by every
 * in-flight request, so they must be safe for concurrent use.
 */
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new record.  Names are not checked for uniqueness.
    async fn save(&self, user: &UserInput) -> Result<(), StoreError>;

    /// Return a record with the given name.  When several records share the
    /// name, which one is returned is unspecified.
    async fn find_by_name(&self, name: &str) -> Result<User, StoreError>;

    /// Check that the backing storage is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

// ***************************************************************************
//                                  PgStore
// ***************************************************************************
/** UserStore backed by a Postgres connection pool. */
pub struct PgStore {
    db: Pool<Postgres>,
}

impl PgStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        PgStore {db}
    }

    /// Close every pooled connection.  Called once on shutdown.
    pub async fn close(&self) {
        self.db.close().await;
        info!("Database connection pool closed");
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn save(&self, user: &UserInput) -> Result<(), StoreError> {
        sqlx::query(INSERT_USER)
            .bind(&user.name)
            .bind(&user.date_of_birth)
            .execute(&self.db)
            .await
            .map_err(|e| StoreError::Write(user.name.clone(), e))?;
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<User, StoreError> {
        let result = sqlx::query(GET_USER_BY_NAME)
            .bind(name)
            .fetch_optional(&self.db)
            .await
            .map_err(StoreError::Connection)?;

        // We may have found the user.
        match result {
            Some(row) => User::from_row(&row).map_err(StoreError::Connection),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query(PING)
            .execute(&self.db)
            .await
            .map_err(StoreError::Connection)?;
        Ok(())
    }
}

// ***************************************************************************
//                                MemoryStore
// ***************************************************************************
/** In-process UserStore used by the endpoint tests.  Records are kept in
 * insertion order and lookups return the first match.
 */
#[cfg(test)]
pub mod memory {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryStore {
        users: Mutex<Vec<User>>,
        unreachable: AtomicBool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            MemoryStore::default()
        }

        /// Make every subsequent call fail as if the database were down.
        pub fn set_unreachable(&self, unreachable: bool) {
            self.unreachable.store(unreachable, Ordering::SeqCst);
        }

        pub fn count(&self) -> usize {
            self.users.lock().map(|u| u.len()).unwrap_or(0)
        }

        fn check_reachable(&self) -> Result<(), sqlx::Error> {
            if self.unreachable.load(Ordering::SeqCst) {
                Err(sqlx::Error::PoolTimedOut)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl UserStore for MemoryStore {
        async fn save(&self, user: &UserInput) -> Result<(), StoreError> {
            self.check_reachable().map_err(|e| StoreError::Write(user.name.clone(), e))?;
            let mut users = self.users.lock().map_err(|_| StoreError::Write(user.name.clone(), sqlx::Error::PoolClosed))?;
            let id = users.len() as i32 + 1;
            users.push(User::new(id, user.name.clone(), user.date_of_birth.clone()));
            Ok(())
        }

        async fn find_by_name(&self, name: &str) -> Result<User, StoreError> {
            self.check_reachable().map_err(StoreError::Connection)?;
            let users = self.users.lock().map_err(|_| StoreError::Connection(sqlx::Error::PoolClosed))?;
            users.iter()
                .find(|u| u.name == name)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(name.to_string()))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.check_reachable().map_err(StoreError::Connection)
        }
    }
}
