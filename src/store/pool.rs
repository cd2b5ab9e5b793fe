//! Fixed-size connection pool over a single SQLite file.
//!
//! The teacher (`vault/vault_db.rs`) wraps one `rusqlite::Connection` in a
//! single `tokio::sync::Mutex`. Spec §4.1 asks for a pool with a hard cap
//! (≈12-43 connections) and fail-fast on acquisition timeout, so this pool
//! holds N independently-lockable connections and hands out whichever is
//! free, failing fast with `AppError::StoreUnavailable` if none frees up
//! in time.

use crate::error::AppError;
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct StorePool {
    conns: Vec<Mutex<Connection>>,
    permits: Semaphore,
}

pub struct PooledConn<'a> {
    guard: tokio::sync::MutexGuard<'a, Connection>,
    _permit: tokio::sync::SemaphorePermit<'a>,
}

impl<'a> std::ops::Deref for PooledConn<'a> {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        &self.guard
    }
}

impl<'a> std::ops::DerefMut for PooledConn<'a> {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.guard
    }
}

impl StorePool {
    pub fn open(path: &str, size: usize) -> Result<Arc<Self>> {
        let size = size.clamp(1, 64);
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open(path).context("open store connection")?;
            conn.pragma_update(None, "journal_mode", "WAL").ok();
            conn.pragma_update(None, "synchronous", "NORMAL").ok();
            conn.pragma_update(None, "foreign_keys", "ON").ok();
            conns.push(Mutex::new(conn));
        }
        super::schema::init(&conns[0].try_lock().expect("fresh pool conn"))?;

        Ok(Arc::new(Self {
            permits: Semaphore::new(size),
            conns,
        }))
    }

    pub async fn acquire(&self) -> Result<PooledConn<'_>, AppError> {
        let permit = tokio::time::timeout(ACQUIRE_TIMEOUT, self.permits.acquire())
            .await
            .map_err(|_| AppError::StoreUnavailable("connection pool exhausted".into()))?
            .expect("semaphore not closed");

        for slot in &self.conns {
            if let Ok(guard) = slot.try_lock() {
                return Ok(PooledConn { guard, _permit: permit });
            }
        }
        // All slots momentarily held past the semaphore's count being free
        // (a racing release) — wait on the first one.
        let guard = tokio::time::timeout(ACQUIRE_TIMEOUT, self.conns[0].lock())
            .await
            .map_err(|_| AppError::StoreUnavailable("connection pool exhausted".into()))?;
        Ok(PooledConn { guard, _permit: permit })
    }
}
