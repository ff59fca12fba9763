//! Best-effort cache access.
//!
//! Cache failures never fail an operation: they are logged, counted and
//! treated as a miss (reads) or skipped (writes and invalidations). A value
//! that no longer decodes is treated the same way.

use std::time::Duration;

use common::OperationContext;
use metrics::counter;
use ports::{Cache, CacheError, CacheExt};
use serde::{Serialize, de::DeserializeOwned};

fn record_failure(op: &'static str, key: &str, error: &CacheError) {
    counter!("cache_failures_total", "op" => op).increment(1);
    tracing::warn!(op, key, error = %error, "cache operation failed");
}

pub(crate) async fn read_json<C, T>(ctx: &OperationContext, cache: &C, key: &str) -> Option<T>
where
    C: Cache + ?Sized,
    T: DeserializeOwned + Send,
{
    match ctx.run(cache.get_json(key)).await {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            record_failure("get", key, &e);
            None
        }
        Err(interrupted) => {
            tracing::debug!(key, reason = %interrupted, "cache read skipped");
            None
        }
    }
}

pub(crate) async fn write_json<C, T>(
    ctx: &OperationContext,
    cache: &C,
    key: &str,
    value: &T,
    ttl_seconds: u64,
) where
    C: Cache + ?Sized,
    T: Serialize + Sync,
{
    match ctx.run(cache.set_json(key, value, ttl_seconds)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => record_failure("set", key, &e),
        Err(interrupted) => {
            tracing::debug!(key, reason = %interrupted, "cache write skipped");
        }
    }
}

pub(crate) async fn write_raw<C>(
    ctx: &OperationContext,
    cache: &C,
    key: &str,
    value: String,
    ttl_seconds: u64,
) -> bool
where
    C: Cache + ?Sized,
{
    match ctx.run(cache.set(key, value, ttl_seconds)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            record_failure("set", key, &e);
            false
        }
        Err(_) => false,
    }
}

/// Marker for a cache read that failed or was interrupted.
pub(crate) struct Unavailable;

pub(crate) async fn read_raw<C>(
    ctx: &OperationContext,
    cache: &C,
    key: &str,
) -> Result<Option<String>, Unavailable>
where
    C: Cache + ?Sized,
{
    match ctx.run(cache.get(key)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            record_failure("get", key, &e);
            Err(Unavailable)
        }
        Err(_) => Err(Unavailable),
    }
}

/// Deletes every key, continuing past failures.
///
/// Not raced against the caller's context: an acknowledged write is always
/// followed by its invalidations. `timeout` bounds each delete.
pub(crate) async fn invalidate<C>(cache: &C, keys: &[String], timeout: Duration)
where
    C: Cache + ?Sized,
{
    for key in keys {
        match tokio::time::timeout(timeout, cache.delete(key)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => record_failure("delete", key, &e),
            Err(_) => {
                counter!("cache_failures_total", "op" => "delete").increment(1);
                tracing::warn!(key, "cache invalidation timed out");
            }
        }
    }
}
