/// Redis-backed [`KvStore`].
///
/// Unlike a cache, this backend is the system of record for the keys it holds, so every
/// Redis failure is surfaced to the caller instead of degrading to a miss.
use futures::future::BoxFuture;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::CommonError;
use crate::kv::{validate_key, KvStore};

pub struct RedisKv {
    client: redis::Client,
}

impl RedisKv {
    /// Create a client for `url`. No connection is made until first use.
    pub fn new(url: &str) -> Result<Self, CommonError> {
        let client = redis::Client::open(url)
            .inspect_err(|e| warn!(error = %e, url, "failed to create redis client"))?;
        Ok(Self { client })
    }

    /// Test the connection by sending a PING. Returns `true` if Redis is reachable.
    pub async fn is_available(&self) -> bool {
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
                result.is_ok()
            }
            Err(_) => false,
        }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CommonError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))?;
        Ok(conn)
    }
}

impl KvStore for RedisKv {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CommonError>> {
        Box::pin(async move {
            validate_key(key)?;
            let mut conn = self.connection().await?;
            let value: Option<String> = conn
                .get(key)
                .await
                .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))?;
            Ok(value)
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), CommonError>> {
        Box::pin(async move {
            validate_key(key)?;
            let mut conn = self.connection().await?;
            conn.set::<_, _, ()>(key, value)
                .await
                .inspect_err(|e| warn!(error = %e, key, "redis SET failed"))?;
            Ok(())
        })
    }

    fn flush(&self) -> BoxFuture<'_, Result<(), CommonError>> {
        // Writes are acknowledged by the server; persistence is Redis's own policy.
        Box::pin(async { Ok(()) })
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
