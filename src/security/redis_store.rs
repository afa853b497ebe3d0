//! Redis-backed rate limit store.
//!
//! The GCRA step runs inside a Lua script so the read of the stored TAT and
//! the write of the new one happen as one atomic operation on the Redis
//! server, regardless of how many proxy instances share it. Time comes from
//! the Redis server's clock, which keeps instances with skewed clocks
//! consistent.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{ErrorKind, RedisError, Script};
use tokio::sync::OnceCell;

use crate::security::store::{GcraParams, GcraReply, RateLimitStore, StoreError};

// KEYS[1] = key, ARGV[1] = interval (us), ARGV[2] = burst offset (us)
// returns {allowed, tat_us, now_us}
const GCRA_SCRIPT: &str = r"
redis.replicate_commands()

local interval = tonumber(ARGV[1])
local burst_offset = tonumber(ARGV[2])

local time = redis.call('TIME')
local now = tonumber(time[1]) * 1000000 + tonumber(time[2])

local tat = tonumber(redis.call('GET', KEYS[1]))
if not tat or tat < now then
    tat = now
end

local new_tat = tat + interval
if new_tat > now + burst_offset then
    return {0, tat, now}
end

local ttl = math.max(new_tat - now, burst_offset)
redis.call('SET', KEYS[1], string.format('%d', new_tat), 'PX', math.ceil(ttl / 1000))
return {1, new_tat, now}
";

/// Rate limit store shared by every proxy instance through Redis.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    script: Script,
    timeout: Duration,
}

impl RedisStore {
    /// Create a store for the given URL. No connection is made until the
    /// first check, so an unreachable server fails requests, not startup.
    ///
    /// `timeout` bounds every check end to end, connecting included.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            script: Script::new(GCRA_SCRIPT),
            timeout,
        })
    }

    // No retries: callers fail closed instead of queueing behind a backoff.
    fn manager_config(&self) -> ConnectionManagerConfig {
        ConnectionManagerConfig::new()
            .set_number_of_retries(0)
            .set_connection_timeout(self.timeout)
            .set_response_timeout(self.timeout)
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn =
                    ConnectionManager::new_with_config(self.client.clone(), self.manager_config())
                        .await?;
                tracing::info!("Connected to redis for request rate limiting");
                Ok::<_, RedisError>(conn)
            })
            .await
            .map_err(unavailable)?;
        Ok(conn.clone())
    }

    async fn run_script(&self, key: &str, params: GcraParams) -> Result<GcraReply, StoreError> {
        let mut conn = self.connection().await?;

        // EVALSHA, falling back to EVAL when the script cache is cold.
        let (allowed, tat_us, now_us): (i64, i64, i64) = self
            .script
            .key(key)
            .arg(params.interval_us)
            .arg(params.burst_offset_us)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::TypeError => StoreError::MalformedReply(e.to_string()),
                _ => unavailable(e),
            })?;

        parse_reply(allowed, tat_us, now_us)
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn apply_gcra(&self, key: &str, params: GcraParams) -> Result<GcraReply, StoreError> {
        tokio::time::timeout(self.timeout, self.run_script(key, params))
            .await
            .map_err(|elapsed| StoreError::Unavailable(Box::new(elapsed)))?
    }
}

fn parse_reply(allowed: i64, tat_us: i64, now_us: i64) -> Result<GcraReply, StoreError> {
    let allowed = match allowed {
        0 => false,
        1 => true,
        other => return Err(StoreError::MalformedReply(format!("allowed flag {other}"))),
    };
    let (Ok(tat_us), Ok(now_us)) = (u64::try_from(tat_us), u64::try_from(now_us)) else {
        return Err(StoreError::MalformedReply(format!(
            "negative timestamps tat={tat_us} now={now_us}"
        )));
    };
    Ok(GcraReply {
        allowed,
        tat_us,
        now_us,
    })
}

fn unavailable(e: RedisError) -> StoreError {
    StoreError::Unavailable(Box::new(e))
}
