//! Redis helpers (rate limiting).

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Increment a counter, starting its TTL window on first hit.
pub async fn incr_expire(
    conn: &mut ConnectionManager,
    key: &str,
    ttl_secs: u64,
) -> Result<i64, redis::RedisError> {
    let count: i64 = conn.incr(key, 1).await?;
    if count == 1 {
        let _: () = conn.expire(key, ttl_secs as i64).await?;
    }
    Ok(count)
}

/// Remaining TTL of a key in seconds (`None` when missing or persistent).
pub async fn ttl(conn: &mut ConnectionManager, key: &str) -> Result<Option<u64>, redis::RedisError> {
    let ttl: i64 = conn.ttl(key).await?;
    Ok(u64::try_from(ttl).ok())
}

/// Delete a key.
pub async fn del(conn: &mut ConnectionManager, key: &str) -> Result<(), redis::RedisError> {
    conn.del(key).await
}

/// Rate-limit key for login attempts against one username.
pub fn login_attempts_key(username: &str) -> String {
    format!("prhub:login:{}", username.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_keys_are_case_insensitive() {
        assert_eq!(login_attempts_key("Anna"), "prhub:login:anna");
        assert_eq!(login_attempts_key("anna"), login_attempts_key("ANNA"));
    }
}
