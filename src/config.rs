use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub token_secret: String,
    pub max_rooms: usize,
    pub room_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("CAST_BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));
        let token_secret = std::env::var("CAST_TOKEN_SECRET").unwrap_or_else(|_| {
            tracing::warn!("CAST_TOKEN_SECRET not set; sender tokens will not survive a restart");
            uuid::Uuid::new_v4().to_string()
        });
        Self {
            bind_addr,
            token_secret,
            max_rooms: parse_or("CAST_MAX_ROOMS", 1024),
            room_ttl: Duration::from_secs(parse_or("CAST_ROOM_TTL_SECS", 1800)),
            sweep_interval: Duration::from_secs(parse_or("CAST_SWEEP_INTERVAL_SECS", 60)),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_uses_the_default_when_unset_or_garbage() {
        assert_eq!(parse_or("CAST_TEST_MISSING_KEY", 7usize), 7);

        std::env::set_var("CAST_TEST_GARBAGE_KEY", "not-a-number");
        assert_eq!(parse_or("CAST_TEST_GARBAGE_KEY", 7usize), 7);
        std::env::remove_var("CAST_TEST_GARBAGE_KEY");
    }

    #[test]
    fn parse_or_reads_a_set_value() {
        std::env::set_var("CAST_TEST_SET_KEY", "42");
        assert_eq!(parse_or("CAST_TEST_SET_KEY", 7usize), 42);
        std::env::remove_var("CAST_TEST_SET_KEY");
    }
}
