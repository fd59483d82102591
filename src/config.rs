//! Node configuration for the demo binary.
//!
//! All values come from environment variables with defaults that match a
//! single-node local setup, so `peercached` runs with no configuration at
//! all and a fleet only needs `LISTEN_ADDR`/`PEERS` per node.

use std::env;

use crate::http::DEFAULT_REPLICAS;

/// Node configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    pub listen_addr: String,
    /// This node's base URL as other peers reach it.
    pub self_url: String,
    /// Base URLs of every node in the fleet (including this one).
    pub peers: Vec<String>,
    /// Byte budget of the demo group's local store (`0` = unbounded).
    pub cache_bytes: usize,
    /// Virtual nodes per peer; must agree across the fleet.
    pub ring_replicas: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `LISTEN_ADDR` — bind address (default: `127.0.0.1:9999`)
    /// - `SELF_URL` — own base URL (default: `http://{LISTEN_ADDR}`)
    /// - `PEERS` — comma-separated peer base URLs (default: empty)
    /// - `CACHE_BYTES` — store budget in bytes (default: 2048)
    /// - `RING_REPLICAS` — virtual nodes per peer (default: 50)
    pub fn from_env() -> Self {
        let listen_addr =
            env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:9999".to_string());
        let self_url =
            env::var("SELF_URL").unwrap_or_else(|_| format!("http://{listen_addr}"));
        let peers = env::var("PEERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|peer| !peer.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            listen_addr,
            self_url,
            peers,
            cache_bytes: env::var("CACHE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2 << 10),
            ring_replicas: env::var("RING_REPLICAS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REPLICAS),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9999".to_string(),
            self_url: "http://127.0.0.1:9999".to_string(),
            peers: Vec::new(),
            cache_bytes: 2 << 10,
            ring_replicas: DEFAULT_REPLICAS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_single_node() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:9999");
        assert_eq!(config.self_url, "http://127.0.0.1:9999");
        assert!(config.peers.is_empty());
        assert_eq!(config.cache_bytes, 2048);
        assert_eq!(config.ring_replicas, 50);
    }

    #[test]
    fn from_env_defaults_match_default() {
        env::remove_var("LISTEN_ADDR");
        env::remove_var("SELF_URL");
        env::remove_var("PEERS");
        env::remove_var("CACHE_BYTES");
        env::remove_var("RING_REPLICAS");

        let config = Config::from_env();
        assert_eq!(config.listen_addr, Config::default().listen_addr);
        assert_eq!(config.self_url, Config::default().self_url);
        assert_eq!(config.cache_bytes, Config::default().cache_bytes);
    }
}
