//! Environment-driven configuration.
//!
//! Every knob is optional; defaults match a small LAN deployment. Intervals
//! and timeouts are given in milliseconds.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// UDP port the discovery protocol binds and broadcasts on.
    pub discovery_port: u16,
    /// Retransmit period for every unicast retry loop and the JOIN broadcast.
    pub message_interval: Duration,
    /// Deadline after which a unicast retry loop gives up on its peer.
    pub message_timeout: Duration,
    /// Debounce between a membership change and starting an election.
    pub preelection_timeout: Duration,
    /// Discovery interface address. Autodetected when unset.
    pub address: Option<Ipv4Addr>,
    /// Netmask of the discovery interface.
    pub netmask: Ipv4Addr,
    /// TCP port of the HTTP gateway (only bound while holding GATEWAY).
    pub gateway_port: u16,
    /// TCP port of the message broker fabric.
    pub broker_port: u16,
    /// Where the document store persists its JSON file. `None` disables
    /// persistence.
    pub storage_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_port: 4321,
            message_interval: Duration::from_millis(100),
            message_timeout: Duration::from_millis(550),
            preelection_timeout: Duration::from_millis(550),
            address: None,
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway_port: 8080,
            broker_port: 4322,
            storage_path: Some(PathBuf::from("documents.json")),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            discovery_port: env_parse("DISCOVERY_PORT").unwrap_or(defaults.discovery_port),
            message_interval: env_millis("DISCOVERY_MESSAGE_INTERVAL")
                .unwrap_or(defaults.message_interval),
            message_timeout: env_millis("DISCOVERY_MESSAGE_TIMEOUT")
                .unwrap_or(defaults.message_timeout),
            preelection_timeout: env_millis("DISCOVERY_PREELECTION_TIMEOUT")
                .unwrap_or(defaults.preelection_timeout),
            address: env_parse("DISCOVERY_ADDRESS"),
            netmask: env_parse("DISCOVERY_NETMASK").unwrap_or(defaults.netmask),
            gateway_port: env_parse("GATEWAY_PORT").unwrap_or(defaults.gateway_port),
            broker_port: env_parse("BROKER_PORT").unwrap_or(defaults.broker_port),
            storage_path: std::env::var("STORAGE_PATH")
                .ok()
                .map(PathBuf::from)
                .or(defaults.storage_path),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
