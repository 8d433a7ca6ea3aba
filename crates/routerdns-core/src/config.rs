//! Configuration types for the router DNS updater
//!
//! [`RouterConfig`] is built once at startup and never mutated afterwards;
//! the scheduler and workflow share it read-only.

use crate::error::{Error, Result};
use crate::validator;
use std::net::IpAddr;
use std::time::Duration;
use tracing::info;

/// Router management URL
pub const KEY_ROUTER_URL: &str = "router_url";
/// Router login user name
pub const KEY_USER_NAME: &str = "user_name";
/// Router login password
pub const KEY_PASSWORD: &str = "password";
/// Primary IPv4 DNS server
pub const KEY_IPV4_DNS_SERVER1: &str = "ipv4_dns_server1";
/// Secondary IPv4 DNS server
pub const KEY_IPV4_DNS_SERVER2: &str = "ipv4_dns_server2";
/// Primary IPv6 DNS server
pub const KEY_IPV6_DNS_SERVER1: &str = "ipv6_dns_server1";
/// Secondary IPv6 DNS server
pub const KEY_IPV6_DNS_SERVER2: &str = "ipv6_dns_server2";
/// Seconds between update cycles
pub const KEY_UPDATE_INTERVAL_TIME: &str = "update_interval_time";

/// Every required key, in the order they are reported when missing
pub const REQUIRED_KEYS: [&str; 8] = [
    KEY_ROUTER_URL,
    KEY_USER_NAME,
    KEY_PASSWORD,
    KEY_IPV4_DNS_SERVER1,
    KEY_IPV4_DNS_SERVER2,
    KEY_IPV6_DNS_SERVER1,
    KEY_IPV6_DNS_SERVER2,
    KEY_UPDATE_INTERVAL_TIME,
];

/// The four DNS servers pushed to the router, already validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsServers {
    /// Primary server for the LAN IPv4 page
    pub ipv4_primary: IpAddr,
    /// Secondary server for the LAN IPv4 page
    pub ipv4_secondary: IpAddr,
    /// Primary server for the LAN IPv6 page
    pub ipv6_primary: IpAddr,
    /// Secondary server for the LAN IPv6 page
    pub ipv6_secondary: IpAddr,
}

/// Router settings for the update workflow
#[derive(Clone)]
pub struct RouterConfig {
    router_url: String,
    username: String,
    /// ⚠️ NEVER log this value
    password: String,
    dns: DnsServers,
    interval: Duration,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterConfig")
            .field("router_url", &self.router_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("dns", &self.dns)
            .field("interval", &self.interval)
            .finish()
    }
}

impl RouterConfig {
    /// Create a configuration from already-parsed values
    ///
    /// The URL must use an http(s) scheme; a trailing `/` is dropped so
    /// paths can be appended directly. The interval must be non-zero.
    pub fn new(
        router_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        dns: DnsServers,
        interval: Duration,
    ) -> Result<Self> {
        let router_url = router_url.into();
        if !router_url.starts_with("http://") && !router_url.starts_with("https://") {
            return Err(Error::config_invalid(format!(
                "{} must use an http:// or https:// scheme. Got: {}",
                KEY_ROUTER_URL, router_url
            )));
        }

        if interval.is_zero() {
            return Err(Error::config_invalid(format!(
                "{} must be a positive number of seconds",
                KEY_UPDATE_INTERVAL_TIME
            )));
        }

        Ok(Self {
            router_url: router_url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            dns,
            interval,
        })
    }

    /// Load the configuration through a key lookup (usually the environment)
    ///
    /// Checks run in a fixed order: missing keys first (all reported
    /// together), then the interval, then the DNS address literals.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| value(*key).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(Error::config_missing(format!(
                "required settings not set: {}. Required: {}",
                missing.join(", "),
                REQUIRED_KEYS.join(", ")
            )));
        }

        let get = |key: &str| value(key).unwrap_or_default();

        let interval_raw = get(KEY_UPDATE_INTERVAL_TIME);
        let interval_secs: u64 = interval_raw.trim().parse().map_err(|_| {
            Error::config_invalid(format!(
                "{} must be a positive integer number of seconds. Got: {}",
                KEY_UPDATE_INTERVAL_TIME, interval_raw
            ))
        })?;

        let dns = validator::validate_dns_servers(
            &get(KEY_IPV4_DNS_SERVER1),
            &get(KEY_IPV4_DNS_SERVER2),
            &get(KEY_IPV6_DNS_SERVER1),
            &get(KEY_IPV6_DNS_SERVER2),
        )?;

        Self::new(
            get(KEY_ROUTER_URL),
            get(KEY_USER_NAME),
            get(KEY_PASSWORD),
            dns,
            Duration::from_secs(interval_secs),
        )
    }

    /// Router management base URL (no trailing slash)
    pub fn router_url(&self) -> &str {
        &self.router_url
    }

    /// Login user name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Login password
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Validated DNS servers
    pub fn dns(&self) -> &DnsServers {
        &self.dns
    }

    /// Time between the end of one cycle and the start of the next
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Log the effective settings (password excluded)
    pub fn log_summary(&self) {
        let secs = self.interval.as_secs();
        info!("Router URL: {}", self.router_url);
        info!("Username: {}", self.username);
        info!("IPv4 DNS Server 1: {}", self.dns.ipv4_primary);
        info!("IPv4 DNS Server 2: {}", self.dns.ipv4_secondary);
        info!("IPv6 DNS Server 1: {}", self.dns.ipv6_primary);
        info!("IPv6 DNS Server 2: {}", self.dns.ipv6_secondary);
        info!(
            "Update interval: {} seconds ({:.2} hours)",
            secs,
            secs as f64 / 3600.0
        );
    }
}

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Normal wait between cycles
    pub interval: Duration,

    /// Wait after an unclassified fault, shorter than `interval`
    pub fault_backoff: Duration,

    /// Capacity of the scheduler event channel
    ///
    /// When full, new events are dropped with a warning log.
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Create scheduler settings for the given cycle interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            fault_backoff: default_fault_backoff(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the fault backoff
    pub fn with_fault_backoff(mut self, fault_backoff: Duration) -> Self {
        self.fault_backoff = fault_backoff;
        self
    }

    /// Set the event channel capacity
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Backoff actually applied after a fault
    ///
    /// Always shorter than the normal interval: a configured backoff that
    /// is not falls back to half the interval.
    pub fn effective_fault_backoff(&self) -> Duration {
        if self.fault_backoff < self.interval {
            self.fault_backoff
        } else {
            self.interval / 2
        }
    }
}

fn default_fault_backoff() -> Duration {
    Duration::from_secs(60)
}

fn default_event_channel_capacity() -> usize {
    100
}
