//! DNS address validation
//!
//! Gate run once before the scheduler starts. Each configured server must be
//! a literal IPv4 or IPv6 address; nothing is resolved.

use crate::config::DnsServers;
use crate::error::{Error, Result};
use std::net::IpAddr;
use tracing::{error, info};

/// Parse a single address literal
///
/// Accepts dotted-quad IPv4 and RFC 4291 text IPv6 forms. Hostnames,
/// surrounding whitespace and scoped (`%iface`) addresses are rejected.
pub fn parse_literal(value: &str) -> std::result::Result<IpAddr, String> {
    value
        .parse::<IpAddr>()
        .map_err(|e| format!("'{}' is not an IP address literal ({})", value, e))
}

/// Validate the four configured DNS servers
///
/// Every value is checked before returning so the error names all of the
/// offending settings at once.
///
/// # Returns
///
/// - `Ok(DnsServers)`: all four parsed
/// - `Err(Error::ConfigurationInvalid)`: at least one did not
pub fn validate_dns_servers(
    ipv4_primary: &str,
    ipv4_secondary: &str,
    ipv6_primary: &str,
    ipv6_secondary: &str,
) -> Result<DnsServers> {
    let entries = [
        ("ipv4_dns_server1", ipv4_primary),
        ("ipv4_dns_server2", ipv4_secondary),
        ("ipv6_dns_server1", ipv6_primary),
        ("ipv6_dns_server2", ipv6_secondary),
    ];

    let mut parsed = Vec::with_capacity(entries.len());
    let mut failures = Vec::new();

    for (key, value) in entries {
        match parse_literal(value) {
            Ok(ip) => parsed.push(ip),
            Err(reason) => failures.push(format!("{}: {}", key, reason)),
        }
    }

    if !failures.is_empty() {
        let message = failures.join("; ");
        error!("DNS server addresses are not valid: {}", message);
        return Err(Error::config_invalid(message));
    }

    info!("DNS server addresses are in valid format");
    Ok(DnsServers {
        ipv4_primary: parsed[0],
        ipv4_secondary: parsed[1],
        ipv6_primary: parsed[2],
        ipv6_secondary: parsed[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ipv4_and_ipv6_literals() {
        let servers =
            validate_dns_servers("1.1.1.1", "1.0.0.1", "2606:4700:4700::1111", "::1").unwrap();

        assert_eq!(servers.ipv4_primary, "1.1.1.1".parse::<IpAddr>().unwrap());
        assert_eq!(servers.ipv4_secondary, "1.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(
            servers.ipv6_primary,
            "2606:4700:4700::1111".parse::<IpAddr>().unwrap()
        );
        assert!(servers.ipv6_secondary.is_ipv6());
    }

    #[test]
    fn rejects_out_of_range_octet() {
        let err = validate_dns_servers("999.1.1.1", "1.0.0.1", "::1", "::2").unwrap_err();
        assert!(matches!(err, Error::ConfigurationInvalid(_)));
        assert!(err.to_string().contains("ipv4_dns_server1"));
    }

    #[test]
    fn rejects_hostnames_without_resolving() {
        let err = validate_dns_servers("1.1.1.1", "1.0.0.1", "not-an-ip", "dns.google").unwrap_err();
        let message = err.to_string();

        assert!(message.contains("ipv6_dns_server1"));
        assert!(message.contains("ipv6_dns_server2"));
        assert!(!message.contains("ipv4_dns_server1"));
    }

    #[test]
    fn rejects_empty_and_padded_values() {
        assert!(parse_literal("").is_err());
        assert!(parse_literal(" 8.8.8.8").is_err());
        assert!(parse_literal("8.8.8.8 ").is_err());
    }

    #[test]
    fn validation_is_idempotent() {
        let first = validate_dns_servers("8.8.8.8", "8.8.4.4", "2001:4860:4860::8888", "2001:4860:4860::8844")
            .unwrap();
        let second = validate_dns_servers("8.8.8.8", "8.8.4.4", "2001:4860:4860::8888", "2001:4860:4860::8844")
            .unwrap();
        assert_eq!(first, second);
    }
}
