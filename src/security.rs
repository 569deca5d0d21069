use crate::error::PreviewError;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::net::lookup_host;
use tracing::debug;
use url::{Host, Url};

/// Configuration for the private-network guard.
#[derive(Debug, Clone)]
pub struct HostGuardConfig {
    /// Allowed URL schemes (default: ["http", "https"])
    pub allowed_schemes: HashSet<String>,
    /// Block URLs whose host resolves to a private/loopback/link-local
    /// address (default: true). Tests running against a loopback mock
    /// server turn this off.
    pub block_private_addresses: bool,
}

impl Default for HostGuardConfig {
    fn default() -> Self {
        let mut allowed_schemes = HashSet::new();
        allowed_schemes.insert("http".to_string());
        allowed_schemes.insert("https".to_string());

        Self {
            allowed_schemes,
            block_private_addresses: true,
        }
    }
}

/// Resolves hostnames and rejects URLs that point at internal
/// infrastructure before the fetcher opens a connection.
#[derive(Debug, Clone)]
pub struct HostGuard {
    config: HostGuardConfig,
}

impl Default for HostGuard {
    fn default() -> Self {
        Self::with_default_config()
    }
}

impl HostGuard {
    pub fn new(config: HostGuardConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(HostGuardConfig::default())
    }

    pub fn validate_scheme(&self, url: &Url) -> Result<(), PreviewError> {
        if !self.config.allowed_schemes.contains(url.scheme()) {
            return Err(PreviewError::InvalidProtocol(url.scheme().to_string()));
        }
        Ok(())
    }

    /// Resolves a hostname to every address it maps to, across address
    /// families.
    pub async fn resolve_host(host: &str) -> Result<Vec<IpAddr>, PreviewError> {
        let addrs = lookup_host((host, 80))
            .await
            .map_err(|e| PreviewError::DnsLookupFailed(e.to_string()))?;

        let ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
        if ips.is_empty() {
            return Err(PreviewError::DnsLookupFailed(format!(
                "no addresses for {host}"
            )));
        }
        Ok(ips)
    }

    /// Verifies that a URL's host does not land on a private network.
    ///
    /// IP-literal hosts are classified directly; hostnames are resolved and
    /// every returned address is checked, not just the first. The fetcher
    /// re-runs this on each redirect hop.
    pub async fn ensure_public(&self, url: &Url) -> Result<(), PreviewError> {
        if !self.config.block_private_addresses {
            return Ok(());
        }

        let host = url
            .host()
            .ok_or_else(|| PreviewError::FetchError("URL has no host".to_string()))?;

        match host {
            Host::Ipv4(ip) => Self::reject_private(IpAddr::V4(ip)),
            Host::Ipv6(ip) => Self::reject_private(IpAddr::V6(ip)),
            Host::Domain(name) => {
                let ips = Self::resolve_host(name).await?;
                debug!(host = %name, addresses = ips.len(), "Resolved host for guard check");
                for ip in ips {
                    Self::reject_private(ip)?;
                }
                Ok(())
            }
        }
    }

    fn reject_private(ip: IpAddr) -> Result<(), PreviewError> {
        if Self::is_private_address(&ip) {
            return Err(PreviewError::PrivateAddressBlocked(ip.to_string()));
        }
        Ok(())
    }

    /// Classifies an address as private/loopback/link-local/unique-local.
    pub fn is_private_address(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(ipv4) => Self::is_private_ipv4(ipv4),
            IpAddr::V6(ipv6) => Self::is_private_ipv6(ipv6),
        }
    }

    fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
        if ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified() {
            return true;
        }

        let octets = ip.octets();
        // 0.0.0.0/8
        octets[0] == 0
            // 100.64.0.0/10 (carrier-grade NAT)
            || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000)
            // 224.0.0.0/4 (multicast)
            || (octets[0] & 0b1111_0000) == 0b1110_0000
            // 240.0.0.0/4 (reserved)
            || (octets[0] & 0b1111_0000) == 0b1111_0000
    }

    fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
        if ip.is_loopback() || ip.is_unspecified() {
            return true;
        }

        // ::ffff:a.b.c.d inherits the embedded IPv4 classification
        if let Some(mapped) = ip.to_ipv4_mapped() {
            return Self::is_private_ipv4(&mapped);
        }

        let segments = ip.segments();
        // fe80::/10 (link-local)
        (segments[0] & 0xffc0) == 0xfe80
            // fc00::/7 (unique-local)
            || (segments[0] & 0xfe00) == 0xfc00
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private(addr: &str) -> bool {
        HostGuard::is_private_address(&addr.parse().unwrap())
    }

    #[test]
    fn test_scheme_allow_list() {
        let guard = HostGuard::with_default_config();

        assert!(guard
            .validate_scheme(&Url::parse("https://example.com").unwrap())
            .is_ok());
        assert!(guard
            .validate_scheme(&Url::parse("http://example.com").unwrap())
            .is_ok());
        assert!(matches!(
            guard.validate_scheme(&Url::parse("ftp://example.com").unwrap()),
            Err(PreviewError::InvalidProtocol(_))
        ));
        assert!(matches!(
            guard.validate_scheme(&Url::parse("file:///etc/passwd").unwrap()),
            Err(PreviewError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn test_private_ipv4_ranges() {
        for addr in [
            "127.0.0.1",
            "127.255.255.255",
            "10.0.0.1",
            "10.255.255.255",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.0.1",
            "192.168.255.255",
            "169.254.0.1",
            "100.64.0.1",
            "0.0.0.0",
        ] {
            assert!(private(addr), "{addr} should be private");
        }

        for addr in ["8.8.8.8", "1.1.1.1", "93.184.216.34", "172.32.0.1"] {
            assert!(!private(addr), "{addr} should be public");
        }
    }

    #[test]
    fn test_private_ipv6_ranges() {
        for addr in ["::1", "fe80::1", "fc00::1", "fd12:3456::1"] {
            assert!(private(addr), "{addr} should be private");
        }
        assert!(!private("2606:4700::1111"));
    }

    #[test]
    fn test_ipv4_mapped_ipv6() {
        assert!(private("::ffff:127.0.0.1"));
        assert!(private("::ffff:192.168.1.5"));
        assert!(!private("::ffff:8.8.8.8"));
    }

    #[tokio::test]
    async fn test_ensure_public_blocks_loopback_literal() {
        let guard = HostGuard::with_default_config();
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();

        assert!(matches!(
            guard.ensure_public(&url).await,
            Err(PreviewError::PrivateAddressBlocked(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_public_resolves_hostnames() {
        let guard = HostGuard::with_default_config();
        // localhost resolves to loopback on every resolver
        let url = Url::parse("http://localhost:8080/").unwrap();

        assert!(matches!(
            guard.ensure_public(&url).await,
            Err(PreviewError::PrivateAddressBlocked(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_public_can_be_disabled() {
        let guard = HostGuard::new(HostGuardConfig {
            block_private_addresses: false,
            ..HostGuardConfig::default()
        });
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();

        assert!(guard.ensure_public(&url).await.is_ok());
    }
}
