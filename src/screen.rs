// asset_proxy::screen
//
// Host screening.  A deliberately literal SSRF baseline: loopback names,
// mDNS `.local` names and the RFC 1918 IPv4 blocks written as dotted quads.
// Hostnames are never resolved, so a public name pointing at a private
// address passes; IPv6 unique-local and link-local literals pass too.

use std::net::Ipv4Addr;

/// Outcome of screening one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreeningVerdict {
    Allowed,
    ForbiddenLocalHost,
    ForbiddenPrivateRange,
    NotInAllowlist,
}

impl ScreeningVerdict {
    pub fn is_allowed(self) -> bool {
        self == ScreeningVerdict::Allowed
    }
}

const LOCAL_NAMES: &[&str] = &["localhost", "0.0.0.0", "::1"];

/// Classify `hostname` against the local/private rules.
///
/// Never returns `NotInAllowlist`; that verdict belongs to the allowlist.
pub fn screen_host(hostname: &str) -> ScreeningVerdict {
    let host = hostname.trim_end_matches('.').to_ascii_lowercase();

    if LOCAL_NAMES.contains(&host.as_str()) || host.ends_with(".local") {
        return ScreeningVerdict::ForbiddenLocalHost;
    }

    let Ok(ip) = host.parse::<Ipv4Addr>() else {
        return ScreeningVerdict::Allowed;
    };

    match ip.octets() {
        [127, ..] => ScreeningVerdict::ForbiddenLocalHost,
        [10, ..] => ScreeningVerdict::ForbiddenPrivateRange,
        [172, second, ..] if (16..=31).contains(&second) => {
            ScreeningVerdict::ForbiddenPrivateRange
        }
        [192, 168, ..] => ScreeningVerdict::ForbiddenPrivateRange,
        _ => ScreeningVerdict::Allowed,
    }
}

pub fn is_forbidden_host(hostname: &str) -> bool {
    !screen_host(hostname).is_allowed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_names_are_local() {
        for host in ["localhost", "LOCALHOST", "127.0.0.1", "127.8.9.10", "0.0.0.0", "::1"] {
            assert_eq!(screen_host(host), ScreeningVerdict::ForbiddenLocalHost, "{host}");
        }
    }

    #[test]
    fn mdns_suffix_is_local() {
        assert_eq!(screen_host("foo.local"), ScreeningVerdict::ForbiddenLocalHost);
        assert_eq!(screen_host("printer.Office.LOCAL"), ScreeningVerdict::ForbiddenLocalHost);
        assert!(!is_forbidden_host("local.example.com"));
    }

    #[test]
    fn trailing_dot_is_ignored() {
        assert!(is_forbidden_host("localhost."));
    }

    #[test]
    fn rfc1918_ranges() {
        for host in ["10.0.0.1", "10.255.255.255", "172.16.0.1", "172.31.255.1", "192.168.1.1"] {
            assert_eq!(screen_host(host), ScreeningVerdict::ForbiddenPrivateRange, "{host}");
        }
    }

    #[test]
    fn neighbours_of_private_ranges_pass() {
        for host in ["172.15.0.1", "172.32.0.1", "192.169.0.1", "11.0.0.1", "8.8.8.8"] {
            assert_eq!(screen_host(host), ScreeningVerdict::Allowed, "{host}");
        }
    }

    #[test]
    fn names_are_not_resolved() {
        assert!(!is_forbidden_host("example.com"));
        assert!(!is_forbidden_host("10.example.com"));
    }

    #[test]
    fn ipv6_private_ranges_are_not_screened() {
        assert!(!is_forbidden_host("fd00::1"));
        assert!(!is_forbidden_host("fe80::1"));
    }
}
