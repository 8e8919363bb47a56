// Client address resolution

use crate::HttpRequest;

/// Header set by proxies with the chain of client addresses.
pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";
/// Header set by proxies with the original client address.
pub const X_REAL_IP: &str = "X-Real-IP";

/// Best guess at the originating client address.
///
/// Uses the first `X-Forwarded-For` entry, then `X-Real-IP`, then the socket
/// peer. Returns `None` when none of them is available.
pub fn client_ip(req: &HttpRequest) -> Option<String> {
    if let Some(forwarded) = req.header(X_FORWARDED_FOR).filter(|v| !v.trim().is_empty()) {
        let first = forwarded.split(',').next().unwrap_or(forwarded).trim();
        return Some(first.to_string());
    }
    if let Some(real) = req.header(X_REAL_IP).filter(|v| !v.trim().is_empty()) {
        return Some(real.trim().to_string());
    }
    remote_ip(req)
}

/// IP of the socket peer, without the port.
pub fn remote_ip(req: &HttpRequest) -> Option<String> {
    req.remote_addr.map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn peer() -> SocketAddr {
        "192.0.2.10:54321".parse().unwrap()
    }

    #[test]
    fn test_forwarded_for_wins() {
        let req = HttpRequest::new("GET", "/")
            .with_remote_addr(peer())
            .with_header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .with_header("X-Real-IP", "198.51.100.2");
        assert_eq!(client_ip(&req).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_real_ip_then_peer() {
        let req = HttpRequest::new("GET", "/")
            .with_remote_addr(peer())
            .with_header("X-Real-IP", "198.51.100.2");
        assert_eq!(client_ip(&req).as_deref(), Some("198.51.100.2"));

        let req = HttpRequest::new("GET", "/").with_remote_addr(peer());
        assert_eq!(client_ip(&req).as_deref(), Some("192.0.2.10"));
    }

    #[test]
    fn test_ipv6_peer_has_no_port() {
        let req = HttpRequest::new("GET", "/").with_remote_addr("[2001:db8::1]:8080".parse().unwrap());
        assert_eq!(remote_ip(&req).as_deref(), Some("2001:db8::1"));
    }

    #[test]
    fn test_nothing_known() {
        assert!(client_ip(&HttpRequest::new("GET", "/")).is_none());
    }
}
