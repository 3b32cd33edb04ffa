//! Realtime listener port selection.
//!
//! The realtime port is not fixed: if the preferred port is taken the next
//! ones are tried, and as a last resort the OS picks one. Clients learn the
//! bound port through `GET /api/v1/realtime` on the main HTTP listener.

use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;

/// Width of the port range scanned above the preferred port.
pub const PORT_SCAN_RANGE: u16 = 100;

/// Bind the first free port starting at `start`.
///
/// Tries at most `attempts` consecutive ports, never more than
/// [`PORT_SCAN_RANGE`] above `start`, then falls back to port 0. Only a
/// failure of the fallback is returned as an error.
pub async fn bind_with_fallback(host: IpAddr, start: u16, attempts: u16) -> io::Result<TcpListener> {
    for port in candidate_ports(start, attempts) {
        match TcpListener::bind(SocketAddr::new(host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                tracing::warn!(port, error = %e, "Realtime port unavailable, trying next");
            }
        }
    }

    tracing::warn!(start, attempts, "No port free in scan range, using an OS-assigned port");
    TcpListener::bind(SocketAddr::new(host, 0)).await
}

/// Ports tried before the OS fallback, in order.
pub fn candidate_ports(start: u16, attempts: u16) -> impl Iterator<Item = u16> {
    let limit = attempts.min(PORT_SCAN_RANGE);
    (0..limit).map_while(move |offset| start.checked_add(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn candidates_are_consecutive_and_bounded() {
        let ports: Vec<u16> = candidate_ports(8080, 3).collect();
        assert_eq!(ports, [8080, 8081, 8082]);

        assert_eq!(candidate_ports(8080, 500).count(), usize::from(PORT_SCAN_RANGE));
        assert_eq!(candidate_ports(u16::MAX - 1, 30).count(), 2);
    }

    #[tokio::test]
    async fn occupied_port_is_skipped() {
        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let taken = TcpListener::bind(SocketAddr::new(host, 0)).await.unwrap();
        let taken_port = taken.local_addr().unwrap().port();

        let listener = bind_with_fallback(host, taken_port, 1).await.unwrap();

        assert_ne!(listener.local_addr().unwrap().port(), taken_port);
    }
}
