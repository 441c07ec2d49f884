use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::OnceLock;

/// Facts about the host that every log entry carries.
///
/// Resolved once per process on first use and shared afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentInfo {
    pub machine_name: String,
    pub machine_ip_address: String,
    pub user_name: String,
}

static ENVIRONMENT: OnceLock<EnvironmentInfo> = OnceLock::new();

/// The cached environment facts for this process.
pub fn current() -> &'static EnvironmentInfo {
    ENVIRONMENT.get_or_init(EnvironmentInfo::detect)
}

impl EnvironmentInfo {
    fn detect() -> Self {
        let machine_name = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let user_name = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            machine_name,
            machine_ip_address: detect_local_ip().to_string(),
            user_name,
        }
    }
}

/// Local address of the default route. Connecting a UDP socket only selects a
/// route; no packet leaves the host.
fn detect_local_ip() -> IpAddr {
    let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let Ok(socket) = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)) else {
        return loopback;
    };
    if socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1)).is_err() {
        return loopback;
    }
    socket
        .local_addr()
        .map(|addr| addr.ip())
        .ok()
        .filter(|ip| !ip.is_unspecified())
        .unwrap_or(loopback)
}
