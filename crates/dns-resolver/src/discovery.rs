use std::net::{Ipv4Addr, SocketAddr};

/// Finds the servers a resolution starts from: the root servers for
/// iterative resolution, or the upstream nameservers for forwarding.
///
/// This is consulted once at the start of every resolution which is
/// not answered from the cache.
pub trait ServerDiscovery: Send + Sync {
    fn list_servers(&self) -> Vec<SocketAddr>;
}

/// A fixed list of servers.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StaticServers {
    servers: Vec<SocketAddr>,
}

impl StaticServers {
    pub fn new(servers: Vec<SocketAddr>) -> Self {
        Self { servers }
    }
}

impl ServerDiscovery for StaticServers {
    fn list_servers(&self) -> Vec<SocketAddr> {
        self.servers.clone()
    }
}

/// The IPv4 addresses of `a.root-servers.net` to `m.root-servers.net`.
pub const ROOT_HINTS: [Ipv4Addr; 13] = [
    Ipv4Addr::new(198, 41, 0, 4),
    Ipv4Addr::new(199, 9, 14, 201),
    Ipv4Addr::new(192, 33, 4, 12),
    Ipv4Addr::new(199, 7, 91, 13),
    Ipv4Addr::new(192, 203, 230, 10),
    Ipv4Addr::new(192, 5, 5, 241),
    Ipv4Addr::new(192, 112, 36, 4),
    Ipv4Addr::new(198, 97, 190, 53),
    Ipv4Addr::new(192, 36, 148, 17),
    Ipv4Addr::new(192, 58, 128, 30),
    Ipv4Addr::new(193, 0, 14, 129),
    Ipv4Addr::new(199, 7, 83, 42),
    Ipv4Addr::new(202, 12, 27, 33),
];

/// The root servers, on port 53.
pub fn root_hints() -> StaticServers {
    StaticServers::new(
        ROOT_HINTS
            .iter()
            .map(|ip| SocketAddr::from((*ip, 53)))
            .collect(),
    )
}
