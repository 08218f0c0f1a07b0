pub mod nameserver;
pub mod net;
pub mod types;
