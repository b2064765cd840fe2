// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Local port allocation.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};

/// Source of local TCP ports.
pub trait PortAllocator: Send + Sync {
    /// Returns a port expected to be free on the local host.
    fn allocate(&self) -> io::Result<u16>;
}

/// Asks the OS for an ephemeral port by binding port 0 and releasing it immediately.
///
/// Another process may grab the port between allocation and use; the engine then fails to
/// bind and the service reports a startup error.
#[derive(Debug, Clone, Copy)]
pub struct RandomPortAllocator {
    ip: IpAddr,
}

impl RandomPortAllocator {
    /// Allocates ports on the given interface.
    #[must_use]
    pub fn new(ip: IpAddr) -> Self {
        Self { ip }
    }
}

impl Default for RandomPortAllocator {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

impl PortAllocator for RandomPortAllocator {
    fn allocate(&self) -> io::Result<u16> {
        let listener = TcpListener::bind(SocketAddr::new(self.ip, 0))?;
        Ok(listener.local_addr()?.port())
    }
}

/// Always hands out the same port.
#[derive(Debug, Clone, Copy)]
pub struct FixedPortAllocator(pub u16);

impl PortAllocator for FixedPortAllocator {
    fn allocate(&self) -> io::Result<u16> {
        Ok(self.0)
    }
}
