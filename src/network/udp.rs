//! UDP socket setup and remote peer tracking

use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

use crate::config::NetworkConfig;
use crate::error::NetworkError;

/// Create a non-blocking UDP socket tuned for RTP and hand it to tokio.
///
/// Must be called from within a tokio runtime.
pub fn bind_socket(config: &NetworkConfig) -> Result<UdpSocket, NetworkError> {
    let addr = config.bind_addr();

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(NetworkError::SocketOption)?;

    socket.set_reuse_address(true).map_err(NetworkError::SocketOption)?;

    // The kernel may clamp these; a smaller buffer is not fatal
    if let Err(e) = socket.set_recv_buffer_size(config.recv_buffer_size) {
        tracing::warn!(size = config.recv_buffer_size, "Failed to set receive buffer size: {}", e);
    }
    if let Err(e) = socket.set_send_buffer_size(config.send_buffer_size) {
        tracing::warn!(size = config.send_buffer_size, "Failed to set send buffer size: {}", e);
    }

    socket.set_nonblocking(true).map_err(NetworkError::SocketOption)?;
    socket
        .bind(&addr.into())
        .map_err(|source| NetworkError::BindFailed { addr, source })?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(NetworkError::SocketOption)
}

/// Where outbound RTP goes.
///
/// Either fixed by configuration, or latched from the source address of the
/// first valid inbound packet (symmetric RTP). Once set it does not move.
#[derive(Debug, Clone, Default)]
pub struct RemotePeer {
    addr: Arc<RwLock<Option<SocketAddr>>>,
}

impl RemotePeer {
    pub fn new(configured: Option<SocketAddr>) -> Self {
        Self {
            addr: Arc::new(RwLock::new(configured)),
        }
    }

    pub fn get(&self) -> Option<SocketAddr> {
        *self.addr.read()
    }

    /// Record `from` as the peer if none is known yet. Returns true if it was
    /// latched by this call.
    pub fn latch(&self, from: SocketAddr) -> bool {
        if self.addr.read().is_some() {
            return false;
        }
        let mut addr = self.addr.write();
        if addr.is_some() {
            return false;
        }
        *addr = Some(from);
        true
    }
}
