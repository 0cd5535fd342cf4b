use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tonic::async_trait;
use tracing::trace;

use super::Notifier;
use super::PushPayload;
use super::SilenceWindow;
use crate::PushError;
use crate::Result;

/// UDP socket shared by every datagram notifier, bound on first use
#[derive(Debug)]
pub struct DatagramSender {
    bind_addr: SocketAddr,
    socket: OnceCell<UdpSocket>,
}

impl Default for DatagramSender {
    fn default() -> Self {
        Self::with_bind_addr(SocketAddr::from(([0, 0, 0, 0], 0)))
    }
}

impl DatagramSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            socket: OnceCell::new(),
        }
    }

    async fn socket(&self) -> std::result::Result<&UdpSocket, PushError> {
        let socket = self.socket.get_or_try_init(|| UdpSocket::bind(self.bind_addr)).await?;
        Ok(socket)
    }

    pub async fn send_to(
        &self,
        bytes: &[u8],
        target: SocketAddr,
    ) -> std::result::Result<usize, PushError> {
        let socket = self.socket().await?;
        Ok(socket.send_to(bytes, target).await?)
    }

    /// Local address once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.get().and_then(|s| s.local_addr().ok())
    }
}

/// Pushes to a 1.x client's UDP listener. The client proves it is alive only
/// by re-subscribing, so a notifier not refreshed within the silence window
/// is a zombie.
pub struct DatagramNotifier {
    sender: Arc<DatagramSender>,
    target: SocketAddr,
    silence: SilenceWindow,
}

impl DatagramNotifier {
    pub fn new(
        sender: Arc<DatagramSender>,
        target: SocketAddr,
        silence_window: Duration,
    ) -> Self {
        Self {
            sender,
            target,
            silence: SilenceWindow::new(silence_window),
        }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl Notifier for DatagramNotifier {
    async fn notify(
        &self,
        payload: &PushPayload,
    ) -> Result<()> {
        let bytes = payload.wire_bytes();
        let sent = self.sender.send_to(bytes, self.target).await?;
        trace!(
            target_addr = %self.target,
            key = %payload.key,
            sent,
            compressed = payload.is_compressed(),
            "datagram push sent"
        );
        Ok(())
    }

    fn is_zombie(&self) -> bool {
        self.silence.exceeded()
    }

    fn refresh(&self) {
        self.silence.touch();
    }

    fn close(&self) {}
}
