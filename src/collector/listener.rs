use std::sync::Arc;

use tokio::net::UdpSocket;

use super::store::CollectorStore;

/// Largest datagram the emitter will ever send, plus slack.
const RECV_BUFFER: usize = 2048;

/// Bind the mock collector. Split from `run` so callers learn the bound
/// address before the loop starts.
pub async fn bind(addr: &str) -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind(addr).await?;
    tracing::info!(addr = %socket.local_addr()?, "Mock StatsD collector listening");
    Ok(socket)
}

/// Receive datagrams forever, feeding every payload to the store.
pub async fn run(socket: UdpSocket, store: Arc<CollectorStore>) {
    let mut buf = vec![0u8; RECV_BUFFER];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, peer)) => {
                let payload = String::from_utf8_lossy(&buf[..n]);
                tracing::trace!(%peer, bytes = n, "Collector received datagram");
                store.record_datagram(&payload);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Collector receive failed");
            }
        }
    }
}
