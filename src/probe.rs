use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::catalog::ServiceCatalog;
use crate::types::PortResult;

/// One TCP connect attempt against `ip:port`, bounded by `timeout`.
///
/// The stream is dropped as soon as the handshake completes; nothing is sent
/// or read. Refused, timed out and any other socket failure all yield `None`.
pub async fn probe(
    catalog: &ServiceCatalog,
    ip: IpAddr,
    port: u16,
    timeout: Duration,
) -> Option<PortResult> {
    probe_with_cancel(catalog, ip, port, timeout, &CancellationToken::new()).await
}

/// Like [`probe`], but gives up immediately with `None` once `cancel` fires.
pub async fn probe_with_cancel(
    catalog: &ServiceCatalog,
    ip: IpAddr,
    port: u16,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Option<PortResult> {
    let addr = SocketAddr::new(ip, port);
    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => return None,
        res = time::timeout(timeout, TcpStream::connect(addr)) => res,
    };
    match connected {
        Ok(Ok(stream)) => {
            drop(stream);
            let entry = catalog.lookup(port);
            log::trace!("[probe] open: addr={addr} service={}", entry.name);
            Some(PortResult::open(port, entry))
        }
        Ok(Err(e)) => {
            log::trace!("[probe] closed: addr={addr} error={e}");
            None
        }
        Err(_) => {
            log::trace!("[probe] timeout: addr={addr}");
            None
        }
    }
}
