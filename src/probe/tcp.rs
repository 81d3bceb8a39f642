use std::time::Duration;

use log::debug;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;

use super::Transport;
use crate::error::{ResolverError, Result};
use crate::types::ConnectivityState;

/// Opens a single TCP connection and reports when the peer goes away.
///
/// There is no reconnect: once the connection fails or closes the
/// transport reports `TransientFailure` and stops.
pub struct TcpTransport {
    address: String,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(address: &str, connect_timeout: Duration) -> Result<Self> {
        validate_address(address)?;
        Ok(Self {
            address: address.to_string(),
            connect_timeout,
        })
    }
}

impl Transport for TcpTransport {
    fn open(&self) -> mpsc::UnboundedReceiver<ConnectivityState> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(self.address.clone(), self.connect_timeout, tx));
        rx
    }
}

async fn drive(
    address: String,
    connect_timeout: Duration,
    tx: mpsc::UnboundedSender<ConnectivityState>,
) {
    let _ = tx.send(ConnectivityState::Idle);
    let _ = tx.send(ConnectivityState::Connecting);

    let connected = tokio::select! {
        connected = time::timeout(connect_timeout, TcpStream::connect(address.as_str())) => connected,
        _ = tx.closed() => return,
    };

    let mut stream = match connected {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            debug!("Connection to {} failed: {}", address, e);
            let _ = tx.send(ConnectivityState::TransientFailure);
            return;
        }
        Err(_) => {
            debug!("Connection to {} timed out", address);
            let _ = tx.send(ConnectivityState::TransientFailure);
            return;
        }
    };
    let _ = tx.send(ConnectivityState::Ready);

    // Whatever the peer sends is discarded, only EOF and errors matter.
    let mut buf = [0u8; 1024];
    loop {
        tokio::select! {
            read = stream.read(&mut buf) => match read {
                Ok(0) => {
                    debug!("{} closed the connection", address);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!("Connection to {} broke: {}", address, e);
                    break;
                }
            },
            _ = tx.closed() => return,
        }
    }

    let _ = tx.send(ConnectivityState::TransientFailure);
}

fn validate_address(address: &str) -> Result<()> {
    let invalid = |reason: &str| ResolverError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    let host = match host.strip_prefix('[') {
        Some(bracketed) => bracketed
            .strip_suffix(']')
            .ok_or_else(|| invalid("unterminated IPv6 host"))?,
        None if host.contains(':') => return Err(invalid("IPv6 host must be bracketed")),
        None => host,
    };
    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    Ok(())
}
