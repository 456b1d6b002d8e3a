//! Single-upstream transport: UDP first, TCP retry on truncation.

use std::net::SocketAddr;
use std::time::Duration;

use hickory_server::proto::op::Message as WireMessage;
use hickory_server::proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UdpSocket;

use crate::message::Message;
use crate::upstream::pool::ConnectionPool;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
/// A DNS reply shorter than a bare header-plus-question has nothing a
/// resolver could act on.
const MIN_REPLY_LEN: usize = 17;

#[derive(Debug)]
pub enum UpstreamError {
    Timeout,
    Io(String),
    MalformedReply(String),
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "upstream query timed out"),
            Self::Io(msg) => write!(f, "upstream i/o error: {msg}"),
            Self::MalformedReply(msg) => write!(f, "malformed upstream reply: {msg}"),
        }
    }
}

impl std::error::Error for UpstreamError {}

impl From<std::io::Error> for UpstreamError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

pub struct UpstreamClient {
    pub addr: SocketAddr,
    pool: ConnectionPool,
    read_timeout: Duration,
    pub queries_total: std::sync::atomic::AtomicU64,
    pub tcp_retries_total: std::sync::atomic::AtomicU64,
    pub failures_total: std::sync::atomic::AtomicU64,
}

impl UpstreamClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_timeouts(addr, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    pub fn with_timeouts(addr: SocketAddr, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            addr,
            pool: ConnectionPool::new(addr, connect_timeout),
            read_timeout,
            queries_total: std::sync::atomic::AtomicU64::new(0),
            tcp_retries_total: std::sync::atomic::AtomicU64::new(0),
            failures_total: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub async fn query(&self, message: &Message) -> Result<Message, UpstreamError> {
        use std::sync::atomic::Ordering;
        self.queries_total.fetch_add(1, Ordering::Relaxed);

        let result = self.query_udp(message).await;
        let reply = match result {
            Ok(reply) if reply.truncated => {
                self.tcp_retries_total.fetch_add(1, Ordering::Relaxed);
                self.query_tcp(message).await
            }
            other => other,
        };

        if reply.is_err() {
            self.failures_total.fetch_add(1, Ordering::Relaxed);
        }
        reply
    }

    async fn query_udp(&self, message: &Message) -> Result<Message, UpstreamError> {
        let wire = message.to_wire().to_bytes().map_err(|e| UpstreamError::Io(e.to_string()))?;

        let bind_addr: SocketAddr = if self.addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" }
            .parse()
            .unwrap();
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.addr).await?;
        socket.send(&wire).await?;

        let mut buf = [0u8; 4096];
        let len = tokio::time::timeout(self.read_timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| UpstreamError::Timeout)??;

        decode_reply(message.id, &buf[..len])
    }

    async fn query_tcp(&self, message: &Message) -> Result<Message, UpstreamError> {
        let wire = message.to_wire().to_bytes().map_err(|e| UpstreamError::Io(e.to_string()))?;
        let mut stream = self.pool.checkout().await?;

        let result: Result<Message, UpstreamError> = async {
            let framed = write_tcp_frame(&mut stream, &wire);
            tokio::time::timeout(self.read_timeout, framed).await.map_err(|_| UpstreamError::Timeout)??;

            let reply = tokio::time::timeout(self.read_timeout, read_tcp_frame(&mut stream))
                .await
                .map_err(|_| UpstreamError::Timeout)??;
            decode_reply(message.id, &reply)
        }
        .await;

        if result.is_ok() {
            self.pool.checkin(stream).await;
        }
        result
    }
}

async fn write_tcp_frame(stream: &mut tokio::net::TcpStream, wire: &[u8]) -> std::io::Result<()> {
    let len = u16::try_from(wire.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "message too large for TCP framing"))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(wire).await?;
    stream.flush().await
}

async fn read_tcp_frame(stream: &mut tokio::net::TcpStream) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(body)
}

fn decode_reply(query_id: u16, bytes: &[u8]) -> Result<Message, UpstreamError> {
    if bytes.len() < MIN_REPLY_LEN {
        return Err(UpstreamError::MalformedReply(format!(
            "reply of {} bytes is below the {MIN_REPLY_LEN}-byte minimum",
            bytes.len()
        )));
    }
    let wire = WireMessage::from_bytes(bytes)
        .map_err(|e| UpstreamError::MalformedReply(e.to_string()))?;
    if wire.id() != query_id {
        return Err(UpstreamError::MalformedReply(format!(
            "reply id {} did not match query id {query_id}",
            wire.id()
        )));
    }
    Ok(Message::from_wire(&wire))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_reply_is_rejected() {
        let err = decode_reply(1, &[0u8; 10]);
        assert!(matches!(err, Err(UpstreamError::MalformedReply(_))));
    }

    #[test]
    fn mismatched_transaction_id_is_rejected() {
        let mut msg = WireMessage::new();
        msg.set_id(7);
        let bytes = msg.to_bytes().unwrap();
        let padded = {
            let mut v = bytes;
            v.resize(MIN_REPLY_LEN, 0);
            v
        };
        let err = decode_reply(99, &padded);
        assert!(matches!(err, Err(UpstreamError::MalformedReply(_))));
    }
}
