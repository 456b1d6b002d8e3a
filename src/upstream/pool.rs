//! LIFO connection pool for the TCP transport to a single upstream address.
//!
//! Connections are pushed back onto a stack rather than a queue: the most
//! recently used connection is handed out first, so under light load a
//! single warm connection does all the work and the rest age out. Idle
//! connections older than 30 seconds are dropped rather than reused, since
//! most recursive resolvers close idle TCP sessions well before that.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::Mutex;

const IDLE_LIMIT: Duration = Duration::from_secs(30);

struct Idle {
    stream: TcpStream,
    since: Instant,
}

pub struct ConnectionPool {
    addr: SocketAddr,
    connect_timeout: Duration,
    idle: Mutex<Vec<Idle>>,
}

impl ConnectionPool {
    pub fn new(addr: SocketAddr, connect_timeout: Duration) -> Self {
        Self { addr, connect_timeout, idle: Mutex::new(Vec::new()) }
    }

    /// Pop the most recently returned connection, if any is still fresh;
    /// otherwise dial a new one within `connect_timeout`.
    pub async fn checkout(&self) -> std::io::Result<TcpStream> {
        let now = Instant::now();
        {
            let mut idle = self.idle.lock().await;
            while let Some(conn) = idle.pop() {
                if now.saturating_duration_since(conn.since) < IDLE_LIMIT {
                    return Ok(conn.stream);
                }
            }
        }

        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.addr)).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect to {} timed out", self.addr),
            )),
        }
    }

    /// Return a still-usable connection to the pool for reuse.
    pub async fn checkin(&self, stream: TcpStream) {
        let mut idle = self.idle.lock().await;
        idle.push(Idle { stream, since: Instant::now() });
    }

    pub async fn len(&self) -> usize {
        self.idle.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_limit_is_thirty_seconds() {
        assert_eq!(IDLE_LIMIT, Duration::from_secs(30));
    }
}
