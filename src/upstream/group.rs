//! Primary-plus-fallback upstream group with optional health checking.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hickory_server::proto::op::ResponseCode;
use hickory_server::proto::rr::{DNSClass, Name, RecordType};

use crate::config::UpstreamGroupConfig;
use crate::message::Message;
use crate::upstream::proxy::{UpstreamClient, UpstreamError};

struct HealthState {
    unhealthy_until: Option<Instant>,
}

/// One primary resolver plus an ordered list of fallbacks, tried in order
/// whenever the previous one times out, errors, or returns SERVFAIL.
pub struct UpstreamGroup {
    clients: Vec<UpstreamClient>,
    health: Mutex<HashMap<SocketAddr, HealthState>>,
    health_check_template: String,
    health_check_backoff: Duration,
}

impl UpstreamGroup {
    pub fn new(config: &UpstreamGroupConfig) -> Self {
        let new_client = |addr| UpstreamClient::with_timeouts(addr, config.connect_timeout, config.read_timeout);
        let mut clients = vec![new_client(config.primary)];
        clients.extend(config.fallbacks.iter().map(|addr| new_client(*addr)));

        let mut health = HashMap::new();
        for client in &clients {
            health.insert(client.addr, HealthState { unhealthy_until: None });
        }

        Self {
            clients,
            health: Mutex::new(health),
            health_check_template: config.health_check_template.clone(),
            health_check_backoff: config.health_check_backoff,
        }
    }

    fn is_healthy(&self, addr: &SocketAddr, now: Instant) -> bool {
        match self.health.lock().unwrap().get(addr) {
            Some(HealthState { unhealthy_until: Some(until) }) => now >= *until,
            _ => true,
        }
    }

    fn mark_unhealthy(&self, addr: SocketAddr, now: Instant) {
        self.health
            .lock()
            .unwrap()
            .insert(addr, HealthState { unhealthy_until: Some(now + self.health_check_backoff) });
    }

    fn mark_healthy(&self, addr: SocketAddr) {
        self.health.lock().unwrap().insert(addr, HealthState { unhealthy_until: None });
    }

    /// Try the primary, then each fallback in order, skipping any upstream
    /// currently in its health-check backoff window. Returns the first
    /// non-SERVFAIL reply, or the last error/SERVFAIL seen if every
    /// upstream failed.
    pub async fn query(&self, message: &Message) -> Result<Message, UpstreamError> {
        let now = Instant::now();
        let mut last_err = None;
        let mut last_servfail = None;

        for client in &self.clients {
            if !self.is_healthy(&client.addr, now) {
                continue;
            }
            match client.query(message).await {
                Ok(reply) if reply.response_code == ResponseCode::ServFail => {
                    last_servfail = Some(reply);
                }
                Ok(reply) => {
                    self.mark_healthy(client.addr);
                    return Ok(reply);
                }
                Err(err) => {
                    self.mark_unhealthy(client.addr, now);
                    last_err = Some(err);
                }
            }
        }

        if let Some(reply) = last_servfail {
            return Ok(reply);
        }
        Err(last_err.unwrap_or(UpstreamError::Timeout))
    }

    /// Send one health-check query per upstream using the configured
    /// template name, with a random label substituted for `__TOKEN__` so
    /// caching resolvers in between can't mask an actual outage. Intended
    /// to be driven by a periodic task in the server's main loop.
    pub async fn run_health_checks(&self, random_token: &str) {
        let name_str = self.health_check_template.replace("__TOKEN__", random_token);
        let Ok(name) = name_str.parse::<Name>() else { return };

        let mut query = Message {
            id: 0,
            op_code: hickory_server::proto::op::OpCode::Query,
            message_type: hickory_server::proto::op::MessageType::Query,
            response_code: ResponseCode::NoError,
            truncated: false,
            authoritative: false,
            recursion_desired: true,
            recursion_available: false,
            authentic_data: false,
            checking_disabled: false,
            question: Some(crate::message::Question { name, qtype: RecordType::A, qclass: DNSClass::IN }),
            answers: vec![],
            name_servers: vec![],
            additionals: vec![],
            edns: None,
        };

        for client in &self.clients {
            query.id = rand_u16_from(random_token);
            match client.query(&query).await {
                Ok(_) => self.mark_healthy(client.addr),
                Err(_) => self.mark_unhealthy(client.addr, Instant::now()),
            }
        }
    }
}

fn rand_u16_from(token: &str) -> u16 {
    token.bytes().fold(0u16, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_with(primary: SocketAddr, fallbacks: Vec<SocketAddr>) -> UpstreamGroup {
        UpstreamGroup::new(&UpstreamGroupConfig {
            primary,
            fallbacks,
            connect_timeout: Duration::from_millis(50),
            read_timeout: Duration::from_millis(50),
            health_check_interval: None,
            health_check_template: "__TOKEN__.health.invalid.".to_string(),
            health_check_backoff: Duration::from_secs(1),
        })
    }

    #[test]
    fn new_group_starts_with_every_upstream_healthy() {
        let group = group_with("127.0.0.1:5300".parse().unwrap(), vec!["127.0.0.1:5301".parse().unwrap()]);
        let now = Instant::now();
        for client in &group.clients {
            assert!(group.is_healthy(&client.addr, now));
        }
    }

    #[test]
    fn marking_unhealthy_then_waiting_out_the_backoff_recovers() {
        let group = group_with("127.0.0.1:5300".parse().unwrap(), vec![]);
        let addr: SocketAddr = "127.0.0.1:5300".parse().unwrap();
        let now = Instant::now();
        group.mark_unhealthy(addr, now);
        assert!(!group.is_healthy(&addr, now));
        assert!(group.is_healthy(&addr, now + Duration::from_secs(2)));
    }
}
