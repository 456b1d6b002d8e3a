//! Rcode-keyed alternate-upstream dispatcher.
//!
//! Some deployments want a different upstream to handle, say, every
//! SERVFAIL the primary group produces, retrying against a completely
//! separate resolver keyed off the rcode the primary produced.
//! `AlternateRule.original` picks which query the alternate handler
//! receives: the pre-mutation query as the pipeline first saw it
//! (`true`), or the query as it stands at the point of dispatch
//! (`false`).

use std::collections::HashMap;
use std::net::SocketAddr;

use hickory_server::proto::op::ResponseCode;

use crate::config::AlternateRule;
use crate::error::app::AppError;
use crate::upstream::UpstreamClient;

#[derive(Debug, Clone, Copy)]
pub struct Alternate {
    pub address: SocketAddr,
    pub use_original_query: bool,
}

#[derive(Default)]
pub struct AlternateDispatcher {
    by_rcode: HashMap<ResponseCode, Alternate>,
    clients: HashMap<SocketAddr, UpstreamClient>,
}

impl AlternateDispatcher {
    /// Parse config-level rules. Fails if two rules target the same rcode
    /// (`ServerConfig::validate` already enforces this earlier, but the
    /// dispatcher re-checks so it can be built standalone too) or if an
    /// rcode name isn't recognized.
    pub fn build(rules: &[AlternateRule]) -> Result<Self, AppError> {
        let mut by_rcode = HashMap::new();
        let mut clients = HashMap::new();
        for rule in rules {
            let rcode = parse_rcode(&rule.rcode)?;
            if by_rcode
                .insert(
                    rcode,
                    Alternate { address: rule.address, use_original_query: rule.original },
                )
                .is_some()
            {
                return Err(AppError::Malformed(format!("duplicate alternate rule for rcode {}", rule.rcode)));
            }
            clients.entry(rule.address).or_insert_with(|| UpstreamClient::new(rule.address));
        }
        Ok(Self { by_rcode, clients })
    }

    pub fn for_rcode(&self, rcode: ResponseCode) -> Option<Alternate> {
        self.by_rcode.get(&rcode).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rcode.is_empty()
    }

    /// The pre-built client for an alternate's address. Panics if `address`
    /// was not part of the rule set this dispatcher was built from.
    pub fn client_for(&self, address: SocketAddr) -> &UpstreamClient {
        self.clients.get(&address).expect("alternate address not registered with a client")
    }
}

fn parse_rcode(name: &str) -> Result<ResponseCode, AppError> {
    match name.to_ascii_uppercase().as_str() {
        "NOERROR" => Ok(ResponseCode::NoError),
        "FORMERR" => Ok(ResponseCode::FormErr),
        "SERVFAIL" => Ok(ResponseCode::ServFail),
        "NXDOMAIN" => Ok(ResponseCode::NXDomain),
        "NOTIMP" | "NOTIMPL" => Ok(ResponseCode::NotImp),
        "REFUSED" => Ok(ResponseCode::Refused),
        other => Err(AppError::Malformed(format!("unrecognized rcode name: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(rcode: &str, addr: &str, original: bool) -> AlternateRule {
        AlternateRule { rcode: rcode.to_string(), address: addr.parse().unwrap(), original }
    }

    #[test]
    fn looks_up_alternate_by_rcode() {
        let dispatcher =
            AlternateDispatcher::build(&[rule("SERVFAIL", "192.0.2.1:53", true)]).unwrap();
        let alt = dispatcher.for_rcode(ResponseCode::ServFail).unwrap();
        assert_eq!(alt.address, "192.0.2.1:53".parse().unwrap());
        assert!(alt.use_original_query);
    }

    #[test]
    fn rcode_with_no_rule_returns_none() {
        let dispatcher = AlternateDispatcher::build(&[]).unwrap();
        assert!(dispatcher.for_rcode(ResponseCode::NXDomain).is_none());
    }

    #[test]
    fn duplicate_rcode_rejected_at_build_time() {
        let rules = [rule("SERVFAIL", "192.0.2.1:53", true), rule("servfail", "192.0.2.2:53", false)];
        assert!(AlternateDispatcher::build(&rules).is_err());
    }

    #[test]
    fn unrecognized_rcode_name_rejected() {
        let rules = [rule("BOGUS", "192.0.2.1:53", true)];
        assert!(AlternateDispatcher::build(&rules).is_err());
    }
}
