//! Name-resolution overlay
//!
//! A lookup is a flooded request/response pair matched by a randomly drawn
//! response identifier. The request is sealed for the service (the node
//! resolving the names), the response for the requester; successful
//! decryption stands in for authenticity. Outstanding requests re-issue on
//! timeout under a fresh packet id, indefinitely — a give-up policy is the
//! caller's to impose via [`Node::cancel_resolve`].
//!
//! State machine per outstanding request:
//! `ISSUED -> (RESPONSE_RECEIVED | TIMED_OUT -> re-ISSUED) -> CANCELLED`

use std::collections::HashMap;

use tracing::{debug, warn};

use floodnet_core::{
    Address, FloodnetError, Packet, PacketKind, ResolveRequest, ResolveResponse, codec,
};

use crate::flood::Node;
use crate::timer::{TimerEvent, TimerToken};

/// An outstanding resolve request, kept until answered or cancelled
///
/// The stored fields reconstruct the request on timeout; only the packet
/// id is fresh on each re-issue, since the stale id may already sit in
/// downstream dedup caches.
#[derive(Debug, Clone)]
pub(crate) struct PendingRequest {
    pub service_key: Vec<u8>,
    pub names: Vec<String>,
    pub timer: TimerToken,
}

/// Resolver state composed into every node
#[derive(Debug, Clone, Default)]
pub(crate) struct Resolver {
    /// Outstanding requests keyed by response id
    pub pending: HashMap<Address, PendingRequest>,
    /// Names this node answers for (its host table)
    pub hosted: HashMap<String, Vec<u8>>,
}

impl Resolver {
    /// Is this address registered as awaiting a response?
    pub fn awaiting(&self, response_id: &Address) -> bool {
        self.pending.contains_key(response_id)
    }
}

impl Node {
    /// Register a name this node can resolve for others
    pub fn register_name(&mut self, name: impl Into<String>, key: Vec<u8>) {
        self.resolver.hosted.insert(name.into(), key);
    }

    /// Number of requests still outstanding
    pub fn outstanding_resolves(&self) -> usize {
        self.resolver.pending.len()
    }

    /// Issue a name lookup against the service holding `service_key`
    ///
    /// Floods a request addressed to `digest(service_key)` and arms the
    /// retry timer. Returns the response id, which also serves as the
    /// cancellation handle.
    pub fn resolve_names(
        &mut self,
        service_key: &[u8],
        names: Vec<String>,
    ) -> Result<Address, FloodnetError> {
        let response_id = Address::random(&mut self.rng);
        let packet = self.build_resolve_request(service_key, response_id, &names)?;
        self.enqueue_local(packet)?;

        let timer = self.timers.arm(
            self.clock,
            self.resolve_timeout,
            TimerEvent::ResolveRetry(response_id),
        );
        self.resolver.pending.insert(
            response_id,
            PendingRequest {
                service_key: service_key.to_vec(),
                names,
                timer,
            },
        );
        debug!(node = %self.display_name(), response_id = %response_id, "resolve issued");
        Ok(response_id)
    }

    /// Abandon an outstanding request; idempotent
    pub fn cancel_resolve(&mut self, response_id: Address) {
        if let Some(pending) = self.resolver.pending.remove(&response_id) {
            self.timers.cancel(pending.timer);
            debug!(node = %self.display_name(), response_id = %response_id, "resolve cancelled");
        }
    }

    fn build_resolve_request(
        &mut self,
        service_key: &[u8],
        response_id: Address,
        names: &[String],
    ) -> Result<Packet, FloodnetError> {
        let body = ResolveRequest {
            requester_key: self.keys.public.clone(),
            response_id,
            names: names.to_vec(),
        };
        let bytes = codec::encode(&body)?;
        let sealed = self.cipher.encrypt(service_key, &bytes);
        let packet = self.create_packet(
            PacketKind::Request {
                recipient: Address::for_key(service_key),
            },
            sealed,
        )?;
        Ok(packet)
    }

    /// Timeout path: re-issue the identical request under a fresh packet id
    pub(crate) fn retry_resolve(&mut self, response_id: Address) {
        // Cancelled or answered while the timer was in flight
        let Some(pending) = self.resolver.pending.get(&response_id) else {
            return;
        };
        let service_key = pending.service_key.clone();
        let names = pending.names.clone();

        match self.build_resolve_request(&service_key, response_id, &names) {
            Ok(packet) => {
                self.enqueue_or_warn(packet);
                self.stats.resolve_retries += 1;
                debug!(node = %self.display_name(), response_id = %response_id, "resolve re-issued");
            }
            Err(err) => {
                warn!(node = %self.display_name(), %err, "failed to rebuild resolve request");
            }
        }

        let timer = self.timers.arm(
            self.clock,
            self.resolve_timeout,
            TimerEvent::ResolveRetry(response_id),
        );
        if let Some(pending) = self.resolver.pending.get_mut(&response_id) {
            pending.timer = timer;
        }
    }

    /// Service side: answer a request addressed to this node
    pub(crate) fn handle_resolve_request(&mut self, packet: &Packet) {
        let plaintext = match self.cipher.decrypt(&self.keys.secret, &packet.payload) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                warn!(node = %self.display_name(), %err, "undecryptable resolve request");
                return;
            }
        };
        let request: ResolveRequest = match codec::decode(&plaintext) {
            Ok(request) => request,
            Err(err) => {
                warn!(node = %self.display_name(), %err, "malformed resolve request");
                return;
            }
        };

        // A miss is reported as absent, never fabricated
        let entries: Vec<(String, Option<Vec<u8>>)> = request
            .names
            .iter()
            .map(|name| (name.clone(), self.resolver.hosted.get(name).cloned()))
            .collect();
        for (name, key) in &entries {
            if key.is_none() {
                debug!(node = %self.display_name(), name, "requested name not hosted here");
            }
        }

        let body = ResolveResponse { entries };
        let bytes = match codec::encode(&body) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(node = %self.display_name(), %err, "failed to encode resolve response");
                return;
            }
        };
        let sealed = self.cipher.encrypt(&request.requester_key, &bytes);
        match self.create_packet(
            PacketKind::Response {
                recipient: request.response_id,
            },
            sealed,
        ) {
            Ok(response) => self.enqueue_or_warn(response),
            Err(err) => {
                warn!(node = %self.display_name(), %err, "resolve response exceeds packet bound");
            }
        }
    }

    /// Requester side: a response matched an outstanding response id
    pub(crate) fn handle_resolve_response(&mut self, response_id: Address, packet: &Packet) {
        let plaintext = match self.cipher.decrypt(&self.keys.secret, &packet.payload) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                // Authenticity failure; keep the request outstanding
                warn!(node = %self.display_name(), %err, "undecryptable resolve response");
                return;
            }
        };
        let response: ResolveResponse = match codec::decode(&plaintext) {
            Ok(response) => response,
            Err(err) => {
                warn!(node = %self.display_name(), %err, "malformed resolve response");
                return;
            }
        };

        let Some(pending) = self.resolver.pending.remove(&response_id) else {
            return;
        };
        self.timers.cancel(pending.timer);

        let resolved = response
            .entries
            .into_iter()
            .filter_map(|(name, key)| key.map(|key| (name, key)));
        let written = self.names.merge(resolved);
        self.stats.resolves_completed += 1;
        debug!(node = %self.display_name(), response_id = %response_id, written, "resolve completed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use floodnet_core::{IdentityCipher, KeyPair, NameTable, NodeId, SimTime};

    use crate::flood::{Node, NodeConfig};

    fn node_pair() -> (Node, Node, Arc<NameTable>) {
        let names = Arc::new(NameTable::new());
        let cipher = Arc::new(IdentityCipher);
        let mut rng = StdRng::seed_from_u64(42);
        let requester = Node::new(
            NodeId(1),
            KeyPair::generate(&mut rng),
            Arc::clone(&names),
            cipher.clone(),
            NodeConfig::default().with_seed(1),
        );
        let service = Node::new(
            NodeId(2),
            KeyPair::generate(&mut rng),
            Arc::clone(&names),
            cipher,
            NodeConfig::default().with_seed(2),
        );
        (requester, service, names)
    }

    /// Hand every drained packet from one node straight to the other
    fn exchange(from: &mut Node, to: &mut Node, now: SimTime) {
        for packet in from.update(now) {
            to.receive_packet(packet, now).unwrap();
        }
    }

    #[test]
    fn test_resolve_round_trip() {
        let (mut requester, mut service, names) = node_pair();
        service.register_name("Service0", b"Service0-PublicKey".to_vec());
        service.register_name("Service1", b"Service1-PublicKey".to_vec());

        requester
            .resolve_names(
                &service.public_key().to_vec(),
                vec!["Service0".to_string(), "Service1".to_string()],
            )
            .unwrap();
        assert_eq!(requester.outstanding_resolves(), 1);

        exchange(&mut requester, &mut service, 5);
        exchange(&mut service, &mut requester, 10);

        assert_eq!(names.get("Service0"), Some(b"Service0-PublicKey".to_vec()));
        assert_eq!(names.get("Service1"), Some(b"Service1-PublicKey".to_vec()));
        assert_eq!(requester.outstanding_resolves(), 0);
        assert!(requester.timers.is_empty());
        assert_eq!(requester.stats().resolves_completed, 1);
    }

    #[test]
    fn test_miss_is_reported_absent() {
        let (mut requester, mut service, names) = node_pair();
        service.register_name("Known", b"key".to_vec());

        requester
            .resolve_names(
                &service.public_key().to_vec(),
                vec!["Known".to_string(), "Unknown".to_string()],
            )
            .unwrap();

        exchange(&mut requester, &mut service, 5);
        exchange(&mut service, &mut requester, 10);

        assert!(names.contains("Known"));
        assert!(!names.contains("Unknown"));
    }

    #[test]
    fn test_timeout_reissues_with_fresh_packet_id() {
        let (mut requester, _service, _names) = node_pair();
        requester
            .resolve_names(b"service key", vec!["Service0".to_string()])
            .unwrap();

        // First issue drains now; drop it on the floor (simulated loss)
        let first = requester.update(5);
        assert_eq!(first.len(), 1);

        // Default timeout is 400; the retry fires and re-drains
        let second = requester.update(500);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].id, second[0].id);
        assert_eq!(requester.stats().resolve_retries, 1);

        // And keeps retrying
        let third = requester.update(1000);
        assert_eq!(third.len(), 1);
        assert_eq!(requester.stats().resolve_retries, 2);
    }

    #[test]
    fn test_cancel_stops_retries_and_is_idempotent() {
        let (mut requester, _service, _names) = node_pair();
        let response_id = requester
            .resolve_names(b"service key", vec!["Service0".to_string()])
            .unwrap();
        requester.update(5);

        requester.cancel_resolve(response_id);
        requester.cancel_resolve(response_id);
        assert_eq!(requester.outstanding_resolves(), 0);

        // No retry after the timeout would have fired
        assert!(requester.update(1000).is_empty());
        assert_eq!(requester.stats().resolve_retries, 0);
    }
}
