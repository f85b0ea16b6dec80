//! Reliable transport overlay: fragmentation, reassembly and NACKs
//!
//! An application payload is split into bounded fragments sharing one
//! datagram id; each fragment floods independently under its own packet id
//! (a shared id would let the flood-suppression cache kill every fragment
//! after the first). The recipient reassembles by fragment index and asks
//! for exactly the missing indices with a NACK once the gap timer fires.
//! There is no retransmission bound; congestion control is out of scope.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::{debug, trace, warn};

use floodnet_core::{Address, DatagramId, FloodnetError, Packet, PacketKind, SimTime};

use crate::flood::{Delivered, Node};
use crate::timer::{TimerEvent, TimerToken};

/// Maximum bytes of application data per fragment
pub const MAX_FRAGMENT_DATA: usize = 64;

/// Reassembly state for one incoming datagram
#[derive(Debug, Clone)]
pub(crate) struct PendingDatagram {
    /// Address of the datagram's original sender (where NACKs go)
    pub source: Address,
    /// Total fragments expected
    pub count: u32,
    /// Fragments received so far, keyed by index; duplicates ignored
    pub fragments: BTreeMap<u32, Vec<u8>>,
    /// Gap-detection timer, re-armed on every new incomplete fragment
    pub nack_timer: Option<TimerToken>,
}

impl PendingDatagram {
    fn new(source: Address, count: u32) -> Self {
        Self {
            source,
            count,
            fragments: BTreeMap::new(),
            nack_timer: None,
        }
    }

    fn is_complete(&self) -> bool {
        self.fragments.len() as u32 == self.count
    }

    /// Indices still missing, in order
    fn missing(&self) -> Vec<u32> {
        (0..self.count)
            .filter(|index| !self.fragments.contains_key(index))
            .collect()
    }

    /// Concatenate the fragments in index order
    fn assemble(self) -> Vec<u8> {
        self.fragments.into_values().flatten().collect()
    }
}

/// A datagram this node sent, retained to serve retransmissions
#[derive(Debug, Clone)]
pub(crate) struct SentDatagram {
    pub recipient: Address,
    pub chunks: Vec<Vec<u8>>,
}

/// How many completed datagram ids are remembered
const COMPLETED_CAPACITY: usize = 128;

/// Datagram state composed into every node
#[derive(Debug, Clone, Default)]
pub(crate) struct DatagramState {
    pub sent: HashMap<DatagramId, SentDatagram>,
    pub pending: HashMap<DatagramId, PendingDatagram>,
    /// Recently completed datagrams, insertion-ordered with the oldest
    /// evicted first. A stale NACK can trigger retransmissions after
    /// delivery; their fragments must not resurrect reassembly state.
    completed_order: VecDeque<DatagramId>,
    completed: HashSet<DatagramId>,
}

impl DatagramState {
    fn mark_completed(&mut self, datagram: DatagramId) {
        if !self.completed.insert(datagram) {
            return;
        }
        self.completed_order.push_back(datagram);
        if self.completed_order.len() > COMPLETED_CAPACITY
            && let Some(oldest) = self.completed_order.pop_front()
        {
            self.completed.remove(&oldest);
        }
    }

    fn is_completed(&self, datagram: &DatagramId) -> bool {
        self.completed.contains(datagram)
    }
}

impl Node {
    /// Send an application payload reliably to `recipient`
    ///
    /// Splits the payload into [`MAX_FRAGMENT_DATA`]-byte fragments and
    /// floods each one. The chunk list is retained so NACKs can be served.
    pub fn send_datagram(
        &mut self,
        payload: &[u8],
        recipient: Address,
    ) -> Result<DatagramId, FloodnetError> {
        let datagram = DatagramId(rand::Rng::random(&mut self.rng));
        let mut chunks: Vec<Vec<u8>> = payload
            .chunks(MAX_FRAGMENT_DATA)
            .map(<[u8]>::to_vec)
            .collect();
        if chunks.is_empty() {
            // An empty payload still travels as one empty fragment
            chunks.push(Vec::new());
        }
        let count = chunks.len() as u32;

        for (index, chunk) in chunks.iter().enumerate() {
            let packet = self.create_packet(
                PacketKind::Fragment {
                    recipient,
                    source: self.address,
                    datagram,
                    index: index as u32,
                    count,
                },
                chunk.clone(),
            )?;
            self.enqueue_local(packet)?;
        }

        self.datagrams
            .sent
            .insert(datagram, SentDatagram { recipient, chunks });
        debug!(node = %self.display_name(), datagram = %datagram, count, "datagram queued");
        Ok(datagram)
    }

    /// Number of datagrams still being reassembled
    pub fn pending_datagrams(&self) -> usize {
        self.datagrams.pending.len()
    }

    /// A fragment addressed to this node arrived
    pub(crate) fn handle_fragment(&mut self, packet: &Packet, now: SimTime) {
        let PacketKind::Fragment {
            source,
            datagram,
            index,
            count,
            ..
        } = &packet.kind
        else {
            return;
        };

        // Already delivered: any further copy is a stale retransmission
        if self.datagrams.is_completed(datagram) {
            trace!(node = %self.display_name(), datagram = %datagram, index, "fragment for completed datagram");
            return;
        }

        let (complete, old_timer) = {
            let pending = self
                .datagrams
                .pending
                .entry(*datagram)
                .or_insert_with(|| PendingDatagram::new(*source, *count));
            if pending.fragments.contains_key(index) {
                // Duplicate index: ignored, and the gap timer is left alone
                trace!(node = %self.display_name(), datagram = %datagram, index, "duplicate fragment");
                return;
            }
            pending.fragments.insert(*index, packet.payload.clone());
            (pending.is_complete(), pending.nack_timer.take())
        };

        if let Some(timer) = old_timer {
            self.timers.cancel(timer);
        }

        if complete {
            if let Some(pending) = self.datagrams.pending.remove(datagram) {
                self.datagrams.mark_completed(*datagram);
                let data = pending.assemble();
                debug!(node = %self.display_name(), datagram = %datagram, bytes = data.len(), "datagram delivered");
                self.push_delivered(Delivered {
                    data,
                    datagram: Some(*datagram),
                });
                self.stats.datagrams_delivered += 1;
            }
        } else {
            let timer = self
                .timers
                .arm(now, self.nack_delay, TimerEvent::NackDelay(*datagram));
            if let Some(pending) = self.datagrams.pending.get_mut(datagram) {
                pending.nack_timer = Some(timer);
            }
        }
    }

    /// Gap timer fired: ask the sender for the missing indices
    pub(crate) fn fire_nack(&mut self, datagram: DatagramId) {
        // Completed or discarded while the timer was in flight
        let Some(pending) = self.datagrams.pending.get(&datagram) else {
            return;
        };
        let missing = pending.missing();
        let source = pending.source;

        match self.create_packet(
            PacketKind::Nack {
                recipient: source,
                datagram,
                missing: missing.clone(),
            },
            Vec::new(),
        ) {
            Ok(packet) => {
                self.enqueue_or_warn(packet);
                self.stats.nacks_sent += 1;
                debug!(node = %self.display_name(), datagram = %datagram, ?missing, "NACK sent");
            }
            Err(err) => {
                warn!(node = %self.display_name(), %err, "failed to build NACK");
            }
        }

        // Keep the request alive in case the NACK or the retransmission
        // is itself lost
        let timer = self
            .timers
            .arm(self.clock, self.nack_delay, TimerEvent::NackDelay(datagram));
        if let Some(pending) = self.datagrams.pending.get_mut(&datagram) {
            pending.nack_timer = Some(timer);
        }
    }

    /// Sender side: re-flood exactly the fragments a NACK names
    pub(crate) fn handle_nack(&mut self, packet: &Packet) {
        let PacketKind::Nack {
            datagram, missing, ..
        } = &packet.kind
        else {
            return;
        };

        let Some(sent) = self.datagrams.sent.get(datagram) else {
            trace!(node = %self.display_name(), datagram = %datagram, "NACK for unknown datagram");
            return;
        };
        let recipient = sent.recipient;
        let count = sent.chunks.len() as u32;
        let resend: Vec<(u32, Vec<u8>)> = missing
            .iter()
            .filter_map(|&index| {
                sent.chunks
                    .get(index as usize)
                    .map(|chunk| (index, chunk.clone()))
            })
            .collect();
        let datagram = *datagram;

        for (index, chunk) in resend {
            match self.create_packet(
                PacketKind::Fragment {
                    recipient,
                    source: self.address,
                    datagram,
                    index,
                    count,
                },
                chunk,
            ) {
                Ok(fragment) => {
                    self.enqueue_or_warn(fragment);
                    self.stats.retransmissions += 1;
                }
                Err(err) => {
                    warn!(node = %self.display_name(), %err, "failed to rebuild fragment");
                }
            }
        }
    }
}
