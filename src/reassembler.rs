// ABOUTME: Inbound reassembler: collects DELIVER fragments by UDH concatenation key or a time-window heuristic
// ABOUTME: Mirrors the multipart_messages/message_buffer dual-path merge in the legacy listener this gateway replaces

use crate::config::GatewayConfig;
use crate::pdu::codec::{self, Deliver};
use crate::transport::LineSource;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// One fully reassembled inbound message, ready for a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    pub sender: String,
    pub timestamp: crate::pdu::scts::ServiceCenterTimestamp,
    pub text: String,
}

#[derive(Clone)]
struct ConcatGroup {
    total_parts: u8,
    fragments: BTreeMap<u8, String>,
    earliest_timestamp: crate::pdu::scts::ServiceCenterTimestamp,
    first_seen: Instant,
}

#[derive(Clone)]
struct BufferedFragment {
    arrival: Instant,
    timestamp: crate::pdu::scts::ServiceCenterTimestamp,
    text: String,
}

/// Owns the fragment tables for inbound concatenated and un-headered SMS.
/// Confined to a single thread; no locking needed internally.
pub struct Reassembler {
    groups: HashMap<(String, u16), ConcatGroup>,
    buffers: HashMap<String, Vec<BufferedFragment>>,
    config: GatewayConfig,
    sink: mpsc::Sender<AssembledMessage>,
}

impl Reassembler {
    pub fn new(config: GatewayConfig, sink: mpsc::Sender<AssembledMessage>) -> Self {
        Reassembler {
            groups: HashMap::new(),
            buffers: HashMap::new(),
            config,
            sink,
        }
    }

    /// Reads URC lines from `reader` until `stop` is set, feeding decoded
    /// DELIVER PDUs into the fragment tables and ticking the time-window
    /// and concat-group sweeps roughly once a second.
    pub fn run<R: LineSource>(&mut self, reader: &mut R, stop: &AtomicBool) {
        let mut last_tick = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            match reader.read_line() {
                Ok(Some(line)) if line.starts_with("+CMT:") => match reader.read_line() {
                    Ok(Some(pdu_line)) => self.process_pdu_line(&pdu_line),
                    Ok(None) => {}
                    Err(e) => {
                        error!("serial read error: {e}");
                        break;
                    }
                },
                Ok(_) => {}
                Err(e) => {
                    error!("serial read error: {e}");
                    break;
                }
            }

            if last_tick.elapsed() >= Duration::from_secs(1) {
                self.tick(Instant::now());
                last_tick = Instant::now();
            }
        }
    }

    fn process_pdu_line(&mut self, pdu_line: &str) {
        let candidate = pdu_line.trim();
        if candidate.is_empty() || !candidate.chars().all(|c| c.is_ascii_hexdigit()) {
            debug!("discarding non-hex candidate PDU line: {candidate:?}");
            return;
        }
        match codec::decode_deliver(candidate) {
            Ok(deliver) => self.handle_fragment(deliver),
            Err(e) => debug!("discarding malformed DELIVER PDU: {e}"),
        }
    }

    /// Routes a decoded fragment to the UDH or time-window path.
    pub fn handle_fragment(&mut self, deliver: Deliver) {
        match deliver.concat {
            Some(header) => self.handle_udh_fragment(deliver, header),
            None => self.handle_time_window_fragment(deliver),
        }
    }

    fn handle_udh_fragment(&mut self, deliver: Deliver, header: crate::pdu::udh::ConcatHeader) {
        let key = (deliver.sender.as_str().to_string(), header.reference);
        let now = Instant::now();

        let group = self.groups.entry(key.clone()).or_insert_with(|| ConcatGroup {
            total_parts: header.total_parts,
            fragments: BTreeMap::new(),
            earliest_timestamp: deliver.timestamp,
            first_seen: now,
        });

        if group.total_parts != header.total_parts {
            warn!(
                "concat group {key:?} total_parts mismatch ({} vs {}), dropping group",
                group.total_parts, header.total_parts
            );
            self.groups.remove(&key);
            return;
        }

        if deliver.timestamp.0 < group.earliest_timestamp.0 {
            group.earliest_timestamp = deliver.timestamp;
        }
        group.fragments.entry(header.sequence).or_insert(deliver.text);

        if group.fragments.len() == group.total_parts as usize {
            let group = self.groups.remove(&key).expect("just matched on it above");
            let text: String = group.fragments.into_values().collect();
            let _ = self.sink.send(AssembledMessage {
                sender: key.0,
                timestamp: group.earliest_timestamp,
                text,
            });
        }
    }

    fn handle_time_window_fragment(&mut self, deliver: Deliver) {
        let now = Instant::now();
        let sender = deliver.sender.as_str().to_string();
        let buffer = self.buffers.entry(sender.clone()).or_default();
        buffer.push(BufferedFragment {
            arrival: now,
            timestamp: deliver.timestamp,
            text: deliver.text,
        });
        self.evaluate_time_window(&sender, now);
    }

    fn tick(&mut self, now: Instant) {
        let senders: Vec<String> = self.buffers.keys().cloned().collect();
        for sender in senders {
            self.evaluate_time_window(&sender, now);
        }
        self.sweep_concat_groups(now);
    }

    /// Checks the merge condition before the singleton condition, per the
    /// heuristic's intended ordering, then purges stale entries.
    fn evaluate_time_window(&mut self, sender: &str, now: Instant) {
        let Some(mut buffer) = self.buffers.remove(sender) else {
            return;
        };

        let recent_indices: Vec<usize> = buffer
            .iter()
            .enumerate()
            .filter(|(_, f)| now.duration_since(f.arrival) <= self.config.time_window_merge)
            .map(|(i, _)| i)
            .collect();

        if recent_indices.len() >= 2 {
            let mut entries: Vec<BufferedFragment> =
                recent_indices.iter().map(|&i| buffer[i].clone()).collect();
            entries.sort_by_key(|f| f.timestamp.0);
            let earliest = entries[0].timestamp;
            let text: String = entries.into_iter().map(|f| f.text).collect();
            let _ = self.sink.send(AssembledMessage {
                sender: sender.to_string(),
                timestamp: earliest,
                text,
            });
            return;
        }

        if recent_indices.len() == 1 {
            let idx = recent_indices[0];
            if now.duration_since(buffer[idx].arrival) > self.config.time_window_singleton_wait {
                let fragment = buffer.remove(idx);
                let _ = self.sink.send(AssembledMessage {
                    sender: sender.to_string(),
                    timestamp: fragment.timestamp,
                    text: fragment.text,
                });
                return;
            }
        }

        buffer.retain(|f| now.duration_since(f.arrival) <= self.config.time_window_retention);
        if !buffer.is_empty() {
            self.buffers.insert(sender.to_string(), buffer);
        }
    }

    fn sweep_concat_groups(&mut self, now: Instant) {
        let lifetime = self.config.concat_group_lifetime;
        let expired: Vec<(String, u16)> = self
            .groups
            .iter()
            .filter(|(_, g)| now.duration_since(g.first_seen) > lifetime)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            warn!("concat group {key:?} abandoned after {lifetime:?}, tearing down");
            self.groups.remove(&key);
        }
    }
}
