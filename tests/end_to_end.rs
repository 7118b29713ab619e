// ABOUTME: End-to-end scenario coverage for the dispatcher and reassembler wired against fakes
// ABOUTME: Each test below exercises one of the gateway's named delivery scenarios through its public run loops

use sms_gateway::config::GatewayConfig;
use sms_gateway::dispatcher::Dispatcher;
use sms_gateway::pdu::address::Address;
use sms_gateway::pdu::codec::encode_submit;
use sms_gateway::queue::FileQueue;
use sms_gateway::reassembler::Reassembler;
use sms_gateway::transport::{LineSource, ModemWriter};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

struct FakeModem;

impl ModemWriter for FakeModem {
    fn write_at_command(&mut self, _command: &str) -> io::Result<()> {
        Ok(())
    }

    fn write_pdu(&mut self, _pdu_hex: &str) -> io::Result<()> {
        Ok(())
    }

    fn drain_response(&mut self) -> String {
        "OK".to_string()
    }

    fn restore_urc_delivery(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A URC line source a test thread can append to while the reassembler is
/// reading from it, so a second fragment can arrive mid-run.
#[derive(Clone)]
struct SharedLines(Arc<Mutex<VecDeque<String>>>);

impl SharedLines {
    fn new() -> Self {
        SharedLines(Arc::new(Mutex::new(VecDeque::new())))
    }

    fn push_cmt(&self, pdu_hex: String) {
        let mut lines = self.0.lock().unwrap();
        lines.push_back("+CMT: ,23".to_string());
        lines.push_back(pdu_hex);
    }
}

impl LineSource for SharedLines {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.0.lock().unwrap().pop_front())
    }
}

fn fast_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.queue_poll_interval = Duration::from_millis(5);
    config.send_backoff = Duration::from_millis(5);
    config
}

fn swap_pair(decimal_pair: &str) -> String {
    let bytes = decimal_pair.as_bytes();
    format!("{}{}", bytes[1] as char, bytes[0] as char)
}

/// Builds a valid SCTS hex for 2024-03-05 10:<minute>:00 +07:00.
fn scts_hex_for_minute(minute: &str) -> String {
    format!(
        "{}{}{}{}{}{}{}",
        swap_pair("24"),
        swap_pair("03"),
        swap_pair("05"),
        swap_pair("10"),
        swap_pair(minute),
        swap_pair("00"),
        "82"
    )
}

/// Hand-assembles a DELIVER PDU hex string the way a modem would report one
/// over `+CMT:`, optionally carrying a concatenation UDH.
fn build_deliver_hex(sender_digits: &str, minute: &str, text: &str, concat: Option<(u8, u8, u8)>) -> String {
    let address = Address::parse(sender_digits).unwrap();
    let ucs2: String = text.encode_utf16().map(|unit| format!("{unit:04X}")).collect();
    let (first_octet, udh_hex) = match concat {
        Some((reference, total, sequence)) => (
            "44".to_string(),
            format!("050003{reference:02X}{total:02X}{sequence:02X}"),
        ),
        None => ("04".to_string(), String::new()),
    };
    let user_data = format!("{udh_hex}{ucs2}");
    let udl = user_data.len() / 2;
    format!(
        "00{first_octet}{:02X}91{}0008{}{udl:02X}{user_data}",
        address.digit_count(),
        address.to_swapped_semi_octets(),
        scts_hex_for_minute(minute),
    )
}

#[test]
fn scenario_short_ascii_send_is_a_single_pdu_and_drains_the_queue() {
    let submission = encode_submit("84977426274", "Hi").unwrap();
    assert_eq!(submission.segments.len(), 1);
    assert!(submission.segments[0].pdu_hex.contains("0008AA0400480069"));

    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.txt");
    let queue = FileQueue::new(&path);
    queue.push("84977426274", "Hi").unwrap();

    let dispatcher = Dispatcher::new(FileQueue::new(&path), fast_config());
    let stop = AtomicBool::new(false);
    let lock = Mutex::new(());
    let mut modem = FakeModem;

    thread::scope(|scope| {
        let handle = scope.spawn(|| dispatcher.run(&mut modem, &lock, &stop));
        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    });

    assert!(queue.is_empty().unwrap());
}

#[test]
fn scenario_long_ucs2_send_splits_into_segments_sharing_one_reference() {
    let text: String = "A".repeat(100);
    let submission = encode_submit("123456789", &text).unwrap();
    assert_eq!(submission.segments.len(), 2);

    let reference = submission.reference.unwrap();
    for segment in &submission.segments {
        assert!(segment.pdu_hex.contains(&format!("050003{reference:02X}02")));
    }

    // UDL = 6-byte UDH + 2 bytes per UCS-2 char; 67 chars then the 33 remainder.
    let udl_first = u8::from_str_radix(&submission.segments[0].pdu_hex[26..28], 16).unwrap();
    let udl_second = u8::from_str_radix(&submission.segments[1].pdu_hex[26..28], 16).unwrap();
    assert_eq!(udl_first, 6 + 67 * 2);
    assert_eq!(udl_second, 6 + 33 * 2);
}

#[test]
fn scenario_concat_inbound_assembles_out_of_order_fragments() {
    let lines = SharedLines::new();
    lines.push_cmt(build_deliver_hex("84357259001", "31", "CD", Some((42, 3, 2))));
    lines.push_cmt(build_deliver_hex("84357259001", "30", "AB", Some((42, 3, 1))));
    lines.push_cmt(build_deliver_hex("84357259001", "32", "EF", Some((42, 3, 3))));
    let mut reader = lines;

    let (tx, rx) = mpsc::channel();
    let mut reassembler = Reassembler::new(GatewayConfig::default(), tx);
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| reassembler.run(&mut reader, &stop));
        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
    });

    let message = rx.try_recv().unwrap();
    assert_eq!(message.text, "ABCDEF");
    assert_eq!(message.sender, "84357259001");
}

#[test]
fn scenario_duplicate_sequence_in_inbound_concat_keeps_first_seen_fragment() {
    let lines = SharedLines::new();
    lines.push_cmt(build_deliver_hex("1", "30", "AB", Some((7, 2, 1))));
    lines.push_cmt(build_deliver_hex("1", "31", "CD", Some((7, 2, 2))));
    lines.push_cmt(build_deliver_hex("1", "32", "ZZ", Some((7, 2, 2))));
    let mut reader = lines;

    let (tx, rx) = mpsc::channel();
    let mut reassembler = Reassembler::new(GatewayConfig::default(), tx);
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| reassembler.run(&mut reader, &stop));
        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
    });

    let message = rx.try_recv().unwrap();
    assert_eq!(message.text, "ABCD");
    assert!(rx.try_recv().is_err());
}

#[test]
fn scenario_time_window_merge_combines_fragments_arriving_within_the_window() {
    let mut config = GatewayConfig::default();
    config.time_window_merge = Duration::from_millis(400);
    config.time_window_singleton_wait = Duration::from_millis(50);

    let lines = SharedLines::new();
    lines.push_cmt(build_deliver_hex("1", "30", "A", None));
    let mut reader = lines.clone();

    let (tx, rx) = mpsc::channel();
    let mut reassembler = Reassembler::new(config, tx);
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| reassembler.run(&mut reader, &stop));
        thread::sleep(Duration::from_millis(150));
        lines.push_cmt(build_deliver_hex("1", "31", "B", None));
        thread::sleep(Duration::from_millis(150));
        stop.store(true, Ordering::Relaxed);
    });

    let message = rx.try_recv().unwrap();
    assert_eq!(message.text, "AB");
}

#[test]
fn scenario_time_window_singleton_emits_after_the_wait_elapses() {
    let mut config = GatewayConfig::default();
    config.time_window_merge = Duration::from_millis(200);
    config.time_window_singleton_wait = Duration::from_millis(100);

    let lines = SharedLines::new();
    lines.push_cmt(build_deliver_hex("1", "30", "solo", None));
    let mut reader = lines;

    let (tx, rx) = mpsc::channel();
    let mut reassembler = Reassembler::new(config, tx);
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| reassembler.run(&mut reader, &stop));
        thread::sleep(Duration::from_millis(1500));
        stop.store(true, Ordering::Relaxed);
    });

    let message = rx.try_recv().unwrap();
    assert_eq!(message.text, "solo");
}
