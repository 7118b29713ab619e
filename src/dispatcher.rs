// ABOUTME: Outbound dispatcher: drains the file queue and drives the modem through the AT+CMGS handshake per segment
// ABOUTME: Timing and the +CMS ERROR scan are ported as-is from the legacy fire-and-forget sender this gateway replaces

use crate::config::GatewayConfig;
use crate::pdu::codec::{self, CodecError};
use crate::queue::{FileQueue, QueueError};
use crate::transport::ModemWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Drains `queue`, encoding and sending each head entry over `writer`.
pub struct Dispatcher {
    queue: FileQueue,
    config: GatewayConfig,
}

impl Dispatcher {
    pub fn new(queue: FileQueue, config: GatewayConfig) -> Self {
        Dispatcher { queue, config }
    }

    /// Runs the drain loop until `stop` is set. `command_lock` is held for
    /// the duration of each AT transaction so the reassembler's reader
    /// thread never races a write against this one.
    pub fn run<W: ModemWriter>(
        &self,
        writer: &mut W,
        command_lock: &Mutex<()>,
        stop: &AtomicBool,
    ) {
        while !stop.load(Ordering::Relaxed) {
            match self.queue.peek_head() {
                Ok(None) => thread::sleep(self.config.queue_poll_interval),
                Ok(Some(message)) => {
                    self.dispatch_head(writer, command_lock, &message.destination, &message.text)
                }
                Err(QueueError::MalformedLine(line)) => {
                    warn!("discarding malformed queue line: {line:?}");
                    let _ = self.queue.pop_head();
                }
                Err(QueueError::Io(e)) => {
                    error!("queue file error: {e}, retrying in 5s");
                    thread::sleep(Duration::from_secs(5));
                }
            }
        }
    }

    fn dispatch_head<W: ModemWriter>(
        &self,
        writer: &mut W,
        command_lock: &Mutex<()>,
        destination: &str,
        text: &str,
    ) {
        let submission = match codec::encode_submit(destination, text) {
            Ok(submission) => submission,
            Err(CodecError::Address(e)) => {
                warn!("bad request, discarding queue entry: {e}");
                let _ = self.queue.pop_head();
                return;
            }
            Err(e) => {
                warn!("could not encode queue entry, discarding: {e}");
                let _ = self.queue.pop_head();
                return;
            }
        };

        let total_segments = submission.segments.len();
        let mut all_ok = true;
        {
            let _guard = command_lock.lock().unwrap();
            for (index, segment) in submission.segments.iter().enumerate() {
                let settle = if total_segments > 1 {
                    Duration::from_secs(3)
                } else {
                    Duration::from_secs(2)
                };
                if !self.send_segment(writer, &segment.pdu_hex, segment.tpdu_length, settle) {
                    warn!(
                        "segment {}/{} to {destination} failed",
                        index + 1,
                        total_segments
                    );
                    all_ok = false;
                    break;
                }
            }
            if all_ok {
                if let Err(e) = writer.restore_urc_delivery() {
                    warn!("failed to restore URC delivery after send: {e}");
                }
            }
        }

        if all_ok {
            info!("sent {total_segments} segment(s) to {destination}");
            let _ = self.queue.pop_head();
        } else {
            thread::sleep(self.config.send_backoff);
        }
    }

    fn send_segment<W: ModemWriter>(
        &self,
        writer: &mut W,
        pdu_hex: &str,
        tpdu_length: usize,
        settle: Duration,
    ) -> bool {
        if writer.write_at_command("AT+CMGF=0").is_err() {
            return false;
        }
        thread::sleep(Duration::from_millis(500));

        if writer
            .write_at_command(&format!("AT+CMGS={tpdu_length}"))
            .is_err()
        {
            return false;
        }
        thread::sleep(Duration::from_millis(500));

        if writer.write_pdu(pdu_hex).is_err() {
            return false;
        }
        thread::sleep(settle);

        let response = writer.drain_response();
        if response.contains("+CMS ERROR") {
            debug!("modem reported +CMS ERROR: {response}");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io;
    use tempfile::tempdir;

    struct FakeModem {
        commands: RefCell<Vec<String>>,
        fail_on_pdu: bool,
    }

    impl FakeModem {
        fn new() -> Self {
            FakeModem {
                commands: RefCell::new(Vec::new()),
                fail_on_pdu: false,
            }
        }

        fn failing() -> Self {
            FakeModem {
                commands: RefCell::new(Vec::new()),
                fail_on_pdu: true,
            }
        }
    }

    impl ModemWriter for FakeModem {
        fn write_at_command(&mut self, command: &str) -> io::Result<()> {
            self.commands.borrow_mut().push(command.to_string());
            Ok(())
        }

        fn write_pdu(&mut self, pdu_hex: &str) -> io::Result<()> {
            self.commands.borrow_mut().push(format!("PDU:{pdu_hex}"));
            Ok(())
        }

        fn drain_response(&mut self) -> String {
            if self.fail_on_pdu {
                "+CMS ERROR: 304".to_string()
            } else {
                "OK".to_string()
            }
        }

        fn restore_urc_delivery(&mut self) -> io::Result<()> {
            self.commands
                .borrow_mut()
                .push("AT+CNMI=2,2,0,0,0".to_string());
            Ok(())
        }
    }

    fn fast_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.queue_poll_interval = Duration::from_millis(1);
        config.send_backoff = Duration::from_millis(1);
        config
    }

    #[test]
    fn successful_send_removes_head_from_queue() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::new(dir.path().join("queue.txt"));
        queue.push("84977426274", "Hi").unwrap();
        let dispatcher = Dispatcher::new(FileQueue::new(dir.path().join("queue.txt")), fast_config());
        let mut modem = FakeModem::new();
        let lock = Mutex::new(());

        dispatcher.dispatch_head(&mut modem, &lock, "84977426274", "Hi");

        assert!(queue.is_empty().unwrap());
        assert!(modem.commands.borrow().iter().any(|c| c.starts_with("PDU:")));
    }

    #[test]
    fn failed_send_leaves_head_in_queue() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::new(dir.path().join("queue.txt"));
        queue.push("84977426274", "Hi").unwrap();
        let dispatcher = Dispatcher::new(FileQueue::new(dir.path().join("queue.txt")), fast_config());
        let mut modem = FakeModem::failing();
        let lock = Mutex::new(());

        dispatcher.dispatch_head(&mut modem, &lock, "84977426274", "Hi");

        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn malformed_destination_discards_entry() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::new(dir.path().join("queue.txt"));
        queue.push("not-a-number", "Hi").unwrap();
        let dispatcher = Dispatcher::new(FileQueue::new(dir.path().join("queue.txt")), fast_config());
        let mut modem = FakeModem::new();
        let lock = Mutex::new(());

        dispatcher.dispatch_head(&mut modem, &lock, "not-a-number", "Hi");

        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn long_message_sends_every_segment() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::new(dir.path().join("queue.txt"));
        let text = "x".repeat(150);
        queue.push("123456789", &text).unwrap();
        let dispatcher = Dispatcher::new(FileQueue::new(dir.path().join("queue.txt")), fast_config());
        let mut modem = FakeModem::new();
        let lock = Mutex::new(());

        dispatcher.dispatch_head(&mut modem, &lock, "123456789", &text);

        let pdu_count = modem
            .commands
            .borrow()
            .iter()
            .filter(|c| c.starts_with("PDU:"))
            .count();
        assert_eq!(pdu_count, 3);
        assert!(queue.is_empty().unwrap());
    }
}
