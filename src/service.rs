// ABOUTME: Wires transport, dispatcher, and reassembler into the running gateway, mirroring the teacher's builder-style client factory
// ABOUTME: Two threads share the modem: a command lock serializes AT transactions against the reassembler's independent read handle

use crate::config::GatewayConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::queue::FileQueue;
use crate::reassembler::{AssembledMessage, Reassembler};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use tracing::info;

/// A running instance of the outbound dispatcher and inbound reassembler,
/// sharing one modem over independently-cloned serial handles.
pub struct GatewayService {
    config: GatewayConfig,
}

impl GatewayService {
    pub fn new(config: GatewayConfig) -> Self {
        GatewayService { config }
    }

    /// Appends a message to the outbound queue and returns immediately; the
    /// running dispatcher (if any) picks it up on its next poll.
    pub fn send(&self, destination: &str, text: &str) -> GatewayResult<()> {
        let queue = FileQueue::new(&self.config.queue_file);
        queue.push(destination, text)?;
        Ok(())
    }

    /// Reports the number of entries currently queued.
    pub fn status(&self) -> GatewayResult<usize> {
        let queue = FileQueue::new(&self.config.queue_file);
        Ok(queue.len()?)
    }

    /// Opens the modem, runs the dispatcher and reassembler each on their
    /// own thread, and blocks until `stop` is set. Assembled inbound
    /// messages are logged as they arrive; a richer sink can be substituted
    /// by calling the lower-level components directly.
    pub fn run(&self, stop: Arc<AtomicBool>) -> GatewayResult<()> {
        let transport = Transport::open(
            &self.config.device,
            self.config.baud_rate,
            self.config.serial_timeout,
        )
        .map_err(GatewayError::DeviceUnavailable)?;
        let (mut writer, mut reader) = transport
            .split(self.config.reassembler_poll_interval)
            .map_err(GatewayError::DeviceUnavailable)?;
        writer.init_modem().map_err(GatewayError::DeviceUnavailable)?;

        let command_lock = Arc::new(Mutex::new(()));
        let (sink, inbox) = mpsc::channel::<AssembledMessage>();

        let dispatcher_config = self.config.clone();
        let dispatcher_queue = FileQueue::new(&self.config.queue_file);
        let dispatcher_stop = Arc::clone(&stop);
        let dispatcher_lock = Arc::clone(&command_lock);
        let dispatcher_handle = thread::spawn(move || {
            let dispatcher = Dispatcher::new(dispatcher_queue, dispatcher_config);
            dispatcher.run(&mut writer, &dispatcher_lock, &dispatcher_stop);
        });

        let reassembler_config = self.config.clone();
        let reassembler_stop = Arc::clone(&stop);
        let reassembler_handle = thread::spawn(move || {
            let mut reassembler = Reassembler::new(reassembler_config, sink);
            reassembler.run(&mut reader, &reassembler_stop);
        });

        while !stop.load(Ordering::Relaxed) {
            match inbox.recv_timeout(std::time::Duration::from_millis(200)) {
                Ok(message) => info!(
                    sender = %message.sender,
                    timestamp = %message.timestamp,
                    "assembled inbound message: {}",
                    message.text
                ),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        dispatcher_handle.join().expect("dispatcher thread panicked");
        reassembler_handle.join().expect("reassembler thread panicked");
        Ok(())
    }
}
