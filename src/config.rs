// ABOUTME: Runtime configuration for the gateway, layered as defaults -> TOML file -> CLI overrides
// ABOUTME: Mirrors the all-Option file struct merged onto a Default config, same pattern the file-adapter config uses elsewhere in the corpus

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub device: String,
    pub baud_rate: u32,
    pub serial_timeout: Duration,
    /// Read timeout on the reassembler's own handle. Kept well below the 1 Hz
    /// tick interval so an idle line never starves the time-window and
    /// concat-group sweeps, independent of `serial_timeout` (which only
    /// governs the dispatcher's command/response transactions).
    pub reassembler_poll_interval: Duration,
    pub queue_file: String,
    /// Merge window for un-headered fragments from the same sender.
    pub time_window_merge: Duration,
    /// How long a lone fragment waits before being emitted as a singleton.
    pub time_window_singleton_wait: Duration,
    /// Fragments older than this are purged from the time-window buffer.
    pub time_window_retention: Duration,
    /// A concat group with no completion after this long is torn down.
    pub concat_group_lifetime: Duration,
    /// Backoff after a failed send attempt.
    pub send_backoff: Duration,
    /// Sleep when the queue file is empty or missing.
    pub queue_poll_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            device: "/dev/ttyUSB2".to_string(),
            baud_rate: 115_200,
            serial_timeout: Duration::from_secs(3),
            reassembler_poll_interval: Duration::from_millis(250),
            queue_file: "/tmp/sms_queue.txt".to_string(),
            time_window_merge: Duration::from_secs(3),
            time_window_singleton_wait: Duration::from_secs(2),
            time_window_retention: Duration::from_secs(10),
            concat_group_lifetime: Duration::from_secs(24 * 60 * 60),
            send_backoff: Duration::from_secs(10),
            queue_poll_interval: Duration::from_secs(1),
        }
    }
}

/// On-disk representation; every field optional so a partial file only
/// overrides what it names, the rest falling back to `GatewayConfig::default()`.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    device: Option<String>,
    baud_rate: Option<u32>,
    serial_timeout_secs: Option<u64>,
    reassembler_poll_interval_millis: Option<u64>,
    queue_file: Option<String>,
    time_window_merge_secs: Option<u64>,
    time_window_singleton_wait_secs: Option<u64>,
    time_window_retention_secs: Option<u64>,
    concat_group_lifetime_secs: Option<u64>,
    send_backoff_secs: Option<u64>,
    queue_poll_interval_secs: Option<u64>,
}

impl GatewayConfig {
    /// Load configuration from an optional TOML file, falling back to
    /// defaults for any key the file omits. A missing file is not an error;
    /// a present-but-unparseable file is.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, toml::de::Error> {
        let mut config = GatewayConfig::default();

        let Some(path) = path else {
            return Ok(config);
        };

        let Ok(contents) = std::fs::read_to_string(path) else {
            return Ok(config);
        };

        let file: ConfigFile = toml::from_str(&contents)?;
        if let Some(v) = file.device {
            config.device = v;
        }
        if let Some(v) = file.baud_rate {
            config.baud_rate = v;
        }
        if let Some(v) = file.serial_timeout_secs {
            config.serial_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.reassembler_poll_interval_millis {
            config.reassembler_poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = file.queue_file {
            config.queue_file = v;
        }
        if let Some(v) = file.time_window_merge_secs {
            config.time_window_merge = Duration::from_secs(v);
        }
        if let Some(v) = file.time_window_singleton_wait_secs {
            config.time_window_singleton_wait = Duration::from_secs(v);
        }
        if let Some(v) = file.time_window_retention_secs {
            config.time_window_retention = Duration::from_secs(v);
        }
        if let Some(v) = file.concat_group_lifetime_secs {
            config.concat_group_lifetime = Duration::from_secs(v);
        }
        if let Some(v) = file.send_backoff_secs {
            config.send_backoff = Duration::from_secs(v);
        }
        if let Some(v) = file.queue_poll_interval_secs {
            config.queue_poll_interval = Duration::from_secs(v);
        }

        Ok(config)
    }
}
