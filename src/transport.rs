// ABOUTME: Blocking serial transport to the GSM modem, split into independent read/write handles
// ABOUTME: Owns the file descriptors; callers never parse PDU content here, only move bytes and lines

use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

/// A modem reachable over a serial device.
///
/// Unlike the teacher's `Connection`, which wraps a single async `TcpStream`
/// with one owner, this transport is meant to be [`split`](Transport::split)
/// into independent handles: the dispatcher writes commands, the reassembler
/// reads URCs, and each runs on its own thread. `serialport`'s `try_clone`
/// gives each handle its own file descriptor onto the same TTY, so a
/// blocking read on one thread never stalls a write on the other.
pub struct Transport {
    port: Box<dyn serialport::SerialPort>,
}

/// Write half: owns outbound AT command transactions.
pub struct SerialWriter {
    port: Box<dyn serialport::SerialPort>,
}

/// Read half: owns the URC stream.
pub struct SerialReader {
    reader: BufReader<Box<dyn serialport::SerialPort>>,
}

impl Transport {
    /// Opens the serial device at `device`/`baud_rate`, applying `timeout`
    /// to both reads and writes.
    pub fn open(device: &str, baud_rate: u32, timeout: Duration) -> io::Result<Self> {
        let port = serialport::new(device, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(Transport { port })
    }

    /// Splits into independent write and read handles, each backed by its
    /// own cloned descriptor onto the same device. `read_poll_interval`
    /// overrides the read handle's timeout independently of the write
    /// handle's, so the reassembler's idle-line polling can run much faster
    /// than the dispatcher's command/response timeout without the two
    /// needing to agree on one value.
    pub fn split(mut self, read_poll_interval: Duration) -> io::Result<(SerialWriter, SerialReader)> {
        let write_port = self
            .port
            .try_clone()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        self.port
            .set_timeout(read_poll_interval)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok((
            SerialWriter { port: write_port },
            SerialReader {
                reader: BufReader::new(self.port),
            },
        ))
    }
}

/// The command-writing surface the dispatcher depends on, so it can be
/// driven against a fake modem in tests without opening a real serial port.
pub trait ModemWriter {
    fn write_at_command(&mut self, command: &str) -> io::Result<()>;
    fn write_pdu(&mut self, pdu_hex: &str) -> io::Result<()>;
    fn drain_response(&mut self) -> String;
    fn restore_urc_delivery(&mut self) -> io::Result<()>;
}

impl ModemWriter for SerialWriter {
    fn write_at_command(&mut self, command: &str) -> io::Result<()> {
        SerialWriter::write_at_command(self, command)
    }

    fn write_pdu(&mut self, pdu_hex: &str) -> io::Result<()> {
        SerialWriter::write_pdu(self, pdu_hex)
    }

    fn drain_response(&mut self) -> String {
        SerialWriter::drain_response(self)
    }

    fn restore_urc_delivery(&mut self) -> io::Result<()> {
        SerialWriter::restore_urc_delivery(self)
    }
}

impl SerialWriter {
    /// Runs the modem init handshake: PDU mode, then URC delivery of
    /// incoming SMS on the serial line (`+CMT:` unsolicited notifications).
    pub fn init_modem(&mut self) -> io::Result<()> {
        self.write_at_command("AT+CMGF=0")?;
        std::thread::sleep(Duration::from_secs(1));
        self.write_at_command("AT+CNMI=2,2,0,0,0")?;
        std::thread::sleep(Duration::from_secs(1));
        Ok(())
    }

    /// Re-issues the URC delivery command, used after a send transaction to
    /// restore incoming-message notifications.
    pub fn restore_urc_delivery(&mut self) -> io::Result<()> {
        self.write_at_command("AT+CNMI=2,2,0,0,0")
    }

    /// Writes an AT command followed by CR, with no response read.
    pub fn write_at_command(&mut self, command: &str) -> io::Result<()> {
        self.port.write_all(command.as_bytes())?;
        self.port.write_all(b"\r")?;
        self.port.flush()
    }

    /// Writes a raw PDU payload terminated by Ctrl-Z (`0x1A`), as expected
    /// after `AT+CMGS=<n>`.
    pub fn write_pdu(&mut self, pdu_hex: &str) -> io::Result<()> {
        self.port.write_all(pdu_hex.as_bytes())?;
        self.port.write_all(&[0x1A])?;
        self.port.flush()
    }

    /// Reads whatever bytes are available within the port's configured
    /// timeout, used to scan a settle window for `+CMS ERROR`.
    pub fn drain_response(&mut self) -> String {
        let mut buf = [0u8; 256];
        let mut collected = String::new();
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => collected.push_str(&String::from_utf8_lossy(&buf[..n])),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(_) => break,
            }
        }
        collected
    }
}

impl SerialReader {
    /// Reads one line, stripped of its trailing CR/LF. Returns `Ok(None)`
    /// on a read timeout so the caller can re-check its stop flag.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line.trim_end_matches(['\r', '\n']).to_string())),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// The line-reading surface the reassembler depends on, so it can be driven
/// against a fake URC stream in tests without opening a real serial port.
pub trait LineSource {
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

impl LineSource for SerialReader {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        SerialReader::read_line(self)
    }
}
