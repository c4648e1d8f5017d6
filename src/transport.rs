//! Serial transport to the instrument.
//!
//! The SR715/SR720 speaks line-oriented ASCII over RS-232. One command goes
//! out, at most one line comes back. There is no framing beyond the
//! terminator and no retry: callers decide what a failure means.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use serialport::{ClearBuffer, DataBits, FlowControl, SerialPort};

use crate::config::SerialSettings;
use crate::error::{CalError, CalResult};

/// A half-duplex command/response link.
pub trait Transport {
    /// Writes one command followed by the line terminator.
    fn send_command(&mut self, command: &str) -> CalResult<()>;

    /// Reads one terminated response line, trimmed.
    fn read_response(&mut self) -> CalResult<String>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_command(&mut self, command: &str) -> CalResult<()> {
        (**self).send_command(command)
    }

    fn read_response(&mut self) -> CalResult<String> {
        (**self).read_response()
    }
}

/// RS-232 link backed by the `serialport` crate.
///
/// The port is closed when this value is dropped, on every exit path.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    settings: SerialSettings,
}

impl SerialTransport {
    pub fn connect(settings: &SerialSettings) -> CalResult<Self> {
        let port = serialport::new(&settings.port, settings.baud)
            .data_bits(DataBits::Eight)
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .flow_control(FlowControl::None)
            .timeout(settings.timeout)
            .open()
            .map_err(|source| CalError::Connection {
                port: settings.port.clone(),
                source,
            })?;

        debug!("Serial port '{}' opened at {} baud", settings.port, settings.baud);
        Ok(Self {
            port,
            settings: settings.clone(),
        })
    }

    /// Sends a bare newline so the instrument drops any half-received command.
    fn wake(&mut self) -> io::Result<()> {
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        thread::sleep(Duration::from_millis(10));
        Ok(())
    }
}

impl Transport for SerialTransport {
    fn send_command(&mut self, command: &str) -> CalResult<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| CalError::Serial(e.into()))?;
        self.wake().map_err(CalError::Serial)?;

        let line = format!("{command}{}", self.settings.eol);
        self.port.write_all(line.as_bytes()).map_err(CalError::Serial)?;
        self.port.flush().map_err(CalError::Serial)?;
        debug!("Sent serial command: {}", command);

        thread::sleep(self.settings.settle);
        Ok(())
    }

    fn read_response(&mut self) -> CalResult<String> {
        let raw = read_until(&mut self.port, self.settings.response_delimiter(), self.settings.timeout)?;
        let response = decode_response(&raw);
        debug!("Received serial response: {}", response);
        Ok(response)
    }
}

/// Reads byte by byte until `delimiter`, which is not included.
///
/// Fails with `Timeout` when the reader times out or no delimiter shows up
/// within `timeout`.
pub fn read_until<R: Read + ?Sized>(reader: &mut R, delimiter: u8, timeout: Duration) -> CalResult<Vec<u8>> {
    let start = Instant::now();
    let mut raw = Vec::with_capacity(64);
    let mut byte = [0u8; 1];

    loop {
        if start.elapsed() > timeout {
            return Err(CalError::Timeout(timeout));
        }
        match reader.read(&mut byte) {
            Ok(1) => {
                if byte[0] == delimiter {
                    return Ok(raw);
                }
                raw.push(byte[0]);
            }
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                return Err(CalError::Timeout(timeout));
            }
            Err(e) => return Err(CalError::Serial(e)),
        }
    }
}

/// ASCII-decodes a response, dropping anything outside 7-bit ASCII.
pub fn decode_response(raw: &[u8]) -> String {
    raw.iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect::<String>()
        .trim()
        .to_string()
}
