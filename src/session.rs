//! One transport plus the calibration log, with wire traffic mirrored.

use log::warn;

use crate::error::{CalError, CalResult};
use crate::logbook::CalLog;
use crate::transport::Transport;

pub struct Session<'a, T: Transport> {
    link: T,
    log: &'a mut CalLog,
}

impl<'a, T: Transport> Session<'a, T> {
    pub fn new(link: T, log: &'a mut CalLog) -> Self {
        Self { link, log }
    }

    pub fn log(&mut self) -> &mut CalLog {
        self.log
    }

    /// Sends one command, logging it as `TX`.
    pub fn send(&mut self, command: &str) -> CalResult<()> {
        self.log.line(format!("TX {command}"))?;
        self.link.send_command(command)
    }

    /// Sends a query and waits for its answer. A blank answer is a failure.
    ///
    /// Per-entry failures come back as non-fatal errors; a log write failure
    /// comes back fatal.
    pub fn query(&mut self, command: &str) -> CalResult<String> {
        self.send(command)?;
        match self.link.read_response() {
            Ok(reply) if reply.is_empty() => {
                self.log.line("RX (empty)")?;
                Err(CalError::EmptyResponse)
            }
            Ok(reply) => {
                self.log.line(format!("RX {reply}"))?;
                Ok(reply)
            }
            Err(e) => {
                warn!("{command}: {e}");
                self.log.line(format!("RX ({e})"))?;
                Err(e)
            }
        }
    }

    /// Asks for the identity string and records it. Failure is only noted.
    pub fn identify(&mut self) -> CalResult<Option<String>> {
        match self.query("*IDN?") {
            Ok(idn) => {
                self.log.line(format!("[INFO] *IDN? -> {idn}"))?;
                Ok(Some(idn))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(_) => {
                self.log.line("[INFO] *IDN? -> (no response)")?;
                Ok(None)
            }
        }
    }

    pub fn into_inner(self) -> T {
        self.link
    }
}
