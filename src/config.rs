//! Run configuration, built once at startup and handed to every mode.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CalError, CalResult};

/// Default compare tolerance.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Pause between writing a query and reading its answer.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(50);

#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM5";
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(s: StopBits) -> Self {
        match s {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Everything needed to open and talk over the RS-232 link.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Per-command read timeout.
    pub timeout: Duration,
    /// Command terminator. The SR720 accepts CR or LF.
    pub eol: String,
    pub settle: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud: 9600,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_secs(1),
            eol: "\n".to_string(),
            settle: DEFAULT_SETTLE,
        }
    }
}

impl SerialSettings {
    pub fn validate(&self) -> CalResult<()> {
        if self.port.trim().is_empty() {
            return Err(CalError::Config("port name is empty".into()));
        }
        if self.baud == 0 {
            return Err(CalError::Config("baud rate must be non-zero".into()));
        }
        if self.timeout.is_zero() {
            return Err(CalError::Config("timeout must be positive".into()));
        }
        if self.eol.is_empty() {
            return Err(CalError::Config("line terminator is empty".into()));
        }
        Ok(())
    }

    /// Byte that ends an instrument response: the last byte of the terminator.
    pub fn response_delimiter(&self) -> u8 {
        self.eol.as_bytes().last().copied().unwrap_or(b'\n')
    }
}

/// Which of the three operations to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dump,
    Restore,
    Compare,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Dump => "DUMP",
            Mode::Restore => "RESTORE",
            Mode::Compare => "COMPARE",
        }
    }
}

/// Immutable description of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub mode: Mode,
    pub serial: SerialSettings,
    /// Snapshot written by dump, read by restore and compare.
    pub csv: PathBuf,
    pub log: PathBuf,
    pub report: PathBuf,
    pub dry_run: bool,
    pub tolerance: f64,
}

impl RunConfig {
    pub fn new(mode: Mode, serial: SerialSettings) -> Self {
        Self {
            mode,
            serial,
            csv: PathBuf::from("sr720_cal.csv"),
            log: PathBuf::from("sr720_cal.log"),
            report: PathBuf::from("sr720_compare.csv"),
            dry_run: false,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn validate(&self) -> CalResult<()> {
        self.serial.validate()?;
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(CalError::Config(format!("tolerance must be >= 0, got {}", self.tolerance)));
        }
        Ok(())
    }
}

/// Expands backslash escapes in a terminator typed on the command line,
/// so `--eol '\r\n'` means CR LF.
pub fn unescape_eol(raw: &str) -> CalResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => return Err(CalError::Config(format!("unknown escape '\\{other}' in terminator"))),
            None => return Err(CalError::Config("terminator ends with a lone backslash".into())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_common_terminators() {
        assert_eq!(unescape_eol("\\n").unwrap(), "\n");
        assert_eq!(unescape_eol("\\r\\n").unwrap(), "\r\n");
        assert_eq!(unescape_eol("\r").unwrap(), "\r");
        assert_eq!(unescape_eol("\\\\").unwrap(), "\\");
    }

    #[test]
    fn rejects_bad_escapes() {
        assert!(unescape_eol("\\x").is_err());
        assert!(unescape_eol("abc\\").is_err());
    }

    #[test]
    fn response_delimiter_is_last_byte() {
        let mut s = SerialSettings::default();
        assert_eq!(s.response_delimiter(), b'\n');
        s.eol = "\r".into();
        assert_eq!(s.response_delimiter(), b'\r');
        s.eol = "\r\n".into();
        assert_eq!(s.response_delimiter(), b'\n');
    }

    #[test]
    fn validation_catches_nonsense() {
        let mut cfg = RunConfig::new(Mode::Compare, SerialSettings::default());
        assert!(cfg.validate().is_ok());
        cfg.tolerance = -1.0;
        assert!(cfg.validate().is_err());
        cfg.tolerance = f64::NAN;
        assert!(cfg.validate().is_err());
        cfg.tolerance = 0.0;
        cfg.serial.eol.clear();
        assert!(cfg.validate().is_err());
    }
}
