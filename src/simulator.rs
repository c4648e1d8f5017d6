//! # SR720 Simulator
//!
//! Holds the calibration memory of a simulated SR715/SR720 and processes
//! commands against it, returning the responses the real instrument would.
//! Like the hardware, it stays silent on anything it does not understand, and
//! it ignores calibration writes while the CAL jumper is off.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::num::ParseIntError;
use std::time::Duration;

use log::debug;

use crate::error::{CalError, CalResult};
use crate::registers::{CBT_MAX_INDEX, CFT_MAX_INDEX, RANGE_MAX};
use crate::transport::Transport;

pub const SIMULATED_IDN: &str = "StanfordResearchSystems,SR720,s/n00000,ver1.07";

// Custom error types for command processing.
#[derive(Debug, PartialEq)]
pub enum CommandError {
    /// Nothing but whitespace between terminators.
    Empty,
    /// The command mnemonic is not part of the instrument's command set.
    UnknownCommand(String),
    /// An indexed command was sent without its index.
    MissingIndex,
    /// The index is not a valid number.
    InvalidIndex(ParseIntError),
    /// The index is outside the register bank.
    IndexOutOfRange(u32),
    /// The value to store is missing or not numeric.
    InvalidValue(String),
}

// Indexed calbyte banks.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Bank {
    Cbt,
    Cft,
}

impl Bank {
    fn max_index(self) -> u32 {
        match self {
            Bank::Cbt => CBT_MAX_INDEX,
            Bank::Cft => CFT_MAX_INDEX,
        }
    }

    fn key(self, index: u32) -> String {
        match self {
            Bank::Cbt => format!("CBT[{index}]"),
            Bank::Cft => format!("CFT[{index}]"),
        }
    }
}

// One parsed sub-command.
#[derive(Debug, PartialEq)]
enum Command {
    Identify,
    SelectRange(u8),
    QueryRange,
    QueryIndexed(Bank, u32),
    WriteIndexed(Bank, u32, String),
    // Plain and range-scoped registers, by their register key.
    Query(String),
    Write(String, String),
}

/// The state of the simulated instrument.
#[derive(Debug, Clone)]
pub struct Simulator {
    pub identity: String,
    /// Mirrors the CAL jumper: writes are ignored while this is false.
    pub write_enabled: bool,
    registers: BTreeMap<String, String>,
    // Registers that never answer.
    silent: HashSet<String>,
    range: u8,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Creates a simulator preloaded with plausible factory calibration.
    pub fn new() -> Self {
        let mut registers = BTreeMap::new();
        registers.insert("FRQ".to_string(), "12.3".to_string());
        registers.insert("RND".to_string(), "-1".to_string());
        for i in 0..=CBT_MAX_INDEX {
            registers.insert(Bank::Cbt.key(i), ((100 + i * 3) % 256).to_string());
        }
        for r in 0..=RANGE_MAX {
            registers.insert(format!("CMJ@R{r}"), format!("{}.{:03}", 10u32.pow(u32::from(r) + 1), 17 + u32::from(r)));
            registers.insert(format!("CMN@R{r}"), format!("{}", i32::from(r) * 7 - 9));
        }
        for i in 0..=CFT_MAX_INDEX {
            registers.insert(Bank::Cft.key(i), format!("{:.6}", 1.0 + f64::from(i) * 1.25e-4));
        }

        Self {
            identity: SIMULATED_IDN.to_string(),
            write_enabled: true,
            registers,
            silent: HashSet::new(),
            range: 0,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.registers.get(key).map(String::as_str)
    }

    /// Seeds or overwrites a register, including ones outside the SR720 set.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.registers.insert(key.into(), value.into());
    }

    /// Makes a register stop answering queries.
    pub fn silence(&mut self, key: impl Into<String>) {
        self.silent.insert(key.into());
    }

    /// Processes a command line and returns the response, if any.
    ///
    /// `;` separates sub-commands; the answer of the last query is returned.
    pub fn process_command(&mut self, command_str: &str) -> Result<Option<String>, CommandError> {
        let parts: Vec<&str> = command_str.split(';').map(str::trim).filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Err(CommandError::Empty);
        }

        let mut response = None;
        for part in parts {
            let command = self.parse_command(part)?;
            if let Some(r) = self.execute_command(command) {
                response = Some(r);
            }
        }
        Ok(response)
    }

    /// Parses one sub-command into a `Command`.
    fn parse_command(&self, content: &str) -> Result<Command, CommandError> {
        let (head, args) = match content.split_once(char::is_whitespace) {
            Some((h, a)) => (h, a.trim()),
            None => (content, ""),
        };
        let mnemonic = head.trim_start_matches(&['$', '*'][..]).to_ascii_uppercase();
        let is_query = mnemonic.ends_with('?');
        let name = mnemonic.trim_end_matches('?');

        match (name, is_query) {
            ("IDN", true) => Ok(Command::Identify),
            ("CRN", true) => Ok(Command::QueryRange),
            ("CRN", false) => {
                let range = parse_index(args)?;
                if range > u32::from(RANGE_MAX) {
                    return Err(CommandError::IndexOutOfRange(range));
                }
                Ok(Command::SelectRange(range as u8))
            }
            ("CBT" | "CFT", _) => {
                let bank = if name == "CBT" { Bank::Cbt } else { Bank::Cft };
                if is_query {
                    let index = parse_index(args)?;
                    check_index(bank, index)?;
                    Ok(Command::QueryIndexed(bank, index))
                } else {
                    let (index, value) = args.split_once(',').ok_or(CommandError::MissingIndex)?;
                    let index = parse_index(index)?;
                    check_index(bank, index)?;
                    let value = parse_value(value)?;
                    if bank == Bank::Cbt && !matches!(value.parse::<u32>(), Ok(0..=255)) {
                        return Err(CommandError::InvalidValue(value));
                    }
                    Ok(Command::WriteIndexed(bank, index, value))
                }
            }
            ("CMJ" | "CMN", _) => {
                let key = format!("{name}@R{}", self.range);
                if is_query {
                    Ok(Command::Query(key))
                } else {
                    Ok(Command::Write(key, parse_value(args)?))
                }
            }
            (name, _) if self.registers.contains_key(name) => {
                if is_query {
                    Ok(Command::Query(name.to_string()))
                } else {
                    Ok(Command::Write(name.to_string(), parse_value(args)?))
                }
            }
            _ => Err(CommandError::UnknownCommand(head.to_string())),
        }
    }

    /// Executes a parsed command and returns the response string, if any.
    fn execute_command(&mut self, command: Command) -> Option<String> {
        match command {
            Command::Identify => Some(self.identity.clone()),
            Command::SelectRange(r) => {
                self.range = r;
                None
            }
            Command::QueryRange => Some(self.range.to_string()),
            Command::QueryIndexed(bank, i) => self.answer(&bank.key(i)),
            Command::Query(key) => self.answer(&key),
            Command::WriteIndexed(bank, i, value) => {
                self.store(bank.key(i), value);
                None
            }
            Command::Write(key, value) => {
                self.store(key, value);
                None
            }
        }
    }

    fn answer(&self, key: &str) -> Option<String> {
        if self.silent.contains(key) {
            return None;
        }
        self.registers.get(key).cloned()
    }

    fn store(&mut self, key: String, value: String) {
        if self.write_enabled {
            self.registers.insert(key, value);
        } else {
            debug!("CAL jumper off, ignoring write to {key}");
        }
    }
}

fn parse_index(s: &str) -> Result<u32, CommandError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(CommandError::MissingIndex);
    }
    s.parse::<u32>().map_err(CommandError::InvalidIndex)
}

fn check_index(bank: Bank, index: u32) -> Result<(), CommandError> {
    if index > bank.max_index() {
        return Err(CommandError::IndexOutOfRange(index));
    }
    Ok(())
}

fn parse_value(s: &str) -> Result<String, CommandError> {
    let s = s.trim();
    if s.parse::<f64>().is_err() {
        return Err(CommandError::InvalidValue(s.to_string()));
    }
    Ok(s.to_string())
}

/// [`Transport`] over an in-process [`Simulator`].
///
/// Keeps every command it was given so callers can see what went out.
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    pub meter: Simulator,
    pub sent: Vec<String>,
    pending: VecDeque<String>,
    timeout: Duration,
}

impl SimulatedLink {
    pub fn new(meter: Simulator) -> Self {
        Self {
            meter,
            sent: Vec::new(),
            pending: VecDeque::new(),
            timeout: Duration::from_secs(1),
        }
    }
}

impl Transport for SimulatedLink {
    fn send_command(&mut self, command: &str) -> CalResult<()> {
        self.sent.push(command.to_string());
        match self.meter.process_command(command) {
            Ok(Some(response)) => self.pending.push_back(response),
            Ok(None) => {}
            Err(e) => debug!("Simulator rejected '{command}': {e:?}"),
        }
        Ok(())
    }

    fn read_response(&mut self) -> CalResult<String> {
        self.pending.pop_front().ok_or(CalError::Timeout(self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify() {
        let mut sim = Simulator::new();
        assert_eq!(sim.process_command("*IDN?").unwrap(), Some(SIMULATED_IDN.to_string()));
    }

    #[test]
    fn indexed_calbyte_roundtrip() {
        let mut sim = Simulator::new();
        assert_eq!(sim.process_command("$CBT 5,200").unwrap(), None);
        assert_eq!(sim.process_command("$CBT? 5").unwrap(), Some("200".to_string()));
        assert_eq!(sim.process_command("$CFT 120,0.99875").unwrap(), None);
        assert_eq!(sim.get("CFT[120]"), Some("0.99875"));
    }

    #[test]
    fn calbyte_out_of_range() {
        let mut sim = Simulator::new();
        assert_eq!(sim.process_command("$CBT? 95"), Err(CommandError::IndexOutOfRange(95)));
        assert_eq!(sim.process_command("$CBT 3,256"), Err(CommandError::InvalidValue("256".into())));
        assert!(matches!(sim.process_command("$CFT? x"), Err(CommandError::InvalidIndex(_))));
        assert_eq!(sim.process_command("$CFT 3"), Err(CommandError::MissingIndex));
    }

    #[test]
    fn range_scoped_registers_follow_crn() {
        let mut sim = Simulator::new();
        sim.process_command("$CRN 2;$CMJ 1000.5").unwrap();
        assert_eq!(sim.get("CMJ@R2"), Some("1000.5"));
        assert_ne!(sim.get("CMJ@R0"), Some("1000.5"));
        assert_eq!(sim.process_command("$CRN 2;$CMJ?").unwrap(), Some("1000.5".into()));
        assert_eq!(sim.process_command("$CRN?").unwrap(), Some("2".into()));
        assert_eq!(sim.process_command("$CRN 4"), Err(CommandError::IndexOutOfRange(4)));
    }

    #[test]
    fn generic_registers() {
        let mut sim = Simulator::new();
        sim.set("ZOFS", "0.00123");
        assert_eq!(sim.process_command("ZOFS?").unwrap(), Some("0.00123".into()));
        sim.process_command("ZOFS 0.5").unwrap();
        assert_eq!(sim.get("ZOFS"), Some("0.5"));
        assert_eq!(sim.process_command("$FRQ?").unwrap(), Some("12.3".into()));
        assert_eq!(sim.process_command("$BOGUS?"), Err(CommandError::UnknownCommand("$BOGUS?".into())));
    }

    #[test]
    fn writes_ignored_without_cal_jumper() {
        let mut sim = Simulator::new();
        sim.write_enabled = false;
        sim.process_command("$FRQ 99").unwrap();
        assert_eq!(sim.get("FRQ"), Some("12.3"));
    }

    #[test]
    fn silenced_register_times_out_over_the_link() {
        let mut sim = Simulator::new();
        sim.silence("RND");
        let mut link = SimulatedLink::new(sim);
        link.send_command("$RND?").unwrap();
        assert!(matches!(link.read_response(), Err(CalError::Timeout(_))));
        link.send_command("$FRQ?").unwrap();
        assert_eq!(link.read_response().unwrap(), "12.3");
        assert_eq!(link.sent, vec!["$RND?", "$FRQ?"]);
    }

    #[test]
    fn empty_command() {
        let mut sim = Simulator::new();
        assert_eq!(sim.process_command(" ; "), Err(CommandError::Empty));
    }
}
