//! The SR715/SR720 calibration register table.
//!
//! Ranges and command forms come from the instrument manual: 95 amplitude
//! calbytes (`$CBT`), 121 floating point calbytes (`$CFT`) and a major/minor
//! standard resistor pair (`$CMJ`/`$CMN`) for each of the four measurement
//! ranges, selected with `$CRN`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CalError, CalResult};

pub const CBT_MAX_INDEX: u32 = 94;
pub const CFT_MAX_INDEX: u32 = 120;
pub const RANGE_MAX: u8 = 3;

/// Placeholder a write template may use for where the value goes.
pub const VALUE_PLACEHOLDER: &str = "<v>";

/// One calibration parameter, and one row of a snapshot CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterEntry {
    pub key: String,
    pub cmd_read: String,
    /// `None` marks a read-only register.
    pub cmd_write: Option<String>,
    pub scope: String,
    /// Raw instrument text; numeric for calibration constants.
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub notes: String,
}

impl RegisterEntry {
    pub fn new(key: impl Into<String>, cmd_read: impl Into<String>, cmd_write: Option<&str>, scope: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cmd_read: cmd_read.into(),
            cmd_write: cmd_write.map(str::to_string),
            scope: scope.into(),
            value: String::new(),
            notes: notes.into(),
        }
    }

    /// Write template, if this register is writable at all.
    pub fn write_template(&self) -> Option<&str> {
        self.cmd_write.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn is_read_only(&self) -> bool {
        self.write_template().is_none()
    }

    /// Builds the command that stores `value` into this register.
    pub fn write_command(&self, value: &str) -> Option<String> {
        self.write_template().map(|t| format_write(t, value))
    }
}

/// Fills a write template with a value.
///
/// A template carrying `<v>` gets the value substituted in place. Otherwise the
/// value is appended to the last `;`-separated sub-command, so a range select
/// prefix like `$CRN 2;` is left alone. Indexed calbyte writes take the value
/// after a comma (`$CBT 3,128`), everything else after a space.
pub fn format_write(template: &str, value: &str) -> String {
    if template.contains(VALUE_PLACEHOLDER) {
        return template.replace(VALUE_PLACEHOLDER, value);
    }

    let mut parts: Vec<&str> = template.split(';').map(str::trim).filter(|p| !p.is_empty()).collect();
    let Some(target) = parts.pop() else {
        return value.to_string();
    };

    let indexed = target.starts_with("$CBT ") || target.starts_with("$CFT ");
    let has_index = target.split_whitespace().nth(1).is_some();
    let last = if indexed && has_index {
        format!("{target},{value}")
    } else {
        format!("{target} {value}")
    };

    parts.iter().map(|p| p.to_string()).chain(std::iter::once(last)).collect::<Vec<_>>().join(";")
}

/// Ordered, immutable list of registers. Keys are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterTable {
    entries: Vec<RegisterEntry>,
}

impl RegisterTable {
    pub fn from_entries(entries: Vec<RegisterEntry>) -> CalResult<Self> {
        let mut seen = HashSet::new();
        for e in &entries {
            if !seen.insert(e.key.as_str()) {
                return Err(CalError::Config(format!("duplicate register key '{}'", e.key)));
            }
        }
        Ok(Self { entries })
    }

    /// The full SR715/SR720 calibration table.
    pub fn sr7xx() -> Self {
        let mut entries = vec![
            RegisterEntry::new("IDN", "*IDN?", None, "global", "Instrument ID string"),
            RegisterEntry::new("FRQ", "$FRQ?", Some("$FRQ"), "global", "Frequency correction factor (ppm, ±10000, 0.1ppm)"),
            RegisterEntry::new("RND", "$RND?", Some("$RND"), "global", "Rounding (-1 auto, 0..3 fixed digits)"),
        ];

        for i in 0..=CBT_MAX_INDEX {
            entries.push(RegisterEntry::new(
                format!("CBT[{i}]"),
                format!("$CBT? {i}"),
                Some(format!("$CBT {i}").as_str()),
                "global",
                "Amplitude calbyte (j=0..255)",
            ));
        }

        for r in 0..=RANGE_MAX {
            entries.push(RegisterEntry::new(
                format!("CMJ@R{r}"),
                format!("$CRN {r};$CMJ?"),
                Some(format!("$CRN {r};$CMJ").as_str()),
                format!("range:{r}"),
                "Std resistor cal: major parameter (Ohms) for range r",
            ));
            entries.push(RegisterEntry::new(
                format!("CMN@R{r}"),
                format!("$CRN {r};$CMN?"),
                Some(format!("$CRN {r};$CMN").as_str()),
                format!("range:{r}"),
                "Std resistor cal: minor parameter (ppm) for range r",
            ));
        }

        for i in 0..=CFT_MAX_INDEX {
            entries.push(RegisterEntry::new(
                format!("CFT[{i}]"),
                format!("$CFT? {i}"),
                Some(format!("$CFT {i}").as_str()),
                "global",
                "Floating point calbyte i = 0..120",
            ));
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[RegisterEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegisterEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&RegisterEntry> {
        self.entries.iter().find(|e| e.key == key)
    }
}
