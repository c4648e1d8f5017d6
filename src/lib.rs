//! # SR715/SR720 Calibration Utility Library
//!
//! Backs up, restores and verifies the calibration constants an SRS SR715 or
//! SR720 LCR meter keeps in battery-backed memory, talking to it over RS-232.
//!
//! A static [`RegisterTable`] lists every calibration register. The three
//! modes in [`modes`] walk either that table (dump) or a saved snapshot
//! (restore, compare) one command at a time through a [`Session`], which
//! mirrors all wire traffic into the [`CalLog`].

pub mod config;
pub mod error;
pub mod logbook;
pub mod modes;
pub mod registers;
pub mod session;
pub mod simulator;
pub mod snapshot;
pub mod transport;

pub use config::{Mode, RunConfig, SerialSettings};
pub use error::{CalError, CalResult};
pub use logbook::CalLog;
pub use registers::{RegisterEntry, RegisterTable};
pub use session::Session;
pub use simulator::{SimulatedLink, Simulator};
pub use snapshot::{CompareRow, Status};
pub use transport::{SerialTransport, Transport};
