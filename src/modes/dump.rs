use log::info;

use crate::error::CalResult;
use crate::registers::{RegisterEntry, RegisterTable};
use crate::session::Session;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub total: usize,
    pub ok: usize,
    pub fail: usize,
}

#[derive(Debug, Clone)]
pub struct DumpOutcome {
    /// Table entries with `value` filled in, in table order.
    pub entries: Vec<RegisterEntry>,
    pub summary: DumpSummary,
}

/// Reads every register in `table` from the instrument.
///
/// A register that does not answer keeps an empty value and gets a note; the
/// dump carries on.
pub fn dump<T: Transport>(table: &RegisterTable, session: &mut Session<'_, T>) -> CalResult<DumpOutcome> {
    session.log().banner("DUMP START")?;
    info!("Dumping {} registers", table.len());

    let mut entries = Vec::with_capacity(table.len());
    let mut summary = DumpSummary::default();

    for reg in table.iter() {
        let mut entry = reg.clone();
        match session.query(&entry.cmd_read) {
            Ok(value) => {
                summary.ok += 1;
                session.log().line(format!("[ OK ] {} | {} -> {}", entry.key, entry.cmd_read, value))?;
                entry.value = value;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                summary.fail += 1;
                session.log().line(format!("[FAIL] {} | {} -> ({})", entry.key, entry.cmd_read, e))?;
                entry.value.clear();
                entry.notes = if entry.notes.is_empty() {
                    format!("read failed: {e}")
                } else {
                    format!("{} [read failed: {e}]", entry.notes)
                };
            }
        }
        entries.push(entry);
    }

    summary.total = entries.len();
    session.log().banner(format!(
        "DUMP END ({} rows, ok={}, fail={})",
        summary.total, summary.ok, summary.fail
    ))?;
    Ok(DumpOutcome { entries, summary })
}
