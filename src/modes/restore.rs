use log::{info, warn};

use crate::config::RunConfig;
use crate::error::CalResult;
use crate::modes::compare::compare_values;
use crate::registers::RegisterEntry;
use crate::session::Session;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub total: usize,
    /// Commands actually sent.
    pub written: usize,
    pub skipped_read_only: usize,
    /// Writable rows with no recorded value, e.g. from a failed dump.
    pub skipped_blank: usize,
    /// Commands formatted but not sent because of `--dry-run`.
    pub dry_run: usize,
    /// Sent, but the read-back disagreed.
    pub bad_verify: usize,
    pub write_fail: usize,
    /// Values that would not make a safe command.
    pub invalid: usize,
}

impl RestoreSummary {
    pub fn failed(&self) -> usize {
        self.bad_verify + self.write_fail + self.invalid
    }
}

/// Rejects values that would smuggle extra commands onto the line.
fn validate_value(value: &str) -> Result<(), String> {
    if value.contains(';') {
        return Err("value contains ';'".to_string());
    }
    if value.chars().any(|c| c.is_control()) {
        return Err("value contains control characters".to_string());
    }
    Ok(())
}

/// Writes snapshot values back into the instrument.
///
/// Read-only and blank rows are skipped. With `config.dry_run` every command
/// is formatted, validated and logged, but nothing is sent. A failed write is
/// logged and the restore moves on.
pub fn restore<T: Transport>(
    config: &RunConfig,
    rows: &[RegisterEntry],
    session: &mut Session<'_, T>,
) -> CalResult<RestoreSummary> {
    let dry_run = config.dry_run;
    session.log().banner(format!("RESTORE START | dry_run={dry_run}"))?;
    info!("Restoring {} registers (dry_run={})", rows.len(), dry_run);
    if !dry_run {
        session.identify()?;
    }

    let mut summary = RestoreSummary {
        total: rows.len(),
        ..Default::default()
    };

    for entry in rows {
        let key = entry.key.as_str();
        let value = entry.value.trim();

        let Some(command) = entry.write_command(value) else {
            summary.skipped_read_only += 1;
            session.log().line(format!("[SKIP] {key} | read-only, excluded from restore"))?;
            continue;
        };
        if value.is_empty() {
            summary.skipped_blank += 1;
            session.log().line(format!("[SKIP] {key} | no value recorded"))?;
            continue;
        }
        if let Err(reason) = validate_value(value) {
            summary.invalid += 1;
            session.log().line(format!("[FAIL] {key} | {command} | {reason}"))?;
            continue;
        }

        if dry_run {
            summary.dry_run += 1;
            session.log().line(format!("[DRY ] {key} | {command}"))?;
            continue;
        }

        match session.send(&command) {
            Ok(()) => summary.written += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("{key}: write failed: {e}");
                summary.write_fail += 1;
                session.log().line(format!("[FAIL] {key} | {command} | error={e}"))?;
                continue;
            }
        }

        let cmd_read = entry.cmd_read.trim();
        let mut tag = "[ OK ]";
        let verify = if cmd_read.is_empty() {
            String::new()
        } else {
            match session.query(cmd_read) {
                Ok(readback) => {
                    if !compare_values(value, &readback, 0.0).matched {
                        tag = "[BAD ]";
                        summary.bad_verify += 1;
                    }
                    readback
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => "(no response)".to_string(),
            }
        };
        session
            .log()
            .line(format!("{tag} {key} | {command} | expected={value} verify={verify}"))?;
    }

    if summary.failed() > 0 {
        session.log().banner("Write failure detected.  Check CAL jumper enabled?")?;
    }
    session.log().banner(format!(
        "RESTORE END (written={}, skipped_read_only={}, skipped_blank={}, dry_run={}, failures={})",
        summary.written,
        summary.skipped_read_only,
        summary.skipped_blank,
        summary.dry_run,
        summary.failed()
    ))?;
    Ok(summary)
}
