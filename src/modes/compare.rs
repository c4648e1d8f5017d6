use log::info;

use crate::config::RunConfig;
use crate::error::{CalError, CalResult};
use crate::registers::RegisterEntry;
use crate::session::Session;
use crate::snapshot::{CompareRow, Status};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareSummary {
    pub total: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub errors: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct CompareOutcome {
    /// One report row per snapshot row, in snapshot order.
    pub rows: Vec<CompareRow>,
    pub summary: CompareSummary,
}

/// Result of comparing one expected value against one live value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub matched: bool,
    /// `actual - expected`, when both sides are numbers.
    pub delta: Option<f64>,
}

pub fn parse_number(text: &str) -> CalResult<f64> {
    text.trim().parse::<f64>().map_err(|source| CalError::Parse {
        text: text.trim().to_string(),
        source,
    })
}

/// Dual-path comparison.
///
/// Identical strings always match, which covers non-numeric values such as
/// identity strings. Otherwise both sides must be numbers and the absolute
/// difference must be within `tolerance`.
pub fn compare_values(expected: &str, actual: &str, tolerance: f64) -> Comparison {
    let exp = expected.trim();
    let act = actual.trim();

    let delta = match (parse_number(exp), parse_number(act)) {
        (Ok(e), Ok(a)) => Some(round_delta(a - e)).filter(|d| d.is_finite()),
        _ => None,
    };
    let matched = exp == act || delta.is_some_and(|d| d.abs() <= tolerance);
    Comparison { matched, delta }
}

/// Rounds to 12 significant digits. The tolerance check and the report both
/// see this value.
fn round_delta(delta: f64) -> f64 {
    if !delta.is_finite() {
        return delta;
    }
    format!("{delta:.11e}").parse::<f64>().unwrap_or(delta)
}

/// Renders a delta in shortest round-trip form.
pub fn format_delta(delta: f64) -> String {
    format!("{:?}", round_delta(delta))
}

/// Reads each snapshot register live and compares it to the recorded value.
pub fn compare<T: Transport>(
    config: &RunConfig,
    rows: &[RegisterEntry],
    session: &mut Session<'_, T>,
) -> CalResult<CompareOutcome> {
    let tol = config.tolerance;
    session.log().banner(format!("COMPARE START | tol={tol}"))?;
    info!("Comparing {} registers (tol={})", rows.len(), tol);
    session.identify()?;

    let mut report = Vec::with_capacity(rows.len());
    let mut summary = CompareSummary::default();

    for entry in rows {
        let expected = entry.value.trim();
        let cmd_read = entry.cmd_read.trim();
        let mut row = CompareRow {
            key: entry.key.clone(),
            cmd_read: cmd_read.to_string(),
            expected: expected.to_string(),
            actual: String::new(),
            status: Status::Skipped,
            delta: String::new(),
            notes: entry.notes.clone(),
        };

        if cmd_read.is_empty() || expected.is_empty() {
            summary.skipped += 1;
            session
                .log()
                .line(format!("[SKIP] {} | cmd_read='{}' expected='{}'", row.key, cmd_read, expected))?;
            report.push(row);
            continue;
        }

        let actual = match session.query(cmd_read) {
            Ok(actual) => actual,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                summary.errors += 1;
                session.log().line(format!("[FAIL] {} | {} -> ({})", row.key, cmd_read, e))?;
                row.status = Status::Error;
                report.push(row);
                continue;
            }
        };

        let cmp = compare_values(expected, &actual, tol);
        row.delta = cmp.delta.map(format_delta).unwrap_or_default();
        let tag = if cmp.matched {
            summary.matched += 1;
            row.status = Status::Match;
            "[ OK ]"
        } else {
            summary.mismatched += 1;
            row.status = Status::Mismatch;
            "[DIFF]"
        };

        let mut line = format!("{tag} {} | expected={} actual={} delta={}", row.key, expected, actual, row.delta);
        if cmp.delta.is_none() && expected != actual {
            if let Err(e) = parse_number(expected).and_then(|_| parse_number(&actual)) {
                line.push_str(&format!(" ({e})"));
            }
        }
        session.log().line(line)?;

        row.actual = actual;
        report.push(row);
    }

    summary.total = report.len();
    session.log().banner(format!(
        "COMPARE END (match={}, mismatch={}, error={}, skipped={}, total={})",
        summary.matched, summary.mismatched, summary.errors, summary.skipped, summary.total
    ))?;
    Ok(CompareOutcome { rows: report, summary })
}
