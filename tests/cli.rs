use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

// 3 global + 95 CBT + 8 range-scoped + 121 CFT
const TABLE_LEN: usize = 227;

fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sr7xx-cal").unwrap();
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("SR7XX_PORT");
    cmd
}

fn dump_fixture(dir: &Path) {
    cmd(dir).args(["--simulate", "dump"]).assert().success();
}

#[test]
fn dump_writes_full_snapshot() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .args(["--simulate", "dump"])
        .assert()
        .success()
        .stdout(contains(format!("dump total={TABLE_LEN} ok={TABLE_LEN} fail=0")));

    let csv = fs::read_to_string(tmp.path().join("sr720_cal.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("key,cmd_read,cmd_write,scope,value,notes"));
    assert_eq!(lines.count(), TABLE_LEN);
    assert!(csv.contains("CMJ@R2,$CRN 2;$CMJ?,$CRN 2;$CMJ,range:2,"));

    let log = fs::read_to_string(tmp.path().join("sr720_cal.log")).unwrap();
    assert!(log.contains("--- DUMP START ---"));
    assert!(log.contains("TX $CBT? 94"));
    assert!(log.contains("[SUMMARY] dump total="));
}

#[test]
fn mode_defaults_to_dump() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .arg("--simulate")
        .assert()
        .success()
        .stdout(contains("dump total="));
    assert!(tmp.path().join("sr720_cal.csv").exists());
}

#[test]
fn compare_against_own_dump_matches() {
    let tmp = TempDir::new().unwrap();
    dump_fixture(tmp.path());

    cmd(tmp.path())
        .args(["--simulate", "compare"])
        .assert()
        .success()
        .stdout(contains(format!("match={TABLE_LEN} mismatch=0 error=0 skipped=0")));

    let report = fs::read_to_string(tmp.path().join("sr720_compare.csv")).unwrap();
    assert!(report.starts_with("key,cmd_read,expected,actual,status,delta,notes\n"));
    assert!(report.contains("FRQ,$FRQ?,12.3,12.3,match,0.0,"));
}

#[test]
fn compare_options_after_mode() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("edited.csv"),
        "key,cmd_read,cmd_write,scope,value,notes\n\
         FRQ,$FRQ?,$FRQ,global,12.25,\n\
         ZOFS,ZOFS?,ZOFS <v>,cal,0.00123,\n\
         RND,$RND?,$RND,global,,\n",
    )
    .unwrap();

    cmd(tmp.path())
        .args(["--simulate", "compare", "--csv", "edited.csv", "--report", "out.csv", "--tol", "0.1"])
        .assert()
        .success()
        .stdout(contains("total=3 match=1 mismatch=0 error=1 skipped=1"));

    let report = fs::read_to_string(tmp.path().join("out.csv")).unwrap();
    assert!(report.contains("FRQ,$FRQ?,12.25,12.3,match,0.05,"));
    assert!(report.contains("ZOFS,ZOFS?,0.00123,,error,,"));
    assert!(report.contains("RND,$RND?,,,skipped,,"));
}

#[test]
fn dry_run_restore_logs_commands() {
    let tmp = TempDir::new().unwrap();
    dump_fixture(tmp.path());

    cmd(tmp.path())
        .args(["--simulate", "restore", "--dry-run"])
        .assert()
        .success()
        .stdout(contains(format!("written=0 skipped_read_only=1 skipped_blank=0 dry_run={}", TABLE_LEN - 1)));

    let log = fs::read_to_string(tmp.path().join("sr720_cal.log")).unwrap();
    assert!(log.contains("[DRY ] FRQ | $FRQ 12.3"));
    assert!(log.contains("[DRY ] CBT[1] | $CBT 1,103"));
    assert!(log.contains("[SKIP] IDN | read-only"));
    assert!(!log.contains("TX $FRQ 12.3"));
}

#[test]
fn restore_writes_and_verifies() {
    let tmp = TempDir::new().unwrap();
    dump_fixture(tmp.path());

    cmd(tmp.path())
        .args(["--simulate", "restore"])
        .assert()
        .success()
        .stdout(contains(format!("written={} skipped_read_only=1", TABLE_LEN - 1)))
        .stdout(contains("failed=0"));
}

#[test]
fn missing_snapshot_fails_before_opening_port() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .args(["--port", "/dev/no-such-sr720", "compare", "--csv", "nope.csv"])
        .assert()
        .failure()
        .stderr(contains("[ERROR]"))
        .stderr(contains("nope.csv"));

    let log = fs::read_to_string(tmp.path().join("sr720_cal.log")).unwrap_or_default();
    assert!(!log.contains("could not open serial port"));
}

#[test]
fn unopenable_port_fails_with_hint() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .args(["--port", "/dev/no-such-sr720", "dump"])
        .assert()
        .failure()
        .stderr(contains("could not open serial port '/dev/no-such-sr720'"))
        .stderr(contains("[HINT]"));

    let log = fs::read_to_string(tmp.path().join("sr720_cal.log")).unwrap();
    assert!(log.contains("--- DUMP ERROR ---"));
    assert!(log.contains("[HINT]"));
    assert!(!tmp.path().join("sr720_cal.csv").exists());
}

#[test]
fn bad_terminator_is_rejected() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .args(["--simulate", "--eol", "\\q", "dump"])
        .assert()
        .failure()
        .stderr(contains("unknown escape"));
}
