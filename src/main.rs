use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use crossterm::style::Stylize;
use log::info;

use sr7xx_cal::config::{self, Parity, StopBits, DEFAULT_PORT, DEFAULT_SETTLE, DEFAULT_TOLERANCE};
use sr7xx_cal::{
    modes, snapshot, CalError, CalLog, Mode, RegisterEntry, RegisterTable, RunConfig, SerialSettings, SerialTransport,
    Session, SimulatedLink, Simulator, Transport,
};

#[derive(Parser, Debug)]
#[command(name = "sr7xx-cal", version)]
#[command(about = "SR715/SR720 calibration constants dump/restore/compare over RS232. Default mode is dump.")]
struct Cli {
    /// Serial port, e.g. COM5 or /dev/ttyUSB0
    #[arg(long, env = "SR7XX_PORT", default_value = DEFAULT_PORT)]
    port: String,

    /// Baud rate
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Parity
    #[arg(long, value_enum, default_value_t = ParityArg::N)]
    parity: ParityArg,

    /// Number of stop bits
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    stopbits: u8,

    /// Per-command timeout in seconds
    #[arg(long, default_value_t = 1.0)]
    timeout: f64,

    /// Command terminator, e.g. \n or \r\n
    #[arg(long, default_value = "\\n")]
    eol: String,

    /// Snapshot CSV: dump output, restore input, compare baseline
    #[arg(long, global = true, default_value = "sr720_cal.csv")]
    csv: PathBuf,

    /// Log file, appended to on every run
    #[arg(long, global = true, default_value = "sr720_cal.log")]
    log: PathBuf,

    /// Compare report CSV output path
    #[arg(long, global = true, default_value = "sr720_compare.csv")]
    report: PathBuf,

    /// Talk to a built-in SR720 simulator instead of the serial port
    #[arg(long, global = true)]
    simulate: bool,

    /// Increase diagnostic output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    mode: Option<ModeCommand>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum ModeCommand {
    /// Read every calibration register into the snapshot CSV
    Dump,
    /// Write snapshot values back into the instrument
    Restore {
        /// Log the commands that would be sent without sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Compare live values against the snapshot and write a report
    Compare {
        /// Tolerance for numeric comparisons
        #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
        tol: f64,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ParityArg {
    #[value(name = "N", alias = "n")]
    N,
    #[value(name = "E", alias = "e")]
    E,
    #[value(name = "O", alias = "o")]
    O,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .with_context(|| format!("--timeout must be a positive number of seconds, got {}", self.timeout))?;

        let serial = SerialSettings {
            port: self.port.clone(),
            baud: self.baud,
            parity: match self.parity {
                ParityArg::N => Parity::None,
                ParityArg::E => Parity::Even,
                ParityArg::O => Parity::Odd,
            },
            stop_bits: if self.stopbits == 2 { StopBits::Two } else { StopBits::One },
            timeout,
            eol: config::unescape_eol(&self.eol)?,
            settle: DEFAULT_SETTLE,
        };

        let mode = self.mode.unwrap_or(ModeCommand::Dump);
        let mut cfg = RunConfig::new(
            match mode {
                ModeCommand::Dump => Mode::Dump,
                ModeCommand::Restore { .. } => Mode::Restore,
                ModeCommand::Compare { .. } => Mode::Compare,
            },
            serial,
        );
        cfg.csv = self.csv.clone();
        cfg.log = self.log.clone();
        cfg.report = self.report.clone();
        match mode {
            ModeCommand::Restore { dry_run } => cfg.dry_run = dry_run,
            ModeCommand::Compare { tol } => cfg.tolerance = tol,
            ModeCommand::Dump => {}
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "[ERROR]".red().bold());
            if let Some(hint) = e.downcast_ref::<CalError>().and_then(CalError::hint) {
                eprintln!("{} {hint}", "[HINT]".yellow());
            }
            if cli.log.exists() {
                eprintln!("[INFO] See log: {}", cli.log.display());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.run_config()?;
    let table = RegisterTable::sr7xx();
    let mut log = CalLog::open(&config.log)?;

    // Restore and compare need a readable snapshot before the port is touched.
    let rows = match config.mode {
        Mode::Dump => Vec::new(),
        Mode::Restore | Mode::Compare => snapshot::read_snapshot(&config.csv)?,
    };

    if cli.simulate {
        info!("Using the built-in simulator");
        return execute(&config, &table, &rows, SimulatedLink::new(Simulator::new()), &mut log);
    }

    let link = match SerialTransport::connect(&config.serial) {
        Ok(link) => link,
        Err(e) => {
            log.banner(format!("{} ERROR", config.mode.label()))?;
            log.line(format!("[FAIL] {e}"))?;
            if let Some(hint) = e.hint() {
                log.line(format!("[HINT] {hint}"))?;
            }
            return Err(e.into());
        }
    };
    execute(&config, &table, &rows, link, &mut log)
}

fn execute<T: Transport>(
    config: &RunConfig,
    table: &RegisterTable,
    rows: &[RegisterEntry],
    link: T,
    log: &mut CalLog,
) -> Result<()> {
    let mut session = Session::new(link, log);
    let csv = config.csv.display();
    let log_path = config.log.display();

    let (line, clean) = match config.mode {
        Mode::Dump => {
            let out = modes::dump(table, &mut session)?;
            snapshot::write_snapshot(&config.csv, &out.entries)?;
            let s = out.summary;
            (
                format!("dump total={} ok={} fail={} csv={csv} log={log_path}", s.total, s.ok, s.fail),
                s.fail == 0,
            )
        }
        Mode::Restore => {
            let s = modes::restore(config, rows, &mut session)?;
            (
                format!(
                    "restore total={} written={} skipped_read_only={} skipped_blank={} dry_run={} \
                     bad_verify={} write_fail={} failed={} csv={csv} log={log_path}",
                    s.total,
                    s.written,
                    s.skipped_read_only,
                    s.skipped_blank,
                    s.dry_run,
                    s.bad_verify,
                    s.write_fail,
                    s.failed()
                ),
                s.failed() == 0,
            )
        }
        Mode::Compare => {
            let out = modes::compare(config, rows, &mut session)?;
            snapshot::write_report(&config.report, &out.rows)?;
            let s = out.summary;
            (
                format!(
                    "compare total={} match={} mismatch={} error={} skipped={} report={} log={log_path}",
                    s.total,
                    s.matched,
                    s.mismatched,
                    s.errors,
                    s.skipped,
                    config.report.display()
                ),
                s.mismatched == 0 && s.errors == 0,
            )
        }
    };

    session.log().line(format!("[SUMMARY] {line}"))?;
    session.log().flush()?;
    let tag = if clean { "[SUMMARY]".green() } else { "[SUMMARY]".yellow() };
    println!("{} {line}", tag.bold());
    Ok(())
}
