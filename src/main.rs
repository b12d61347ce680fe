//! Transim - transient circuit simulator
//!
//! Runs a netlist through a fixed-step transient analysis and writes the
//! recorded signals.
//!
//! # Usage
//!
//! ```bash
//! transim rc.cir --step 10u --stop 5m --method trap > rc.csv
//! transim rc.cir --format json --output rc.json -v
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};
use transim::{
    components::StamperRegistry,
    dsl,
    error::{Result, TransimError},
    output::{self, OutputFormat},
    solver::{IntegrationMethod, SimulatorConfig},
    Netlist, Simulator,
};

/// Time-domain companion-model circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// Time step in seconds, overrides .tran (suffixes allowed, e.g. 10u)
    #[arg(long, value_parser = parse_seconds)]
    step: Option<f64>,

    /// Stop time in seconds, overrides .tran
    #[arg(long, value_parser = parse_seconds)]
    stop: Option<f64>,

    /// Integration method, overrides .method (be | trap)
    #[arg(short, long)]
    method: Option<IntegrationMethod>,

    /// Maximum re-solves per step for switching elements
    #[arg(long)]
    max_switch: Option<usize>,

    /// Record every n-th step
    #[arg(long)]
    record: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Write results here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_seconds(s: &str) -> std::result::Result<f64, String> {
    dsl::parse_value(s).ok_or_else(|| format!("not a time value: {}", s))
}

/// Plain stderr logger.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Parse the netlist and apply its directives
    let ast = dsl::parse_file(&args.netlist)?;
    let mut config = ast.simulator_config(SimulatorConfig::default());
    if let Some(step) = args.step {
        config = config.with_step(step);
    }
    if let Some(stop) = args.stop {
        config = config.with_stop_time(stop);
    }
    if let Some(method) = args.method {
        config = config.with_method(method);
    }
    if let Some(n) = args.max_switch {
        config = config.with_max_switch_iterations(n);
    }
    if let Some(n) = args.record {
        config = config.with_record_interval(n);
    }

    // Build and run
    let circuit = Netlist::from_ast(&ast)?.compile(&StamperRegistry::create_default())?;
    let mut simulator = Simulator::new(circuit, config)?;
    let result = simulator.run()?;

    // Write results
    match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(|source| TransimError::OutputError { source })?;
            let mut writer = BufWriter::new(file);
            output::write_result(&result, args.format, &mut writer)?;
            writer
                .flush()
                .map_err(|source| TransimError::OutputError { source })?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            output::write_result(&result, args.format, &mut writer)?;
            writer
                .flush()
                .map_err(|source| TransimError::OutputError { source })?;
        }
    }

    Ok(())
}
