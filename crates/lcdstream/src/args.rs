use std::{env::var, io::stderr, path::PathBuf};

use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use miette::{Result, bail};
use tracing::{debug, warn};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};

/// Stream video frames to an ST7789 SPI display
#[derive(Debug, Clone, Parser)]
#[command(
	author,
	version,
	after_help = "Want more detail? Try the long '--help' flag!",
	after_long_help = "Didn't expect this much output? Use the short '-h' flag to get short help."
)]
#[cfg_attr(debug_assertions, command(before_help = "⚠ DEBUG BUILD ⚠"))]
pub struct Args {
	/// When to use terminal colours
	///
	/// You can also set the NO_COLOR environment variable to disable colours.
	#[arg(long, default_value = "auto", value_name = "MODE", alias = "colour")]
	pub color: ColourMode,

	/// Set diagnostic log level
	///
	/// This enables diagnostic logging, which is useful for investigating bugs. Use multiple
	/// times to increase verbosity. Goes up to '-vvvv'.
	///
	/// At '-vvv' and above, every SPI transfer is logged: expect this to slow streaming down a lot.
	///
	/// Setting $RUST_LOG also works, and takes precedence, but is not recommended unless you know
	/// what you're doing. However, using $RUST_LOG is the only way to get logs from before these
	/// options are parsed.
	#[arg(
		long,
		short,
		action = ArgAction::Count,
		num_args = 0,
		default_value = "0",
	)]
	pub verbose: u8,

	/// Write diagnostic logs to a file
	///
	/// This writes diagnostic logs to a file, instead of the terminal, in JSON format.
	///
	/// If the path provided is a directory, a file will be created in that directory. The file name
	/// will be the current date and time, in the format 'lcdstream.YYYY-MM-DDTHH-MM-SSZ.log'.
	#[arg(
		long,
		num_args = 0..=1,
		default_missing_value = ".",
		value_hint = ValueHint::AnyPath,
		value_name = "PATH",
	)]
	pub log_file: Option<PathBuf>,

	/// Omit timestamps in logs
	///
	/// This can be useful when running under systemd, to avoid having two timestamps.
	///
	/// This option is ignored if the log file is set, or when using $RUST_LOG (as logging is
	/// initialized before arguments are parsed in that case).
	#[arg(long)]
	pub log_timeless: bool,

	/// What to do
	#[command(subcommand)]
	pub action: crate::actions::Action,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ColourMode {
	Auto,
	Always,
	Never,
}

pub fn get_args() -> Result<(Args, Option<WorkerGuard>)> {
	let prearg_logs = logging_preargs();
	if prearg_logs {
		warn!("⚠ RUST_LOG environment variable set, logging options have no effect");
	}

	debug!("parsing arguments");
	let mut args = Args::parse();

	// https://no-color.org/
	if var("NO_COLOR").is_ok() {
		args.color = ColourMode::Never;
	}

	let log_guard = if !prearg_logs {
		Some(logging_postargs(&args)?)
	} else {
		None
	};

	debug!(?args, "got arguments");
	Ok((args, log_guard))
}

fn logging_preargs() -> bool {
	let Ok(filter) = var("RUST_LOG") else {
		return false;
	};

	match tracing_subscriber::fmt::try_init() {
		Ok(()) => {
			warn!(RUST_LOG=%filter, "logging configured from RUST_LOG");
			true
		}
		Err(e) => {
			eprintln!("Failed to initialise logging with RUST_LOG, falling back\n{e}");
			false
		}
	}
}

fn verbosity_filter(verbose: u8) -> &'static str {
	match verbose {
		0 => "info",
		1 => "info,lcdstream=debug,st7789_spidev_driver=debug",
		2 => "debug",
		3 => "debug,lcdstream=trace,st7789_spidev_driver=trace",
		_ => "trace",
	}
}

fn logging_postargs(args: &Args) -> Result<WorkerGuard> {
	let (log_writer, guard) = if let Some(file) = &args.log_file {
		let (dir, filename) = if file.is_dir() {
			(
				file.to_owned(),
				PathBuf::from(format!(
					"lcdstream.{}.log",
					jiff::Timestamp::now().strftime("%Y-%m-%dT%H-%M-%SZ")
				)),
			)
		} else if let (Some(parent), Some(file_name)) = (file.parent(), file.file_name()) {
			(parent.into(), PathBuf::from(file_name))
		} else {
			bail!("Failed to determine log file name");
		};

		non_blocking(rolling::never(dir, filename))
	} else {
		non_blocking(stderr())
	};

	let mut builder = tracing_subscriber::fmt().with_env_filter(verbosity_filter(args.verbose));

	match args.color {
		ColourMode::Never => {
			builder = builder.with_ansi(false);
		}
		ColourMode::Always => {
			builder = builder.with_ansi(true);
		}
		ColourMode::Auto => {}
	}

	let result = if args.log_file.is_some() {
		builder.json().with_writer(log_writer).try_init()
	} else if args.log_timeless {
		builder.without_time().with_writer(log_writer).try_init()
	} else if args.verbose > 3 {
		builder.pretty().with_writer(log_writer).try_init()
	} else {
		builder.with_writer(log_writer).try_init()
	};

	match result {
		Ok(()) => debug!("logging initialised"),
		Err(e) => eprintln!("Failed to initialise logging, continuing with none\n{e}"),
	}

	Ok(guard)
}

#[test]
fn verify_cli() {
	use clap::CommandFactory;
	Args::command().debug_assert()
}

#[test]
fn verbosity_levels() {
	assert_eq!(verbosity_filter(0), "info");
	assert!(verbosity_filter(1).contains("st7789_spidev_driver=debug"));
	assert_eq!(verbosity_filter(9), "trace");
}
