//! Next-edit trace replayer.
//!
//! Feeds a recorded sequence of host notifications through an edit session
//! backed by the in-memory host, then prints every collaborator call the
//! session made as one JSON object per line.

#![cfg_attr(test, allow(unused_crate_dependencies))]

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use nextedit_arbiter::ArbiterConfig;
use tracing::info;

mod trace;

/// Replay command line arguments.
#[derive(Parser, Debug)]
#[command(name = "nextedit-replay")]
#[command(about = "Replay a next-edit host trace and print the collaborator call log")]
struct Args {
	/// JSON array of trace steps
	#[arg(value_name = "TRACE")]
	trace: PathBuf,

	/// Session configuration (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => ArbiterConfig::load(path)?,
		None => ArbiterConfig::default(),
	};
	let steps = trace::load(&args.trace).with_context(|| format!("reading trace {}", args.trace.display()))?;
	info!(trace = %args.trace.display(), steps = steps.len(), "replay.start");

	let mut replayer = trace::Replayer::new(config);
	replayer.run(&steps).await?;
	let calls = replayer.finish().await;
	info!(calls = calls.len(), "replay.done");

	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	trace::write_json_lines(&calls, &mut out)?;
	out.flush()?;
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_env("NEXTEDIT_LOG")
		.or_else(|_| EnvFilter::try_from_default_env())
		.unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("nextedit=debug,info")
			} else {
				EnvFilter::new("nextedit=info,warn")
			}
		});

	// Stdout carries the call log.
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();
}
