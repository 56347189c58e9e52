use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use flowbeat::audio::{BeatsRenderer, StimulusOutput};
use flowbeat::config::Config;
use flowbeat::optimizer::{
    AdaptiveController, BandpowerEstimator, HillClimbLaw, OptimizeSession, SignalSource,
    SimulatedEeg, StimulusParams,
};

mod cli;

use cli::{BeatsArgs, Cli, Command};

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(&cli.config)?;
    config.validate()?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))
            .context("failed to install the Ctrl-C handler")?;
    }

    match cli.command {
        Command::Stream => run_stream(&config, cancel),
        Command::Beats(args) => run_beats(&config, &args),
        Command::Optimize => run_optimize(&config, cancel),
    }
}

/// Raw passthrough: print timestamped samples until interrupted.
fn run_stream(config: &Config, cancel: Arc<AtomicBool>) -> Result<()> {
    let timeout = Duration::from_secs_f32(config.bluetooth.timeout);
    let mut source = SimulatedEeg::connect(timeout, config.optimizer.fs)?;
    println!("Streaming EEG. Press Ctrl+C to stop.");
    let result = loop {
        if cancel.load(Ordering::SeqCst) {
            break Ok(());
        }
        match source.pull() {
            Ok(Some(sample)) => println!("{:.3}: {:?}", sample.timestamp, sample.channels),
            Ok(None) => {}
            Err(e) => break Err(e.into()),
        }
    };
    source.disconnect();
    if result.is_ok() {
        println!("EEG streaming stopped by user.");
    }
    result
}

/// Fixed-parameter playback, blocking until the beat has played out.
fn run_beats(config: &Config, args: &BeatsArgs) -> Result<()> {
    let params = StimulusParams {
        carrier_hz: args.carrier.unwrap_or(config.initial.carrier),
        split_hz: args.split.unwrap_or(config.initial.split),
    };
    let duration = args.duration.unwrap_or(config.optimizer.window_size);
    let mut renderer = BeatsRenderer::open(config.audio.rate, config.audio.chunk)?;
    println!(
        "Playing beats: carrier={} Hz, split={} Hz, duration={}s",
        params.carrier_hz, params.split_hz, duration
    );
    let result = renderer.play(params, duration);
    if result.is_ok() {
        renderer.wait_until_done();
    }
    renderer.close();
    result.map_err(Into::into)
}

/// The adaptive closed loop.
fn run_optimize(config: &Config, cancel: Arc<AtomicBool>) -> Result<()> {
    let timeout = Duration::from_secs_f32(config.bluetooth.timeout);
    let fs = config.optimizer.fs;
    let mut source = SimulatedEeg::connect(timeout, fs)?;
    let renderer = match BeatsRenderer::open(config.audio.rate, config.audio.chunk) {
        Ok(renderer) => renderer,
        Err(e) => {
            source.disconnect();
            return Err(e.into());
        }
    };

    let controller = AdaptiveController::new(
        config.initial.params(),
        config.control.limits(),
        config.control.smoothing,
        Box::new(HillClimbLaw::default()),
    );
    let [lo, hi] = config.optimizer.target_band;
    let session = OptimizeSession::new(
        source,
        renderer,
        controller,
        BandpowerEstimator::new(fs, (lo, hi)),
        fs,
        Duration::from_secs_f32(config.optimizer.window_size),
        Duration::from_secs_f32(config.optimizer.stimulus_duration()),
        cancel,
    );

    println!("Starting optimization loop. Press Ctrl+C to stop.");
    session.run()?;
    println!("Optimization stopped by user.");
    Ok(())
}
