//! imgstream - Main entry point
//!
//! Streams desktop images through a capture source and reports what the
//! consumer side receives.

mod args;

use args::Args;
use clap::Parser;
use crossbeam::channel::RecvTimeoutError;
use imgstream::config::{parse_resolution, Config};
use imgstream::source::desktop_source;
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let loaded = args.load_config();
    let mut config = match loaded {
        Ok(ref cfg) => cfg.clone(),
        Err(_) => Config::default(),
    };
    args.apply_overrides(&mut config);

    let log_level = if args.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    env_logger::Builder::new()
        .parse_filters(&std::env::var("IMGSTREAM_LOG").unwrap_or(log_level))
        .init();

    info!("imgstream v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => info!("Loaded configuration from {:?}", args.config),
        Err(e) => warn!("Failed to load config: {}, using defaults", e),
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }

    let mut source = desktop_source(&config)?;
    let info = source.capture_info()?;
    if args.info {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    info!(
        "Capture target {:?}: {} formats available",
        info.name,
        info.formats.len()
    );

    if let Some(ref requested) = config.capture.format {
        let adopted = source.format_control().set_format(&parse_resolution(requested)?)?;
        info!("Negotiated format {}", adopted);
    }

    source.connect();
    let streams = source.streams();
    let stream = &streams[0];
    let buffers = stream.subscribe();

    source.start()?;
    let started = Instant::now();
    let timeout = Duration::from_secs(args.timeout.max(1));
    let mut received = 0u64;
    while received < args.frames {
        match buffers.recv_timeout(timeout) {
            Ok(buffer) => {
                received += 1;
                debug!("{}", buffer);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("No buffer within {:?}, stopping", timeout);
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Stream closed");
                break;
            }
        }
    }
    let elapsed = started.elapsed();

    source.stop();
    source.disconnect();

    let stats = stream.stats();
    info!(
        "Received {} buffers in {:.2}s ({:.1} fps), avg capture {}us",
        received,
        elapsed.as_secs_f64(),
        received as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        stats.average_capture_time_us()
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
