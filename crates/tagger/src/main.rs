mod cli;
mod config;
mod logging;
mod progress;

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use cli::Args;
use config::{load_config, locate_config, TaggerConfig};
use library::{Engine, ProgressCounter};
use metadata::LoftyCodec;
use progress::{spinner, SpinnerObserver};
use tracing::{info, warn};

const INTERRUPTED_EXIT_CODE: i32 = 130;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = locate_config(args.config.as_deref());
    let mut settings = match &config_path {
        Some(path) => load_config(path)?,
        None => TaggerConfig::default(),
    };
    args.apply(&mut settings);

    logging::init(settings.verbose, settings.log_path().as_deref())?;
    if let Some(path) = &config_path {
        info!("Loaded config from {:?}", path);
    }

    let run_config = settings.run_config();

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        warn!("Interrupt received; finishing files in flight. Press Ctrl-C again to stop immediately.");
    })?;

    let bar = run_config.progress.then(spinner);
    let counter = match &bar {
        Some(bar) => ProgressCounter::with_observer(SpinnerObserver::new(bar.clone())),
        None => ProgressCounter::new(),
    };

    let codec = LoftyCodec;
    let result = Engine::new(&run_config, &codec)
        .with_progress(&counter)
        .with_cancel(&cancel)
        .run();
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    let summary = result?;

    if let Some(path) = &args.report {
        fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        info!("Wrote run report to {:?}", path);
    }

    if summary.interrupted {
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }
    Ok(())
}
