use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use engine_logging::{engine_info, engine_warn};
use tunegrab_core::{BatchSummary, Status, TaskRecord};
use tunegrab_engine::{
    default_output_dir, extract_entries, ffmpeg_location, find_existing, settings_path,
    BundleLayout, ChannelObserver, DownloadEngine, EngineConfig, EngineEvent, Settings,
    SettingsStore, YtDlpAdapter, YtDlpSettings,
};

use crate::cli::Args;
use crate::report::{self, LineDeduper};

pub fn run(args: Args) -> anyhow::Result<ExitCode> {
    let layout = BundleLayout::detect();
    let store = SettingsStore::new(settings_path(&layout));
    let outdir = resolve_outdir(args.outdir.clone(), &store.load());
    if let Err(err) = store.update(|s| s.set_output_dir(&outdir)) {
        engine_warn!("Could not save settings to {:?}: {}", store.path(), err);
    }

    let ytdlp = YtDlpSettings {
        ytdlp_path: args.ytdlp.clone(),
        ffmpeg_location: ffmpeg_location(&layout),
        ..YtDlpSettings::default()
    };

    println!("Fetching item list for {}", args.url);
    let entries = extract_entries(&args.url, &ytdlp);
    if entries.is_empty() {
        eprintln!("No downloadable items found at {}", args.url);
        return Ok(ExitCode::FAILURE);
    }

    let skip_ids = if args.no_skip {
        HashSet::new()
    } else {
        find_existing(&entries, &outdir)
    };
    println!(
        "{} items, {} already in {}",
        entries.len(),
        skip_ids.len(),
        outdir.display()
    );

    let (observer, events) = ChannelObserver::channel();
    let config = EngineConfig::new(outdir.clone()).with_max_workers(args.workers);
    let adapter = Arc::new(YtDlpAdapter::new(ytdlp));
    let engine = DownloadEngine::new(config, adapter, Arc::new(observer))
        .context("invalid engine configuration")?;

    spawn_interrupt_handler(engine.clone())?;
    engine
        .start(&entries, &skip_ids)
        .with_context(|| format!("could not start downloads into {}", outdir.display()))?;

    let tasks = print_events(&events).unwrap_or_else(|| engine.tasks());
    engine.wait();

    let summary = BatchSummary::from_tasks(&tasks);
    println!("{}", report::summary_line(&summary));
    engine_info!("Exiting with {} failed tasks", summary.count(Status::Failed));

    if summary.count(Status::Failed) == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Command-line flag first, then the last directory used, then the default.
fn resolve_outdir(flag: Option<PathBuf>, settings: &Settings) -> PathBuf {
    flag.or_else(|| settings.output_dir())
        .unwrap_or_else(default_output_dir)
}

/// Prints task updates until the batch completes and returns the final tasks.
fn print_events(events: &Receiver<EngineEvent>) -> Option<Vec<TaskRecord>> {
    let mut deduper = LineDeduper::default();
    for event in events.iter() {
        match event {
            EngineEvent::TaskUpdated(task) => {
                if let Some(line) = deduper.accept(&task) {
                    println!("{line}");
                }
            }
            EngineEvent::BatchCompleted(tasks) => return Some(tasks),
        }
    }
    None
}

/// First Ctrl-C cancels the batch; a second one exits immediately.
fn spawn_interrupt_handler(engine: DownloadEngine) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not build signal runtime")?;

    thread::Builder::new()
        .name("tunegrab-signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    engine_warn!("Ctrl-C handler unavailable");
                    return;
                }
                eprintln!("Cancelling, press Ctrl-C again to quit now");
                engine.cancel();

                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });
        })
        .context("could not spawn signal thread")?;
    Ok(())
}
