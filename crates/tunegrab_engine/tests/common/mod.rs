#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Once;
use std::time::Duration;

use tunegrab_core::{ItemDescriptor, TaskRecord};
use tunegrab_engine::{
    AdapterEvent, CancellationToken, ConversionAdapter, ConversionError, ConversionOutput,
    ConversionRequest, EngineEvent, FailureKind, ProgressSink,
};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// What the fake adapter does for one item id.
#[derive(Debug, Clone)]
pub enum Script {
    /// Report progress (including an overshoot past 100%), then succeed.
    Succeed,
    Fail(String),
    Panic,
    /// Block until cancelled, then report the interruption.
    WaitForCancel,
    /// Fail with an error only after cancellation, like a killed subprocess.
    FailWhenCancelled,
    /// Emit `n` retry events before succeeding.
    Retry(u32),
}

pub struct FakeAdapter {
    default: Script,
    scripts: HashMap<String, Script>,
    delay: Duration,
    write_files: bool,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeAdapter {
    pub fn new(default: Script) -> Self {
        init_logging();
        Self {
            default,
            scripts: HashMap::new(),
            delay: Duration::from_millis(5),
            write_files: false,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_script(mut self, id: &str, script: Script) -> Self {
        self.scripts.insert(id.to_string(), script);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn writing_files(mut self) -> Self {
        self.write_files = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn succeed(
        &self,
        retries: u32,
        request: &ConversionRequest,
        sink: &mut (dyn ProgressSink + Send),
    ) -> Result<ConversionOutput, ConversionError> {
        for attempt in 2..=retries + 1 {
            sink.emit(AdapterEvent::Retrying { attempt });
        }
        sink.emit(AdapterEvent::Downloading {
            downloaded: 40,
            total: Some(100),
        });
        tokio::time::sleep(self.delay).await;
        sink.emit(AdapterEvent::Downloading {
            downloaded: 105,
            total: Some(100),
        });
        sink.emit(AdapterEvent::FetchFinished);
        let path = request.outdir.join(format!("{}.mp3", request.stem));
        if self.write_files {
            std::fs::write(&path, b"ID3")
                .map_err(|e| ConversionError::new(FailureKind::Io, e.to_string()))?;
        }
        Ok(ConversionOutput { path: Some(path) })
    }

    async fn run(
        &self,
        script: Script,
        request: &ConversionRequest,
        sink: &mut (dyn ProgressSink + Send),
        cancel: &CancellationToken,
    ) -> Result<ConversionOutput, ConversionError> {
        match script {
            Script::Succeed => self.succeed(0, request, sink).await,
            Script::Retry(n) => self.succeed(n, request, sink).await,
            Script::Fail(message) => {
                tokio::time::sleep(self.delay).await;
                Err(ConversionError::new(FailureKind::Network, message))
            }
            Script::Panic => panic!("adapter exploded"),
            Script::WaitForCancel => {
                sink.emit(AdapterEvent::Downloading {
                    downloaded: 1,
                    total: Some(10),
                });
                tokio::select! {
                    _ = cancel.cancelled() => Err(ConversionError::interrupted()),
                    _ = tokio::time::sleep(EVENT_TIMEOUT) => Ok(ConversionOutput { path: None }),
                }
            }
            Script::FailWhenCancelled => {
                cancel.cancelled().await;
                Err(ConversionError::new(FailureKind::Io, "broken pipe"))
            }
        }
    }
}

#[async_trait::async_trait]
impl ConversionAdapter for FakeAdapter {
    async fn convert(
        &self,
        request: &ConversionRequest,
        sink: &mut (dyn ProgressSink + Send),
        cancel: &CancellationToken,
    ) -> Result<ConversionOutput, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let script = self
            .scripts
            .get(&request.item_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        let result = self.run(script, request, sink, cancel).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn entries(n: usize) -> Vec<ItemDescriptor> {
    (1..=n)
        .map(|i| {
            ItemDescriptor::new(
                format!("http://example.com/{i}"),
                format!("Song {i}"),
                i.to_string(),
            )
        })
        .collect()
}

/// Drains engine events until the batch completes.
pub fn wait_for_completion(rx: &Receiver<EngineEvent>) -> (Vec<TaskRecord>, Vec<TaskRecord>) {
    wait_for_completion_with(rx, |_| {})
}

/// Like [`wait_for_completion`], calling `on_update` for every task update.
pub fn wait_for_completion_with(
    rx: &Receiver<EngineEvent>,
    mut on_update: impl FnMut(&TaskRecord),
) -> (Vec<TaskRecord>, Vec<TaskRecord>) {
    let mut updates = Vec::new();
    loop {
        match rx.recv_timeout(EVENT_TIMEOUT).expect("engine event") {
            EngineEvent::TaskUpdated(task) => {
                on_update(&task);
                updates.push(task);
            }
            EngineEvent::BatchCompleted(tasks) => return (updates, tasks),
        }
    }
}
