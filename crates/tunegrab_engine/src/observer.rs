use std::sync::mpsc;

use tunegrab_core::TaskRecord;

use crate::EngineEvent;

/// Receives task notifications from the engine.
///
/// `on_update` is called from worker threads, possibly concurrently for
/// different tasks, so implementations must be reentrant. Updates for a single
/// task arrive in order. `on_complete` fires exactly once per batch.
pub trait EngineObserver: Send + Sync {
    fn on_update(&self, task: &TaskRecord);
    fn on_complete(&self, tasks: Vec<TaskRecord>);
}

/// Observer built from two closures.
pub struct CallbackObserver<U, C> {
    on_update: U,
    on_complete: C,
}

impl<U, C> CallbackObserver<U, C>
where
    U: Fn(&TaskRecord) + Send + Sync,
    C: Fn(Vec<TaskRecord>) + Send + Sync,
{
    pub fn new(on_update: U, on_complete: C) -> Self {
        Self {
            on_update,
            on_complete,
        }
    }
}

impl<U, C> EngineObserver for CallbackObserver<U, C>
where
    U: Fn(&TaskRecord) + Send + Sync,
    C: Fn(Vec<TaskRecord>) + Send + Sync,
{
    fn on_update(&self, task: &TaskRecord) {
        (self.on_update)(task);
    }

    fn on_complete(&self, tasks: Vec<TaskRecord>) {
        (self.on_complete)(tasks);
    }
}

/// Forwards notifications into a channel so a single consumer can process
/// them on its own thread.
pub struct ChannelObserver {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }
}

impl EngineObserver for ChannelObserver {
    fn on_update(&self, task: &TaskRecord) {
        let _ = self.tx.send(EngineEvent::TaskUpdated(task.clone()));
    }

    fn on_complete(&self, tasks: Vec<TaskRecord>) {
        let _ = self.tx.send(EngineEvent::BatchCompleted(tasks));
    }
}
