//! Autosave loop - flushes in-memory session state when it changes.
//!
//! State machine: `Idle → Dirty → Saving → Idle`.
//!
//! [`AutoSave`] is driven explicitly: callers pass the current instant to
//! [`AutoSave::poll`], which saves once per interval if the state is dirty.
//! [`spawn_autosave`] runs the same state machine on a worker thread,
//! ticking with `recv_timeout` on a command channel.

use crate::config::AutosaveConfig;
use crate::storage::{KvBackend, SetOutcome, Storage};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default interval between dirty checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Autosave state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSaveState {
    Idle,
    Dirty,
    Saving,
}

/// Dirty-flag driven autosave of named session fields.
#[derive(Debug, Clone)]
pub struct AutoSave {
    fields: BTreeMap<String, Value>,
    state: AutoSaveState,
    interval: Duration,
    next_due: Option<Instant>,
    save_count: u64,
}

impl Default for AutoSave {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl AutoSave {
    /// A stopped loop. Call [`AutoSave::start`] to arm the timer.
    pub fn new(interval: Duration) -> Self {
        Self {
            fields: BTreeMap::new(),
            state: AutoSaveState::Idle,
            interval,
            next_due: None,
            save_count: 0,
        }
    }

    /// A stopped loop using the `[autosave]` interval.
    pub fn from_config(config: &AutosaveConfig) -> Self {
        Self::new(config.interval())
    }

    pub fn state(&self) -> AutoSaveState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Saves performed so far.
    pub fn save_count(&self) -> u64 {
        self.save_count
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Arm the timer; the first check happens one interval after `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
        debug!("Autosave started (every {:?})", self.interval);
    }

    /// Cancel the timer. `mark_dirty` has no effect until the next `start`.
    pub fn stop(&mut self) {
        self.next_due = None;
        debug!("Autosave stopped");
    }

    /// Flag the session state as changed. Returns false when stopped.
    pub fn mark_dirty(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = AutoSaveState::Dirty;
        true
    }

    /// Update a session field and mark the state dirty.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
        self.mark_dirty();
    }

    /// Time left until the next check, `None` when stopped.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// Timer callback. Saves if the interval elapsed and the state is dirty.
    /// Returns whether a save happened.
    pub fn poll<B: KvBackend>(&mut self, now: Instant, storage: &mut Storage<B>) -> bool {
        match self.next_due {
            Some(due) if now >= due => {}
            _ => return false,
        }
        self.next_due = Some(now + self.interval);

        if self.state != AutoSaveState::Dirty {
            return false;
        }
        self.save(storage);
        true
    }

    /// Page teardown. Saves immediately if dirty, timer or not.
    pub fn teardown<B: KvBackend>(&mut self, storage: &mut Storage<B>) -> bool {
        if self.state != AutoSaveState::Dirty {
            return false;
        }
        self.save(storage);
        true
    }

    /// Write every field through the facade. The dirty flag is cleared
    /// whatever the outcome; failures were already handled by `set`.
    fn save<B: KvBackend>(&mut self, storage: &mut Storage<B>) {
        self.state = AutoSaveState::Saving;

        let mut stored = 0;
        for (name, value) in &self.fields {
            match storage.set(name, value, false) {
                SetOutcome::Stored { .. } => stored += 1,
                other => warn!("Autosave of '{}' failed: {:?}", name, other),
            }
        }

        self.save_count += 1;
        self.state = AutoSaveState::Idle;
        debug!("Autosaved {}/{} field(s)", stored, self.fields.len());
    }
}

/// Commands accepted by the autosave worker.
#[derive(Debug)]
enum Command {
    MarkDirty,
    SetField(String, Value),
    Stop,
    Teardown,
}

/// Handle to an autosave loop running on its own thread.
///
/// The worker owns the storage. Dropping the handle performs teardown.
pub struct AutoSaveHandle<B: KvBackend + Send + 'static> {
    tx: Sender<Command>,
    worker: Option<JoinHandle<(AutoSave, Storage<B>)>>,
}

impl<B: KvBackend + Send + 'static> AutoSaveHandle<B> {
    pub fn mark_dirty(&self) {
        let _ = self.tx.send(Command::MarkDirty);
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        let _ = self.tx.send(Command::SetField(name.into(), value));
    }

    /// Cancel the timer. A later teardown still saves pending changes.
    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }

    /// Tear down the loop and get the state machine and storage back.
    pub fn shutdown(mut self) -> Option<(AutoSave, Storage<B>)> {
        self.finish()
    }

    fn finish(&mut self) -> Option<(AutoSave, Storage<B>)> {
        let worker = self.worker.take()?;
        let _ = self.tx.send(Command::Teardown);
        match worker.join() {
            Ok(result) => Some(result),
            Err(_) => {
                warn!("Autosave worker panicked");
                None
            }
        }
    }
}

impl<B: KvBackend + Send + 'static> Drop for AutoSaveHandle<B> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Start `autosave` on a worker thread that owns `storage`.
pub fn spawn_autosave<B: KvBackend + Send + 'static>(
    mut autosave: AutoSave,
    mut storage: Storage<B>,
) -> AutoSaveHandle<B> {
    let (tx, rx) = channel();

    let worker = std::thread::spawn(move || {
        autosave.start(Instant::now());
        info!("Autosave loop running (every {:?})", autosave.interval());

        loop {
            let received = match autosave.time_until_due(Instant::now()) {
                Some(wait) => rx.recv_timeout(wait),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(Command::MarkDirty) => {
                    autosave.mark_dirty();
                }
                Ok(Command::SetField(name, value)) => autosave.set_field(name, value),
                Ok(Command::Stop) => autosave.stop(),
                Ok(Command::Teardown) | Err(RecvTimeoutError::Disconnected) => {
                    autosave.teardown(&mut storage);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    autosave.poll(Instant::now(), &mut storage);
                }
            }
        }

        info!("Autosave loop finished ({} save(s))", autosave.save_count());
        (autosave, storage)
    });

    AutoSaveHandle {
        tx,
        worker: Some(worker),
    }
}
