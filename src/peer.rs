use std::{
    collections::HashMap,
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;

use super::{
    ErrorObject, PeerOptions,
    components::{Builtin, ComponentSet, DUAL_BATCH, LIST_COMPONENTS, RemoteComponents},
    deadline::DeadlineTable,
    outbox::Outbox,
    serve::{Exposed, ServeId},
    transmit::BoxTransmitter,
};

/// Receives the outcome of one outgoing call.
pub(crate) type ReplySink = Box<dyn FnOnce(Result<Value, ErrorObject>) + Send + 'static>;

pub(crate) struct PeerState {
    pub transmitter: Option<BoxTransmitter>,
    pub remote_timeout: Duration,
    pub local_timeout: Duration,
    pub serial: u64,
    pub discard_serial: i64,
    pub outbox: Outbox,
    pub inbox: HashMap<u64, ReplySink>,
    pub out_timers: DeadlineTable<u64>,
    pub local_timers: DeadlineTable<ServeId>,
    pub local_components: ComponentSet,
    pub remote_components: RemoteComponents,
    pub exposed: HashMap<String, Exposed>,
    pub tasks: Vec<JoinHandle<()>>,
    pub closed: Option<watch::Receiver<bool>>,
}

impl PeerState {
    fn new(options: &PeerOptions) -> Self {
        let mut exposed = HashMap::new();
        exposed.insert(
            LIST_COMPONENTS.to_string(),
            Exposed::Builtin(Builtin::ListComponents),
        );
        exposed.insert(DUAL_BATCH.to_string(), Exposed::Builtin(Builtin::DualBatch));
        Self {
            transmitter: None,
            remote_timeout: options.remote_timeout(),
            local_timeout: options.local_timeout(),
            serial: 0,
            discard_serial: 0,
            outbox: Outbox::default(),
            inbox: HashMap::new(),
            out_timers: DeadlineTable::new(),
            local_timers: DeadlineTable::new(),
            local_components: ComponentSet::with_builtins(),
            remote_components: RemoteComponents::default(),
            exposed,
            tasks: Vec::new(),
            closed: None,
        }
    }

    pub fn insert_task(&mut self, task: JoinHandle<()>) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }
}

impl Drop for PeerState {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

enum Lifecycle {
    Active(Box<PeerState>),
    Shutdown,
}

pub(crate) struct RawPeer(Mutex<Lifecycle>);

impl RawPeer {
    pub(crate) fn new(options: &PeerOptions) -> Arc<Self> {
        Arc::new(Self(Mutex::new(Lifecycle::Active(Box::new(PeerState::new(
            options,
        ))))))
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the state if the peer is still active.
    ///
    /// The lock is held while `f` runs, so `f` must not call back into user code.
    pub(crate) fn with_active<R>(&self, f: impl FnOnce(&mut PeerState) -> R) -> Option<R> {
        let mut guard = self.lock();
        if let Lifecycle::Active(s) = &mut *guard {
            return Some(f(s));
        }
        drop(guard);
        drop(f);
        None
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(*self.lock(), Lifecycle::Active(_))
    }

    pub(crate) fn shutdown(&self) {
        let old = mem::replace(&mut *self.lock(), Lifecycle::Shutdown);
        if let Lifecycle::Active(s) = old {
            debug!(
                pending = s.out_timers.len(),
                serving = s.local_timers.len(),
                "peer shut down"
            );
            drop(s);
        }
    }
}
