/*!
 * Event bus — the language-neutral publish surface a host shell binds to
 * (spec §4.6). Channels correspond 1:1 to the event set in §4.2 plus
 * `volume_attached`/`volume_detached`/`file_found`.
 *
 * Delivery is at-most-once per listener per event, in publication order
 * within a channel; events across transfer ids are not ordered relative to
 * one another (spec §5 "Ordering guarantees").
 */

use crate::model::{BatchId, Priority, TransferId, VolumeClass, VolumeId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One published event. Each variant mirrors a spec §4.2/§4.6 channel.
#[derive(Debug, Clone)]
pub enum Event {
    Started { id: TransferId, filename: String },
    Progress {
        id: TransferId,
        fraction: f64,
        speed_bps: f64,
        eta_seconds: Option<f64>,
        total_bytes: u64,
        transferred_bytes: u64,
    },
    Completed { id: TransferId },
    Error { id: TransferId, message: String },
    Cancelled { id: TransferId },
    Paused { id: TransferId },
    Resumed { id: TransferId },
    Skipped { id: TransferId, reason: String },

    BatchProgress { batch_id: BatchId, completed: usize, total: usize },
    BatchCompleted { batch_id: BatchId },
    BatchError { batch_id: BatchId },

    VolumeAttached { id: VolumeId, label: Option<String>, class: VolumeClass },
    VolumeDetached { id: VolumeId },

    FileFound { path: PathBuf, volume: VolumeId, priority: Priority },
}

type Listener = Box<dyn Fn(&Event) + Send + Sync>;

/// A minimal in-process publish/subscribe bus. Subsystems hold a handle on
/// a shared `EventBus` rather than references to one another (spec §9
/// "Cyclic references... broken by giving each subsystem a handle on a
/// central event_bus").
#[derive(Clone)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<(u64, Listener)>>>,
    next_id: Arc<Mutex<u64>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(0)),
        }
    }

    /// Register a listener, returning a token usable with `unregister`.
    /// Thread-safe to call concurrently with `publish`.
    pub fn register<F>(&self, listener: F) -> ListenerToken
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut next_id = self.next_id.lock().unwrap();
        let token = *next_id;
        *next_id += 1;
        self.listeners.lock().unwrap().push((token, Box::new(listener)));
        ListenerToken(token)
    }

    pub fn unregister(&self, token: ListenerToken) {
        self.listeners.lock().unwrap().retain(|(id, _)| *id != token.0);
    }

    /// Publish one event to every currently-registered listener, in
    /// registration order. Listeners must not block significantly — this
    /// call runs on the publishing subsystem's own thread.
    pub fn publish(&self, event: Event) {
        let listeners = self.listeners.lock().unwrap();
        for (_, listener) in listeners.iter() {
            listener(&event);
        }
    }

    /// A channel-backed subscriber for callers that prefer to drain events
    /// (e.g. tests), grounded on the teacher's `ProgressPublisher`/`ProgressSubscriber`
    /// split.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = unbounded();
        let token = self.register(move |event: &Event| {
            let _ = tx.send(event.clone());
        });
        EventReceiver { receiver: rx, _token: token, bus: self.clone() }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerToken(u64);

pub struct EventReceiver {
    receiver: Receiver<Event>,
    _token: ListenerToken,
    bus: EventBus,
}

impl EventReceiver {
    pub fn try_recv(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Event> {
        self.receiver.recv_timeout(timeout).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.receiver.try_iter()
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        self.bus.unregister(self._token);
    }
}
