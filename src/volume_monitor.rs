/*!
 * Volume monitor: polls attached volumes and emits `volume_attached`/
 * `volume_detached` events on change (spec §4.3).
 */

use crate::event_bus::{Event, EventBus};
use crate::model::{Volume, VolumeId};
use crate::system_info::SystemInfoPort;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default poll cadence when not overridden by settings (spec §4.3).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct VolumeMonitor {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl VolumeMonitor {
    /// Spawns the polling thread. `excluded` names volumes (by id) that
    /// should never be reported, e.g. the system volume the host process
    /// itself runs from.
    pub fn start(
        system_info: Arc<dyn SystemInfoPort>,
        event_bus: EventBus,
        poll_interval: Duration,
        excluded: HashSet<String>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();

        let handle = std::thread::spawn(move || {
            let mut known: HashMap<VolumeId, Volume> = HashMap::new();

            while !stop_clone.load(Ordering::SeqCst) {
                let current = system_info.list_volumes();
                let current_ids: HashSet<VolumeId> = current.iter().map(|v| v.id.clone()).collect();

                for volume in &current {
                    if excluded.contains(volume.id.as_str()) {
                        continue;
                    }
                    if !known.contains_key(&volume.id) {
                        event_bus.publish(Event::VolumeAttached {
                            id: volume.id.clone(),
                            label: volume.label.clone(),
                            class: volume.class,
                        });
                    }
                }

                let detached: Vec<VolumeId> =
                    known.keys().filter(|id| !current_ids.contains(id)).cloned().collect();
                for id in detached {
                    if !excluded.contains(id.as_str()) {
                        event_bus.publish(Event::VolumeDetached { id: id.clone() });
                    }
                    known.remove(&id);
                }

                known = current.into_iter().map(|v| (v.id.clone(), v)).collect();

                std::thread::sleep(poll_interval);
            }
        });

        Self { stop, handle: Some(handle) }
    }

    /// Signal the polling thread to stop and block until it exits. Bounded
    /// by one poll interval, since the loop only checks the stop flag
    /// between sleeps.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for VolumeMonitor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VolumeClass;
    use crate::system_info::MockSystemInfoPort;
    use std::sync::Mutex;

    #[test]
    fn emits_attach_event_for_newly_seen_volume() {
        let volume = Volume::new(VolumeId::new("E:"), "/mnt/e".into(), VolumeClass::Removable);
        let port: Arc<dyn SystemInfoPort> = Arc::new(MockSystemInfoPort::new().with_volume(volume));
        let bus = EventBus::new();
        let rx = bus.subscribe();

        let monitor = VolumeMonitor::start(port, bus, Duration::from_millis(20), HashSet::new());
        let first = rx.recv_timeout(Duration::from_secs(1));
        assert!(matches!(first, Some(Event::VolumeAttached { .. })));
        monitor.stop();
    }

    #[test]
    fn excluded_volumes_never_surface_events() {
        let volume = Volume::new(VolumeId::new("C:"), "/".into(), VolumeClass::Local);
        let port: Arc<dyn SystemInfoPort> = Arc::new(MockSystemInfoPort::new().with_volume(volume));
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sink = bus.register(move |event| seen_clone.lock().unwrap().push(event.clone()));

        let mut excluded = HashSet::new();
        excluded.insert("C:".to_string());
        let monitor = VolumeMonitor::start(port, bus, Duration::from_millis(20), excluded);
        std::thread::sleep(Duration::from_millis(80));
        monitor.stop();

        assert!(rx.try_recv().is_none());
    }
}
