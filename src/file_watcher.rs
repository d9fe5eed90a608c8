/*!
 * File watcher: polls a single volume's mount point for new or changed
 * files matching the configured extension mappings (spec §4.4).
 */

use crate::event_bus::{Event, EventBus};
use crate::mapping::MappingResolver;
use crate::model::{Priority, VolumeId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Default poll cadence when not overridden by settings (spec §4.4).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Per-watcher record of the last known mtime for a path, used to detect
/// changes and evict entries for files that have since disappeared.
type SeenMap = HashMap<PathBuf, SystemTime>;

pub struct FileWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Spawns the polling thread for one volume's mount point. Only files
    /// whose extension resolves via `mappings` are reported; everything
    /// else is silently skipped.
    pub fn start(
        volume_id: VolumeId,
        root: PathBuf,
        mappings: HashMap<String, PathBuf>,
        event_bus: EventBus,
        poll_interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();

        let handle = std::thread::spawn(move || {
            let resolver = MappingResolver::new(&mappings);
            let mut seen: SeenMap = HashMap::new();

            while !stop_clone.load(Ordering::SeqCst) {
                let mut current: SeenMap = HashMap::new();

                for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
                    if stop_clone.load(Ordering::SeqCst) {
                        return;
                    }
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let path = entry.path().to_path_buf();
                    if resolver.resolve(&path).is_none() {
                        continue;
                    }
                    let Ok(metadata) = entry.metadata() else { continue };
                    let Ok(mtime) = metadata.modified() else { continue };

                    current.insert(path.clone(), mtime);

                    let changed = seen.get(&path).map(|prev| *prev < mtime).unwrap_or(true);
                    if changed {
                        event_bus.publish(Event::FileFound {
                            path,
                            volume: volume_id.clone(),
                            priority: Priority::Normal,
                        });
                    }
                }

                seen = current;
                std::thread::sleep(poll_interval);
            }
        });

        Self { stop, handle: Some(handle) }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
