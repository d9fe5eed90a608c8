/*!
 * dailies - media ingest engine
 *
 * Watches removable and network volumes for newly arrived camera/audio
 * files, copies matching files into mapped destinations, and tracks each
 * transfer through a small state machine (queued, running, paused,
 * completed, error, cancelled, skipped).
 *
 * Building blocks:
 * - [`volume_monitor`] and [`file_watcher`] observe the filesystem and
 *   publish events onto the [`event_bus`].
 * - [`coordinator`] schedules and runs transfers on a bounded worker pool,
 *   delegating the actual bytes-on-disk work to [`copy_engine`].
 * - [`config`] holds the persisted settings surface; [`model`] holds the
 *   data types shared across all of the above.
 */

pub mod config;
pub mod coordinator;
pub mod copy_engine;
pub mod disk_space;
pub mod error;
pub mod event_bus;
pub mod file_watcher;
pub mod hashing;
pub mod logging;
pub mod mapping;
pub mod metadata;
pub mod model;
pub mod queue;
pub mod rate_limiter;
pub mod stats;
pub mod system_info;
pub mod volume_monitor;

pub use config::Settings;
pub use coordinator::{CoordinatorConfig, TransferCoordinator};
pub use error::{DailiesError, ErrorKind, Result};
pub use event_bus::{Event, EventBus, EventReceiver};
pub use file_watcher::FileWatcher;
pub use mapping::MappingResolver;
pub use metadata::{FilesystemMetadataPort, MetadataPort};
pub use model::{
    Batch, BatchId, BatchStatus, Priority, ProgressSample, TransferId, TransferRecord,
    TransferStatus, VerificationPolicy, Volume, VolumeClass, VolumeId,
};
pub use queue::TransferQueue;
pub use rate_limiter::BandwidthLimiter;
pub use stats::{CoordinatorStats, StatsSnapshot};
pub use system_info::{SysinfoPort, SystemInfoPort};
pub use volume_monitor::VolumeMonitor;
