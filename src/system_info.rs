/*!
 * System information port: the seam that lets volume enumeration and
 * resource checks run against the real OS in production and a fixed
 * fixture in tests, mirroring the teacher's filesystem-port split
 * (`system/mod.rs` LocalSystem/MockSystem).
 */

use crate::model::{Volume, VolumeClass, VolumeId};
use std::path::PathBuf;
use sysinfo::Disks;

/// Abstracts the host facts the volume monitor and disk-space preflight
/// need, so both can be exercised without a real removable drive attached.
pub trait SystemInfoPort: Send + Sync {
    fn list_volumes(&self) -> Vec<Volume>;
    fn available_memory_bytes(&self) -> u64;
    fn cpu_count(&self) -> usize;
    fn disk_partition_count(&self) -> usize;
    /// Bytes free on the filesystem containing `path`, if it could be determined.
    fn available_space(&self, path: &std::path::Path) -> Option<u64>;
}

/// Production implementation, backed by `sysinfo`.
#[derive(Debug, Default)]
pub struct SysinfoPort;

impl SysinfoPort {
    pub fn new() -> Self {
        Self
    }

    /// Classify a disk, except the system volume the current process runs
    /// from, which is never reported `Removable` regardless of the
    /// underlying removable-media bit (spec §4.3).
    fn classify(disk: &sysinfo::Disk, is_system_volume: bool) -> VolumeClass {
        if is_system_volume {
            return VolumeClass::Local;
        }
        if disk.is_removable() {
            VolumeClass::Removable
        } else if matches!(disk.file_system().to_str(), Some(fs) if fs.eq_ignore_ascii_case("nfs") || fs.eq_ignore_ascii_case("smb") || fs.eq_ignore_ascii_case("cifs"))
        {
            VolumeClass::Remote
        } else {
            VolumeClass::Local
        }
    }

    /// The mount point hosting the current process's executable, i.e. the
    /// system volume — longest matching prefix among `disks`.
    fn system_mount(disks: &Disks) -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        disks
            .iter()
            .filter(|d| exe.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .map(|d| d.mount_point().to_path_buf())
    }
}

impl SystemInfoPort for SysinfoPort {
    fn list_volumes(&self) -> Vec<Volume> {
        let disks = Disks::new_with_refreshed_list();
        let system_mount = Self::system_mount(&disks);
        disks
            .iter()
            .map(|disk| {
                let id = VolumeId::new(disk.mount_point().to_string_lossy().into_owned());
                let is_system = system_mount.as_deref() == Some(disk.mount_point());
                let mut volume =
                    Volume::new(id, PathBuf::from(disk.mount_point()), Self::classify(disk, is_system));
                let name = disk.name().to_string_lossy();
                if !name.is_empty() {
                    volume.label = Some(name.into_owned());
                }
                volume
            })
            .collect()
    }

    fn available_memory_bytes(&self) -> u64 {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        sys.available_memory()
    }

    fn cpu_count(&self) -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    fn disk_partition_count(&self) -> usize {
        Disks::new_with_refreshed_list().len()
    }

    fn available_space(&self, path: &std::path::Path) -> Option<u64> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
    }
}

/// Fixed, in-memory fixture for unit tests — no real disks touched.
#[derive(Debug, Clone, Default)]
pub struct MockSystemInfoPort {
    pub volumes: Vec<Volume>,
    pub available_memory_bytes: u64,
    pub cpu_count: usize,
    pub disk_partition_count: usize,
    pub space_by_mount: Vec<(PathBuf, u64)>,
}

impl MockSystemInfoPort {
    pub fn new() -> Self {
        Self {
            cpu_count: 4,
            available_memory_bytes: 4 * 1024 * 1024 * 1024,
            ..Default::default()
        }
    }

    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn with_space(mut self, mount: impl Into<PathBuf>, available: u64) -> Self {
        self.space_by_mount.push((mount.into(), available));
        self
    }
}

impl SystemInfoPort for MockSystemInfoPort {
    fn list_volumes(&self) -> Vec<Volume> {
        self.volumes.clone()
    }

    fn available_memory_bytes(&self) -> u64 {
        self.available_memory_bytes
    }

    fn cpu_count(&self) -> usize {
        self.cpu_count.max(1)
    }

    fn disk_partition_count(&self) -> usize {
        self.disk_partition_count
    }

    fn available_space(&self, path: &std::path::Path) -> Option<u64> {
        self.space_by_mount
            .iter()
            .filter(|(mount, _)| path.starts_with(mount))
            .max_by_key(|(mount, _)| mount.as_os_str().len())
            .map(|(_, space)| *space)
    }
}
