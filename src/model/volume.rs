/*!
 * Volume identity and classification (spec §3 "Volume")
 */

use serde::{Deserialize, Serialize};

/// A platform-stable drive identifier: a letter on Windows, a mount path
/// elsewhere. Unique among currently-attached volumes.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct VolumeId(pub String);

impl VolumeId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VolumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a volume is attached to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeClass {
    Local,
    Removable,
    Remote,
}

/// A mountable storage unit, created on attach and removed on detach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: VolumeId,
    pub label: Option<String>,
    pub mount_point: std::path::PathBuf,
    pub class: VolumeClass,
    pub excluded: bool,
}

impl Volume {
    pub fn new(id: VolumeId, mount_point: std::path::PathBuf, class: VolumeClass) -> Self {
        Self {
            id,
            label: None,
            mount_point,
            class,
            excluded: false,
        }
    }

    pub fn is_removable(&self) -> bool {
        matches!(self.class, VolumeClass::Removable)
    }
}
