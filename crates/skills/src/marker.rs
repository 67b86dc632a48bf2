use std::path::Path;

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    skillport_remote::Visibility,
};

use crate::error::Result;

/// File dropped into every folder the installer writes.
pub const MARKER_FILE: &str = ".skillport.json";

/// Boundary marker: folders carrying it were installed from the remote store
/// and belong to the installer, never to backup discovery or cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMarker {
    pub skill_id: String,
    pub slug: String,
    pub name: String,
    pub visibility: Visibility,
    /// Identity of the remote store the skill came from.
    pub server: String,
    pub installed_at: DateTime<Utc>,
}

impl InstallMarker {
    /// Read the marker in `folder`, if present and well-formed.
    pub fn read(folder: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(folder.join(MARKER_FILE)).ok()?;
        serde_json::from_str(&data).ok()
    }

    pub fn write(&self, folder: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(folder.join(MARKER_FILE), data)?;
        Ok(())
    }
}

/// Whether `folder` carries a marker file, well-formed or not.
pub fn has_marker(folder: &Path) -> bool {
    folder.join(MARKER_FILE).is_file()
}
