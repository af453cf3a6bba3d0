// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation sidecar files.
//!
//! The same [`PersistedState`] that autosave keeps per image can be
//! exported to, and imported from, a YAML or JSON file next to the image.

use crate::models::project::PersistedState;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Sidecar format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarFormat {
    Yaml,
    Json,
}

impl SidecarFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Ok(SidecarFormat::Yaml),
            Some("json") => Ok(SidecarFormat::Json),
            other => bail!("Unsupported file extension: {:?}", other),
        }
    }
}

/// Export annotations to `path`, format taken from its extension.
pub fn export_sidecar(data: &PersistedState, path: &Path) -> Result<()> {
    let text = match SidecarFormat::from_path(path)? {
        SidecarFormat::Yaml => serde_yaml::to_string(data)?,
        SidecarFormat::Json => serde_json::to_string_pretty(data)?,
    };
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Import annotations from `path`, format taken from its extension.
pub fn import_sidecar(path: &Path) -> Result<PersistedState> {
    let format = SidecarFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let data = match format {
        SidecarFormat::Yaml => serde_yaml::from_str(&text)?,
        SidecarFormat::Json => serde_json::from_str(&text)?,
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::annotation::{Annotation, Measurement};
    use crate::models::project::Offset;
    use tempfile::tempdir;

    fn data() -> PersistedState {
        PersistedState::new(
            vec![Annotation::Measurement(Measurement {
                id: "a2".to_string(),
                x: 1.5,
                y: 2.0,
                x2: 30.0,
                y2: 40.0,
            })],
            0.264,
            1.0,
            Offset::default(),
        )
    }

    #[test]
    fn test_yaml_and_json_agree() {
        let dir = tempdir().unwrap();
        let original = data();
        for name in ["notes.yaml", "notes.json"] {
            let path = dir.path().join(name);
            export_sidecar(&original, &path).unwrap();
            assert_eq!(import_sidecar(&path).unwrap(), original, "{name}");
        }
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        assert!(export_sidecar(&data(), &path).is_err());
        assert!(!path.exists());
    }
}
