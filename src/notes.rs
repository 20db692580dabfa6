use crate::{
    error::{SourceError, SourceRead},
    links::sidecar_path,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModNote {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub modname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub info: String,
}

impl ModNote {
    pub fn is_empty(&self) -> bool {
        self.modname.trim().is_empty() && self.info.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredNote {
    Legacy(String),
    Full {
        #[serde(default)]
        modname: Option<String>,
        #[serde(default)]
        info: Option<String>,
    },
}

impl From<StoredNote> for ModNote {
    fn from(value: StoredNote) -> Self {
        match value {
            StoredNote::Legacy(info) => ModNote {
                modname: String::new(),
                info,
            },
            StoredNote::Full { modname, info } => ModNote {
                modname: modname.unwrap_or_default(),
                info: info.unwrap_or_default(),
            },
        }
    }
}

pub type ModNotes = BTreeMap<String, ModNote>;

pub fn notes_path(modlist: &Path) -> PathBuf {
    sidecar_path(modlist, "notes.json")
}

pub fn load_notes(path: &Path) -> SourceRead<ModNotes> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(SourceError::io(path, err)),
    };
    let object: Map<String, Value> =
        serde_json::from_str(&raw).map_err(|err| SourceError::malformed(path, err.to_string()))?;
    let mut notes = ModNotes::new();
    for (package_id, value) in object {
        match serde_json::from_value::<StoredNote>(value) {
            Ok(stored) => {
                notes.insert(package_id, stored.into());
            }
            Err(err) => tracing::debug!(package = %package_id, "skipping note: {err}"),
        }
    }
    Ok(Some(notes))
}

pub fn save_notes(path: &Path, notes: &ModNotes) -> Result<()> {
    let kept: BTreeMap<&String, &ModNote> =
        notes.iter().filter(|(_, note)| !note.is_empty()).collect();
    let raw = serde_json::to_string_pretty(&kept).context("serialize notes")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create notes dir")?;
    }
    fs::write(path, raw).with_context(|| format!("write notes {}", path.display()))?;
    Ok(())
}
