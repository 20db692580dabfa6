use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ARCHIVE_EXTENSIONS: [&str; 2] = ["scs", "zip"];
pub const WORKSHOP_PACKAGE_PREFIX: &str = "mod_workshop_package.";
pub const ACTIVE_MODS_MARKER: &str = "active_mods";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameId {
    Ets2,
    Ats,
}

impl Default for GameId {
    fn default() -> Self {
        GameId::Ets2
    }
}

impl GameId {
    pub fn display_name(self) -> &'static str {
        match self {
            GameId::Ets2 => "Euro Truck Simulator 2",
            GameId::Ats => "American Truck Simulator",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameId::Ets2 => "ets2",
            GameId::Ats => "ats",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ets2" | "eurotrucks2" => Some(GameId::Ets2),
            "ats" | "amtrucks" => Some(GameId::Ats),
            _ => None,
        }
    }

    pub fn steam_app_id(self) -> &'static str {
        match self {
            GameId::Ets2 => "227300",
            GameId::Ats => "270880",
        }
    }

    pub fn install_dir_name(self) -> &'static str {
        self.display_name()
    }

    pub fn documents_dir_name(self) -> &'static str {
        self.display_name()
    }

    pub fn data_dir_name(self) -> &'static str {
        self.as_str()
    }

    pub fn default_mod_dir(self, documents: &Path) -> PathBuf {
        documents.join(self.documents_dir_name()).join("mod")
    }
}

pub fn is_mod_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
