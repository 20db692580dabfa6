use crate::{
    error::{SourceError, SourceRead},
    game::GameId,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct LibraryHints {
    pub steam_root: Option<PathBuf>,
    pub game_root: Option<PathBuf>,
}

pub fn discover_libraries(hints: &LibraryHints) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(root) = &hints.steam_root {
        roots.push(root.clone());
    }
    roots.extend(registry_steam_root());
    if let Some(game_root) = &hints.game_root {
        if let Some(library) = library_from_game_root(game_root) {
            roots.push(library);
        }
    }
    roots.extend(default_steam_roots());

    let mut libraries: Vec<PathBuf> = Vec::new();
    for root in roots {
        if !root.join("steamapps").is_dir() {
            debug!(path = %root.display(), "no steamapps directory");
            continue;
        }
        let vdf = root.join("steamapps").join("libraryfolders.vdf");
        let extra = match read_library_folders(&vdf) {
            Ok(Some(paths)) => paths,
            Ok(None) => Vec::new(),
            Err(err) => {
                debug!("{err}");
                Vec::new()
            }
        };
        push_unique(&mut libraries, root);
        for path in extra {
            if path.join("steamapps").is_dir() {
                push_unique(&mut libraries, path);
            }
        }
    }
    libraries
}

pub fn library_from_game_root(game_root: &Path) -> Option<PathBuf> {
    game_root
        .ancestors()
        .find(|ancestor| {
            ancestor
                .file_name()
                .map(|name| name.to_string_lossy().eq_ignore_ascii_case("steamapps"))
                .unwrap_or(false)
        })
        .and_then(|steamapps| steamapps.parent())
        .map(Path::to_path_buf)
}

pub fn workshop_content_dir(library: &Path, app_id: &str) -> PathBuf {
    library
        .join("steamapps")
        .join("workshop")
        .join("content")
        .join(app_id)
}

pub fn workshop_ledger_path(library: &Path, app_id: &str) -> PathBuf {
    library
        .join("steamapps")
        .join("workshop")
        .join(format!("appworkshop_{app_id}.acf"))
}

pub fn find_game_root(game: GameId, libraries: &[PathBuf]) -> Option<PathBuf> {
    libraries
        .iter()
        .map(|lib| {
            lib.join("steamapps")
                .join("common")
                .join(game.install_dir_name())
        })
        .find(|candidate| candidate.is_dir())
}

pub fn read_library_folders(path: &Path) -> SourceRead<Vec<PathBuf>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(SourceError::io(path, err)),
    };
    Ok(Some(parse_library_folders(&raw)))
}

fn parse_library_folders(raw: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if !line.contains("\"path\"") {
            continue;
        }

        let parts: Vec<&str> = line.split('"').collect();
        if parts.len() >= 4 {
            let path = parts[3].replace("\\\\", "\\");
            paths.push(PathBuf::from(path));
        }
    }
    paths
}

#[cfg(windows)]
fn registry_steam_root() -> Option<PathBuf> {
    use winreg::{enums::HKEY_LOCAL_MACHINE, RegKey};

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    [r"SOFTWARE\WOW6432Node\Valve\Steam", r"SOFTWARE\Valve\Steam"]
        .iter()
        .find_map(|subkey| {
            let key = hklm.open_subkey(subkey).ok()?;
            let path: String = key.get_value("InstallPath").ok()?;
            Some(PathBuf::from(path))
        })
}

#[cfg(not(windows))]
fn registry_steam_root() -> Option<PathBuf> {
    None
}

fn default_steam_roots() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs_home() {
        candidates.push(home.join(".local/share/Steam"));
        candidates.push(home.join(".steam/steam"));
        candidates.push(home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"));
    }
    if cfg!(windows) {
        candidates.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
        candidates.push(PathBuf::from(r"C:\Program Files\Steam"));
    }
    candidates
}

fn push_unique(list: &mut Vec<PathBuf>, path: PathBuf) {
    let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
    let seen = list
        .iter()
        .any(|existing| fs::canonicalize(existing).unwrap_or_else(|_| existing.clone()) == key);
    if !seen {
        list.push(path);
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}
