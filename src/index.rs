use crate::{
    config::GameConfig,
    game,
    manifest::{self, LedgerItem},
    names::{normalize_key, strip_archive_extension, tokenize_with, MIN_TOKEN_LEN},
    steam::{self, LibraryHints},
};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AvailabilityIndex {
    min_token_len: usize,
    pub(crate) local_files: HashSet<String>,
    pub(crate) local_stems: HashSet<String>,
    pub(crate) local_keys: HashSet<String>,
    pub(crate) remote_files: HashSet<String>,
    pub(crate) remote_stems: HashSet<String>,
    pub(crate) remote_keys: HashSet<String>,
    pub(crate) remote_dirs: HashSet<String>,
    pub(crate) subscribed: HashSet<String>,
    pub(crate) titles: BTreeMap<String, String>,
    pub(crate) title_tokens: BTreeMap<String, HashSet<String>>,
    pub(crate) file_tokens: BTreeMap<String, HashSet<String>>,
}

impl Default for AvailabilityIndex {
    fn default() -> Self {
        Self::new(MIN_TOKEN_LEN)
    }
}

impl AvailabilityIndex {
    pub fn new(min_token_len: usize) -> Self {
        Self {
            min_token_len,
            local_files: HashSet::new(),
            local_stems: HashSet::new(),
            local_keys: HashSet::new(),
            remote_files: HashSet::new(),
            remote_stems: HashSet::new(),
            remote_keys: HashSet::new(),
            remote_dirs: HashSet::new(),
            subscribed: HashSet::new(),
            titles: BTreeMap::new(),
            title_tokens: BTreeMap::new(),
            file_tokens: BTreeMap::new(),
        }
    }

    pub fn min_token_len(&self) -> usize {
        self.min_token_len
    }

    pub fn add_local_file(&mut self, file_name: &str) {
        let stem = strip_archive_extension(file_name);
        self.local_files.insert(file_name.trim().to_lowercase());
        self.local_stems.insert(stem.to_lowercase());
        let key = normalize_key(stem);
        if !key.is_empty() {
            self.local_keys.insert(key);
        }
    }

    pub fn add_remote_dir(&mut self, id: &str) {
        self.remote_dirs.insert(id.trim().to_lowercase());
    }

    pub fn add_subscribed(&mut self, id: &str) {
        self.subscribed.insert(id.trim().to_lowercase());
    }

    pub fn set_title(&mut self, id: &str, title: &str) {
        let id = id.trim().to_lowercase();
        let tokens = tokenize_with(title, self.min_token_len);
        self.title_tokens.insert(id.clone(), tokens);
        self.titles.insert(id, title.trim().to_string());
    }

    pub fn add_remote_file(&mut self, id: &str, file_name: &str) {
        let stem = strip_archive_extension(file_name);
        self.remote_files.insert(file_name.trim().to_lowercase());
        self.remote_stems.insert(stem.to_lowercase());
        let key = normalize_key(stem);
        if !key.is_empty() {
            self.remote_keys.insert(key);
        }
        let tokens = tokenize_with(stem, self.min_token_len);
        self.file_tokens
            .entry(id.trim().to_lowercase())
            .or_default()
            .extend(tokens);
    }

    pub fn title(&self, id: &str) -> Option<&str> {
        self.titles.get(&id.to_lowercase()).map(String::as_str)
    }

    pub fn local_count(&self) -> usize {
        self.local_files.len()
    }

    pub fn remote_count(&self) -> usize {
        self.remote_dirs.union(&self.subscribed).count()
    }

    pub fn remote_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .remote_dirs
            .iter()
            .chain(self.subscribed.iter())
            .chain(self.titles.keys())
            .chain(self.file_tokens.keys())
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexSources {
    pub local_dirs: Vec<PathBuf>,
    pub content_dirs: Vec<PathBuf>,
    pub ledgers: Vec<PathBuf>,
}

impl IndexSources {
    pub fn for_game(config: &GameConfig) -> Self {
        let app_id = config.app_id();
        let hints = LibraryHints {
            steam_root: config.steam_root_hint.clone(),
            game_root: config.game_root.clone(),
        };
        let libraries = steam::discover_libraries(&hints);

        let content_dirs = match &config.workshop_content_dir {
            Some(dir) => vec![dir.clone()],
            None => libraries
                .iter()
                .map(|lib| steam::workshop_content_dir(lib, app_id))
                .collect(),
        };
        let ledgers = libraries
            .iter()
            .map(|lib| steam::workshop_ledger_path(lib, app_id))
            .collect();

        Self {
            local_dirs: config.local_mod_dirs.clone(),
            content_dirs,
            ledgers,
        }
    }
}

/// Scans every source; individual failures are logged and skipped.
pub fn build_index(sources: &IndexSources, min_token_len: usize) -> AvailabilityIndex {
    let mut index = AvailabilityIndex::new(min_token_len);

    for dir in &sources.local_dirs {
        scan_local_dir(&mut index, dir);
    }
    for dir in &sources.content_dirs {
        scan_content_dir(&mut index, dir);
    }
    for ledger in &sources.ledgers {
        match manifest::read_workshop_ledger(ledger) {
            Ok(Some(items)) => merge_ledger(&mut index, &items),
            Ok(None) => debug!(path = %ledger.display(), "no workshop ledger"),
            Err(err) => warn!("skipping workshop ledger: {err}"),
        }
    }

    info!(
        local = index.local_count(),
        remote = index.remote_count(),
        titled = index.titles.len(),
        "availability index built"
    );
    index
}

fn scan_local_dir(index: &mut AvailabilityIndex, dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(path = %dir.display(), "skipping local mod dir: {err}");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !game::is_mod_archive(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            index.add_local_file(name);
        }
    }
}

fn scan_content_dir(index: &mut AvailabilityIndex, dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(path = %dir.display(), "skipping workshop content dir: {err}");
            return;
        }
    };
    for entry in entries.flatten() {
        let item_dir = entry.path();
        if !item_dir.is_dir() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().to_string();
        index.add_remote_dir(&id);

        match manifest::read_item_title(&item_dir) {
            Ok(Some(title)) => index.set_title(&id, &title),
            Ok(None) => debug!(id = %id, "workshop item has no manifest"),
            Err(err) => warn!(id = %id, "unreadable workshop manifest: {err}"),
        }

        for archive in manifest::item_archives(&item_dir) {
            if let Some(name) = archive.file_name().and_then(|name| name.to_str()) {
                index.add_remote_file(&id, name);
            }
        }
    }
}

fn merge_ledger(index: &mut AvailabilityIndex, items: &[LedgerItem]) {
    for item in items {
        index.add_subscribed(&item.id);
        if let Some(title) = &item.title {
            if index.title(&item.id).is_none() {
                index.set_title(&item.id, title);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn in_memory_index_tracks_names_and_tokens() {
        let mut index = AvailabilityIndex::default();
        index.add_local_file("Euro_Truck.SCS");
        assert!(index.local_files.contains("euro_truck.scs"));
        assert!(index.local_stems.contains("euro_truck"));
        assert!(index.local_keys.contains("eurotruck"));

        index.add_remote_dir("2001");
        index.set_title("2001", "Heavy Cargo Pack");
        index.add_remote_file("2001", "heavy_cargo_v3.scs");
        assert_eq!(index.title("2001"), Some("Heavy Cargo Pack"));
        assert!(index.file_tokens["2001"].contains("heavy"));
        assert!(!index.file_tokens["2001"].contains("v3"));
        assert_eq!(index.remote_ids(), vec!["2001"]);
    }

    #[test]
    fn builds_from_directories_and_ledger() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("mod");
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("euro_truck.scs"), b"").unwrap();
        fs::write(local.join("notes.txt"), b"").unwrap();
        fs::create_dir_all(local.join("folder.scs")).unwrap();

        let content = temp.path().join("content").join("227300");
        let item = content.join("2001");
        fs::create_dir_all(&item).unwrap();
        fs::write(item.join("manifest.sii"), "display_name: \"Heavy Cargo Pack\"\n").unwrap();
        fs::write(item.join("heavy_cargo.scs"), b"").unwrap();

        let ledger = temp.path().join("appworkshop_227300.acf");
        fs::write(
            &ledger,
            "\"AppWorkshop\"\n{\n \"WorkshopItemsInstalled\"\n {\n  \"3003\"\n  {\n   \"title\" \"Real Traffic\"\n  }\n }\n}\n",
        )
        .unwrap();

        let sources = IndexSources {
            local_dirs: vec![local, temp.path().join("missing")],
            content_dirs: vec![content],
            ledgers: vec![ledger, temp.path().join("absent.acf")],
        };
        let index = build_index(&sources, MIN_TOKEN_LEN);

        assert_eq!(index.local_count(), 1);
        assert!(index.local_files.contains("euro_truck.scs"));
        assert!(index.remote_dirs.contains("2001"));
        assert!(index.remote_files.contains("heavy_cargo.scs"));
        assert!(index.subscribed.contains("3003"));
        assert_eq!(index.title("2001"), Some("Heavy Cargo Pack"));
        assert_eq!(index.title("3003"), Some("Real Traffic"));
        assert_eq!(index.remote_count(), 2);
    }

    #[test]
    fn broken_manifest_does_not_stop_the_scan() {
        let temp = TempDir::new().unwrap();
        let content = temp.path().join("227300");
        let broken = content.join("1001");
        let good = content.join("1002");
        fs::create_dir_all(&broken).unwrap();
        fs::create_dir_all(&good).unwrap();
        fs::write(broken.join("broken.scs"), b"not a zip").unwrap();
        fs::write(good.join("manifest.sii"), "display_name: \"Real Traffic\"\n").unwrap();

        let sources = IndexSources {
            content_dirs: vec![content],
            ..IndexSources::default()
        };
        let index = build_index(&sources, MIN_TOKEN_LEN);

        assert!(index.remote_dirs.contains("1001"));
        assert!(index.remote_files.contains("broken.scs"));
        assert_eq!(index.title("1001"), None);
        assert_eq!(index.title("1002"), Some("Real Traffic"));
    }

    #[test]
    fn explicit_content_dir_overrides_libraries() {
        let temp = TempDir::new().unwrap();
        let mut config =
            GameConfig::load_or_create_at(game::GameId::Ets2, temp.path().join("ets2")).unwrap();
        config.workshop_content_dir = Some(temp.path().join("override"));
        let sources = IndexSources::for_game(&config);
        assert_eq!(sources.content_dirs, vec![temp.path().join("override")]);
    }
}
