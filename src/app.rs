use crate::{
    backup::{self, LastPatch},
    config::{AppConfig, GameConfig},
    error::PatchError,
    game::GameId,
    index::{build_index, AvailabilityIndex, IndexSources},
    links::{self, LinkMap},
    modlist::{self, ModEntry},
    notes::{self, ModNote, ModNotes},
    profile::{self, PatchOutcome, ProfileDecoder},
    resolver::{self, Resolution, ResolutionSummary},
    steam::{self, LibraryHints},
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub struct App {
    pub config: AppConfig,
    pub game: GameConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckRow {
    pub position: usize,
    pub entry: ModEntry,
    pub resolution: Resolution,
    pub link: Option<String>,
    pub note: Option<ModNote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub modlist: PathBuf,
    pub rows: Vec<CheckRow>,
    pub summary: ResolutionSummary,
}

impl App {
    pub fn initialize(game_override: Option<GameId>) -> Result<Self> {
        let mut config = AppConfig::load_or_create()?;
        if let Some(game) = game_override {
            config.active_game = game;
        }
        let game = GameConfig::load_or_create(config.active_game)?;
        Ok(Self::from_parts(config, game))
    }

    pub fn from_parts(config: AppConfig, game: GameConfig) -> Self {
        Self { config, game }
    }

    pub fn index_sources(&self) -> IndexSources {
        IndexSources::for_game(&self.game)
    }

    pub fn game_root(&self) -> Option<PathBuf> {
        if let Some(root) = &self.game.game_root {
            return Some(root.clone());
        }
        let libraries = steam::discover_libraries(&LibraryHints {
            steam_root: self.game.steam_root_hint.clone(),
            game_root: None,
        });
        steam::find_game_root(self.game.game_id, &libraries)
    }

    pub fn build_index(&self) -> AvailabilityIndex {
        build_index(&self.index_sources(), self.game.matching.min_token_len)
    }

    pub fn modlist_path(&self, name: &str) -> PathBuf {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return direct;
        }
        self.game.modlist_dir.join(format!("{name}.txt"))
    }

    pub fn check_modlist(&self, modlist_path: &Path) -> Result<CheckReport> {
        let index = self.build_index();
        self.check_modlist_with(modlist_path, &index)
    }

    pub fn check_modlist_with(
        &self,
        modlist_path: &Path,
        index: &AvailabilityIndex,
    ) -> Result<CheckReport> {
        let entries = modlist::load_modlist(modlist_path)?;
        let shown = modlist::displayed_entries(&entries);
        let settings = self.game.matching;
        let (resolved, summary) = resolver::resolve_all(&shown, index, &settings);

        let global = links::load_links_or_empty(&self.game.global_links_path());
        let per_list = links::load_links_or_empty(&links::per_list_links_path(modlist_path));
        let notes = self.load_notes_or_empty(modlist_path);

        let rows = resolved
            .into_iter()
            .enumerate()
            .map(|(position, (entry, resolution))| {
                let link =
                    links::resolve_link(&entry, &global, &per_list, settings.min_substring_len);
                let note = notes.get(&entry.package_id).cloned();
                CheckRow {
                    position: position + 1,
                    entry,
                    resolution,
                    link,
                    note,
                }
            })
            .collect();

        tracing::info!(
            modlist = %modlist_path.display(),
            local = summary.available_local,
            remote = summary.available_remote,
            missing = summary.missing,
            "modlist checked"
        );
        Ok(CheckReport {
            modlist: modlist_path.to_path_buf(),
            rows,
            summary,
        })
    }

    fn load_notes_or_empty(&self, modlist_path: &Path) -> ModNotes {
        match notes::load_notes(&notes::notes_path(modlist_path)) {
            Ok(Some(notes)) => notes,
            Ok(None) => ModNotes::new(),
            Err(err) => {
                tracing::warn!("ignoring notes: {err}");
                ModNotes::new()
            }
        }
    }

    pub fn set_note(&self, modlist_path: &Path, package_id: &str, info: &str) -> Result<PathBuf> {
        let path = notes::notes_path(modlist_path);
        let mut notes = match notes::load_notes(&path) {
            Ok(notes) => notes.unwrap_or_default(),
            Err(err) => return Err(err).context("load notes for edit"),
        };
        let note = notes.entry(package_id.to_string()).or_default();
        note.info = info.trim().to_string();
        notes::save_notes(&path, &notes)?;
        Ok(path)
    }

    pub fn set_link(&self, modlist_path: Option<&Path>, key: &str, url: &str) -> Result<PathBuf> {
        let path = match modlist_path {
            Some(modlist) => links::per_list_links_path(modlist),
            None => self.game.global_links_path(),
        };
        links::set_link(&path, key, url)?;
        Ok(path)
    }

    pub fn global_links(&self) -> LinkMap {
        links::load_links_or_empty(&self.game.global_links_path())
    }

    // Own line first, then the mods reversed, so the displayed order is the block order.
    pub fn create_modlist_from_profile(
        &self,
        profile_path: &Path,
        name: &str,
        decoder: &dyn ProfileDecoder,
    ) -> Result<PathBuf> {
        let active = profile::read_active_mods(profile_path, decoder)?;
        let own = ModEntry::new(profile_label(profile_path), name);
        let mut file_entries = Vec::with_capacity(active.len() + 1);
        file_entries.push(own);
        file_entries.extend(active.into_iter().rev());

        let path = self.game.modlist_dir.join(format!("{name}.txt"));
        modlist::save_modlist(&path, &file_entries)
            .with_context(|| format!("create modlist {name}"))?;
        tracing::info!(path = %path.display(), mods = file_entries.len() - 1, "modlist created");
        Ok(path)
    }

    pub fn adopt_modlist(&self, modlist_path: &Path, profile_path: &Path) -> Result<PatchOutcome> {
        let entries = modlist::load_modlist(modlist_path)?;
        let shown = modlist::displayed_entries(&entries);
        let lines = modlist::activation_lines(&shown);
        let outcome = profile::patch_profile(profile_path, &lines)?;
        backup::record_last_patch(
            &self.game.last_patch_path(),
            &outcome.profile,
            &outcome.backup,
        )?;
        Ok(outcome)
    }

    pub fn undo_last_patch(&self) -> Result<LastPatch, PatchError> {
        backup::undo_last_patch(&self.game.last_patch_path())
    }
}

fn profile_label(profile_path: &Path) -> String {
    profile_path
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "profile".to_string())
}
