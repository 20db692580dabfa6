use crate::{game::GameId, resolver::MatchSettings};
use anyhow::{Context, Result};
use directories::{BaseDirs, UserDirs};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, deserialize_with = "game_or_default")]
    pub active_game: GameId,
    #[serde(default = "default_true")]
    pub confirm_profile_patch: bool,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        Self::load_or_create_in(&base_dir)
    }

    pub fn load_or_create_in(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let value: Value = serde_json::from_str(&raw).context("parse app config")?;
            let unknown_game = value
                .get("active_game")
                .map(|game| game.as_str().and_then(GameId::parse).is_none())
                .unwrap_or(false);
            let config: AppConfig = serde_json::from_value(value).context("parse app config")?;
            if unknown_game {
                tracing::warn!(game = %config.active_game.as_str(), "unknown active game, using default");
                config.save_in(base_dir)?;
            }
            return Ok(config);
        }

        let config = AppConfig {
            active_game: GameId::default(),
            confirm_profile_patch: true,
        };
        config.save_in(base_dir)?;
        Ok(config)
    }

    pub fn save_in(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub game_id: GameId,
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub local_mod_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub game_root: Option<PathBuf>,
    #[serde(default)]
    pub steam_root_hint: Option<PathBuf>,
    #[serde(default)]
    pub workshop_content_dir: Option<PathBuf>,
    #[serde(default)]
    pub app_id_override: Option<String>,
    #[serde(default)]
    pub modlist_dir: PathBuf,
    #[serde(default)]
    pub matching: MatchSettings,
}

impl GameConfig {
    pub fn load_or_create(game: GameId) -> Result<Self> {
        let data_dir = data_dir_for_game(game)?;
        Self::load_or_create_at(game, data_dir)
    }

    pub fn load_or_create_at(game: GameId, data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).context("create data dir")?;

        let config_path = data_dir.join("config.json");
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path).context("read config")?;
            let mut config: GameConfig = serde_json::from_str(&raw).context("parse config")?;
            config.game_id = game;
            config.data_dir = data_dir;
            if config.modlist_dir.as_os_str().is_empty() {
                config.modlist_dir = config.data_dir.join("modlists");
            }
            return Ok(config);
        }

        let local_mod_dirs = UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(|docs| game.default_mod_dir(docs)))
            .filter(|dir| dir.is_dir())
            .into_iter()
            .collect();

        let config = GameConfig {
            game_id: game,
            modlist_dir: data_dir.join("modlists"),
            data_dir,
            local_mod_dirs,
            game_root: None,
            steam_root_hint: None,
            workshop_content_dir: None,
            app_id_override: None,
            matching: MatchSettings::default(),
        };

        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.data_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(config_path, raw).context("write config")?;
        Ok(())
    }

    pub fn app_id(&self) -> &str {
        self.app_id_override
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.game_id.steam_app_id())
    }

    pub fn global_links_path(&self) -> PathBuf {
        self.data_dir.join("links.json")
    }

    pub fn last_patch_path(&self) -> PathBuf {
        self.data_dir.join("last_patch.json")
    }
}

pub fn data_dir_for_game(game: GameId) -> Result<PathBuf> {
    let base = base_data_dir()?;
    Ok(base.join(game.data_dir_name()))
}

fn game_or_default<'de, D>(deserializer: D) -> std::result::Result<GameId, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(GameId::parse).unwrap_or_default())
}

fn default_true() -> bool {
    true
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("truckmods"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_game_config_with_defaults() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("ats");
        let config = GameConfig::load_or_create_at(GameId::Ats, data_dir.clone()).unwrap();
        assert!(data_dir.join("config.json").exists());
        assert_eq!(config.app_id(), "270880");
        assert_eq!(config.modlist_dir, data_dir.join("modlists"));
        assert_eq!(config.matching.min_overlap, 2);
    }

    #[test]
    fn app_id_override_wins_when_set() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("ets2");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(
            data_dir.join("config.json"),
            r#"{ "app_id_override": "999", "matching": { "min_overlap": 3 } }"#,
        )
        .unwrap();
        let config = GameConfig::load_or_create_at(GameId::Ets2, data_dir).unwrap();
        assert_eq!(config.app_id(), "999");
        assert_eq!(config.matching.min_overlap, 3);
        assert_eq!(config.matching.min_token_len, 3);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("ets2");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join("config.json"), "{ not json").unwrap();
        assert!(GameConfig::load_or_create_at(GameId::Ets2, data_dir).is_err());
    }

    #[test]
    fn unknown_active_game_falls_back_and_is_saved() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.json"),
            r#"{"active_game":"fs22","confirm_profile_patch":false}"#,
        )
        .unwrap();
        let config = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert_eq!(config.active_game, GameId::Ets2);
        assert!(!config.confirm_profile_patch);

        let raw = fs::read_to_string(temp.path().join("config.json")).unwrap();
        assert!(raw.contains("\"ets2\""));
        assert!(!raw.contains("fs22"));
    }

    #[test]
    fn app_config_round_trips_active_game() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert_eq!(config.active_game, GameId::Ets2);
        config.active_game = GameId::Ats;
        config.save_in(temp.path()).unwrap();
        let loaded = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert_eq!(loaded.active_game, GameId::Ats);
    }
}
