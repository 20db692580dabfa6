use crate::{
    error::{SourceError, SourceRead},
    modlist::ModEntry,
    names::normalize_key,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkValue {
    Bare(String),
    Object {
        #[serde(default)]
        url: String,
    },
}

impl LinkValue {
    pub fn into_url(self) -> String {
        match self {
            LinkValue::Bare(url) | LinkValue::Object { url } => url.trim().to_string(),
        }
    }
}

/// Key to raw URL table, in file order. Later inserts replace earlier keys in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkMap {
    entries: Vec<(String, String)>,
}

impl LinkMap {
    pub fn insert(&mut self, key: impl Into<String>, url: impl Into<String>) {
        let key = key.into();
        let url = url.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = url,
            None => self.entries.push((key, url)),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| existing != key);
        before != self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, url)| url.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, url)| (key.as_str(), url.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn merged(global: &LinkMap, per_list: &LinkMap) -> LinkMap {
        let mut merged = global.clone();
        for (key, url) in per_list.iter() {
            merged.insert(key, url);
        }
        merged
    }

    pub fn from_json(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        let object: Map<String, Value> = serde_json::from_str(raw)?;
        let mut map = LinkMap::default();
        for (key, value) in object {
            let Ok(value) = serde_json::from_value::<LinkValue>(value) else {
                continue;
            };
            let url = value.into_url();
            if !key.trim().is_empty() && !url.is_empty() {
                map.insert(key, url);
            }
        }
        Ok(map)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut object = Map::new();
        for (key, url) in self.iter() {
            let value = serde_json::to_value(LinkValue::Object {
                url: url.to_string(),
            })?;
            object.insert(key.to_string(), value);
        }
        serde_json::to_string_pretty(&Value::Object(object))
    }
}

pub fn per_list_links_path(modlist: &Path) -> PathBuf {
    sidecar_path(modlist, "links.json")
}

pub(crate) fn sidecar_path(modlist: &Path, suffix: &str) -> PathBuf {
    let mut name = modlist
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    modlist.with_file_name(name)
}

pub fn load_links(path: &Path) -> SourceRead<LinkMap> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(SourceError::io(path, err)),
    };
    LinkMap::from_json(&raw)
        .map(Some)
        .map_err(|err| SourceError::malformed(path, err.to_string()))
}

pub fn load_links_or_empty(path: &Path) -> LinkMap {
    match load_links(path) {
        Ok(Some(map)) => map,
        Ok(None) => LinkMap::default(),
        Err(err) => {
            tracing::warn!("ignoring link file: {err}");
            LinkMap::default()
        }
    }
}

pub fn save_links(path: &Path, map: &LinkMap) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create links dir")?;
    }
    let raw = map.to_json().context("serialize links")?;
    fs::write(path, raw).with_context(|| format!("write links {}", path.display()))?;
    Ok(())
}

/// Read-modify-write of a single key. An empty `url` removes the key.
pub fn set_link(path: &Path, key: &str, url: &str) -> Result<()> {
    let mut map = match load_links(path) {
        Ok(map) => map.unwrap_or_default(),
        Err(err) => return Err(err).context("load links for edit"),
    };
    let url = url.trim();
    if url.is_empty() {
        map.remove(key);
    } else {
        map.insert(key, url);
    }
    save_links(path, &map)
}

pub fn resolve_link(
    entry: &ModEntry,
    global: &LinkMap,
    per_list: &LinkMap,
    min_substring_len: usize,
) -> Option<String> {
    if global.is_empty() && per_list.is_empty() {
        return None;
    }
    let merged = LinkMap::merged(global, per_list);
    lookup_raw(entry, &merged, min_substring_len).map(normalize_url)
}

fn lookup_raw<'a>(entry: &ModEntry, map: &'a LinkMap, min_substring_len: usize) -> Option<&'a str> {
    let name = entry.display_name.trim();
    let package = entry.package_id.trim();

    for key in [name, package] {
        if key.is_empty() {
            continue;
        }
        if let Some(url) = map.get(key) {
            return Some(url);
        }
    }

    let normalized: Vec<(String, &str)> = map
        .iter()
        .map(|(key, url)| (normalize_key(key), url))
        .filter(|(key, _)| !key.is_empty())
        .collect();
    let queries: Vec<String> = [name, package]
        .into_iter()
        .map(normalize_key)
        .filter(|query| !query.is_empty())
        .collect();

    for query in &queries {
        if let Some((_, url)) = normalized.iter().find(|(key, _)| key == query) {
            return Some(*url);
        }
    }

    for query in &queries {
        if query.chars().count() < min_substring_len {
            continue;
        }
        if let Some((_, url)) = normalized
            .iter()
            .find(|(key, _)| key.contains(query.as_str()) || query.contains(key.as_str()))
        {
            return Some(*url);
        }
    }
    None
}

pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return trimmed.to_string();
    }
    let domain_like =
        lower.starts_with("www.") || (trimmed.contains('.') && !trimmed.contains(char::is_whitespace));
    if domain_like {
        return format!("https://{trimmed}");
    }
    trimmed.to_string()
}
