use crate::{
    error::{SourceError, SourceRead},
    game,
};
use std::{
    fs,
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

const MANIFEST_NAME: &str = "manifest.sii";

/// Title from SII text: the first `key: "value"` whose key mentions a name or title.
pub fn parse_manifest_title(text: &str) -> Option<String> {
    for line in text.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        if !(key.contains("name") || key.contains("title")) {
            continue;
        }
        let value = value.trim().trim_end_matches(';').trim().trim_matches('"').trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

pub fn find_loose_manifest(item_dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<(usize, PathBuf)> = WalkDir::new(item_dir)
        .max_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .eq_ignore_ascii_case(MANIFEST_NAME)
        })
        .map(|entry| (entry.depth(), entry.path().to_path_buf()))
        .collect();
    candidates.sort();
    candidates.into_iter().next().map(|(_, path)| path)
}

pub fn read_loose_title(item_dir: &Path) -> SourceRead<String> {
    let Some(path) = find_loose_manifest(item_dir) else {
        return Ok(None);
    };
    let bytes = fs::read(&path).map_err(|err| SourceError::io(&path, err))?;
    let text = String::from_utf8_lossy(&bytes);
    parse_manifest_title(&text)
        .map(Some)
        .ok_or_else(|| SourceError::malformed(&path, "no name or title key"))
}

pub fn read_archive_title(archive: &Path) -> SourceRead<String> {
    let file = match fs::File::open(archive) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(SourceError::io(archive, err)),
    };
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|err| SourceError::malformed(archive, err.to_string()))?;

    let mut best: Option<(String, usize)> = None;
    for name in zip.file_names() {
        let normalized = name.replace('\\', "/").to_ascii_lowercase();
        let file_name = normalized.rsplit('/').next().unwrap_or("");
        if file_name != MANIFEST_NAME {
            continue;
        }
        let depth = normalized.matches('/').count();
        if best
            .as_ref()
            .map(|(_, best_depth)| depth < *best_depth)
            .unwrap_or(true)
        {
            best = Some((name.to_string(), depth));
        }
    }
    let Some((name, _)) = best else {
        return Ok(None);
    };

    let mut entry = zip
        .by_name(&name)
        .map_err(|err| SourceError::malformed(archive, err.to_string()))?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|err| SourceError::io(archive, err))?;
    let text = String::from_utf8_lossy(&bytes);
    parse_manifest_title(&text)
        .map(Some)
        .ok_or_else(|| SourceError::malformed(archive, "manifest has no name or title key"))
}

pub fn item_archives(item_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(item_dir) else {
        return Vec::new();
    };
    let mut archives: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && game::is_mod_archive(path))
        .collect();
    archives.sort();
    archives
}

/// Loose manifest first, then any archive in the directory that carries one.
pub fn read_item_title(item_dir: &Path) -> SourceRead<String> {
    let loose = read_loose_title(item_dir);
    if let Ok(Some(title)) = loose {
        return Ok(Some(title));
    }
    let mut last_err = loose.err();
    for archive in item_archives(item_dir) {
        match read_archive_title(&archive) {
            Ok(Some(title)) => return Ok(Some(title)),
            Ok(None) => {}
            Err(err) => last_err = Some(err),
        }
    }
    match last_err {
        Some(err) => Err(err),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerItem {
    pub id: String,
    pub title: Option<String>,
}

const LEDGER_SECTIONS: [&str; 2] = ["WorkshopItemsInstalled", "WorkshopItemDetails"];

pub fn read_workshop_ledger(path: &Path) -> SourceRead<Vec<LedgerItem>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(SourceError::io(path, err)),
    };
    parse_workshop_ledger(&raw)
        .map(Some)
        .map_err(|reason| SourceError::malformed(path, reason))
}

#[derive(Debug, PartialEq)]
enum KvToken {
    Str(String),
    Open,
    Close,
}

fn kv_tokens(raw: &str) -> Result<Vec<KvToken>, String> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' => tokens.push(KvToken::Open),
            '}' => tokens.push(KvToken::Close),
            '"' => {
                let mut value = String::new();
                let mut closed = false;
                while let Some(next) = chars.next() {
                    match next {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err("unterminated string".to_string());
                }
                tokens.push(KvToken::Str(value));
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(tokens)
}

fn parse_workshop_ledger(raw: &str) -> Result<Vec<LedgerItem>, String> {
    let tokens = kv_tokens(raw)?;
    let mut path: Vec<String> = Vec::new();
    let mut items: Vec<LedgerItem> = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        match &tokens[index] {
            KvToken::Str(key) => match tokens.get(index + 1) {
                Some(KvToken::Open) => {
                    let in_section = path.len() == 2
                        && LEDGER_SECTIONS
                            .iter()
                            .any(|section| path[1].eq_ignore_ascii_case(section));
                    if in_section
                        && !key.is_empty()
                        && key.chars().all(|ch| ch.is_ascii_digit())
                        && !items.iter().any(|item| item.id == *key)
                    {
                        items.push(LedgerItem {
                            id: key.clone(),
                            title: None,
                        });
                    }
                    path.push(key.clone());
                    index += 2;
                }
                Some(KvToken::Str(value)) => {
                    if path.len() == 3 && key.eq_ignore_ascii_case("title") && !value.is_empty() {
                        if let Some(item) = items.iter_mut().find(|item| item.id == path[2]) {
                            item.title = Some(value.clone());
                        }
                    }
                    index += 2;
                }
                _ => return Err(format!("dangling key {key}")),
            },
            KvToken::Close => {
                if path.pop().is_none() {
                    return Err("unbalanced closing brace".to_string());
                }
                index += 1;
            }
            KvToken::Open => return Err("block without key".to_string()),
        }
    }

    if !path.is_empty() {
        return Err("unclosed block".to_string());
    }
    Ok(items)
}
