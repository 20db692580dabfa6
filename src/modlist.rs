use crate::game::ACTIVE_MODS_MARKER;
use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModEntry {
    pub package_id: String,
    pub display_name: String,
}

impl ModEntry {
    pub fn new(package_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            display_name: display_name.into(),
        }
    }

    pub fn from_line(line: &str) -> Self {
        let (package_id, display_name) = parse_line(line);
        Self {
            package_id,
            display_name,
        }
    }

    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.package_id
        } else {
            &self.display_name
        }
    }

    pub fn to_line(&self) -> String {
        format!("\"{}|{}\"", self.package_id, self.display_name)
    }
}

const LEGACY_DELIMITERS: [&str; 3] = [";", "\t", " - "];

/// A line with no recognised delimiter is returned as both fields.
pub fn parse_line(line: &str) -> (String, String) {
    let trimmed = line.trim();
    let working = match (trimmed.find('"'), trimmed.rfind('"')) {
        (Some(first), Some(last)) if first < last => &trimmed[first + 1..last],
        _ => trimmed,
    };

    if let Some((package, name)) = working.split_once('|') {
        return (clean_field(package), clean_field(name));
    }

    for delimiter in LEGACY_DELIMITERS {
        if let Some((package, name)) = working.split_once(delimiter) {
            let package = clean_field(package);
            let name = clean_field(name);
            if !package.is_empty() || !name.is_empty() {
                return (package, name);
            }
        }
    }

    let cleaned = clean_field(working);
    (cleaned.clone(), cleaned)
}

fn clean_field(value: &str) -> String {
    value.trim().trim_matches('"').trim().to_string()
}

pub fn parse_modlist(text: &str) -> Vec<ModEntry> {
    let mut lines = text.lines().peekable();
    if let Some(first) = lines.peek() {
        if is_count_line(first) {
            lines.next();
        }
    }
    lines
        .filter(|line| !line.trim().is_empty())
        .map(ModEntry::from_line)
        .collect()
}

fn is_count_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.parse::<i64>().is_ok()
}

/// Presentation order: newest-first, without the profile's own trailing entry.
pub fn displayed_entries(entries: &[ModEntry]) -> Vec<ModEntry> {
    let mut shown: Vec<ModEntry> = entries.iter().rev().cloned().collect();
    shown.pop();
    shown
}

pub fn load_modlist(path: &Path) -> Result<Vec<ModEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read modlist {}", path.display()))?;
    Ok(parse_modlist(&raw))
}

pub fn save_modlist(path: &Path, entries: &[ModEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create modlist dir")?;
    }
    let mut raw = format!("{}\n", entries.len());
    for entry in entries {
        raw.push_str(&entry.to_line());
        raw.push('\n');
    }
    fs::write(path, raw).with_context(|| format!("write modlist {}", path.display()))?;
    Ok(())
}

pub fn activation_lines(entries: &[ModEntry]) -> Vec<String> {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(format!("{ACTIVE_MODS_MARKER}: {}", entries.len()));
    for (index, entry) in entries.iter().enumerate() {
        lines.push(format!("{ACTIVE_MODS_MARKER}[{index}]: {}", entry.to_line()));
    }
    lines
}

pub fn entries_from_activation_block<S: AsRef<str>>(lines: &[S]) -> Vec<ModEntry> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| {
            line.strip_prefix(ACTIVE_MODS_MARKER)
                .map(|rest| rest.trim_start().starts_with('['))
                .unwrap_or(false)
        })
        .map(ModEntry::from_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ids(entries: &[ModEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.package_id.as_str()).collect()
    }

    #[test]
    fn parses_pipe_delimited_lines() {
        assert_eq!(
            parse_line("modx|Mod X"),
            ("modx".to_string(), "Mod X".to_string())
        );
        assert_eq!(
            parse_line(r#"  active_mods[3]: "mod_workshop_package.00000000000A1B2C|Big Trailers ""#),
            (
                "mod_workshop_package.00000000000A1B2C".to_string(),
                "Big Trailers".to_string()
            )
        );
    }

    #[test]
    fn clean_input_is_stable() {
        let (package, name) = parse_line("modx|Mod X");
        let again = parse_line(&format!("{package}|{name}"));
        assert_eq!(again, (package, name));
    }

    #[test]
    fn falls_back_to_legacy_delimiters() {
        assert_eq!(
            parse_line("pkgA;Name A"),
            ("pkgA".to_string(), "Name A".to_string())
        );
        assert_eq!(
            parse_line("pkgB\tName B"),
            ("pkgB".to_string(), "Name B".to_string())
        );
        assert_eq!(
            parse_line("pkgC - Name C"),
            ("pkgC".to_string(), "Name C".to_string())
        );
    }

    #[test]
    fn legacy_delimiters_are_tried_in_order() {
        assert_eq!(
            parse_line("pkgD - Name;"),
            ("pkgD - Name".to_string(), String::new())
        );
        assert_eq!(parse_line(" ; "), (";".to_string(), ";".to_string()));
    }

    #[test]
    fn undelimited_line_is_both_fields() {
        assert_eq!(
            parse_line("justonefield"),
            ("justonefield".to_string(), "justonefield".to_string())
        );
        assert_eq!(
            parse_line("\"quoted\""),
            ("quoted".to_string(), "quoted".to_string())
        );
    }

    #[test]
    fn modlist_display_order_drops_profile_entry() {
        let entries = parse_modlist("0\n\"pkgZ|Mod Z\"\n\"pkgY|Mod Y\"\n\"pkgX|Mod X\"");
        assert_eq!(ids(&entries), vec!["pkgZ", "pkgY", "pkgX"]);
        let shown = displayed_entries(&entries);
        assert_eq!(ids(&shown), vec!["pkgX", "pkgY"]);
    }

    #[test]
    fn modlist_without_count_line_keeps_first_entry() {
        let entries = parse_modlist("\"pkgA|A\"\n\n   \n\"pkgB|B\"\n");
        assert_eq!(ids(&entries), vec!["pkgA", "pkgB"]);
        assert!(displayed_entries(&[]).is_empty());
    }

    #[test]
    fn saved_modlist_loads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lists").join("convoy.txt");
        let entries = vec![ModEntry::new("pkgA", "Mod A"), ModEntry::new("pkgB", "Mod B")];
        save_modlist(&path, &entries).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("2\n\"pkgA|Mod A\"\n"));
        assert_eq!(load_modlist(&path).unwrap(), entries);
    }

    #[test]
    fn activation_block_renders_and_reads_back() {
        let entries = vec![ModEntry::new("pkgA", "Mod A"), ModEntry::new("pkgB", "Mod B")];
        let lines = activation_lines(&entries);
        assert_eq!(
            lines,
            vec![
                "active_mods: 2".to_string(),
                "active_mods[0]: \"pkgA|Mod A\"".to_string(),
                "active_mods[1]: \"pkgB|Mod B\"".to_string(),
            ]
        );
        assert_eq!(entries_from_activation_block(&lines), entries);
    }
}
