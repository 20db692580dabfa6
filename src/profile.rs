use crate::{
    backup,
    error::PatchError,
    game::ACTIVE_MODS_MARKER,
    modlist::{self, ModEntry},
};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

const TEXT_PROFILE_MAGIC: &[u8] = b"SiiNunit";

pub trait ProfileDecoder {
    fn decode(&self, path: &Path, bytes: &[u8]) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextOnly;

impl ProfileDecoder for TextOnly {
    fn decode(&self, path: &Path, _bytes: &[u8]) -> Result<String> {
        bail!(
            "{} is not a text profile; decrypt it with a SII decoder first",
            path.display()
        )
    }
}

pub fn read_profile_text(path: &Path, decoder: &dyn ProfileDecoder) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read profile {}", path.display()))?;
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    if body.starts_with(TEXT_PROFILE_MAGIC) {
        return Ok(String::from_utf8_lossy(body).into_owned());
    }
    decoder.decode(path, &bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub first: usize,
    pub last: usize,
    pub indent: String,
}

impl BlockSpan {
    /// `false` means unrelated lines sit inside the span and get replaced too.
    pub fn is_contiguous<S: AsRef<str>>(&self, lines: &[S]) -> bool {
        lines[self.first..=self.last]
            .iter()
            .all(|line| is_marker_line(line.as_ref()))
    }
}

fn is_marker_line(line: &str) -> bool {
    line.trim().starts_with(ACTIVE_MODS_MARKER)
}

pub fn find_activation_block<S: AsRef<str>>(lines: &[S]) -> Option<BlockSpan> {
    let mut span: Option<BlockSpan> = None;
    for (index, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if !is_marker_line(line) {
            continue;
        }
        match span.as_mut() {
            Some(span) => span.last = index,
            None => {
                let indent_len = line.len() - line.trim_start().len();
                span = Some(BlockSpan {
                    first: index,
                    last: index,
                    indent: line[..indent_len].to_string(),
                });
            }
        }
    }
    span
}

pub fn patch_lines<S: AsRef<str>>(lines: &[S], replacement: &[String]) -> (Vec<String>, bool) {
    let mut out: Vec<String> = lines.iter().map(|line| line.as_ref().to_string()).collect();
    match find_activation_block(lines) {
        Some(span) => {
            let tail = out.split_off(span.last + 1);
            out.truncate(span.first);
            out.extend(
                replacement
                    .iter()
                    .map(|line| format!("{}{}", span.indent, line.trim_start())),
            );
            out.extend(tail);
            (out, true)
        }
        None => {
            if out.last().map(|line| !line.trim().is_empty()).unwrap_or(false) {
                out.push(String::new());
            }
            out.extend(replacement.iter().map(|line| line.trim_start().to_string()));
            (out, false)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatchOutcome {
    pub profile: PathBuf,
    pub backup: PathBuf,
    pub replaced_block: bool,
    pub contiguous: bool,
}

pub fn patch_profile(path: &Path, replacement: &[String]) -> Result<PatchOutcome, PatchError> {
    let original = fs::read_to_string(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let newline = if original.contains("\r\n") { "\r\n" } else { "\n" };
    let trailing_newline = original.ends_with('\n');
    let lines: Vec<&str> = original.lines().collect();
    let contiguous = find_activation_block(&lines)
        .map(|span| span.is_contiguous(&lines))
        .unwrap_or(true);
    if !contiguous {
        tracing::warn!(
            path = %path.display(),
            "activation block has foreign lines between marker lines; they will be replaced"
        );
    }

    let backup = backup::create_file_backup(path)?;

    let (patched, replaced_block) = patch_lines(&lines, replacement);
    let mut text = patched.join(newline);
    if trailing_newline || !replaced_block {
        text.push_str(newline);
    }
    fs::write(path, text).map_err(|source| PatchError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(
        path = %path.display(),
        backup = %backup.display(),
        lines = replacement.len(),
        "profile patched"
    );
    Ok(PatchOutcome {
        profile: path.to_path_buf(),
        backup,
        replaced_block,
        contiguous,
    })
}

pub fn read_active_mods(path: &Path, decoder: &dyn ProfileDecoder) -> Result<Vec<ModEntry>> {
    let text = read_profile_text(path, decoder)?;
    let lines: Vec<&str> = text.lines().collect();
    let Some(span) = find_activation_block(&lines) else {
        return Ok(Vec::new());
    };
    Ok(modlist::entries_from_activation_block(
        &lines[span.first..=span.last],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const PROFILE: &str = "SiiNunit\n{\nuser_profile : _nameless.1234 {\n    face: 0\n    active_mods: 2\n    active_mods[0]: \"old_a|Old A\"\n    active_mods[1]: \"old_b|Old B\"\n    customization: 42\n}\n}\n";

    fn replacement() -> Vec<String> {
        vec![
            "active_mods: 1".to_string(),
            "        active_mods[0]: \"new_a|New A\"".to_string(),
        ]
    }

    #[test]
    fn finds_block_bounds_and_indent() {
        let lines: Vec<&str> = PROFILE.lines().collect();
        let span = find_activation_block(&lines).unwrap();
        assert_eq!(span.first, 4);
        assert_eq!(span.last, 6);
        assert_eq!(span.indent, "    ");
        assert!(span.is_contiguous(&lines));
    }

    #[test]
    fn replacement_lines_take_block_indent() {
        let lines: Vec<&str> = PROFILE.lines().collect();
        let (patched, replaced) = patch_lines(&lines, &replacement());
        assert!(replaced);
        assert_eq!(
            patched[3..7].to_vec(),
            vec![
                "    face: 0".to_string(),
                "    active_mods: 1".to_string(),
                "    active_mods[0]: \"new_a|New A\"".to_string(),
                "    customization: 42".to_string(),
            ]
        );
    }

    #[test]
    fn interleaved_block_is_spanned_and_flagged() {
        let lines = vec![
            "  active_mods: 1",
            "  other: 5",
            "  active_mods[0]: \"x|X\"",
            "  tail: 1",
        ];
        let span = find_activation_block(&lines).unwrap();
        assert_eq!((span.first, span.last), (0, 2));
        assert!(!span.is_contiguous(&lines));
        let (patched, _) = patch_lines(&lines, &["active_mods: 0".to_string()]);
        assert_eq!(patched, vec!["  active_mods: 0", "  tail: 1"]);
    }

    #[test]
    fn appends_block_when_missing() {
        let lines = vec!["SiiNunit", "{", "}"];
        let (patched, replaced) = patch_lines(&lines, &replacement());
        assert!(!replaced);
        assert_eq!(
            patched,
            vec![
                "SiiNunit",
                "{",
                "}",
                "",
                "active_mods: 1",
                "active_mods[0]: \"new_a|New A\"",
            ]
        );

        let empty: Vec<&str> = Vec::new();
        let (patched, _) = patch_lines(&empty, &replacement());
        assert_eq!(patched.len(), 2);
    }

    #[test]
    fn patch_writes_file_and_keeps_backup() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("profile.sii");
        fs::write(&path, PROFILE).unwrap();

        let outcome = patch_profile(&path, &replacement()).unwrap();
        assert!(outcome.replaced_block);
        assert_eq!(fs::read_to_string(&outcome.backup).unwrap(), PROFILE);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("    active_mods[0]: \"new_a|New A\"\n"));
        assert!(!written.contains("old_b"));
        assert!(written.ends_with("}\n"));
    }

    #[test]
    fn patch_keeps_crlf_line_endings() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("profile.sii");
        fs::write(&path, PROFILE.replace('\n', "\r\n")).unwrap();
        patch_profile(&path, &replacement()).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("active_mods: 1\r\n"));
        assert!(!written.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn patch_of_missing_profile_fails_before_backup() {
        let temp = TempDir::new().unwrap();
        let result = patch_profile(&temp.path().join("none.sii"), &replacement());
        assert!(matches!(result, Err(PatchError::Read { .. })));
    }

    #[test]
    fn reads_active_mods_from_text_profile() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("profile.sii");
        fs::write(&path, PROFILE).unwrap();
        let entries = read_active_mods(&path, &TextOnly).unwrap();
        assert_eq!(
            entries,
            vec![ModEntry::new("old_a", "Old A"), ModEntry::new("old_b", "Old B")]
        );
    }

    #[test]
    fn binary_profile_goes_to_decoder() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("profile.sii");
        fs::write(&path, b"ScsC\x00\x01\x02").unwrap();
        assert!(read_active_mods(&path, &TextOnly).is_err());

        struct Fixed;
        impl ProfileDecoder for Fixed {
            fn decode(&self, _path: &Path, _bytes: &[u8]) -> Result<String> {
                Ok("SiiNunit\n{\n active_mods: 1\n active_mods[0]: \"p|P\"\n}\n".to_string())
            }
        }
        let entries = read_active_mods(&path, &Fixed).unwrap();
        assert_eq!(entries, vec![ModEntry::new("p", "P")]);
    }
}
