use std::collections::HashSet;

pub const MIN_TOKEN_LEN: usize = 3;

pub fn normalize_key(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn strip_archive_extension(value: &str) -> &str {
    let trimmed = value.trim();
    if let Some((stem, ext)) = trimmed.rsplit_once('.') {
        if crate::game::ARCHIVE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
        {
            return stem;
        }
    }
    trimmed
}

pub fn tokenize_with(value: &str, min_len: usize) -> HashSet<String> {
    let mut tokens = HashSet::new();
    let mut buffer = String::new();
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            buffer.extend(ch.to_lowercase());
            continue;
        }
        flush_token(&mut buffer, &mut tokens, min_len);
    }
    flush_token(&mut buffer, &mut tokens, min_len);
    tokens
}

fn flush_token(buffer: &mut String, tokens: &mut HashSet<String>, min_len: usize) {
    if buffer.chars().count() >= min_len {
        tokens.insert(buffer.clone());
    }
    buffer.clear();
}

pub fn token_overlap(a: &HashSet<String>, b: &HashSet<String>) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|token| large.contains(*token)).count()
}
