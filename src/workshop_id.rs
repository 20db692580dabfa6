use crate::game::WORKSHOP_PACKAGE_PREFIX;

// Payloads occur in both byte orders: big-endian reading first, reversed second.
pub fn decode_workshop_ids(package_id: &str) -> Vec<String> {
    let trimmed = package_id.trim();
    let Some(prefix) = trimmed.get(..WORKSHOP_PACKAGE_PREFIX.len()) else {
        return Vec::new();
    };
    if !prefix.eq_ignore_ascii_case(WORKSHOP_PACKAGE_PREFIX) {
        return Vec::new();
    }
    let payload = &trimmed[WORKSHOP_PACKAGE_PREFIX.len()..];
    let payload = payload.split('|').next().unwrap_or("");
    let hex: String = payload.chars().filter(|ch| ch.is_ascii_hexdigit()).collect();
    if hex.is_empty() || hex.len() % 2 != 0 {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    if let Ok(value) = u64::from_str_radix(&hex, 16) {
        candidates.push(value.to_string());
    }

    let reversed: String = hex
        .as_bytes()
        .chunks(2)
        .rev()
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .collect();
    if let Ok(value) = u64::from_str_radix(&reversed, 16) {
        let value = value.to_string();
        if !candidates.contains(&value) {
            candidates.push(value);
        }
    }

    candidates
}

#[cfg(test)]
pub fn encode_workshop_package(id: u64) -> String {
    format!("{WORKSHOP_PACKAGE_PREFIX}{id:016X}")
}
