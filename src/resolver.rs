use crate::{
    index::AvailabilityIndex,
    modlist::ModEntry,
    names::{normalize_key, strip_archive_extension, token_overlap, tokenize_with},
    workshop_id::decode_workshop_ids,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub min_overlap: usize,
    pub min_overlap_ratio: f64,
    pub min_token_len: usize,
    /// Shortest normalized query allowed to match link keys by containment.
    pub min_substring_len: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            min_overlap: 2,
            min_overlap_ratio: 0.5,
            min_token_len: 3,
            min_substring_len: 4,
        }
    }
}

impl MatchSettings {
    pub fn overlap_qualifies(&self, overlap: usize, left: usize, right: usize) -> bool {
        if overlap < self.min_overlap {
            return false;
        }
        let smaller = left.min(right) as f64;
        overlap as f64 >= smaller * self.min_overlap_ratio
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ExactFile,
    ExactStem,
    NormalizedContains,
    WorkshopId,
    RemoteDir,
    RemoteTitle,
    TokenOverlap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Available {
        source: Source,
        matched: Option<String>,
        strategy: MatchStrategy,
    },
    Missing,
}

impl Resolution {
    pub fn is_available(&self) -> bool {
        matches!(self, Resolution::Available { .. })
    }

    fn found(source: Source, matched: impl Into<String>, strategy: MatchStrategy) -> Self {
        Resolution::Available {
            source,
            matched: Some(matched.into()),
            strategy,
        }
    }
}

pub fn resolve(entry: &ModEntry, index: &AvailabilityIndex, settings: &MatchSettings) -> Resolution {
    let names: Vec<&str> = [entry.package_id.as_str(), entry.display_name.as_str()]
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();

    if let Some(found) = match_exact_file(&names, index) {
        return found;
    }
    if let Some(found) = match_exact_stem(&names, index) {
        return found;
    }
    let keys: Vec<String> = names
        .iter()
        .map(|name| normalize_key(strip_archive_extension(name)))
        .filter(|key| !key.is_empty())
        .collect();
    if let Some(found) = match_normalized(&keys, index) {
        return found;
    }
    if let Some(found) = match_workshop_id(&entry.package_id, index) {
        return found;
    }
    if let Some(found) = match_remote_dir(&keys, index) {
        return found;
    }
    if let Some(found) = match_remote_title(&keys, index) {
        return found;
    }
    if let Some(found) = match_token_overlap(&names, index, settings) {
        return found;
    }
    Resolution::Missing
}

fn match_exact_file(names: &[&str], index: &AvailabilityIndex) -> Option<Resolution> {
    for name in names {
        let lower = name.to_lowercase();
        if index.local_files.contains(&lower) {
            return Some(Resolution::found(Source::Local, *name, MatchStrategy::ExactFile));
        }
        if index.remote_files.contains(&lower) {
            return Some(Resolution::found(Source::Remote, *name, MatchStrategy::ExactFile));
        }
    }
    None
}

fn match_exact_stem(names: &[&str], index: &AvailabilityIndex) -> Option<Resolution> {
    for name in names {
        let stem = strip_archive_extension(name).to_lowercase();
        if index.local_stems.contains(&stem) {
            return Some(Resolution::found(Source::Local, stem, MatchStrategy::ExactStem));
        }
        if index.remote_stems.contains(&stem) {
            return Some(Resolution::found(Source::Remote, stem, MatchStrategy::ExactStem));
        }
    }
    None
}

fn contains_either_way(known: &str, query: &str) -> bool {
    known.contains(query) || query.contains(known)
}

fn match_normalized(keys: &[String], index: &AvailabilityIndex) -> Option<Resolution> {
    for key in keys {
        if let Some(hit) = index
            .local_keys
            .iter()
            .find(|known| contains_either_way(known, key))
        {
            return Some(Resolution::found(
                Source::Local,
                hit.as_str(),
                MatchStrategy::NormalizedContains,
            ));
        }
        if let Some(hit) = index
            .remote_keys
            .iter()
            .find(|known| contains_either_way(known, key))
        {
            return Some(Resolution::found(
                Source::Remote,
                hit.as_str(),
                MatchStrategy::NormalizedContains,
            ));
        }
    }
    None
}

fn match_workshop_id(package_id: &str, index: &AvailabilityIndex) -> Option<Resolution> {
    decode_workshop_ids(package_id)
        .into_iter()
        .find(|id| index.remote_dirs.contains(id) || index.subscribed.contains(id))
        .map(|id| remote_hit(index, id, MatchStrategy::WorkshopId))
}

fn match_remote_dir(keys: &[String], index: &AvailabilityIndex) -> Option<Resolution> {
    keys.iter()
        .find(|key| index.remote_dirs.contains(*key))
        .map(|key| remote_hit(index, key.clone(), MatchStrategy::RemoteDir))
}

fn match_remote_title(keys: &[String], index: &AvailabilityIndex) -> Option<Resolution> {
    for key in keys {
        for (id, title) in &index.titles {
            let title_key = normalize_key(title);
            if title_key.is_empty() {
                continue;
            }
            if contains_either_way(&title_key, key) {
                return Some(remote_hit(index, id.clone(), MatchStrategy::RemoteTitle));
            }
        }
    }
    None
}

fn match_token_overlap(
    names: &[&str],
    index: &AvailabilityIndex,
    settings: &MatchSettings,
) -> Option<Resolution> {
    for name in names {
        let query = tokenize_with(strip_archive_extension(name), index.min_token_len());
        if query.is_empty() {
            continue;
        }
        for id in index.remote_ids() {
            let qualifies = |tokens: Option<&HashSet<String>>| {
                tokens
                    .map(|tokens| {
                        settings.overlap_qualifies(
                            token_overlap(&query, tokens),
                            query.len(),
                            tokens.len(),
                        )
                    })
                    .unwrap_or(false)
            };
            if qualifies(index.title_tokens.get(id)) || qualifies(index.file_tokens.get(id)) {
                return Some(remote_hit(index, id.to_string(), MatchStrategy::TokenOverlap));
            }
        }
    }
    None
}

fn remote_hit(index: &AvailabilityIndex, id: String, strategy: MatchStrategy) -> Resolution {
    let matched = index.title(&id).map(str::to_string).unwrap_or(id);
    Resolution::found(Source::Remote, matched, strategy)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub available_local: usize,
    pub available_remote: usize,
    pub missing: usize,
}

pub fn resolve_all(
    entries: &[ModEntry],
    index: &AvailabilityIndex,
    settings: &MatchSettings,
) -> (Vec<(ModEntry, Resolution)>, ResolutionSummary) {
    let mut summary = ResolutionSummary::default();
    let rows = entries
        .iter()
        .map(|entry| {
            let resolution = resolve(entry, index, settings);
            match &resolution {
                Resolution::Available {
                    source: Source::Local,
                    ..
                } => summary.available_local += 1,
                Resolution::Available {
                    source: Source::Remote,
                    ..
                } => summary.available_remote += 1,
                Resolution::Missing => summary.missing += 1,
            }
            (entry.clone(), resolution)
        })
        .collect();
    (rows, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workshop_id::encode_workshop_package;
    use pretty_assertions::assert_eq;

    fn strategy(resolution: &Resolution) -> Option<(Source, MatchStrategy)> {
        match resolution {
            Resolution::Available {
                source, strategy, ..
            } => Some((*source, *strategy)),
            Resolution::Missing => None,
        }
    }

    fn settings() -> MatchSettings {
        MatchSettings::default()
    }

    #[test]
    fn overlap_rule_needs_two_tokens_and_half_of_smaller_set() {
        let rule = settings();
        assert!(!rule.overlap_qualifies(1, 1, 1));
        assert!(!rule.overlap_qualifies(1, 2, 20));
        assert!(rule.overlap_qualifies(2, 3, 4));
        assert!(rule.overlap_qualifies(2, 4, 4));
        assert!(!rule.overlap_qualifies(2, 5, 6));
    }

    #[test]
    fn exact_file_name_hits_first() {
        let mut index = AvailabilityIndex::default();
        index.add_local_file("euro_truck.scs");
        let entry = ModEntry::new("euro_truck.scs", "Euro Truck");
        assert_eq!(
            strategy(&resolve(&entry, &index, &settings())),
            Some((Source::Local, MatchStrategy::ExactFile))
        );
    }

    #[test]
    fn remote_exact_file_hits_at_first_step() {
        let mut index = AvailabilityIndex::default();
        index.add_remote_dir("2001");
        index.add_remote_file("2001", "Big_Trailers.scs");
        let entry = ModEntry::new("big_trailers.scs", "Big Trailers");
        assert_eq!(
            strategy(&resolve(&entry, &index, &settings())),
            Some((Source::Remote, MatchStrategy::ExactFile))
        );

        index.add_local_file("big_trailers.scs");
        assert_eq!(
            strategy(&resolve(&entry, &index, &settings())),
            Some((Source::Local, MatchStrategy::ExactFile))
        );
    }

    #[test]
    fn local_stem_beats_decoded_workshop_id() {
        let package = encode_workshop_package(305);
        let mut index = AvailabilityIndex::default();
        index.add_subscribed("305");
        index.set_title("305", "Heavy Cargo Pack");
        index.add_local_file(&format!("{package}.scs"));
        let entry = ModEntry::new(package.clone(), "Heavy Cargo Pack");
        assert_eq!(
            resolve(&entry, &index, &settings()),
            Resolution::Available {
                source: Source::Local,
                matched: Some(package.to_lowercase()),
                strategy: MatchStrategy::ExactStem,
            }
        );
    }

    #[test]
    fn package_id_matches_local_stem() {
        let mut index = AvailabilityIndex::default();
        index.add_local_file("euro_truck.scs");
        let entry = ModEntry::new("euro_truck", "Something Else");
        let resolution = resolve(&entry, &index, &settings());
        assert_eq!(
            resolution,
            Resolution::Available {
                source: Source::Local,
                matched: Some("euro_truck".to_string()),
                strategy: MatchStrategy::ExactStem,
            }
        );
    }

    #[test]
    fn normalized_containment_works_both_ways() {
        let mut index = AvailabilityIndex::default();
        index.add_local_file("Real-Physics_v2.scs");
        let shorter = ModEntry::new("realphysics", "x");
        assert_eq!(
            strategy(&resolve(&shorter, &index, &settings())),
            Some((Source::Local, MatchStrategy::NormalizedContains))
        );
        let longer = ModEntry::new("real_physics_v2_hotfix", "x");
        assert_eq!(
            strategy(&resolve(&longer, &index, &settings())),
            Some((Source::Local, MatchStrategy::NormalizedContains))
        );
    }

    #[test]
    fn workshop_package_resolves_through_decoded_id() {
        let mut index = AvailabilityIndex::default();
        index.add_subscribed("305");
        index.set_title("305", "Heavy Cargo Pack");
        let entry = ModEntry::new(encode_workshop_package(305), "Renamed In Profile");
        assert_eq!(
            resolve(&entry, &index, &settings()),
            Resolution::Available {
                source: Source::Remote,
                matched: Some("Heavy Cargo Pack".to_string()),
                strategy: MatchStrategy::WorkshopId,
            }
        );
    }

    #[test]
    fn bare_id_matches_remote_directory() {
        let mut index = AvailabilityIndex::default();
        index.add_remote_dir("2876543210");
        let entry = ModEntry::new("2876543210", "2876543210");
        assert_eq!(
            strategy(&resolve(&entry, &index, &settings())),
            Some((Source::Remote, MatchStrategy::RemoteDir))
        );
    }

    #[test]
    fn display_name_matches_remote_title() {
        let mut index = AvailabilityIndex::default();
        index.add_remote_dir("2001");
        index.set_title("2001", "Scania R 2009 - Sound Pack");
        let entry = ModEntry::new("mod_workshop_package.zz", "Scania R 2009 Sound Pack");
        assert_eq!(
            strategy(&resolve(&entry, &index, &settings())),
            Some((Source::Remote, MatchStrategy::RemoteTitle))
        );
    }

    #[test]
    fn fuzzy_overlap_finds_reordered_title() {
        let mut index = AvailabilityIndex::default();
        index.add_remote_dir("4004");
        index.set_title("4004", "Heavy Cargo Addon Pack");
        let entry = ModEntry::new("pkg_unknown", "Pack Heavy Trailers");
        assert_eq!(
            strategy(&resolve(&entry, &index, &settings())),
            Some((Source::Remote, MatchStrategy::TokenOverlap))
        );
    }

    #[test]
    fn fuzzy_overlap_can_use_file_tokens() {
        let mut index = AvailabilityIndex::default();
        index.add_remote_dir("5005");
        index.add_remote_file("5005", "mega_trailer_physics.scs");
        let entry = ModEntry::new("pkg_unknown", "Trailer Mega Bundle");
        assert_eq!(
            strategy(&resolve(&entry, &index, &settings())),
            Some((Source::Remote, MatchStrategy::TokenOverlap))
        );
    }

    #[test]
    fn single_shared_token_is_missing() {
        let mut index = AvailabilityIndex::default();
        index.add_remote_dir("6006");
        index.set_title("6006", "Heavy Cargo Pack");
        let entry = ModEntry::new("pkg_other", "Heavy Skins");
        assert_eq!(resolve(&entry, &index, &settings()), Resolution::Missing);
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mut index = AvailabilityIndex::default();
        index.add_local_file("euro_truck.scs");
        index.add_remote_dir("77");
        let entries = vec![
            ModEntry::new("euro_truck", "Euro Truck"),
            ModEntry::new("77", "77"),
            ModEntry::new("nope_pkg", "Nope"),
        ];
        let (rows, summary) = resolve_all(&entries, &index, &settings());
        assert_eq!(rows.len(), 3);
        assert_eq!(
            summary,
            ResolutionSummary {
                available_local: 1,
                available_remote: 1,
                missing: 1,
            }
        );
    }
}
