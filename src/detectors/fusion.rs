//! Fusion matching.
//!
//! Groups packs whose normalized names (lowercased, accent-stripped,
//! vendor-prefix-removed, noise-suffix-removed) share a canonical form. Each
//! group carries a merge strategy: automatic when confidence is uniformly
//! high, otherwise a user decision. Ties are broken by the longest-prefix
//! match and then by earliest path lexicographically.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config::FusionConfig;
use crate::core::taxonomy::TaxonomyRegistry;
use crate::detectors::classifier::EnrichedPack;

/// How a fusion group should be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Merge without asking: every member's confidence is high
    Auto,
    /// Suspend and ask the user
    UserDecision,
}

/// One source pack inside a fusion group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionSource {
    /// Identifier of the detected pack
    pub pack_id: String,
    /// Source path
    pub path: PathBuf,
    /// Detection confidence of the member
    pub confidence: f64,
}

/// A set of near-duplicate packs destined to merge under one canonical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionGroup {
    /// Canonical target name for the merged pack
    pub canonical_name: String,
    /// Normalized form shared by every member
    pub canonical_form: String,
    /// Members, representative first
    pub sources: Vec<FusionSource>,
    /// Merge strategy
    pub strategy: MergeStrategy,
    /// Ordering priority: larger groups merge first
    pub priority: u32,
}

/// Detects near-duplicate packs that should merge.
pub struct FusionMatcher {
    taxonomy: Arc<TaxonomyRegistry>,
    config: FusionConfig,
}

impl FusionMatcher {
    /// Create a matcher over a shared taxonomy.
    pub fn new(taxonomy: Arc<TaxonomyRegistry>, config: FusionConfig) -> Self {
        Self { taxonomy, config }
    }

    /// Group enriched packs by canonical name form.
    ///
    /// A pack belongs to at most one group; packs with a unique canonical
    /// form produce no group.
    pub fn group(&self, packs: &[EnrichedPack]) -> Vec<FusionGroup> {
        let mut by_form: IndexMap<String, Vec<&EnrichedPack>> = IndexMap::new();
        for pack in packs {
            let form = self.canonical_form(&pack.pack.name);
            if form.is_empty() {
                continue;
            }
            by_form.entry(form).or_default().push(pack);
        }

        let mut groups: Vec<FusionGroup> = by_form
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(form, mut members)| {
                // Representative: longest shared prefix with the canonical
                // form, then earliest path.
                members.sort_by(|a, b| {
                    let prefix_a = common_prefix_len(&normalize(&a.pack.name), &form);
                    let prefix_b = common_prefix_len(&normalize(&b.pack.name), &form);
                    prefix_b
                        .cmp(&prefix_a)
                        .then_with(|| a.pack.path.cmp(&b.pack.path))
                });

                let all_confident = members
                    .iter()
                    .all(|m| m.pack.confidence >= self.config.auto_confidence_threshold);

                FusionGroup {
                    canonical_name: members[0].pack.name.clone(),
                    canonical_form: form,
                    priority: members.len() as u32,
                    sources: members
                        .iter()
                        .map(|m| FusionSource {
                            pack_id: m.pack.id.clone(),
                            path: m.pack.path.clone(),
                            confidence: m.pack.confidence,
                        })
                        .collect(),
                    strategy: if all_confident {
                        MergeStrategy::Auto
                    } else {
                        MergeStrategy::UserDecision
                    },
                }
            })
            .collect();

        // Deterministic output order: bigger groups first, then by form.
        groups.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.canonical_form.cmp(&b.canonical_form))
        });
        groups
    }

    /// Canonical form of a pack name: lowercase, accents stripped, vendor
    /// prefix removed, format markers and copy suffixes dropped.
    pub fn canonical_form(&self, name: &str) -> String {
        let mut normalized = normalize(name);

        // Strip a known vendor prefix ("vendor - rest" keeps "rest").
        if let Some((prefix, rest)) = normalized.split_once(" - ") {
            if !self.taxonomy.matches_label(prefix).is_empty() {
                normalized = rest.trim().to_string();
            }
        }

        // Drop parenthesized/bracketed format markers and noise tokens.
        let mut cleaned = String::with_capacity(normalized.len());
        let mut depth = 0usize;
        for c in normalized.chars() {
            match c {
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                _ if depth == 0 => cleaned.push(c),
                _ => {}
            }
        }

        let mut tokens: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|t| !NOISE_TOKENS.contains(t))
            .collect();

        // Trailing copy markers ("pack 2" vs "pack") stay; a trailing "copy"
        // token does not.
        while tokens.last().map(|t| *t == "copy").unwrap_or(false) {
            tokens.pop();
        }

        tokens.join(" ")
    }
}

/// Noise tokens dropped from canonical forms.
const NOISE_TOKENS: &[&str] = &["wav", "aiff", "24bit", "16bit", "320kbps", "master", "final"];

/// Lowercase, fold accents, map separators to spaces, trim copy suffixes
/// like `_1`.
fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match fold_accent(c) {
            Some(folded) => out.push_str(folded),
            None => {
                let lowered = c.to_ascii_lowercase();
                if lowered == '_' || lowered == '.' {
                    out.push(' ');
                } else {
                    out.push(lowered);
                }
            }
        }
    }
    // "name_1" / "name 2" copy suffixes collapse onto the base name.
    let trimmed = out.trim();
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() >= 2 {
        if let Some(last) = tokens.last() {
            if last.len() == 1 && last.chars().all(|c| c.is_ascii_digit()) {
                // Single trailing digit after a volume marker is meaningful
                // ("vol 2"); otherwise it is a copy suffix.
                let prev = tokens[tokens.len() - 2];
                if !matches!(prev, "vol" | "volume" | "part" | "pt") {
                    return tokens[..tokens.len() - 1].join(" ");
                }
            }
        }
    }
    tokens.join(" ")
}

/// Fold common Latin accents to ASCII; `None` passes the character through.
fn fold_accent(c: char) -> Option<&'static str> {
    match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' | 'å' | 'À' | 'Â' | 'Ä' | 'Á' | 'Ã' | 'Å' => Some("a"),
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => Some("e"),
        'î' | 'ï' | 'í' | 'ì' | 'Î' | 'Ï' | 'Í' | 'Ì' => Some("i"),
        'ô' | 'ö' | 'ó' | 'ò' | 'õ' | 'Ô' | 'Ö' | 'Ó' | 'Ò' | 'Õ' => Some("o"),
        'û' | 'ü' | 'ú' | 'ù' | 'Û' | 'Ü' | 'Ú' | 'Ù' => Some("u"),
        'ç' | 'Ç' => Some("c"),
        'ñ' | 'Ñ' => Some("n"),
        _ => None,
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::classifier::FilesByClass;
    use crate::detectors::packs::{DetectedPack, PackType, StructureSummary};
    use std::collections::BTreeSet;

    fn enriched(name: &str, path: &str, confidence: f64) -> EnrichedPack {
        EnrichedPack {
            pack: DetectedPack {
                id: DetectedPack::new_id(),
                name: name.to_string(),
                path: PathBuf::from(path),
                pack_type: PackType::CommercialPack,
                confidence,
                reasoning: Vec::new(),
                audio_file_count: 30,
                preset_file_count: 0,
                total_file_count: 30,
                total_size: 60 * 1024 * 1024,
                structure: StructureSummary::default(),
                needs_reorganization: false,
                should_extract: false,
                should_recurse_inside: false,
                actual_pack_path: None,
                sub_packs: Vec::new(),
            },
            formats: BTreeSet::new(),
            tags: Vec::new(),
            genres: Vec::new(),
            has_loops: false,
            has_one_shots: false,
            has_presets: false,
            label: None,
            average_file_size: 2 * 1024 * 1024,
            analysis_tags: Vec::new(),
            files: FilesByClass::default(),
        }
    }

    fn matcher() -> FusionMatcher {
        FusionMatcher::new(
            Arc::new(TaxonomyRegistry::builtin()),
            FusionConfig::default(),
        )
    }

    #[test]
    fn test_near_duplicates_group() {
        let packs = vec![
            enriched("Vendor Kicks (WAV)", "/src/a", 0.9),
            enriched("Vendor Kicks", "/src/b", 0.9),
            enriched("Other Pack", "/src/c", 0.9),
        ];
        let groups = matcher().group(&packs);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].sources.len(), 2);
        assert_eq!(groups[0].strategy, MergeStrategy::Auto);
    }

    #[test]
    fn test_copy_suffix_groups() {
        let packs = vec![
            enriched("Vendor Kicks", "/src/a", 0.9),
            enriched("Vendor Kicks_1", "/src/b", 0.9),
        ];
        let groups = matcher().group(&packs);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_volume_numbers_do_not_group() {
        let packs = vec![
            enriched("Vendor Kicks Vol 1", "/src/a", 0.9),
            enriched("Vendor Kicks Vol 2", "/src/b", 0.9),
        ];
        assert!(matcher().group(&packs).is_empty());
    }

    #[test]
    fn test_vendor_prefix_stripped() {
        let packs = vec![
            enriched("Vengeance - Essential Clap Pack", "/src/a", 0.9),
            enriched("Essential Clap Pack", "/src/b", 0.9),
        ];
        let groups = matcher().group(&packs);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_accent_folding() {
        let packs = vec![
            enriched("Mélodie Pack", "/src/a", 0.9),
            enriched("Melodie Pack", "/src/b", 0.9),
        ];
        assert_eq!(matcher().group(&packs).len(), 1);
    }

    #[test]
    fn test_low_confidence_requires_user_decision() {
        let packs = vec![
            enriched("Vendor Kicks", "/src/a", 0.9),
            enriched("Vendor Kicks (WAV)", "/src/b", 0.4),
        ];
        let groups = matcher().group(&packs);
        assert_eq!(groups[0].strategy, MergeStrategy::UserDecision);
    }

    #[test]
    fn test_ties_broken_by_prefix_then_path() {
        let packs = vec![
            enriched("Vendor Kicks (WAV)", "/src/z", 0.9),
            enriched("Vendor Kicks", "/src/b", 0.9),
        ];
        let groups = matcher().group(&packs);
        // "vendor kicks" shares the longer prefix with the canonical form.
        assert_eq!(groups[0].canonical_name, "Vendor Kicks");
        assert_eq!(groups[0].sources[0].path, PathBuf::from("/src/b"));
    }

    #[test]
    fn test_pack_in_at_most_one_group() {
        let packs = vec![
            enriched("Vendor Kicks", "/src/a", 0.9),
            enriched("Vendor Kicks", "/src/b", 0.9),
            enriched("Vendor Snares", "/src/c", 0.9),
            enriched("Vendor Snares", "/src/d", 0.9),
        ];
        let groups = matcher().group(&packs);
        let mut seen = std::collections::HashSet::new();
        for group in &groups {
            for source in &group.sources {
                assert!(seen.insert(source.path.clone()));
            }
        }
        assert_eq!(groups.len(), 2);
    }
}
