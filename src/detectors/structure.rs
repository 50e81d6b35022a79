//! Structure proposals.
//!
//! Given classified packs, emits candidate target hierarchies with folder
//! count and depth estimates. One proposal is marked recommended by a scoring
//! heuristic combining balance, coverage, and a depth penalty. Proposal
//! identifiers are stable slugs so downstream plans stay deterministic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::detectors::classifier::EnrichedPack;

/// Statistics attached to one proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStatistics {
    /// Packs considered
    pub pack_count: usize,
    /// Packs that route to a specific folder
    pub routed: usize,
    /// Packs falling back to the unsorted folder
    pub unrouted: usize,
}

/// A candidate target hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureProposal {
    /// Stable identifier slug
    pub id: String,
    /// Display name
    pub name: String,
    /// Ordered axis labels (e.g. Family/Type/Style)
    pub hierarchy: Vec<String>,
    /// Estimated folder count excluding pack directories
    pub estimated_folder_count: usize,
    /// Maximum depth including the pack directory
    pub max_depth: usize,
    /// Advantages shown to the user
    pub advantages: Vec<String>,
    /// Trade-offs shown to the user
    pub considerations: Vec<String>,
    /// Coverage statistics
    pub statistics: ProposalStatistics,
    /// Heuristic score used for the recommendation
    pub score: f64,
    /// Whether this proposal is the recommended one
    pub recommended: bool,
}

impl StructureProposal {
    /// Path segments (under the source root) a pack routes to, excluding the
    /// pack directory itself.
    pub fn route(&self, pack: &EnrichedPack) -> Vec<String> {
        match self.id.as_str() {
            "family-type-style" => {
                let family = pack
                    .genres
                    .first()
                    .map(|g| family_of(g).to_string())
                    .unwrap_or_else(|| "Unsorted".to_string());
                let kind = primary_type(pack).unwrap_or_else(|| "Packs".to_string());
                let style = pack
                    .genres
                    .first()
                    .map(|g| title_case(g))
                    .unwrap_or_else(|| "General".to_string());
                vec![family, kind, style]
            }
            "genre-pack" => {
                let genre = pack
                    .genres
                    .first()
                    .map(|g| title_case(g))
                    .unwrap_or_else(|| "Unsorted".to_string());
                vec![genre]
            }
            "flat-by-vendor" => {
                let vendor = pack
                    .label
                    .as_deref()
                    .map(title_case)
                    .unwrap_or_else(|| "Independent".to_string());
                vec![vendor]
            }
            _ => vec!["Unsorted".to_string()],
        }
    }
}

/// Generates and scores candidate hierarchies.
pub struct StructureProposer;

impl StructureProposer {
    /// Create a proposer.
    pub fn new() -> Self {
        Self
    }

    /// Emit candidate proposals for a set of classified packs, recommending
    /// the best-scoring one.
    pub fn propose(&self, packs: &[EnrichedPack]) -> Vec<StructureProposal> {
        let mut proposals = vec![
            self.family_type_style(packs),
            self.genre_pack(packs),
            self.flat_by_vendor(packs),
        ];

        let best = proposals
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i);
        if let Some(best) = best {
            proposals[best].recommended = true;
        }
        proposals
    }

    fn family_type_style(&self, packs: &[EnrichedPack]) -> StructureProposal {
        let mut leaves: IndexMap<(String, String, String), usize> = IndexMap::new();
        let mut routed = 0;
        for pack in packs {
            let has_route = !pack.genres.is_empty();
            routed += usize::from(has_route);
            let family = pack
                .genres
                .first()
                .map(|g| family_of(g).to_string())
                .unwrap_or_else(|| "Unsorted".to_string());
            let kind = primary_type(pack).unwrap_or_else(|| "Packs".to_string());
            let style = pack
                .genres
                .first()
                .map(|g| title_case(g))
                .unwrap_or_else(|| "General".to_string());
            *leaves.entry((family, kind, style)).or_default() += 1;
        }

        let folder_count = estimate_folders(&leaves);
        let statistics = ProposalStatistics {
            pack_count: packs.len(),
            routed,
            unrouted: packs.len() - routed,
        };
        let score = proposal_score(&statistics, leaf_counts(&leaves), 4);

        StructureProposal {
            id: "family-type-style".to_string(),
            name: "By family, type and style".to_string(),
            hierarchy: vec![
                "Family".to_string(),
                "Type".to_string(),
                "Style".to_string(),
            ],
            estimated_folder_count: folder_count,
            max_depth: 4,
            advantages: vec![
                "precise browsing by musical family and sound type".to_string(),
                "scales well for very large collections".to_string(),
            ],
            considerations: vec![
                "deepest hierarchy of the candidates".to_string(),
                "untagged packs pool under Unsorted".to_string(),
            ],
            statistics,
            score,
            recommended: false,
        }
    }

    fn genre_pack(&self, packs: &[EnrichedPack]) -> StructureProposal {
        let mut leaves: IndexMap<String, usize> = IndexMap::new();
        let mut routed = 0;
        for pack in packs {
            let genre = pack
                .genres
                .first()
                .map(|g| title_case(g))
                .unwrap_or_else(|| "Unsorted".to_string());
            routed += usize::from(!pack.genres.is_empty());
            *leaves.entry(genre).or_default() += 1;
        }

        let statistics = ProposalStatistics {
            pack_count: packs.len(),
            routed,
            unrouted: packs.len() - routed,
        };
        let counts: Vec<usize> = leaves.values().copied().collect();
        let score = proposal_score(&statistics, counts, 2);

        StructureProposal {
            id: "genre-pack".to_string(),
            name: "By genre".to_string(),
            hierarchy: vec!["Genre".to_string(), "Pack".to_string()],
            estimated_folder_count: leaves.len(),
            max_depth: 2,
            advantages: vec![
                "shallow and predictable".to_string(),
                "one obvious place per pack".to_string(),
            ],
            considerations: vec!["large genres become crowded".to_string()],
            statistics,
            score,
            recommended: false,
        }
    }

    fn flat_by_vendor(&self, packs: &[EnrichedPack]) -> StructureProposal {
        let mut leaves: IndexMap<String, usize> = IndexMap::new();
        let mut routed = 0;
        for pack in packs {
            let vendor = pack
                .label
                .as_deref()
                .map(title_case)
                .unwrap_or_else(|| "Independent".to_string());
            routed += usize::from(pack.label.is_some());
            *leaves.entry(vendor).or_default() += 1;
        }

        let statistics = ProposalStatistics {
            pack_count: packs.len(),
            routed,
            unrouted: packs.len() - routed,
        };
        let counts: Vec<usize> = leaves.values().copied().collect();
        let score = proposal_score(&statistics, counts, 2);

        StructureProposal {
            id: "flat-by-vendor".to_string(),
            name: "Flat by vendor".to_string(),
            hierarchy: vec!["Label".to_string(), "Pack".to_string()],
            estimated_folder_count: leaves.len(),
            max_depth: 2,
            advantages: vec!["mirrors how packs were purchased".to_string()],
            considerations: vec![
                "unlabeled packs pool under Independent".to_string(),
                "style browsing requires search".to_string(),
            ],
            statistics,
            score,
            recommended: false,
        }
    }
}

impl Default for StructureProposer {
    fn default() -> Self {
        Self::new()
    }
}

/// Score = 0.5·coverage + 0.4·balance − depth penalty.
fn proposal_score(statistics: &ProposalStatistics, leaf_counts: Vec<usize>, depth: usize) -> f64 {
    let coverage = if statistics.pack_count == 0 {
        0.0
    } else {
        statistics.routed as f64 / statistics.pack_count as f64
    };
    let balance = balance_of(&leaf_counts);
    let depth_penalty = 0.05 * depth.saturating_sub(1) as f64;
    (0.5 * coverage + 0.4 * balance - depth_penalty).max(0.0)
}

/// Balance in [0,1]: 1.0 when packs spread evenly across leaves.
fn balance_of(counts: &[usize]) -> f64 {
    if counts.len() <= 1 {
        return if counts.is_empty() { 0.0 } else { 0.5 };
    }
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let mean = total as f64 / counts.len() as f64;
    let variance = counts
        .iter()
        .map(|&c| (c as f64 - mean).powi(2))
        .sum::<f64>()
        / counts.len() as f64;
    let cv = variance.sqrt() / mean;
    (1.0 - cv / 2.0).clamp(0.0, 1.0)
}

fn estimate_folders(leaves: &IndexMap<(String, String, String), usize>) -> usize {
    let families: std::collections::HashSet<_> = leaves.keys().map(|(f, _, _)| f).collect();
    let types: std::collections::HashSet<_> =
        leaves.keys().map(|(f, t, _)| (f.clone(), t.clone())).collect();
    families.len() + types.len() + leaves.len()
}

fn leaf_counts(leaves: &IndexMap<(String, String, String), usize>) -> Vec<usize> {
    leaves.values().copied().collect()
}

/// Musical family of a genre tag.
fn family_of(genre: &str) -> &'static str {
    match genre {
        "hardstyle" | "rawstyle" | "hardcore" | "uptempo" | "frenchcore" | "gabber"
        | "hard techno" => "Hard Dance",
        "techno" | "house" | "deep house" | "tech house" | "trance" | "psytrance" | "edm"
        | "future bass" => "Electronic",
        "dnb" | "drum and bass" | "dubstep" | "riddim" => "Bass Music",
        "trap" | "hip hop" => "Urban",
        "ambient" => "Atmospheric",
        _ => "Unsorted",
    }
}

/// First audio-type tag of a pack ("Kicks", "Vocals", ...).
fn primary_type(pack: &EnrichedPack) -> Option<String> {
    pack.tags
        .iter()
        .find(|t| !pack.genres.iter().any(|g| g.eq_ignore_ascii_case(t)))
        .cloned()
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::classifier::FilesByClass;
    use crate::detectors::packs::{DetectedPack, PackType, StructureSummary};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn pack(name: &str, genres: &[&str], types: &[&str], label: Option<&str>) -> EnrichedPack {
        let genres: Vec<String> = genres.iter().map(|g| g.to_string()).collect();
        let mut tags = genres.clone();
        tags.extend(types.iter().map(|t| t.to_string()));
        EnrichedPack {
            pack: DetectedPack {
                id: DetectedPack::new_id(),
                name: name.to_string(),
                path: PathBuf::from(format!("/src/{name}")),
                pack_type: PackType::CommercialPack,
                confidence: 0.8,
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
            tags,
            genres,
            has_loops: false,
            has_one_shots: false,
            has_presets: false,
            label: label.map(str::to_string),
            average_file_size: 2 * 1024 * 1024,
            analysis_tags: Vec::new(),
            files: FilesByClass::default(),
        }
    }

    #[test]
    fn test_emits_multiple_proposals_with_one_recommended() {
        let packs = vec![
            pack("A", &["hardstyle"], &["Kicks"], Some("vendor")),
            pack("B", &["hardstyle"], &["Leads"], None),
            pack("C", &["techno"], &["Loops"], None),
        ];
        let proposals = StructureProposer::new().propose(&packs);

        assert!((2..=4).contains(&proposals.len()));
        assert_eq!(proposals.iter().filter(|p| p.recommended).count(), 1);
        for p in &proposals {
            assert!(!p.hierarchy.is_empty());
            assert!(p.max_depth >= 2);
        }
    }

    #[test]
    fn test_routes_are_deterministic() {
        let p = pack("A", &["hardstyle"], &["Kicks"], None);
        let proposals = StructureProposer::new().propose(&[p.clone()]);
        let fts = proposals
            .iter()
            .find(|x| x.id == "family-type-style")
            .unwrap();
        assert_eq!(
            fts.route(&p),
            vec!["Hard Dance".to_string(), "Kicks".to_string(), "Hardstyle".to_string()]
        );

        let genre = proposals.iter().find(|x| x.id == "genre-pack").unwrap();
        assert_eq!(genre.route(&p), vec!["Hardstyle".to_string()]);
    }

    #[test]
    fn test_untagged_pack_routes_to_unsorted() {
        let p = pack("Mystery", &[], &[], None);
        let proposals = StructureProposer::new().propose(&[p.clone()]);
        let genre = proposals.iter().find(|x| x.id == "genre-pack").unwrap();
        assert_eq!(genre.route(&p), vec!["Unsorted".to_string()]);
        assert_eq!(genre.statistics.unrouted, 1);
    }

    #[test]
    fn test_genre_coverage_beats_vendor_when_unlabeled() {
        let packs = vec![
            pack("A", &["hardstyle"], &["Kicks"], None),
            pack("B", &["techno"], &["Loops"], None),
            pack("C", &["trance"], &["Pads"], None),
            pack("D", &["house"], &["Bass"], None),
        ];
        let proposals = StructureProposer::new().propose(&packs);
        let recommended = proposals.iter().find(|p| p.recommended).unwrap();
        assert_eq!(recommended.id, "genre-pack");
    }
}
