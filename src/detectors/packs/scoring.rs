//! Weighted scoring for rule P3.
//!
//! Each dimension is clamped to its published maximum and the total is capped
//! at 100. The content-validation gate runs independently of the score: a
//! candidate that fails the gate is rejected regardless of how well it is
//! named.

use crate::core::config::DetectorConfig;
use crate::core::files::is_midi_extension;
use crate::core::snapshot::SnapshotNode;
use crate::core::taxonomy::{normalize_token, TaxonomyRegistry};

/// Commercial keywords rewarded by the keyword dimension.
const COMMERCIAL_KEYWORDS: &[&str] = &[
    "pack",
    "sample",
    "samples",
    "kit",
    "bundle",
    "suite",
    "essentials",
    "ultimate",
    "collection",
    "construction kit",
];

/// Edition/series words rewarded by the name dimension.
const EDITION_KEYWORDS: &[&str] = &[
    "edition",
    "series",
    "deluxe",
    "anniversary",
    "remastered",
    "expansion",
];

/// Project/template extensions for the special-pack heuristic.
const TEMPLATE_EXTENSIONS: &[&str] = &["als", "flp", "logic"];

/// Where a candidate sits relative to the source root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionContext {
    /// Depth below the source root (root children are depth 0)
    pub depth: usize,
    /// Whether the candidate is a direct child of a bundle
    pub inside_bundle: bool,
}

impl DetectionContext {
    /// Context for root-level candidates.
    pub fn root() -> Self {
        Self {
            depth: 0,
            inside_bundle: false,
        }
    }

    /// Context for direct bundle children.
    pub fn bundle_child(depth: usize) -> Self {
        Self {
            depth,
            inside_bundle: true,
        }
    }

    /// One level deeper, outside a bundle.
    pub fn deeper(self) -> Self {
        Self {
            depth: self.depth + 1,
            inside_bundle: false,
        }
    }

    /// Score threshold applicable to this context.
    pub fn score_threshold(&self, config: &DetectorConfig) -> f64 {
        if self.inside_bundle {
            return config.sub_pack_score_threshold;
        }
        match self.depth {
            0 => config.root_score_threshold,
            1 => config.sub_pack_score_threshold,
            d => config.score_floor(d),
        }
    }

    /// Minimum taxonomy category matches required at this depth.
    pub fn category_minimum(&self, config: &DetectorConfig) -> usize {
        config.category_minimum(self.depth)
    }

    /// Audio-count gate applicable to this context.
    pub fn audio_threshold(&self, config: &DetectorConfig) -> usize {
        if self.inside_bundle || self.depth > 0 {
            config.min_audio_files_nested
        } else {
            config.min_audio_files_root
        }
    }

    /// Size gate applicable to this context, in bytes.
    pub fn size_threshold(&self, config: &DetectorConfig) -> u64 {
        if self.inside_bundle || self.depth > 0 {
            config.min_size_nested_bytes
        } else {
            config.min_size_root_bytes
        }
    }
}

/// Per-dimension breakdown of a P3 score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// "Artist - Title", volume number, edition word (max 40)
    pub name_pattern: f64,
    /// Commercial vocabulary in the name (max 25)
    pub commercial_keywords: f64,
    /// Subfolders matching taxonomy categories (max 20)
    pub structure: f64,
    /// Known label token (max 15)
    pub label: f64,
    /// Direct audio files at depth 0 (max 15)
    pub direct_content: f64,
    /// Total size above the context threshold (max 10)
    pub size: f64,
    /// Taxonomy categories matched among subfolders
    pub category_matches: usize,
    /// Ordered explanation fragments
    pub reasons: Vec<String>,
}

impl ScoreBreakdown {
    /// Total score, capped at 100.
    pub fn total(&self) -> f64 {
        (self.name_pattern
            + self.commercial_keywords
            + self.structure
            + self.label
            + self.direct_content
            + self.size)
            .min(100.0)
    }
}

/// Outcome of the content-validation gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateResult {
    /// Whether the candidate passed
    pub passed: bool,
    /// Special-pack kind that fired, if any
    pub special: Option<&'static str>,
    /// Ordered explanation fragments
    pub reasons: Vec<String>,
}

/// Scores snapshot directories against the taxonomy.
pub struct PackScorer<'a> {
    taxonomy: &'a TaxonomyRegistry,
    config: &'a DetectorConfig,
}

impl<'a> PackScorer<'a> {
    /// Create a scorer over a taxonomy and detector thresholds.
    pub fn new(taxonomy: &'a TaxonomyRegistry, config: &'a DetectorConfig) -> Self {
        Self { taxonomy, config }
    }

    /// Compute the weighted score for a directory.
    pub fn score(&self, node: &SnapshotNode, ctx: DetectionContext) -> ScoreBreakdown {
        let mut breakdown = ScoreBreakdown::default();
        let name = node.name.as_str();

        // Name pattern dimension, clamped to 40. When "Artist - Title" and an
        // edition word co-occur, both award points and the clamp applies.
        let mut name_score = 0.0;
        if has_artist_title_pattern(name) {
            name_score += 30.0;
            breakdown
                .reasons
                .push("name follows \"Artist - Title\" pattern".to_string());
        }
        let volume = volume_bonus(name);
        if volume > 0.0 {
            name_score += volume;
            breakdown
                .reasons
                .push("name carries a volume/part number".to_string());
        }
        if has_edition_keyword(name) {
            name_score += 18.0;
            breakdown
                .reasons
                .push("name carries an edition/series word".to_string());
        }
        breakdown.name_pattern = name_score.min(40.0);

        // Commercial keyword dimension, clamped to 25. A taxonomy category
        // token in the name ("Kicks", "Vocals") counts as sample vocabulary.
        let mut keyword_hits = commercial_keyword_hits(name);
        if self.taxonomy.category_for(name).is_some() {
            keyword_hits += 1;
        }
        if keyword_hits > 0 {
            breakdown.commercial_keywords = (10.0 + 5.0 * (keyword_hits as f64 - 1.0)).min(25.0);
            breakdown
                .reasons
                .push(format!("commercial keywords ({keyword_hits} match(es))"));
        }

        // Structure dimension: subfolders named after taxonomy categories.
        let category_matches = node
            .subdirectories()
            .filter(|d| self.taxonomy.is_category(&d.name))
            .count();
        breakdown.category_matches = category_matches;
        if category_matches >= 2 {
            breakdown.structure = ((category_matches as f64) * 10.0).min(20.0);
            breakdown.reasons.push(format!(
                "{category_matches} subfolders match taxonomy categories"
            ));
        }

        // Label dimension.
        let labels = self.taxonomy.matches_label(name);
        if !labels.is_empty() {
            breakdown.label = 15.0;
            breakdown
                .reasons
                .push(format!("known label: {}", labels.join(", ")));
        }

        // Direct content dimension.
        let direct_audio = node.direct_audio_file_count();
        if direct_audio > 0 {
            breakdown.direct_content = 15.0;
            breakdown
                .reasons
                .push(format!("{direct_audio} audio files at depth 0"));
        }

        // Size dimension.
        if node.total_size >= ctx.size_threshold(self.config) {
            breakdown.size = 10.0;
            breakdown.reasons.push(format!(
                "total size {} MB above threshold",
                node.total_size / (1024 * 1024)
            ));
        }

        breakdown
    }

    /// Run the content-validation gate for a directory.
    ///
    /// Missing aggregates (snapshot gaps) fail the gate rather than crash;
    /// the caller downgrades confidence and rejects.
    pub fn content_gate(&self, node: &SnapshotNode, ctx: DetectionContext) -> GateResult {
        let mut reasons = Vec::new();

        if let Some(kind) = self.special_pack_kind(node) {
            if node.file_count() >= self.config.min_audio_files_special {
                reasons.push(format!("special pack: {kind}"));
                return GateResult {
                    passed: true,
                    special: Some(kind),
                    reasons,
                };
            }
        }

        let audio_threshold = ctx.audio_threshold(self.config);
        if node.audio_file_count >= audio_threshold {
            reasons.push(format!(
                "{} audio files (gate {audio_threshold})",
                node.audio_file_count
            ));
            return GateResult {
                passed: true,
                special: None,
                reasons,
            };
        }

        let size_threshold = ctx.size_threshold(self.config);
        if node.total_size >= size_threshold {
            reasons.push(format!(
                "{} MB total (gate {} MB)",
                node.total_size / (1024 * 1024),
                size_threshold / (1024 * 1024)
            ));
            return GateResult {
                passed: true,
                special: None,
                reasons,
            };
        }

        let ratio = node.audio_ratio();
        if node.audio_file_count > 0 && ratio >= self.config.min_audio_ratio {
            reasons.push(format!("audio ratio {:.0}%", ratio * 100.0));
            return GateResult {
                passed: true,
                special: None,
                reasons,
            };
        }

        reasons.push(format!(
            "content gate failed: {} audio files, {} MB, ratio {:.0}%",
            node.audio_file_count,
            node.total_size / (1024 * 1024),
            ratio * 100.0
        ));
        GateResult {
            passed: false,
            special: None,
            reasons,
        }
    }

    /// MIDI-only, presets-only, or templates-only directories qualify as
    /// special packs even with zero audio.
    fn special_pack_kind(&self, node: &SnapshotNode) -> Option<&'static str> {
        let total = node.file_count();
        if total == 0 {
            return None;
        }
        if node.audio_file_count > 0 {
            return None;
        }

        let midi = node.count_files_where(&|f| {
            f.extension.as_deref().map(is_midi_extension).unwrap_or(false)
        });
        if midi * 2 >= total {
            return Some("midi-only");
        }

        let templates = node.count_files_where(&|f| {
            f.extension
                .as_deref()
                .map(|e| TEMPLATE_EXTENSIONS.contains(&e))
                .unwrap_or(false)
        });
        if templates * 2 >= total {
            return Some("templates-only");
        }

        if node.preset_file_count * 2 >= total {
            return Some("presets-only");
        }

        None
    }
}

/// "Artist - Title": a " - " separator with non-empty sides.
pub fn has_artist_title_pattern(name: &str) -> bool {
    name.split_once(" - ")
        .map(|(artist, title)| !artist.trim().is_empty() && !title.trim().is_empty())
        .unwrap_or(false)
}

/// Volume/part number bonus, up to 12 points.
pub fn volume_bonus(name: &str) -> f64 {
    let normalized = normalize_token(name);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        let is_marker = matches!(*token, "vol" | "volume" | "part" | "pt");
        if is_marker {
            // "Vol 2" / "Vol.2" (the dot becomes a space when normalized)
            if tokens
                .get(i + 1)
                .map(|next| next.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false)
            {
                return 12.0;
            }
            return 6.0;
        }
        // "Vol2" fused form
        if let Some(rest) = token
            .strip_prefix("vol")
            .or_else(|| token.strip_prefix("part"))
            .or_else(|| token.strip_prefix("pt"))
        {
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                return 12.0;
            }
        }
    }
    // A bare trailing number is weaker evidence.
    if tokens
        .last()
        .map(|t| t.chars().all(|c| c.is_ascii_digit()) && t.len() <= 2)
        .unwrap_or(false)
    {
        return 6.0;
    }
    0.0
}

fn has_edition_keyword(name: &str) -> bool {
    let normalized = normalize_token(name);
    EDITION_KEYWORDS.iter().any(|k| normalized.contains(k))
}

fn commercial_keyword_hits(name: &str) -> usize {
    let normalized = normalize_token(name);
    COMMERCIAL_KEYWORDS
        .iter()
        .filter(|k| normalized.contains(*k))
        .count()
}
