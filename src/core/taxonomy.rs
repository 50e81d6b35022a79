//! Taxonomy registry.
//!
//! Loads the keyword catalogue used by detection and classification:
//! audio-type categories, genre tokens, bundle-hint keywords, known label
//! tokens, and ignore patterns. The catalogue is resolved from a YAML file
//! searched beside the binary, then in parent directories, then in the
//! working directory, then via a bounded recursive search; when nothing is
//! found a hard-coded minimal catalogue is used.
//!
//! The registry is immutable after initialization and shared via `Arc`.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::errors::{OrganizerError, Result};

/// File name of the catalogue.
pub const TAXONOMY_FILE_NAME: &str = "taxonomy.yml";

/// Depth bound for the last-resort recursive search.
const SEARCH_MAX_DEPTH: usize = 3;

/// Where the catalogue came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxonomyOrigin {
    /// Loaded from a catalogue file
    File(PathBuf),
    /// Hard-coded fallback catalogue
    Builtin,
}

/// Serialized catalogue shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    categories: IndexMap<String, Vec<String>>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    bundle_hints: Vec<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    ignore_patterns: Vec<String>,
}

/// Immutable keyword catalogue.
#[derive(Debug, Clone)]
pub struct TaxonomyRegistry {
    categories: IndexMap<String, Vec<String>>,
    genres: Vec<String>,
    bundle_hints: Vec<String>,
    labels: Vec<String>,
    ignore_patterns: Vec<String>,
    origin: TaxonomyOrigin,
}

impl TaxonomyRegistry {
    /// Resolve and load the catalogue, falling back to the builtin set.
    pub fn load() -> Self {
        for candidate in Self::search_candidates() {
            match Self::from_file(&candidate) {
                Ok(registry) => {
                    info!("taxonomy loaded from {}", candidate.display());
                    return registry;
                }
                Err(e) => {
                    warn!("ignoring taxonomy at {}: {e}", candidate.display());
                }
            }
        }
        debug!("no taxonomy file found; using builtin catalogue");
        Self::builtin()
    }

    /// Load the catalogue from a specific file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| OrganizerError::io(format!("reading {}", path.display()), e))?;
        let file: TaxonomyFile = serde_yaml::from_str(&raw).map_err(|e| OrganizerError::Taxonomy {
            message: format!("malformed catalogue: {e}"),
            path: Some(path.to_path_buf()),
        })?;
        if file.categories.is_empty() {
            return Err(OrganizerError::Taxonomy {
                message: "catalogue has no categories".to_string(),
                path: Some(path.to_path_buf()),
            });
        }
        Ok(Self {
            categories: lowercase_map(file.categories),
            genres: lowercase_all(file.genres),
            bundle_hints: lowercase_all(file.bundle_hints),
            labels: lowercase_all(file.labels),
            ignore_patterns: lowercase_all(file.ignore_patterns),
            origin: TaxonomyOrigin::File(path.to_path_buf()),
        })
    }

    /// The hard-coded minimal catalogue.
    pub fn builtin() -> Self {
        static BUILTIN: Lazy<TaxonomyRegistry> = Lazy::new(|| {
            let mut categories = IndexMap::new();
            for (name, keywords) in BUILTIN_CATEGORIES {
                categories.insert(
                    (*name).to_string(),
                    keywords.iter().map(|k| (*k).to_string()).collect(),
                );
            }
            TaxonomyRegistry {
                categories,
                genres: BUILTIN_GENRES.iter().map(|g| (*g).to_string()).collect(),
                bundle_hints: BUILTIN_BUNDLE_HINTS
                    .iter()
                    .map(|h| (*h).to_string())
                    .collect(),
                labels: BUILTIN_LABELS.iter().map(|l| (*l).to_string()).collect(),
                ignore_patterns: BUILTIN_IGNORE.iter().map(|p| (*p).to_string()).collect(),
                origin: TaxonomyOrigin::Builtin,
            }
        });
        BUILTIN.clone()
    }

    /// Where this catalogue came from.
    pub fn origin(&self) -> &TaxonomyOrigin {
        &self.origin
    }

    /// Whether a directory name denotes a taxonomy category (e.g. "Kicks").
    pub fn is_category(&self, name: &str) -> bool {
        self.category_for(name).is_some()
    }

    /// Resolve the canonical category a name belongs to, if any.
    pub fn category_for(&self, name: &str) -> Option<&str> {
        let normalized = normalize_token(name);
        for (category, keywords) in &self.categories {
            if normalize_token(category) == normalized {
                return Some(category);
            }
            if keywords.iter().any(|k| normalized.contains(k.as_str())) {
                return Some(category);
            }
        }
        None
    }

    /// Whether a name IS a category name ("Kicks", "Hi-Hats"), as opposed to
    /// merely containing a category token ("Vendor - Kicks Vol 1").
    pub fn is_category_name(&self, name: &str) -> bool {
        let normalized = normalize_token(name);
        let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
        for (category, keywords) in &self.categories {
            let canonical = normalize_token(category);
            if collapsed == canonical.split_whitespace().collect::<Vec<_>>().join(" ") {
                return true;
            }
            if keywords.iter().any(|k| collapsed == *k) {
                return true;
            }
        }
        false
    }

    /// Bundle-hint keywords present in a name.
    pub fn matches_bundle_hint(&self, name: &str) -> Vec<&str> {
        let normalized = normalize_token(name);
        self.bundle_hints
            .iter()
            .filter(|hint| normalized.contains(hint.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Known label tokens present in a name.
    pub fn matches_label(&self, name: &str) -> Vec<&str> {
        let normalized = normalize_token(name);
        self.labels
            .iter()
            .filter(|label| normalized.contains(label.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Genre tokens present in a name.
    pub fn matches_genre(&self, name: &str) -> Vec<&str> {
        let normalized = normalize_token(name);
        self.genres
            .iter()
            .filter(|genre| normalized.contains(genre.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Whether a name matches an ignore pattern.
    pub fn is_ignored(&self, name: &str) -> bool {
        let normalized = normalize_token(name);
        self.ignore_patterns
            .iter()
            .any(|p| normalized == *p || normalized.contains(p.as_str()))
    }

    /// Iterate over category names in catalogue order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    fn search_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        // Beside the binary, then its parent directories.
        if let Ok(exe) = env::current_exe() {
            let mut dir = exe.parent().map(Path::to_path_buf);
            while let Some(d) = dir {
                candidates.push(d.join(TAXONOMY_FILE_NAME));
                dir = d.parent().map(Path::to_path_buf);
            }
        }

        // Process working directory, then a bounded recursive search below it.
        if let Ok(cwd) = env::current_dir() {
            candidates.push(cwd.join(TAXONOMY_FILE_NAME));
            Self::search_below(&cwd, 0, &mut candidates);
        }

        candidates.into_iter().filter(|p| p.is_file()).collect()
    }

    fn search_below(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
        if depth >= SEARCH_MAX_DEPTH {
            return;
        }
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        for sub in dirs {
            if sub
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }
            out.push(sub.join(TAXONOMY_FILE_NAME));
            Self::search_below(&sub, depth + 1, out);
        }
    }
}

/// Lowercase a name and map separators to spaces for keyword matching.
pub fn normalize_token(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == '-' || c == '.' { ' ' } else { c })
        .collect()
}

fn lowercase_all(values: Vec<String>) -> Vec<String> {
    values.into_iter().map(|v| v.to_lowercase()).collect()
}

fn lowercase_map(map: IndexMap<String, Vec<String>>) -> IndexMap<String, Vec<String>> {
    map.into_iter()
        .map(|(k, v)| (k, lowercase_all(v)))
        .collect()
}

const BUILTIN_CATEGORIES: &[(&str, &[&str])] = &[
    ("Kicks", &["kick", "kicks", "bd", "bassdrum"]),
    ("Snares", &["snare", "snares", "sd", "rimshot"]),
    ("Claps", &["clap", "claps"]),
    ("Hats", &["hat", "hats", "hihat", "hi hat"]),
    ("Cymbals", &["cymbal", "crash", "ride"]),
    ("Percussion", &["perc", "percussion", "toms", "shaker"]),
    ("Bass", &["bass", "808", "sub"]),
    ("Leads", &["lead", "leads", "screech"]),
    ("Synths", &["synth", "synths", "pluck", "plucks", "chords", "stabs"]),
    ("Pads", &["pad", "pads", "atmos", "atmosphere", "ambience"]),
    ("Vocals", &["vocal", "vocals", "vox", "acapella", "phrases", "shouts"]),
    ("FX", &["fx", "effects", "impacts", "risers", "uplifters", "downlifters", "sweeps", "transitions"]),
    ("Loops", &["loop", "loops", "grooves"]),
    ("One-Shots", &["one shot", "one shots", "oneshot", "oneshots", "single hits"]),
    ("Melodies", &["melody", "melodies", "riffs"]),
    ("MIDI", &["midi", "midis"]),
    ("Presets", &["preset", "presets", "patches", "soundbank", "soundset"]),
    ("Templates", &["template", "templates", "project", "projects", "flp", "als"]),
    ("Drums", &["drum", "drums", "drumkit", "breaks"]),
];

const BUILTIN_GENRES: &[&str] = &[
    "hardstyle",
    "rawstyle",
    "hardcore",
    "uptempo",
    "frenchcore",
    "gabber",
    "hard techno",
    "techno",
    "house",
    "deep house",
    "tech house",
    "trance",
    "psytrance",
    "dnb",
    "drum and bass",
    "dubstep",
    "riddim",
    "trap",
    "hip hop",
    "edm",
    "future bass",
    "ambient",
];

const BUILTIN_BUNDLE_HINTS: &[&str] = &[
    "bundle",
    "collection",
    "suite",
    "complete",
    "mega pack",
    "megapack",
    "ultimate",
    "anthology",
    "everything",
    "all packs",
    "full library",
];

const BUILTIN_LABELS: &[&str] = &[
    "dabro music",
    "singomakers",
    "vengeance",
    "black octopus",
    "loopmasters",
    "sample tools by cr2",
    "production master",
    "ghosthack",
    "cymatics",
    "kshmr",
    "splice",
    "wa production",
    "alonso sound",
    "thick sounds",
    "industrial strength",
];

const BUILTIN_IGNORE: &[&str] = &[
    "__macosx",
    "system volume information",
    "$recycle bin",
    "desktop ini",
    "thumbs db",
];
