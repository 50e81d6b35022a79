//! File classification by extension.
//!
//! Every indexed file belongs to exactly one class: audio, preset, or other.
//! Classification is by lowercase extension against fixed sets; no content
//! sniffing is performed.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Audio sample extensions recognized by the indexer
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "aiff", "aif", "ogg", "m4a"];

/// Synth/DAW preset and project extensions recognized by the indexer
pub const PRESET_EXTENSIONS: &[&str] = &[
    "fxp", "fxb", "h2p", "nksf", "nksfx", "adg", "adv", "als", "flp", "logic", "vital", "nmsv",
    "serum", "serumpack", "serumpreset", "spf", "ksd",
];

/// MIDI clip extensions, used by the special-pack heuristic
pub const MIDI_EXTENSIONS: &[&str] = &["mid", "midi"];

/// Documentation extensions, used by the structure summary
pub const DOCUMENTATION_EXTENSIONS: &[&str] = &["txt", "pdf", "rtf", "nfo", "md", "doc", "docx"];

/// Class of an indexed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    /// Audio sample (wav, mp3, flac, ...)
    Audio,
    /// Synth preset or DAW project (fxp, serum, als, ...)
    Preset,
    /// Everything else
    Other,
}

impl FileClass {
    /// Classify a lowercase extension.
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.to_ascii_lowercase();
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Audio
        } else if PRESET_EXTENSIONS.contains(&ext.as_str()) {
            Self::Preset
        } else {
            Self::Other
        }
    }

    /// Classify a path by its extension. Files without an extension are
    /// `Other`.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Other)
    }
}

/// Check if an extension denotes an audio sample
#[inline]
pub fn is_audio_extension(extension: &str) -> bool {
    AUDIO_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

/// Check if an extension denotes a preset or DAW project
#[inline]
pub fn is_preset_extension(extension: &str) -> bool {
    PRESET_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

/// Check if an extension denotes a MIDI clip
#[inline]
pub fn is_midi_extension(extension: &str) -> bool {
    MIDI_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

/// Check if an extension denotes documentation
#[inline]
pub fn is_documentation_extension(extension: &str) -> bool {
    DOCUMENTATION_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_classification_is_exhaustive_and_exclusive() {
        for ext in AUDIO_EXTENSIONS {
            assert_eq!(FileClass::from_extension(ext), FileClass::Audio);
            assert!(!PRESET_EXTENSIONS.contains(ext));
        }
        for ext in PRESET_EXTENSIONS {
            assert_eq!(FileClass::from_extension(ext), FileClass::Preset);
            assert!(!AUDIO_EXTENSIONS.contains(ext));
        }
        assert_eq!(FileClass::from_extension("exe"), FileClass::Other);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(FileClass::from_extension("WAV"), FileClass::Audio);
        assert_eq!(FileClass::from_extension("Fxp"), FileClass::Preset);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            FileClass::from_path(&PathBuf::from("/packs/Kick01.wav")),
            FileClass::Audio
        );
        assert_eq!(
            FileClass::from_path(&PathBuf::from("/packs/lead.fxp")),
            FileClass::Preset
        );
        assert_eq!(
            FileClass::from_path(&PathBuf::from("/packs/README")),
            FileClass::Other
        );
    }
}
