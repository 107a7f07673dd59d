//! Mood labels produced by the classifier and their music mappings.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fallback query for labels without a curated mapping.
pub const DEFAULT_SEARCH_QUERY: &str = "pop music";

/// The fixed set of moods the classifier can emit.
///
/// The discriminant order matches the model's output vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MoodLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl MoodLabel {
    pub const ALL: [MoodLabel; 7] = [
        MoodLabel::Angry,
        MoodLabel::Disgust,
        MoodLabel::Fear,
        MoodLabel::Happy,
        MoodLabel::Sad,
        MoodLabel::Surprise,
        MoodLabel::Neutral,
    ];

    /// Maps a model output index to a label.
    pub fn from_index(index: usize) -> Option<MoodLabel> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodLabel::Angry => "Angry",
            MoodLabel::Disgust => "Disgust",
            MoodLabel::Fear => "Fear",
            MoodLabel::Happy => "Happy",
            MoodLabel::Sad => "Sad",
            MoodLabel::Surprise => "Surprise",
            MoodLabel::Neutral => "Neutral",
        }
    }

    /// Lowercase token used in playlist names and search URLs.
    pub fn token(&self) -> String {
        self.as_str().to_lowercase()
    }

    /// Hand-curated catalog search query for this mood.
    pub fn search_query(&self) -> &'static str {
        match self {
            MoodLabel::Happy => "happy upbeat pop dance bollywood energetic",
            MoodLabel::Sad => "sad melancholic acoustic emotional hindi heartbreak",
            MoodLabel::Angry => "angry rock metal aggressive rap hindi",
            MoodLabel::Fear => "ambient dark atmospheric calm soothing",
            MoodLabel::Surprise => "electronic experimental pop energetic dance",
            MoodLabel::Disgust => "rock alternative metal angry",
            MoodLabel::Neutral => "pop indie chill relaxed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MoodLabel::Happy => "Upbeat, energetic, positive music",
            MoodLabel::Sad => "Melancholic, emotional, slow music",
            MoodLabel::Angry => "Aggressive, rock, metal music",
            MoodLabel::Fear => "Calming, ambient, soothing music",
            MoodLabel::Surprise => "Experimental, electronic, dynamic music",
            MoodLabel::Disgust => "Alternative, rock music",
            MoodLabel::Neutral => "Balanced, popular, chill music",
        }
    }
}

impl fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid mood '{0}'")]
pub struct InvalidMood(pub String);

impl FromStr for MoodLabel {
    type Err = InvalidMood;

    /// Exact, case-sensitive match against the label names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoodLabel::ALL
            .iter()
            .find(|label| label.as_str() == s)
            .copied()
            .ok_or_else(|| InvalidMood(s.to_string()))
    }
}

impl Serialize for MoodLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Classifier output label. `Unknown` covers indices outside the label table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedMood {
    Known(MoodLabel),
    Unknown,
}

impl DetectedMood {
    pub fn from_index(index: usize) -> Self {
        match MoodLabel::from_index(index) {
            Some(label) => DetectedMood::Known(label),
            None => DetectedMood::Unknown,
        }
    }

    pub fn label(&self) -> Option<MoodLabel> {
        match self {
            DetectedMood::Known(label) => Some(*label),
            DetectedMood::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedMood::Known(label) => label.as_str(),
            DetectedMood::Unknown => "Unknown",
        }
    }

    pub fn search_query(&self) -> &'static str {
        match self {
            DetectedMood::Known(label) => label.search_query(),
            DetectedMood::Unknown => DEFAULT_SEARCH_QUERY,
        }
    }
}

impl fmt::Display for DetectedMood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DetectedMood {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A single classification: which mood, and how sure the model is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionResult {
    pub mood: DetectedMood,
    pub confidence: f32,
}
