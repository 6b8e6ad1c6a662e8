//! Story narration catalog: pages, their narrator voice and the encoded
//! narration payload for each page.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoryError;

/// Per-page access to encoded narration
pub trait PayloadLookup: Send + Sync {
    /// base64 PCM for `page` (zero-based), or `None` if narration is unavailable
    fn lookup_encoded_audio(&self, page: usize) -> Option<&str>;

    /// Whether narration controls should be enabled for `page`
    fn is_narration_available(&self, page: usize) -> bool {
        self.lookup_encoded_audio(page).is_some()
    }
}

impl PayloadLookup for HashMap<usize, String> {
    fn lookup_encoded_audio(&self, page: usize) -> Option<&str> {
        self.get(&page).map(String::as_str).filter(|payload| !payload.is_empty())
    }
}

/// Narrator category suggested for a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceCategory {
    Nature,
    Whimsical,
    Adventure,
}

impl VoiceCategory {
    /// Map a page's `voice_id`; anything unrecognised narrates as adventure
    pub fn from_voice_id(voice_id: &str) -> Self {
        match voice_id.trim().to_ascii_lowercase().as_str() {
            "nature" => VoiceCategory::Nature,
            "whimsical" => VoiceCategory::Whimsical,
            _ => VoiceCategory::Adventure,
        }
    }

    /// Name of the synthesized voice used for this category
    pub fn voice_name(&self) -> &'static str {
        match self {
            VoiceCategory::Nature => "Puck",
            VoiceCategory::Whimsical => "Kore",
            VoiceCategory::Adventure => "Zephyr",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceCategory::Nature => "nature",
            VoiceCategory::Whimsical => "whimsical",
            VoiceCategory::Adventure => "adventure",
        }
    }
}

impl fmt::Display for VoiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryPage {
    /// One-based page number as printed in the book
    pub page: u32,
    pub text: String,
    #[serde(default)]
    pub voice_id: String,
    #[serde(default)]
    pub image_prompt: String,
    #[serde(default)]
    pub magic_sound_prompt: String,
    #[serde(default)]
    pub audio_base64: Option<String>,
}

impl StoryPage {
    pub fn voice(&self) -> VoiceCategory {
        VoiceCategory::from_voice_id(&self.voice_id)
    }

    /// Page text with bracketed performance cues (`[giggles]`) removed
    pub fn display_text(&self) -> String {
        strip_cues(&self.text)
    }

    pub fn has_narration(&self) -> bool {
        self.audio_base64
            .as_deref()
            .map_or(false, |payload| !payload.is_empty())
    }
}

/// Remove `[...]` spans that open and close on the same line
fn strip_cues(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let line_end = after.find('\n').unwrap_or(after.len());
        match after[..line_end].find(']') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// A generated story together with its narration payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryNarration {
    pub story_title: String,
    /// Stable identifier for the story's generated assets
    #[serde(default)]
    pub consistency_id: String,
    /// Vocabulary introduced on the cover page
    #[serde(default)]
    pub tricky_words: Vec<String>,
    pub pages: Vec<StoryPage>,
}

impl StoryNarration {
    pub fn from_json(json: &str) -> Result<Self, StoryError> {
        let story: StoryNarration = serde_json::from_str(json)?;
        if story.pages.is_empty() {
            return Err(StoryError::Empty);
        }
        Ok(story)
    }

    pub fn load(path: &Path) -> Result<Self, StoryError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&StoryPage> {
        self.pages.get(index)
    }

    /// Pages that have narration available
    pub fn narrated_pages(&self) -> usize {
        self.pages.iter().filter(|page| page.has_narration()).count()
    }
}

impl PayloadLookup for StoryNarration {
    fn lookup_encoded_audio(&self, page: usize) -> Option<&str> {
        self.pages
            .get(page)
            .and_then(|page| page.audio_base64.as_deref())
            .filter(|payload| !payload.is_empty())
    }
}
