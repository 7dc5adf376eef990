use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Entities ---

/// What kind of worldbuilding subject an import creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Location,
    Faction,
    Creature,
    Item,
    Event,
    Concept,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Location => "location",
            EntityKind::Faction => "faction",
            EntityKind::Creature => "creature",
            EntityKind::Item => "item",
            EntityKind::Event => "event",
            EntityKind::Concept => "concept",
        }
    }

    /// Lenient parse for form input. Unknown values map to `Concept`.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "character" | "person" => EntityKind::Character,
            "location" | "place" => EntityKind::Location,
            "faction" | "organization" | "organisation" => EntityKind::Faction,
            "creature" | "species" => EntityKind::Creature,
            "item" | "object" => EntityKind::Item,
            "event" => EntityKind::Event,
            _ => EntityKind::Concept,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Source pages ---

/// One fetched encyclopedia page in one language. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePage {
    pub lang: String,
    pub page_id: u64,
    pub title: String,
    pub url: String,
    /// Plain-text extract of the article body.
    pub extract: String,
    /// Raw wikitext of the latest revision.
    pub wikitext: String,
    /// The page's declared primary image file title, if any.
    pub page_image: Option<String>,
    /// File titles of every media reference on the page.
    pub image_titles: Vec<String>,
}

/// A full-text search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub page_id: u64,
    pub title: String,
}

/// A cross-language equivalent of a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LangLink {
    pub lang: String,
    pub title: String,
}

// --- Media ---

/// Origin tag used for media lookups when a file lives on the shared
/// cross-language repository rather than a language wiki.
pub const COMMONS_ORIGIN: &str = "commons";

/// A media file reference discovered on a source page, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    /// Language code of the page that referenced it, or `commons`.
    pub origin: String,
    pub title: String,
}

/// Enriched metadata for one media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    /// Direct download URL.
    pub url: String,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub author: Option<String>,
    pub license: Option<String>,
    pub license_url: Option<String>,
    pub attribution: Option<String>,
    pub origin: String,
}

impl MediaInfo {
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn is_audio(&self) -> bool {
        self.mime.starts_with("audio/")
    }

    pub fn is_video(&self) -> bool {
        self.mime.starts_with("video/")
    }

    /// Pixel area, used as a ranking fallback when byte size is unknown.
    pub fn pixel_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// An image placement declared in the source wikitext. Markup evidence
/// always outranks model or heuristic judgment downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlacement {
    pub file: String,
    pub caption: String,
    pub infobox: bool,
    /// Enclosing `== Section ==` name for non-infobox placements.
    pub section: Option<String>,
}

/// Where an accepted media item lands in the final document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Infobox,
    Inline,
    Gallery,
    Exclude,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Infobox => "infobox",
            Placement::Inline => "inline",
            Placement::Gallery => "gallery",
            Placement::Exclude => "exclude",
        }
    }

    /// Default priority when a verdict does not carry one explicitly.
    pub fn default_priority(&self) -> i32 {
        match self {
            Placement::Infobox => 1,
            Placement::Inline => 3,
            Placement::Gallery => 4,
            Placement::Exclude => 9,
        }
    }
}

/// The authoritative per-file decision record. Everything downstream of the
/// classifier keys off this.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRelevance {
    pub title: String,
    pub relevant: bool,
    pub placement: Placement,
    pub caption: Option<String>,
    /// Target section name for inline placements.
    pub section: Option<String>,
    /// Lower is more important; drives import and layout order.
    pub priority: i32,
}

/// A media item that made it into storage.
#[derive(Debug, Clone)]
pub struct ImportedAsset {
    pub asset_id: Uuid,
    pub title: String,
    pub mime: String,
    pub placement: Placement,
    pub caption: Option<String>,
    pub section: Option<String>,
    pub priority: i32,
    /// Storage path relative to the file-store root.
    pub path: String,
}

/// Infobox audio/video highlight attached to an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoboxMedia {
    pub asset_id: Uuid,
    /// `audio` or `video`.
    pub kind: String,
    pub caption: Option<String>,
}

// --- Import report ---

/// Summary of one completed import, returned to the API layer and logged.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub entity_id: Uuid,
    pub article_id: Uuid,
    pub revision_id: Uuid,
    pub workspace_id: Uuid,
    pub source_count: usize,
    pub assets_imported: usize,
    pub gallery_count: usize,
    pub used_generation: bool,
    pub fallback_language: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Import Complete ===")?;
        writeln!(f, "Entity:          {}", self.entity_id)?;
        writeln!(f, "Sources:         {}", self.source_count)?;
        writeln!(f, "Assets imported: {}", self.assets_imported)?;
        writeln!(f, "Gallery items:   {}", self.gallery_count)?;
        writeln!(f, "Generation used: {}", self.used_generation)?;
        if let Some(ref lang) = self.fallback_language {
            writeln!(f, "Fallback lang:   {lang}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_roundtrip() {
        assert_eq!(EntityKind::from_str_loose("Character"), EntityKind::Character);
        assert_eq!(EntityKind::from_str_loose("organization"), EntityKind::Faction);
        assert_eq!(EntityKind::from_str_loose("whatever"), EntityKind::Concept);
    }

    #[test]
    fn placement_default_priorities_order() {
        assert!(Placement::Infobox.default_priority() < Placement::Inline.default_priority());
        assert!(Placement::Inline.default_priority() < Placement::Gallery.default_priority());
        assert!(Placement::Gallery.default_priority() < Placement::Exclude.default_priority());
    }

    #[test]
    fn media_info_mime_helpers() {
        let info = MediaInfo {
            title: "Clip.ogg".into(),
            url: "https://upload.example/clip.ogg".into(),
            mime: "audio/ogg".into(),
            width: 0,
            height: 0,
            size_bytes: 1024,
            author: None,
            license: None,
            license_url: None,
            attribution: None,
            origin: "en".into(),
        };
        assert!(info.is_audio());
        assert!(!info.is_image());
        assert!(!info.is_video());
    }
}
