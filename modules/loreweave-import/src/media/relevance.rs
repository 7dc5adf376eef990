// Keyed store of media relevance verdicts.
//
// One record per normalized file title, discovery order preserved. All merge
// rules live in `apply`; the reconciliation passes are explicit methods so
// their precedence reads in one place: markup placement > model verdict >
// heuristic default > size-based fill.

use std::collections::HashMap;

use loreweave_common::text::normalize_media_title;
use loreweave_common::types::{ImagePlacement, MediaInfo, MediaRelevance, Placement};

/// Priority floor for audio/video forced into the infobox slot.
const AV_BACKSTOP_PRIORITY: i32 = 2;
/// Priority for gallery promotions made by the fill passes.
pub(crate) const GALLERY_FILL_PRIORITY: i32 = 5;

/// Image-title vocabulary that marks reference material worth a gallery slot
/// even when the classifier passed on it.
const DIAGRAM_KEYWORDS: &[&str] = &[
    "diagram",
    "schematic",
    "blueprint",
    "cross-section",
    "cross section",
    "elevation",
    "floor plan",
    "floorplan",
    "site plan",
    "map",
    "chart",
    "layout",
    "plan of",
];

/// Where a verdict came from. Higher values overwrite lower ones in `apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Provenance {
    /// Initial not-relevant record created at seeding.
    Seed,
    /// Promoted by a gallery fill pass.
    SizeFill,
    /// Deterministic default rules.
    Heuristic,
    /// Structured verdict from the generation backend.
    Classifier,
    /// Declared in the source markup.
    Wikitext,
}

#[derive(Debug, Clone)]
struct Entry {
    relevance: MediaRelevance,
    provenance: Provenance,
}

#[derive(Debug, Default)]
pub struct RelevanceStore {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl RelevanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a candidate. Later seeds of the same normalized title are
    /// ignored, so discovery order is stable.
    pub fn seed(&mut self, title: &str) {
        let key = normalize_media_title(title);
        if key.is_empty() || self.index.contains_key(&key) {
            return;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(Entry {
            relevance: MediaRelevance {
                title: title.to_string(),
                relevant: false,
                placement: Placement::Exclude,
                caption: None,
                section: None,
                priority: Placement::Exclude.default_priority(),
            },
            provenance: Provenance::Seed,
        });
    }

    pub fn get(&self, title: &str) -> Option<&MediaRelevance> {
        self.index
            .get(&normalize_media_title(title))
            .map(|&i| &self.entries[i].relevance)
    }

    /// Merge a verdict into the store. Unknown titles are dropped; the
    /// candidate set is fixed at seeding.
    ///
    /// Higher provenance overwrites the relevance flag and placement, takes
    /// the section when it has one, and only fills a missing caption (an
    /// earlier caption is never clobbered). Equal provenance keeps the first
    /// verdict and fills gaps. Lower provenance fills caption gaps only.
    /// Priority never loosens: the stored value is the minimum ever seen
    /// from a winning or equal side.
    pub fn apply(&mut self, provenance: Provenance, verdict: MediaRelevance) {
        let key = normalize_media_title(&verdict.title);
        let Some(&i) = self.index.get(&key) else {
            return;
        };
        let entry = &mut self.entries[i];
        match provenance.cmp(&entry.provenance) {
            std::cmp::Ordering::Greater => {
                entry.relevance.relevant = verdict.relevant;
                entry.relevance.placement = verdict.placement;
                if verdict.section.is_some() {
                    entry.relevance.section = verdict.section;
                }
                if entry.relevance.caption.is_none() {
                    entry.relevance.caption = verdict.caption;
                }
                entry.relevance.priority = entry.relevance.priority.min(verdict.priority);
                entry.provenance = provenance;
            }
            std::cmp::Ordering::Equal => {
                if entry.relevance.caption.is_none() {
                    entry.relevance.caption = verdict.caption;
                }
                if entry.relevance.section.is_none() {
                    entry.relevance.section = verdict.section;
                }
                entry.relevance.priority = entry.relevance.priority.min(verdict.priority);
            }
            std::cmp::Ordering::Less => {
                if entry.relevance.caption.is_none() {
                    entry.relevance.caption = verdict.caption;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reconciliation passes
    // -----------------------------------------------------------------------

    /// Guarantee one infobox audio and one infobox video highlight when the
    /// pool has them, independently per kind.
    pub fn backstop_infobox_av(&mut self, infos: &[MediaInfo]) {
        self.backstop_kind(infos, MediaInfo::is_audio);
        self.backstop_kind(infos, MediaInfo::is_video);
    }

    fn backstop_kind(&mut self, infos: &[MediaInfo], is_kind: fn(&MediaInfo) -> bool) {
        let satisfied = infos.iter().any(|info| {
            is_kind(info)
                && self
                    .get(&info.title)
                    .map_or(false, |r| r.relevant && r.placement == Placement::Infobox)
        });
        if satisfied {
            return;
        }
        if let Some(first) = infos.iter().find(|info| is_kind(info)) {
            self.force(&first.title, Placement::Infobox, AV_BACKSTOP_PRIORITY);
        }
    }

    /// Markup evidence outranks every other verdict: placements land as
    /// relevant with their declared bucket, markup captions fill gaps, and
    /// priority tightens to 1 (infobox) or 3 (inline).
    pub fn apply_placements(&mut self, placements: &[ImagePlacement]) {
        for p in placements {
            let placement = if p.infobox {
                Placement::Infobox
            } else {
                Placement::Inline
            };
            let caption = (!p.caption.is_empty()).then(|| p.caption.clone());
            self.apply(
                Provenance::Wikitext,
                MediaRelevance {
                    title: p.file.clone(),
                    relevant: true,
                    placement,
                    caption,
                    section: p.section.clone(),
                    priority: placement.default_priority(),
                },
            );
        }
    }

    /// Guarantee a portrait: when images are relevant but none sits in the
    /// infobox, promote the first one not pinned elsewhere by markup.
    pub fn backstop_portrait(&mut self, infos: &[MediaInfo]) {
        let has_portrait = infos.iter().any(|info| {
            info.is_image()
                && self
                    .get(&info.title)
                    .map_or(false, |r| r.relevant && r.placement == Placement::Infobox)
        });
        if has_portrait {
            return;
        }
        let candidate = infos.iter().find(|info| {
            info.is_image()
                && self.entry(&info.title).map_or(false, |e| {
                    e.relevance.relevant && e.provenance != Provenance::Wikitext
                })
        });
        if let Some(info) = candidate {
            self.force(
                &info.title,
                Placement::Infobox,
                Placement::Infobox.default_priority(),
            );
        }
    }

    /// Gallery fill, pass one: promote reference-diagram imagery by title
    /// vocabulary until the minimum is met.
    pub fn fill_gallery_by_vocabulary(&mut self, infos: &[MediaInfo], minimum: usize) {
        for info in infos {
            if self.gallery_count() >= minimum {
                return;
            }
            if !info.is_image() {
                continue;
            }
            let normalized = normalize_media_title(&info.title);
            if DIAGRAM_KEYWORDS.iter().any(|k| normalized.contains(k)) {
                self.promote_gallery(&info.title);
            }
        }
    }

    /// Gallery fill, pass two: biggest remaining images first, topic-keyword
    /// matches ahead of the rest.
    pub fn fill_gallery_by_size(&mut self, infos: &[MediaInfo], keywords: &[String], minimum: usize) {
        if self.gallery_count() >= minimum {
            return;
        }
        let mut ranked: Vec<&MediaInfo> = infos
            .iter()
            .filter(|info| {
                info.is_image() && self.get(&info.title).map_or(false, |r| !r.relevant)
            })
            .collect();
        ranked.sort_by_key(|info| {
            let normalized = normalize_media_title(&info.title);
            let keyword_hit = keywords.iter().any(|k| normalized.contains(k.as_str()));
            let weight = if info.size_bytes > 0 {
                info.size_bytes
            } else {
                info.pixel_area()
            };
            (std::cmp::Reverse(keyword_hit), std::cmp::Reverse(weight))
        });
        for info in ranked {
            if self.gallery_count() >= minimum {
                return;
            }
            self.promote_gallery(&info.title);
        }
    }

    pub fn gallery_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.relevance.relevant && e.relevance.placement == Placement::Gallery)
            .count()
    }

    /// Final ordering for downstream consumption: ascending priority,
    /// discovery order as the tiebreak. Non-relevant records stay in the
    /// output so callers can see what was excluded.
    pub fn into_sorted(self) -> Vec<MediaRelevance> {
        let mut indexed: Vec<(usize, Entry)> = self.entries.into_iter().enumerate().collect();
        indexed.sort_by_key(|(i, e)| (e.relevance.priority, *i));
        indexed.into_iter().map(|(_, e)| e.relevance).collect()
    }

    fn entry(&self, title: &str) -> Option<&Entry> {
        self.index
            .get(&normalize_media_title(title))
            .map(|&i| &self.entries[i])
    }

    /// Unconditional upgrade used by the backstops. Provenance floors at
    /// Heuristic so a later markup pass can still override.
    fn force(&mut self, title: &str, placement: Placement, priority: i32) {
        let Some(&i) = self.index.get(&normalize_media_title(title)) else {
            return;
        };
        let entry = &mut self.entries[i];
        entry.relevance.relevant = true;
        entry.relevance.placement = placement;
        entry.relevance.priority = entry.relevance.priority.min(priority);
        entry.provenance = entry.provenance.max(Provenance::Heuristic);
    }

    /// Upgrade-only gallery promotion: already-relevant entries keep their
    /// bucket.
    fn promote_gallery(&mut self, title: &str) {
        let Some(&i) = self.index.get(&normalize_media_title(title)) else {
            return;
        };
        let entry = &mut self.entries[i];
        if entry.relevance.relevant {
            return;
        }
        entry.relevance.relevant = true;
        entry.relevance.placement = Placement::Gallery;
        entry.relevance.priority = entry.relevance.priority.min(GALLERY_FILL_PRIORITY);
        entry.provenance = entry.provenance.max(Provenance::SizeFill);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(title: &str, relevant: bool, placement: Placement) -> MediaRelevance {
        MediaRelevance {
            title: title.to_string(),
            relevant,
            placement,
            caption: None,
            section: None,
            priority: placement.default_priority(),
        }
    }

    fn image(title: &str, size: u64) -> MediaInfo {
        MediaInfo {
            title: title.to_string(),
            url: format!("https://upload.example/{title}"),
            mime: "image/jpeg".to_string(),
            width: 800,
            height: 600,
            size_bytes: size,
            author: None,
            license: None,
            license_url: None,
            attribution: None,
            origin: "en".to_string(),
        }
    }

    fn audio(title: &str) -> MediaInfo {
        MediaInfo {
            mime: "audio/ogg".to_string(),
            width: 0,
            height: 0,
            ..image(title, 2048)
        }
    }

    #[test]
    fn test_seed_dedups_by_normalized_title() {
        let mut store = RelevanceStore::new();
        store.seed("File:Tower.JPG");
        store.seed("tower.jpg");
        store.seed("Tower.jpg");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_classifier_overrides_seed() {
        let mut store = RelevanceStore::new();
        store.seed("Tower.jpg");
        store.apply(
            Provenance::Classifier,
            verdict("Tower.jpg", true, Placement::Gallery),
        );
        let r = store.get("Tower.jpg").unwrap();
        assert!(r.relevant);
        assert_eq!(r.placement, Placement::Gallery);
        assert_eq!(r.priority, 4);
    }

    #[test]
    fn test_wikitext_overrides_classifier_but_keeps_caption() {
        let mut store = RelevanceStore::new();
        store.seed("Tower.jpg");
        let mut classified = verdict("Tower.jpg", false, Placement::Exclude);
        classified.caption = Some("model caption".to_string());
        store.apply(Provenance::Classifier, classified);

        let mut markup = verdict("File:Tower.jpg", true, Placement::Infobox);
        markup.caption = Some("markup caption".to_string());
        markup.priority = 1;
        store.apply(Provenance::Wikitext, markup);

        let r = store.get("Tower.jpg").unwrap();
        assert!(r.relevant);
        assert_eq!(r.placement, Placement::Infobox);
        assert_eq!(r.caption.as_deref(), Some("model caption"));
        assert_eq!(r.priority, 1);
    }

    #[test]
    fn test_lower_provenance_cannot_downgrade() {
        let mut store = RelevanceStore::new();
        store.seed("Tower.jpg");
        store.apply_placements(&[ImagePlacement {
            file: "Tower.jpg".to_string(),
            caption: String::new(),
            infobox: true,
            section: None,
        }]);
        store.apply(
            Provenance::Classifier,
            verdict("Tower.jpg", false, Placement::Exclude),
        );
        let r = store.get("Tower.jpg").unwrap();
        assert!(r.relevant);
        assert_eq!(r.placement, Placement::Infobox);
    }

    #[test]
    fn test_unknown_titles_dropped() {
        let mut store = RelevanceStore::new();
        store.seed("Known.jpg");
        store.apply(
            Provenance::Classifier,
            verdict("Hallucinated.jpg", true, Placement::Infobox),
        );
        assert_eq!(store.len(), 1);
        assert!(store.get("Hallucinated.jpg").is_none());
    }

    #[test]
    fn test_av_backstop_forces_first_audio() {
        let infos = vec![image("Tower.jpg", 100), audio("Anthem.ogg"), audio("Other.ogg")];
        let mut store = RelevanceStore::new();
        for info in &infos {
            store.seed(&info.title);
        }
        store.backstop_infobox_av(&infos);
        let r = store.get("Anthem.ogg").unwrap();
        assert!(r.relevant);
        assert_eq!(r.placement, Placement::Infobox);
        assert_eq!(r.priority, AV_BACKSTOP_PRIORITY);
        assert!(!store.get("Other.ogg").unwrap().relevant);
    }

    #[test]
    fn test_portrait_backstop_prefers_relevant_image() {
        let infos = vec![image("First.jpg", 10), image("Second.jpg", 20)];
        let mut store = RelevanceStore::new();
        for info in &infos {
            store.seed(&info.title);
        }
        store.apply(
            Provenance::Classifier,
            verdict("Second.jpg", true, Placement::Gallery),
        );
        store.backstop_portrait(&infos);
        let r = store.get("Second.jpg").unwrap();
        assert_eq!(r.placement, Placement::Infobox);
        assert!(!store.get("First.jpg").unwrap().relevant);
    }

    #[test]
    fn test_gallery_vocabulary_fill() {
        let infos = vec![
            image("Portrait.jpg", 10),
            image("City map of Ravenna.png", 20),
            image("Harbor schematic.svg", 30),
        ];
        let mut store = RelevanceStore::new();
        for info in &infos {
            store.seed(&info.title);
        }
        store.fill_gallery_by_vocabulary(&infos, 2);
        assert_eq!(store.gallery_count(), 2);
        assert!(!store.get("Portrait.jpg").unwrap().relevant);
        assert!(store.get("City map of Ravenna.png").unwrap().relevant);
        assert!(store.get("Harbor schematic.svg").unwrap().relevant);
    }

    #[test]
    fn test_gallery_size_fill_prefers_keywords_then_size() {
        let infos = vec![
            image("Big unrelated.jpg", 9000),
            image("Ravenna street.jpg", 100),
            image("Small other.jpg", 50),
        ];
        let mut store = RelevanceStore::new();
        for info in &infos {
            store.seed(&info.title);
        }
        store.fill_gallery_by_size(&infos, &["ravenna".to_string()], 1);
        assert_eq!(store.gallery_count(), 1);
        assert!(store.get("Ravenna street.jpg").unwrap().relevant);
    }

    #[test]
    fn test_sorted_by_priority_then_discovery() {
        let mut store = RelevanceStore::new();
        store.seed("A.jpg");
        store.seed("B.jpg");
        store.seed("C.jpg");
        store.apply(Provenance::Classifier, verdict("B.jpg", true, Placement::Infobox));
        store.apply(Provenance::Classifier, verdict("A.jpg", true, Placement::Gallery));
        store.apply(Provenance::Classifier, verdict("C.jpg", true, Placement::Gallery));
        let sorted = store.into_sorted();
        let titles: Vec<_> = sorted.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["B.jpg", "A.jpg", "C.jpg"]);
    }
}
