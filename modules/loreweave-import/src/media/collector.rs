// Media candidate collection and enrichment.
//
// Candidates come from the base page's primary image, the markup placements,
// and every file referenced by any source page. UI chrome is filtered by a
// static keyword denylist; thin coverage triggers a topic search against the
// shared repository, once before enrichment and once after.

use std::collections::HashSet;

use tracing::{debug, warn};

use loreweave_common::config::ImportLimits;
use loreweave_common::text::{normalize_media_title, topic_keywords};
use loreweave_common::types::{
    ImagePlacement, MediaCandidate, MediaInfo, SourcePage, COMMONS_ORIGIN,
};

use crate::traits::WikiFetcher;

pub(crate) const FILE_SEARCH_LIMIT: u32 = 10;

/// Site furniture and meta assets that never belong in an article, matched
/// by substring against the normalized title.
const UI_DENYLIST: &[&str] = &[
    "logo",
    "icon",
    "wikimedia",
    "wikibooks",
    "wikiquote",
    "wikisource",
    "wiktionary",
    "wikidata",
    "wikinews",
    "wikiversity",
    "wikivoyage",
    "disambig",
    "ambox",
    "padlock",
    "question book",
    "magnify",
    "loudspeaker",
    "edit-clear",
    "red pencil",
    "symbol support",
    "placeholder",
    "arrow",
    "chevron",
    "bullet",
    "button",
];

pub(crate) fn denied(title: &str) -> bool {
    let normalized = normalize_media_title(title);
    UI_DENYLIST.iter().any(|k| normalized.contains(k))
}

/// Union all file references across the sources, deduplicated by normalized
/// title and prefiltered by the UI denylist. Discovery order: base page's
/// primary image, markup placements, then per-source reference lists.
pub fn collect_candidates(
    sources: &[SourcePage],
    placements: &[ImagePlacement],
) -> Vec<MediaCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<MediaCandidate> = Vec::new();
    let base_lang = sources.first().map(|s| s.lang.as_str()).unwrap_or("en");

    if let Some(primary) = sources.first().and_then(|s| s.page_image.as_deref()) {
        add(base_lang, primary, &mut seen, &mut out);
    }
    for p in placements {
        add(base_lang, &p.file, &mut seen, &mut out);
    }
    for s in sources {
        for title in &s.image_titles {
            add(&s.lang, title, &mut seen, &mut out);
        }
    }
    out
}

fn add(origin: &str, title: &str, seen: &mut HashSet<String>, out: &mut Vec<MediaCandidate>) {
    let key = normalize_media_title(title);
    if key.is_empty() || seen.contains(&key) || denied(title) {
        return;
    }
    seen.insert(key);
    out.push(MediaCandidate {
        origin: origin.to_string(),
        title: title.to_string(),
    });
}

/// Full collection pass: candidates, coverage backfill, truncation to the
/// candidate cap, metadata enrichment with size/dimension filtering, and a
/// final backfill directly against enriched metadata if coverage is still
/// thin.
pub async fn collect(
    fetcher: &dyn WikiFetcher,
    sources: &[SourcePage],
    placements: &[ImagePlacement],
    limits: &ImportLimits,
) -> Vec<MediaInfo> {
    let mut candidates = collect_candidates(sources, placements);
    let topic = sources.first().map(|s| s.title.as_str()).unwrap_or_default();
    let keywords = topic_keywords(topic);
    let threshold = limits.coverage_threshold();

    if candidates.len() < threshold {
        debug!(
            count = candidates.len(),
            threshold, "thin candidate coverage, searching media repository"
        );
        backfill_candidates(fetcher, topic, &keywords, &mut candidates).await;
    }
    candidates.truncate(limits.max_media_candidates);

    let mut infos: Vec<MediaInfo> = Vec::new();
    for candidate in &candidates {
        let Some(info) = lookup_info(fetcher, candidate).await else {
            continue;
        };
        if info.size_bytes > limits.max_media_bytes {
            debug!(title = %info.title, size = info.size_bytes, "dropping oversized file");
            continue;
        }
        if suppressed_by_dimensions(&info, placements, limits) {
            debug!(title = %info.title, "dropping small image");
            continue;
        }
        infos.push(info);
    }

    if infos.len() < threshold {
        backfill_infos(fetcher, topic, &keywords, placements, limits, &mut infos).await;
    }

    infos
}

/// Try the candidate's origin wiki first, then the shared repository.
async fn lookup_info(fetcher: &dyn WikiFetcher, candidate: &MediaCandidate) -> Option<MediaInfo> {
    match fetcher.file_info(&candidate.origin, &candidate.title).await {
        Ok(Some(info)) => return Some(info),
        Ok(None) => {}
        Err(err) => {
            warn!(title = %candidate.title, origin = %candidate.origin, error = %err, "file info fetch failed")
        }
    }
    if candidate.origin != COMMONS_ORIGIN {
        match fetcher.file_info(COMMONS_ORIGIN, &candidate.title).await {
            Ok(info) => return info,
            Err(err) => {
                warn!(title = %candidate.title, error = %err, "commons file info fetch failed")
            }
        }
    }
    None
}

/// Small images are dropped unless the markup placed them explicitly.
fn suppressed_by_dimensions(
    info: &MediaInfo,
    placements: &[ImagePlacement],
    limits: &ImportLimits,
) -> bool {
    if !info.is_image() {
        return false;
    }
    if info.width.max(info.height) >= limits.min_image_px {
        return false;
    }
    let key = normalize_media_title(&info.title);
    let placed = placements
        .iter()
        .any(|p| normalize_media_title(&p.file) == key);
    !placed
}

async fn backfill_candidates(
    fetcher: &dyn WikiFetcher,
    topic: &str,
    keywords: &[String],
    candidates: &mut Vec<MediaCandidate>,
) {
    let hits = match fetcher.search_files(topic, FILE_SEARCH_LIMIT).await {
        Ok(hits) => hits,
        Err(err) => {
            warn!(topic, error = %err, "media repository search failed");
            return;
        }
    };
    let mut seen: HashSet<String> = candidates
        .iter()
        .map(|c| normalize_media_title(&c.title))
        .collect();
    for hit in hits {
        if denied(&hit.title) || !matches_keywords(&hit.title, keywords) {
            continue;
        }
        if !seen.insert(normalize_media_title(&hit.title)) {
            continue;
        }
        candidates.push(MediaCandidate {
            origin: COMMONS_ORIGIN.to_string(),
            title: hit.title,
        });
    }
}

async fn backfill_infos(
    fetcher: &dyn WikiFetcher,
    topic: &str,
    keywords: &[String],
    placements: &[ImagePlacement],
    limits: &ImportLimits,
    infos: &mut Vec<MediaInfo>,
) {
    let hits = match fetcher.search_files(topic, FILE_SEARCH_LIMIT).await {
        Ok(hits) => hits,
        Err(err) => {
            warn!(topic, error = %err, "media repository search failed");
            return;
        }
    };
    let mut seen: HashSet<String> = infos
        .iter()
        .map(|i| normalize_media_title(&i.title))
        .collect();
    let threshold = limits.coverage_threshold();
    for hit in hits {
        if infos.len() >= threshold || infos.len() >= limits.max_media_candidates {
            break;
        }
        if denied(&hit.title) || !matches_keywords(&hit.title, keywords) {
            continue;
        }
        if !seen.insert(normalize_media_title(&hit.title)) {
            continue;
        }
        match fetcher.file_info(COMMONS_ORIGIN, &hit.title).await {
            Ok(Some(info)) => {
                if info.size_bytes > limits.max_media_bytes
                    || suppressed_by_dimensions(&info, placements, limits)
                {
                    continue;
                }
                infos.push(info);
            }
            Ok(None) => {}
            Err(err) => warn!(title = %hit.title, error = %err, "file info fetch failed"),
        }
    }
}

/// With no significant topic keywords every hit passes; otherwise the title
/// must contain at least one to keep unrelated top hits out.
pub(crate) fn matches_keywords(title: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let normalized = normalize_media_title(title);
    keywords.iter().any(|k| normalized.contains(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWiki;
    use loreweave_common::types::SearchHit;

    fn source_with_images(lang: &str, title: &str, images: &[&str]) -> SourcePage {
        SourcePage {
            lang: lang.to_string(),
            page_id: 1,
            title: title.to_string(),
            url: format!("https://{lang}.example.org/wiki/{title}"),
            extract: String::new(),
            wikitext: String::new(),
            page_image: None,
            image_titles: images.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn info(title: &str, mime: &str, width: u32, height: u32, size: u64) -> MediaInfo {
        MediaInfo {
            title: title.to_string(),
            url: format!("https://upload.example/{title}"),
            mime: mime.to_string(),
            width,
            height,
            size_bytes: size,
            author: None,
            license: None,
            license_url: None,
            attribution: None,
            origin: "en".to_string(),
        }
    }

    #[test]
    fn test_denylist_filters_ui_chrome() {
        // Two of three raw candidates match the "logo" keyword.
        let sources = vec![source_with_images(
            "en",
            "Ravenna",
            &[
                "File:Site-logo.svg",
                "File:Ravenna street.jpg",
                "File:Old logo variant.png",
            ],
        )];
        let candidates = collect_candidates(&sources, &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "File:Ravenna street.jpg");
    }

    #[test]
    fn test_dedup_across_casing_and_prefix() {
        let sources = vec![
            source_with_images("en", "Ravenna", &["File:Tower.jpg", "tower.JPG"]),
            source_with_images("de", "Ravenna", &["Datei:Tower.jpg"]),
        ];
        let candidates = collect_candidates(&sources, &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].origin, "en");
    }

    #[test]
    fn test_primary_image_and_placements_come_first() {
        let mut base = source_with_images("en", "Ravenna", &["File:Other.jpg"]);
        base.page_image = Some("Lead.jpg".to_string());
        let placements = vec![ImagePlacement {
            file: "Mosaic.jpg".to_string(),
            caption: String::new(),
            infobox: false,
            section: Some("History".to_string()),
        }];
        let candidates = collect_candidates(&[base], &placements);
        let titles: Vec<_> = candidates.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Lead.jpg", "Mosaic.jpg", "File:Other.jpg"]);
    }

    #[tokio::test]
    async fn test_collect_drops_oversized_and_small_files() {
        let limits = ImportLimits::default();
        let wiki = MockWiki::new()
            .with_file_info(info("Big.jpg", "image/jpeg", 2000, 1500, limits.max_media_bytes + 1))
            .with_file_info(info("Tiny.png", "image/png", 40, 40, 512))
            .with_file_info(info("Good.jpg", "image/jpeg", 1200, 800, 100_000));
        let sources = vec![source_with_images(
            "en",
            "Ravenna",
            &["Big.jpg", "Tiny.png", "Good.jpg"],
        )];
        let infos = collect(&wiki, &sources, &[], &limits).await;
        let titles: Vec<_> = infos.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Good.jpg"]);
    }

    #[tokio::test]
    async fn test_placed_image_exempt_from_dimension_rule() {
        let limits = ImportLimits::default();
        let wiki = MockWiki::new().with_file_info(info("Seal.png", "image/png", 60, 60, 512));
        let sources = vec![source_with_images("en", "Ravenna", &["Seal.png"])];
        let placements = vec![ImagePlacement {
            file: "Seal.png".to_string(),
            caption: "City seal".to_string(),
            infobox: true,
            section: None,
        }];
        let infos = collect(&wiki, &sources, &placements, &limits).await;
        assert_eq!(infos.len(), 1);
    }

    #[tokio::test]
    async fn test_backfill_respects_topic_keywords() {
        let limits = ImportLimits::default();
        let wiki = MockWiki::new()
            .with_file_search(vec![
                SearchHit {
                    page_id: 1,
                    title: "File:Ravenna mosaic.jpg".to_string(),
                },
                SearchHit {
                    page_id: 2,
                    title: "File:Unrelated cat.jpg".to_string(),
                },
            ])
            .with_file_info(info("Ravenna mosaic.jpg", "image/jpeg", 900, 700, 50_000));
        let sources = vec![source_with_images("en", "Ravenna", &[])];
        let infos = collect(&wiki, &sources, &[], &limits).await;
        let titles: Vec<_> = infos.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Ravenna mosaic.jpg"]);
    }
}
