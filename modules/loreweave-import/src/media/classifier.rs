// Media relevance classification.
//
// One structured call decides every candidate at once. A transport or API
// failure keeps only the first candidate; a response that does not match the
// schema counts as zero verdicts and falls back to the plain heuristic. The
// reconciliation passes run after every path.

use ai_client::{GenerationRequest, StructuredOutput, TextGenerator};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use loreweave_common::config::ImportLimits;
use loreweave_common::text::{topic_keywords, truncate_chars};
use loreweave_common::types::{EntityKind, ImagePlacement, MediaInfo, MediaRelevance, Placement};

use super::relevance::{Provenance, RelevanceStore};

const CLASSIFIER_ROLE: &str =
    "You select which media files belong in an encyclopedia article about a given subject.";

const HEURISTIC_GALLERY_SLOTS: usize = 4;
const WIKITEXT_PROMPT_CAP: usize = 6000;

#[derive(Debug, Deserialize, JsonSchema)]
struct MediaVerdicts {
    /// One verdict per candidate file.
    verdicts: Vec<MediaVerdict>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MediaVerdict {
    /// Candidate file title exactly as listed.
    title: String,
    relevant: bool,
    /// One of: infobox, inline, gallery, exclude.
    placement: String,
    /// Short display caption, when relevance is clear.
    caption: Option<String>,
    /// Target section name for inline placements.
    section: Option<String>,
    /// Lower imports first. Omit to use the bucket default.
    priority: Option<i32>,
}

/// Decide relevance and placement for every candidate. Always returns one
/// record per candidate, ascending by priority with discovery order as the
/// tiebreak.
pub async fn classify(
    generator: Option<&dyn TextGenerator>,
    infos: &[MediaInfo],
    topic_title: &str,
    kind: EntityKind,
    wikitext: &str,
    placements: &[ImagePlacement],
    limits: &ImportLimits,
) -> Vec<MediaRelevance> {
    let mut store = RelevanceStore::new();
    for info in infos {
        store.seed(&info.title);
    }

    let mut decided = false;
    if let Some(generator) = generator {
        match model_verdicts(generator, infos, topic_title, kind, wikitext, placements).await {
            Ok(verdicts) if !verdicts.is_empty() => {
                for v in verdicts {
                    store.apply(Provenance::Classifier, v);
                }
                decided = true;
            }
            Ok(_) => debug!("classifier returned no verdicts, using heuristics"),
            Err(err) => {
                // Backend failure: keep only the first candidate and let the
                // reconciliation passes restore minimum coverage.
                warn!(error = %err, "media classification failed, keeping first candidate");
                if let Some(first) = infos.first() {
                    store.apply(
                        Provenance::Heuristic,
                        MediaRelevance {
                            title: first.title.clone(),
                            relevant: true,
                            placement: Placement::Infobox,
                            caption: None,
                            section: None,
                            priority: Placement::Infobox.default_priority(),
                        },
                    );
                }
                decided = true;
            }
        }
    }
    if !decided {
        heuristic_defaults(&mut store, infos);
    }

    store.backstop_infobox_av(infos);
    store.apply_placements(placements);
    store.backstop_portrait(infos);
    let keywords = topic_keywords(topic_title);
    store.fill_gallery_by_vocabulary(infos, limits.gallery_min);
    store.fill_gallery_by_size(infos, &keywords, limits.gallery_min);

    store.into_sorted()
}

/// No backend: first candidate carries the infobox, the next four fill the
/// gallery, the rest are excluded.
fn heuristic_defaults(store: &mut RelevanceStore, infos: &[MediaInfo]) {
    for (i, info) in infos.iter().enumerate() {
        let placement = if i == 0 {
            Placement::Infobox
        } else if i <= HEURISTIC_GALLERY_SLOTS {
            Placement::Gallery
        } else {
            Placement::Exclude
        };
        store.apply(
            Provenance::Heuristic,
            MediaRelevance {
                title: info.title.clone(),
                relevant: placement != Placement::Exclude,
                placement,
                caption: None,
                section: None,
                priority: placement.default_priority(),
            },
        );
    }
}

async fn model_verdicts(
    generator: &dyn TextGenerator,
    infos: &[MediaInfo],
    topic_title: &str,
    kind: EntityKind,
    wikitext: &str,
    placements: &[ImagePlacement],
) -> anyhow::Result<Vec<MediaRelevance>> {
    let prompt = classification_prompt(infos, topic_title, kind, wikitext, placements);
    let value = generator
        .generate_json(
            GenerationRequest::new(prompt).system(CLASSIFIER_ROLE),
            MediaVerdicts::response_schema(),
        )
        .await?;

    // A shape mismatch is "no verdicts", not an error.
    match serde_json::from_value::<MediaVerdicts>(value) {
        Ok(parsed) => Ok(parsed.verdicts.into_iter().map(to_relevance).collect()),
        Err(err) => {
            warn!(error = %err, "classifier response did not match schema");
            Ok(Vec::new())
        }
    }
}

fn to_relevance(v: MediaVerdict) -> MediaRelevance {
    let placement = parse_placement(&v.placement);
    MediaRelevance {
        title: v.title,
        relevant: v.relevant && placement != Placement::Exclude,
        placement,
        caption: v.caption.filter(|c| !c.trim().is_empty()),
        section: v.section.filter(|s| !s.trim().is_empty()),
        priority: v.priority.unwrap_or_else(|| placement.default_priority()),
    }
}

fn parse_placement(s: &str) -> Placement {
    match s.trim().to_lowercase().as_str() {
        "infobox" => Placement::Infobox,
        "inline" => Placement::Inline,
        "gallery" => Placement::Gallery,
        _ => Placement::Exclude,
    }
}

fn classification_prompt(
    infos: &[MediaInfo],
    topic_title: &str,
    kind: EntityKind,
    wikitext: &str,
    placements: &[ImagePlacement],
) -> String {
    let candidates = infos
        .iter()
        .map(|i| {
            format!(
                "- {} ({}, {}x{}, {} bytes)",
                i.title, i.mime, i.width, i.height, i.size_bytes
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let declared = if placements.is_empty() {
        "(none)".to_string()
    } else {
        placements
            .iter()
            .map(|p| {
                let bucket = if p.infobox {
                    "infobox".to_string()
                } else {
                    match &p.section {
                        Some(s) => format!("inline, section \"{s}\""),
                        None => "inline".to_string(),
                    }
                };
                format!("- {} -> {}", p.file, bucket)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Decide placement for each candidate media file of the article \"{topic_title}\" ({kind}).\n\n\
         Buckets: infobox (the single cover image, or an audio/video highlight), inline (belongs \
         beside a specific section), gallery (supporting reference imagery), exclude (unrelated, \
         decorative, or redundant).\n\n\
         Rules:\n\
         - Judge only from the file titles, dimensions, and the article markup below.\n\
         - Return one verdict per candidate, with the title exactly as listed.\n\
         - Suggest a short caption when relevance is clear.\n\
         - Name the target section for inline placements.\n\n\
         Candidates:\n{candidates}\n\n\
         Placements already declared by the markup:\n{declared}\n\n\
         Article markup (truncated):\n{markup}",
        markup = truncate_chars(wikitext, WIKITEXT_PROMPT_CAP),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGenerator;
    use serde_json::json;

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

    fn six_images() -> Vec<MediaInfo> {
        (0..6).map(|i| image(&format!("Img{i}.jpg"), 1000 + i)).collect()
    }

    fn limits() -> ImportLimits {
        ImportLimits::default()
    }

    #[tokio::test]
    async fn test_heuristic_defaults_without_backend() {
        let infos = six_images();
        let results = classify(
            None,
            &infos,
            "Topic",
            EntityKind::Location,
            "",
            &[],
            &limits(),
        )
        .await;

        assert_eq!(results.len(), 6);
        assert_eq!(results[0].title, "Img0.jpg");
        assert_eq!(results[0].placement, Placement::Infobox);
        assert!(results[0].relevant);
        for r in &results[1..5] {
            assert_eq!(r.placement, Placement::Gallery);
            assert!(r.relevant);
        }
        assert_eq!(results[5].title, "Img5.jpg");
        assert!(!results[5].relevant);
    }

    #[tokio::test]
    async fn test_model_verdicts_applied() {
        let infos = vec![image("Cover.jpg", 10), image("Detail.jpg", 20)];
        let generator = MockGenerator::with_json(vec![Ok(json!({
            "verdicts": [
                {"title": "Cover.jpg", "relevant": true, "placement": "infobox",
                 "caption": "The cover", "section": null, "priority": null},
                {"title": "Detail.jpg", "relevant": true, "placement": "inline",
                 "caption": null, "section": "Design", "priority": null}
            ]
        }))]);
        let results = classify(
            Some(&generator),
            &infos,
            "Topic",
            EntityKind::Item,
            "",
            &[],
            &limits(),
        )
        .await;

        let cover = results.iter().find(|r| r.title == "Cover.jpg").unwrap();
        assert_eq!(cover.placement, Placement::Infobox);
        assert_eq!(cover.caption.as_deref(), Some("The cover"));
        let detail = results.iter().find(|r| r.title == "Detail.jpg").unwrap();
        assert_eq!(detail.placement, Placement::Inline);
        assert_eq!(detail.section.as_deref(), Some("Design"));
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_first_candidate() {
        let infos = six_images();
        let generator = MockGenerator::with_json(vec![Err("api down".to_string())]);
        let results = classify(
            Some(&generator),
            &infos,
            "Topic",
            EntityKind::Location,
            "",
            &[],
            &limits(),
        )
        .await;

        let first = results.iter().find(|r| r.title == "Img0.jpg").unwrap();
        assert!(first.relevant);
        assert_eq!(first.placement, Placement::Infobox);
        // The gallery fill passes still restore minimum coverage afterward.
        let gallery = results
            .iter()
            .filter(|r| r.relevant && r.placement == Placement::Gallery)
            .count();
        assert_eq!(gallery, limits().gallery_min);
    }

    #[tokio::test]
    async fn test_unparseable_response_falls_back_to_heuristics() {
        let infos = six_images();
        let generator =
            MockGenerator::with_json(vec![Ok(json!({"unexpected": "shape"}))]);
        let results = classify(
            Some(&generator),
            &infos,
            "Topic",
            EntityKind::Location,
            "",
            &[],
            &limits(),
        )
        .await;

        let relevant = results.iter().filter(|r| r.relevant).count();
        assert_eq!(relevant, 1 + HEURISTIC_GALLERY_SLOTS);
        assert_eq!(results[0].placement, Placement::Infobox);
    }

    #[tokio::test]
    async fn test_markup_placement_outranks_model_exclusion() {
        let infos = vec![image("Pinned.jpg", 10), image("Other.jpg", 20)];
        let generator = MockGenerator::with_json(vec![Ok(json!({
            "verdicts": [
                {"title": "Pinned.jpg", "relevant": false, "placement": "exclude",
                 "caption": null, "section": null, "priority": null},
                {"title": "Other.jpg", "relevant": true, "placement": "infobox",
                 "caption": null, "section": null, "priority": null}
            ]
        }))]);
        let placements = vec![ImagePlacement {
            file: "Pinned.jpg".to_string(),
            caption: "From the markup".to_string(),
            infobox: true,
            section: None,
        }];
        let results = classify(
            Some(&generator),
            &infos,
            "Topic",
            EntityKind::Location,
            "",
            &placements,
            &limits(),
        )
        .await;

        let pinned = results.iter().find(|r| r.title == "Pinned.jpg").unwrap();
        assert!(pinned.relevant);
        assert_eq!(pinned.placement, Placement::Infobox);
        assert_eq!(pinned.caption.as_deref(), Some("From the markup"));
        assert_eq!(pinned.priority, 1);
    }
}
