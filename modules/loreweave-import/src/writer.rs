//! Persists a finished import: entity, article, revision, media assets,
//! attribution records, and the audit trail.
//!
//! Failure policy: the entity, article, and revision writes are mandatory
//! and abort the import. Everything per-media is best-effort; a file that
//! fails to download or store is skipped with a warning and the rest of
//! the import proceeds.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use loreweave_common::config::ImportLimits;
use loreweave_common::error::ImportError;
use loreweave_common::text::{normalize_media_title, strip_file_prefix, topic_keywords};
use loreweave_common::types::{
    EntityKind, ImportedAsset, InfoboxMedia, MediaInfo, MediaRelevance, Placement, SourcePage,
    COMMONS_ORIGIN,
};
use loreweave_store::files::FileStore;
use loreweave_store::store::{
    NewArticle, NewArticleSource, NewAsset, NewAssetSource, NewAuditEntry, NewEntity,
};

use crate::media::collector;
use crate::media::relevance::GALLERY_FILL_PRIORITY;
use crate::traits::{ImportStore, WikiFetcher};

/// What the committed entity should look like.
#[derive(Debug, Clone)]
pub struct EntityDraft {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub kind: EntityKind,
    /// When false the article is created as a draft.
    pub publish: bool,
}

/// Row ids and imported media produced by [`commit`].
#[derive(Debug, Clone)]
pub struct Committed {
    pub entity_id: Uuid,
    pub article_id: Uuid,
    pub revision_id: Uuid,
    pub assets: Vec<ImportedAsset>,
    pub gallery_count: usize,
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// Writes one import to the store. `relevance` must already be sorted in
/// import order (ascending priority); `infos` carries the metadata for
/// every title that may appear in it.
#[allow(clippy::too_many_arguments)]
pub async fn commit(
    fetcher: &dyn WikiFetcher,
    store: &dyn ImportStore,
    files: &FileStore,
    draft: &EntityDraft,
    body: &str,
    relevance: &[MediaRelevance],
    infos: &[MediaInfo],
    sources: &[SourcePage],
    import_media: bool,
    used_generation: bool,
    limits: &ImportLimits,
) -> Result<Committed, ImportError> {
    let entity_id = store
        .create_entity(NewEntity {
            workspace_id: draft.workspace_id,
            name: draft.name.clone(),
            kind: draft.kind.as_str().to_string(),
        })
        .await
        .map_err(db)?;

    let article_id = store
        .create_article(NewArticle {
            workspace_id: draft.workspace_id,
            entity_id,
            title: draft.name.clone(),
            is_draft: !draft.publish,
            created_by: draft.user_id,
        })
        .await
        .map_err(db)?;

    let by_title: HashMap<String, &MediaInfo> = infos
        .iter()
        .map(|info| (normalize_media_title(&info.title), info))
        .collect();

    let mut assets: Vec<ImportedAsset> = Vec::new();
    for decision in relevance.iter().filter(|r| r.relevant) {
        let Some(info) = by_title.get(&normalize_media_title(&decision.title)) else {
            continue;
        };
        match import_one(fetcher, store, files, draft, decision, info).await {
            Ok(asset) => assets.push(asset),
            Err(err) => {
                warn!(title = %decision.title, error = %err, "media import failed, skipping");
            }
        }
    }

    if import_media {
        backfill_gallery(fetcher, store, files, draft, limits, &mut assets).await;
    }

    let final_body = rewrite_body(body, &assets);
    let revision_id = store
        .create_revision(article_id, &final_body, draft.user_id)
        .await
        .map_err(db)?;

    let portrait = assets
        .iter()
        .find(|a| a.placement == Placement::Infobox && a.mime.starts_with("image/"))
        .map(|a| a.asset_id);
    let side_media: Vec<InfoboxMedia> = assets
        .iter()
        .filter(|a| a.placement == Placement::Infobox && !a.mime.starts_with("image/"))
        .map(|a| InfoboxMedia {
            asset_id: a.asset_id,
            kind: if a.mime.starts_with("audio/") { "audio" } else { "video" }.to_string(),
            caption: a.caption.clone(),
        })
        .collect();
    store
        .set_entity_media(entity_id, portrait, &side_media)
        .await
        .map_err(db)?;

    for page in sources {
        let record = NewArticleSource {
            article_id,
            title: page.title.clone(),
            url: page.url.clone(),
            lang: page.lang.clone(),
            used_generation,
        };
        if let Err(err) = store.create_article_source(record).await {
            warn!(url = %page.url, error = %err, "failed to record article source");
        }
    }

    store
        .append_audit(NewAuditEntry {
            workspace_id: draft.workspace_id,
            user_id: draft.user_id,
            action: "wiki_import".to_string(),
            subject_id: Some(entity_id),
            detail: Some(json!({
                "source_url": sources.first().map(|p| p.url.clone()),
                "lang": sources.first().map(|p| p.lang.clone()),
                "source_count": sources.len(),
                "used_generation": used_generation,
            })),
        })
        .await;

    let gallery_count = assets
        .iter()
        .filter(|a| a.placement == Placement::Gallery)
        .count();

    Ok(Committed {
        entity_id,
        article_id,
        revision_id,
        assets,
        gallery_count,
    })
}

fn db(err: anyhow::Error) -> ImportError {
    ImportError::Database(err.to_string())
}

// ---------------------------------------------------------------------------
// Media import
// ---------------------------------------------------------------------------

/// Downloads one file, stores it, and writes the asset plus its source
/// record. Any step failing fails the whole item.
async fn import_one(
    fetcher: &dyn WikiFetcher,
    store: &dyn ImportStore,
    files: &FileStore,
    draft: &EntityDraft,
    decision: &MediaRelevance,
    info: &MediaInfo,
) -> anyhow::Result<ImportedAsset> {
    let bytes = fetcher.download(&info.url).await?;
    let file_name = strip_file_prefix(&info.title).replace(' ', "_");
    let path = files.put(draft.workspace_id, &file_name, &bytes).await?;

    let asset_id = store
        .create_asset(NewAsset {
            workspace_id: draft.workspace_id,
            file_name: file_name.clone(),
            mime_type: info.mime.clone(),
            storage_path: path.clone(),
            size_bytes: bytes.len() as i64,
            uploaded_by: draft.user_id,
        })
        .await?;
    store
        .create_asset_source(NewAssetSource {
            asset_id,
            source_url: info.url.clone(),
            author: info.author.clone(),
            license: info.license.clone(),
            license_url: info.license_url.clone(),
            attribution: info.attribution.clone(),
        })
        .await?;

    Ok(ImportedAsset {
        asset_id,
        title: info.title.clone(),
        mime: info.mime.clone(),
        placement: decision.placement,
        caption: decision.caption.clone(),
        section: decision.section.clone(),
        priority: decision.priority,
        path,
    })
}

/// Last-resort gallery fill. When the imported set still has fewer gallery
/// images than `gallery_min`, search Commons by topic and import qualifying
/// hits directly, without another classifier round.
async fn backfill_gallery(
    fetcher: &dyn WikiFetcher,
    store: &dyn ImportStore,
    files: &FileStore,
    draft: &EntityDraft,
    limits: &ImportLimits,
    assets: &mut Vec<ImportedAsset>,
) {
    let mut gallery = assets
        .iter()
        .filter(|a| a.placement == Placement::Gallery)
        .count();
    if gallery >= limits.gallery_min || assets.len() >= limits.max_media_candidates {
        return;
    }

    let hits = match fetcher
        .search_files(&draft.name, collector::FILE_SEARCH_LIMIT)
        .await
    {
        Ok(hits) => hits,
        Err(err) => {
            warn!(error = %err, "gallery backfill search failed");
            return;
        }
    };

    let mut have: HashSet<String> = assets
        .iter()
        .map(|a| normalize_media_title(&a.title))
        .collect();
    let keywords = topic_keywords(&draft.name);

    for hit in hits {
        if gallery >= limits.gallery_min || assets.len() >= limits.max_media_candidates {
            break;
        }
        let key = normalize_media_title(&hit.title);
        if key.is_empty() || have.contains(&key) || collector::denied(&key) {
            continue;
        }
        if !collector::matches_keywords(&key, &keywords) {
            continue;
        }
        let info = match fetcher.file_info(COMMONS_ORIGIN, &hit.title).await {
            Ok(Some(info)) => info,
            Ok(None) => continue,
            Err(err) => {
                warn!(title = %hit.title, error = %err, "gallery backfill metadata fetch failed");
                continue;
            }
        };
        if !info.is_image() || info.size_bytes > limits.max_media_bytes {
            continue;
        }
        if info.width.max(info.height) < limits.min_image_px {
            continue;
        }

        let decision = MediaRelevance {
            title: info.title.clone(),
            relevant: true,
            placement: Placement::Gallery,
            caption: None,
            section: None,
            priority: GALLERY_FILL_PRIORITY,
        };
        match import_one(fetcher, store, files, draft, &decision, &info).await {
            Ok(asset) => {
                have.insert(key);
                gallery += 1;
                assets.push(asset);
            }
            Err(err) => {
                warn!(title = %hit.title, error = %err, "gallery backfill import failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Body rewriting
// ---------------------------------------------------------------------------

/// Splices imported media references into the article body. Inline images
/// land directly under their section heading; everything else that belongs
/// in the document collects into a `## Reference Gallery` section placed
/// before `## Sources`. Infobox media never appears in the body.
pub fn rewrite_body(body: &str, assets: &[ImportedAsset]) -> String {
    let mut lines: Vec<String> = body.lines().map(str::to_string).collect();
    let mut gallery: Vec<&ImportedAsset> = Vec::new();

    for asset in assets {
        if !asset.mime.starts_with("image/") {
            continue;
        }
        match asset.placement {
            Placement::Inline => {
                if !splice_inline(&mut lines, asset) {
                    // No matching heading; keep the image visible anyway.
                    gallery.push(asset);
                }
            }
            Placement::Gallery => gallery.push(asset),
            Placement::Infobox | Placement::Exclude => {}
        }
    }

    if !gallery.is_empty() {
        insert_gallery(&mut lines, &gallery);
    }
    lines.join("\n")
}

/// Inserts the image right after the first `## <section>` heading that
/// matches the asset's target section, case-insensitively. Returns false
/// when no heading matches.
fn splice_inline(lines: &mut Vec<String>, asset: &ImportedAsset) -> bool {
    let Some(section) = asset.section.as_deref() else {
        return false;
    };
    let wanted = section.trim().to_lowercase();
    let pos = lines.iter().position(|line| {
        let t = line.trim();
        t.starts_with("## ") && t[3..].trim().to_lowercase() == wanted
    });
    match pos {
        Some(i) => {
            lines.insert(i + 1, image_markdown(asset));
            lines.insert(i + 2, String::new());
            true
        }
        None => false,
    }
}

fn insert_gallery(lines: &mut Vec<String>, gallery: &[&ImportedAsset]) {
    let mut section = vec!["## Reference Gallery".to_string(), String::new()];
    for asset in gallery {
        section.push(image_markdown(asset));
        section.push(String::new());
    }

    // The terminal sources heading, matched exactly so content headings
    // that merely start with "## Sources" do not attract the gallery.
    let sources = lines
        .iter()
        .rposition(|line| line.trim().to_lowercase() == "## sources");
    match sources {
        Some(i) => {
            for (offset, line) in section.into_iter().enumerate() {
                lines.insert(i + offset, line);
            }
        }
        None => {
            if !lines.last().is_some_and(|l| l.is_empty()) {
                lines.push(String::new());
            }
            lines.extend(section);
        }
    }
}

fn image_markdown(asset: &ImportedAsset) -> String {
    let alt = asset
        .caption
        .as_deref()
        .unwrap_or_else(|| strip_file_prefix(&asset.title));
    format!("![{}](/assets/{})", alt, asset.asset_id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
