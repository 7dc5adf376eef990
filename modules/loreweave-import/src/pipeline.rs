//! End-to-end import orchestration: authorization, page resolution,
//! multi-language aggregation, synthesis, media reconciliation, and the
//! final persistence pass.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use ai_client::TextGenerator;
use loreweave_common::config::ImportLimits;
use loreweave_common::error::ImportError;
use loreweave_common::types::{EntityKind, ImportReport};
use loreweave_store::files::FileStore;
use uuid::Uuid;

use crate::media;
use crate::resolver::{self, PageRef};
use crate::synthesizer;
use crate::traits::{ImportStore, WikiFetcher};
use crate::wikitext;
use crate::writer::{self, EntityDraft};
use crate::{aggregator, writer::Committed};

/// One import job as the API layer hands it over.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    /// Wiki language the page is looked up in.
    pub lang: String,
    pub page: PageRef,
    pub kind: EntityKind,
    /// Language the article is written in. Defaults to `lang`.
    pub output_lang: Option<String>,
    pub generate: bool,
    pub aggregate: bool,
    pub import_media: bool,
    pub publish: bool,
    /// Custom prompt template; placeholders are substituted when present.
    pub template: Option<String>,
    pub max_media_candidates: Option<usize>,
    pub max_media_bytes: Option<u64>,
}

/// Owns the pipeline's collaborators for the lifetime of the service.
pub struct Importer {
    fetcher: Arc<dyn WikiFetcher>,
    store: Arc<dyn ImportStore>,
    files: Arc<FileStore>,
    fallback_langs: Vec<String>,
    limits: ImportLimits,
}

impl Importer {
    pub fn new(
        fetcher: Arc<dyn WikiFetcher>,
        store: Arc<dyn ImportStore>,
        files: Arc<FileStore>,
        fallback_langs: Vec<String>,
        limits: ImportLimits,
    ) -> Self {
        Self {
            fetcher,
            store,
            files,
            fallback_langs,
            limits,
        }
    }

    /// Runs one import to completion. `generator` is the per-request
    /// generation backend; `None` forces the deterministic paths.
    pub async fn run(
        &self,
        generator: Option<Arc<dyn TextGenerator>>,
        request: ImportRequest,
    ) -> Result<ImportReport, ImportError> {
        if let PageRef::Title(title) = &request.page {
            if title.trim().is_empty() {
                return Err(ImportError::InvalidRequest("page title is empty".into()));
            }
        }
        let mut limits = self.limits.clone();
        if let Some(n) = request.max_media_candidates {
            limits.max_media_candidates = n;
        }
        if let Some(n) = request.max_media_bytes {
            limits.max_media_bytes = n;
        }

        let allowed = self
            .store
            .can_edit(request.workspace_id, request.user_id)
            .await
            .map_err(|e| ImportError::Database(e.to_string()))?;
        if !allowed {
            return Err(ImportError::Forbidden(format!(
                "user {} cannot edit workspace {}",
                request.user_id, request.workspace_id
            )));
        }

        let resolved = resolver::resolve(
            self.fetcher.as_ref(),
            &request.lang,
            &request.page,
            &self.fallback_langs,
        )
        .await
        .ok_or_else(|| {
            ImportError::NotFound(format!("{}: {}", request.lang, describe_page(&request.page)))
        })?;

        let output_lang = request
            .output_lang
            .clone()
            .unwrap_or_else(|| request.lang.clone());
        // A source in another language can only become an article in the
        // output language through generation.
        if resolved.page.lang != output_lang && !request.generate {
            return Err(ImportError::PolicyViolation(format!(
                "page resolved in '{}' but output language is '{}' and generation is disabled",
                resolved.page.lang, output_lang
            )));
        }

        let title = resolved.page.title.clone();
        let fallback_language = resolved.fallback.clone();

        let sources = if request.aggregate {
            aggregator::aggregate(self.fetcher.as_ref(), resolved.page, &output_lang, &limits).await
        } else {
            vec![resolved.page]
        };
        let placements = wikitext::parse_placements(&sources[0].wikitext);

        let generator_ref = generator.as_deref();
        let synthesis = if request.generate {
            if generator_ref.is_none() {
                return Err(ImportError::InvalidRequest(
                    "generation requested but no provider is configured".into(),
                ));
            }
            synthesizer::synthesize(
                generator_ref,
                &sources,
                &output_lang,
                request.template.as_deref(),
                &limits,
            )
            .await
            .map_err(|e| ImportError::Generation(e.to_string()))?
        } else {
            synthesizer::synthesize(None, &sources, &output_lang, None, &limits)
                .await
                .map_err(|e| ImportError::Generation(e.to_string()))?
        };

        let (infos, relevance) = if request.import_media {
            let infos = media::collect(self.fetcher.as_ref(), &sources, &placements, &limits).await;
            let relevance = media::classify(
                generator_ref,
                &infos,
                &title,
                request.kind,
                &sources[0].wikitext,
                &placements,
                &limits,
            )
            .await;
            (infos, relevance)
        } else {
            (Vec::new(), Vec::new())
        };

        let draft = EntityDraft {
            workspace_id: request.workspace_id,
            user_id: request.user_id,
            name: title,
            kind: request.kind,
            publish: request.publish,
        };
        let Committed {
            entity_id,
            article_id,
            revision_id,
            assets,
            gallery_count,
        } = writer::commit(
            self.fetcher.as_ref(),
            self.store.as_ref(),
            self.files.as_ref(),
            &draft,
            &synthesis.body,
            &relevance,
            &infos,
            &sources,
            request.import_media,
            synthesis.used_generation,
            &limits,
        )
        .await?;

        let report = ImportReport {
            entity_id,
            article_id,
            revision_id,
            workspace_id: request.workspace_id,
            source_count: sources.len(),
            assets_imported: assets.len(),
            gallery_count,
            used_generation: synthesis.used_generation,
            fallback_language,
            finished_at: Utc::now(),
        };
        info!(
            entity_id = %report.entity_id,
            sources = report.source_count,
            assets = report.assets_imported,
            generation = report.used_generation,
            "import complete"
        );
        Ok(report)
    }
}

fn describe_page(page: &PageRef) -> String {
    match page {
        PageRef::Id(id) => format!("page #{id}"),
        PageRef::Title(title) => title.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
