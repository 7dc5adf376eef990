// Test mocks for the import pipeline.
//
// Three mocks matching the trait boundaries:
// - MockWiki (WikiFetcher) — HashMap-based page/search/file fixtures
// - MockImportStore (ImportStore) — stateful in-memory rows
// - MockGenerator (TextGenerator) — scripted reply queues
//
// Plus helpers for building SourcePage, SearchHit and LangLink fixtures.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use ai_client::{GenerationRequest, TextGenerator};
use loreweave_common::text::normalize_media_title;
use loreweave_common::types::{InfoboxMedia, LangLink, MediaInfo, SearchHit, SourcePage};
use loreweave_store::store::{
    NewArticle, NewArticleSource, NewAsset, NewAssetSource, NewAuditEntry, NewEntity,
};

use crate::traits::{ImportStore, WikiFetcher};

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

/// A minimal but realistic source page.
pub fn page_with(lang: &str, id: u64, title: &str) -> SourcePage {
    SourcePage {
        lang: lang.to_string(),
        page_id: id,
        title: title.to_string(),
        url: format!("https://{lang}.wikipedia.org/wiki/{}", title.replace(' ', "_")),
        extract: format!(
            "{title} is a subject with a long recorded history. \
             It appears in many contemporary accounts."
        ),
        wikitext: String::new(),
        page_image: None,
        image_titles: Vec::new(),
    }
}

pub fn hit(page_id: u64, title: &str) -> SearchHit {
    SearchHit {
        page_id,
        title: title.to_string(),
    }
}

pub fn langlink(lang: &str, title: &str) -> LangLink {
    LangLink {
        lang: lang.to_string(),
        title: title.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MockWiki
// ---------------------------------------------------------------------------

/// HashMap-based wiki. Unregistered lookups return empty results, never
/// errors; downloads succeed with the URL bytes unless a failure substring
/// matches. Builder pattern: `.with_page()`, `.with_search_hits()`,
/// `.with_langlinks()`, `.with_file_info()`, `.with_file_search()`.
#[derive(Default)]
pub struct MockWiki {
    pages_by_title: HashMap<(String, String), SourcePage>,
    pages_by_id: HashMap<(String, u64), SourcePage>,
    searches: HashMap<(String, String), Vec<SearchHit>>,
    langlinks: HashMap<(String, String), Vec<LangLink>>,
    /// Keyed by normalized title; origin is ignored on lookup.
    file_infos: HashMap<String, MediaInfo>,
    /// One shared result list, returned for every file search query.
    file_search: Vec<SearchHit>,
    failing_downloads: Vec<String>,
}

impl MockWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: SourcePage) -> Self {
        self.pages_by_id
            .insert((page.lang.clone(), page.page_id), page.clone());
        self.pages_by_title
            .insert((page.lang.clone(), page.title.clone()), page);
        self
    }

    pub fn with_search_hits(mut self, lang: &str, query: &str, hits: Vec<SearchHit>) -> Self {
        self.searches
            .insert((lang.to_string(), query.to_string()), hits);
        self
    }

    pub fn with_langlinks(mut self, lang: &str, title: &str, links: Vec<LangLink>) -> Self {
        self.langlinks
            .insert((lang.to_string(), title.to_string()), links);
        self
    }

    pub fn with_file_info(mut self, info: MediaInfo) -> Self {
        self.file_infos
            .insert(normalize_media_title(&info.title), info);
        self
    }

    pub fn with_file_search(mut self, hits: Vec<SearchHit>) -> Self {
        self.file_search = hits;
        self
    }

    /// Fail every download whose URL contains `fragment`.
    pub fn failing_download(mut self, fragment: &str) -> Self {
        self.failing_downloads.push(fragment.to_string());
        self
    }
}

#[async_trait]
impl WikiFetcher for MockWiki {
    async fn search(&self, lang: &str, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let mut hits = self
            .searches
            .get(&(lang.to_string(), query.to_string()))
            .cloned()
            .unwrap_or_default();
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn page_by_title(&self, lang: &str, title: &str) -> Result<Option<SourcePage>> {
        Ok(self
            .pages_by_title
            .get(&(lang.to_string(), title.to_string()))
            .cloned())
    }

    async fn page_by_id(&self, lang: &str, page_id: u64) -> Result<Option<SourcePage>> {
        Ok(self.pages_by_id.get(&(lang.to_string(), page_id)).cloned())
    }

    async fn langlinks(&self, lang: &str, title: &str) -> Result<Vec<LangLink>> {
        Ok(self
            .langlinks
            .get(&(lang.to_string(), title.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn file_info(&self, _origin: &str, title: &str) -> Result<Option<MediaInfo>> {
        Ok(self.file_infos.get(&normalize_media_title(title)).cloned())
    }

    async fn search_files(&self, _query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let mut hits = self.file_search.clone();
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn download(&self, url: &str) -> Result<bytes::Bytes> {
        if self.failing_downloads.iter().any(|f| url.contains(f)) {
            bail!("download failed: {url}");
        }
        Ok(bytes::Bytes::from(url.as_bytes().to_vec()))
    }
}

// ---------------------------------------------------------------------------
// MockImportStore
// ---------------------------------------------------------------------------

/// Inner mutable state for MockImportStore.
#[derive(Default)]
struct MockImportStoreInner {
    allowed: HashSet<(Uuid, Uuid)>,
    entities: Vec<(Uuid, NewEntity)>,
    articles: Vec<(Uuid, NewArticle)>,
    /// (revision_id, article_id, body, created_by)
    revisions: Vec<(Uuid, Uuid, String, Uuid)>,
    assets: Vec<(Uuid, NewAsset)>,
    asset_sources: Vec<NewAssetSource>,
    article_sources: Vec<NewArticleSource>,
    entity_media: Option<(Uuid, Option<Uuid>, Vec<InfoboxMedia>)>,
    audits: Vec<NewAuditEntry>,
}

/// Stateful in-memory store. Cloning yields a handle onto the same rows, so
/// tests keep a probe while the pipeline owns the store.
#[derive(Clone, Default)]
pub struct MockImportStore {
    inner: Arc<Mutex<MockImportStoreInner>>,
}

impl MockImportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `user_id` edit rights on `workspace_id`.
    pub fn allow(self, workspace_id: Uuid, user_id: Uuid) -> Self {
        self.inner
            .lock()
            .unwrap()
            .allowed
            .insert((workspace_id, user_id));
        self
    }

    pub fn entity_count(&self) -> usize {
        self.inner.lock().unwrap().entities.len()
    }

    pub fn entity_kinds(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.entities.iter().map(|(_, e)| e.kind.clone()).collect()
    }

    pub fn article_count(&self) -> usize {
        self.inner.lock().unwrap().articles.len()
    }

    pub fn article_is_draft(&self) -> Vec<bool> {
        let inner = self.inner.lock().unwrap();
        inner.articles.iter().map(|(_, a)| a.is_draft).collect()
    }

    pub fn revision_count(&self) -> usize {
        self.inner.lock().unwrap().revisions.len()
    }

    pub fn last_revision_body(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.revisions.last().map(|(_, _, body, _)| body.clone())
    }

    pub fn asset_count(&self) -> usize {
        self.inner.lock().unwrap().assets.len()
    }

    pub fn asset_file_names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.assets.iter().map(|(_, a)| a.file_name.clone()).collect()
    }

    pub fn asset_source_count(&self) -> usize {
        self.inner.lock().unwrap().asset_sources.len()
    }

    pub fn article_source_count(&self) -> usize {
        self.inner.lock().unwrap().article_sources.len()
    }

    pub fn article_source_langs(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.article_sources.iter().map(|s| s.lang.clone()).collect()
    }

    pub fn article_source_used_generation(&self) -> Vec<bool> {
        let inner = self.inner.lock().unwrap();
        inner
            .article_sources
            .iter()
            .map(|s| s.used_generation)
            .collect()
    }

    pub fn entity_media(&self) -> Option<(Option<Uuid>, Vec<InfoboxMedia>)> {
        let inner = self.inner.lock().unwrap();
        inner
            .entity_media
            .as_ref()
            .map(|(_, portrait, media)| (*portrait, media.clone()))
    }

    pub fn audit_actions(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.audits.iter().map(|a| a.action.clone()).collect()
    }

    pub fn audit_details(&self) -> Vec<serde_json::Value> {
        let inner = self.inner.lock().unwrap();
        inner
            .audits
            .iter()
            .filter_map(|a| a.detail.clone())
            .collect()
    }
}

#[async_trait]
impl ImportStore for MockImportStore {
    async fn can_edit(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.allowed.contains(&(workspace_id, user_id)))
    }

    async fn create_entity(&self, entity: NewEntity) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().entities.push((id, entity));
        Ok(id)
    }

    async fn create_article(&self, article: NewArticle) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().articles.push((id, article));
        Ok(id)
    }

    async fn create_revision(
        &self,
        article_id: Uuid,
        body: &str,
        created_by: Uuid,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.inner
            .lock()
            .unwrap()
            .revisions
            .push((id, article_id, body.to_string(), created_by));
        Ok(id)
    }

    async fn create_asset(&self, asset: NewAsset) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().assets.push((id, asset));
        Ok(id)
    }

    async fn create_asset_source(&self, source: NewAssetSource) -> Result<Uuid> {
        self.inner.lock().unwrap().asset_sources.push(source);
        Ok(Uuid::new_v4())
    }

    async fn create_article_source(&self, source: NewArticleSource) -> Result<Uuid> {
        self.inner.lock().unwrap().article_sources.push(source);
        Ok(Uuid::new_v4())
    }

    async fn set_entity_media(
        &self,
        entity_id: Uuid,
        portrait_asset_id: Option<Uuid>,
        infobox_media: &[InfoboxMedia],
    ) -> Result<()> {
        self.inner.lock().unwrap().entity_media =
            Some((entity_id, portrait_asset_id, infobox_media.to_vec()));
        Ok(())
    }

    async fn append_audit(&self, entry: NewAuditEntry) {
        self.inner.lock().unwrap().audits.push(entry);
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Scripted generation backend. Each call pops the next reply; `Err`
/// entries become backend errors. Running out of replies is an error too,
/// so tests notice unexpected extra calls.
#[derive(Default)]
pub struct MockGenerator {
    text: Mutex<VecDeque<Result<String, String>>>,
    json: Mutex<VecDeque<Result<serde_json::Value, String>>>,
    text_calls: Mutex<usize>,
}

impl MockGenerator {
    pub fn replying(replies: Vec<Result<String, String>>) -> Self {
        Self {
            text: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn with_json(replies: Vec<Result<serde_json::Value, String>>) -> Self {
        Self {
            json: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Add structured replies to a text-scripted mock.
    pub fn and_json(self, replies: Vec<Result<serde_json::Value, String>>) -> Self {
        *self.json.lock().unwrap() = replies.into();
        self
    }

    /// Number of free-form `generate` calls made so far.
    pub fn generate_calls(&self) -> usize {
        *self.text_calls.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<String> {
        *self.text_calls.lock().unwrap() += 1;
        match self.text.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(err)) => bail!(err),
            None => bail!("no scripted generate reply left"),
        }
    }

    async fn generate_json(
        &self,
        _request: GenerationRequest,
        _schema: serde_json::Value,
    ) -> Result<serde_json::Value> {
        match self.json.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(err)) => bail!(err),
            None => bail!("no scripted generate_json reply left"),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
