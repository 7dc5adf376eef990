// Trait abstractions for the import pipeline's dependencies.
//
// WikiFetcher replaces a concrete WikiClient — all encyclopedia and media
// repository traffic behind one trait.
// ImportStore — persistence writes (entity/article/revision/asset rows) plus
// the membership check and the append-only audit log.
//
// These enable deterministic testing with MockWiki and MockImportStore:
// no network, no database. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use loreweave_common::types::{InfoboxMedia, LangLink, MediaInfo, SearchHit, SourcePage};
use loreweave_store::store::{
    NewArticle, NewArticleSource, NewAsset, NewAssetSource, NewAuditEntry, NewEntity,
};

// ---------------------------------------------------------------------------
// WikiFetcher — replaces WikiClient
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WikiFetcher: Send + Sync {
    /// Full-text article search on one language wiki.
    async fn search(&self, lang: &str, query: &str, limit: u32) -> Result<Vec<SearchHit>>;

    /// Fetch a page with extract, wikitext and image list. `None` when the
    /// title does not exist.
    async fn page_by_title(&self, lang: &str, title: &str) -> Result<Option<SourcePage>>;

    /// Fetch a page by numeric id. `None` when the id does not exist.
    async fn page_by_id(&self, lang: &str, page_id: u64) -> Result<Option<SourcePage>>;

    /// Cross-language equivalents of a page.
    async fn langlinks(&self, lang: &str, title: &str) -> Result<Vec<LangLink>>;

    /// Metadata for one media file on a language wiki or the shared
    /// repository. `None` when the file does not exist at that origin.
    async fn file_info(&self, origin: &str, title: &str) -> Result<Option<MediaInfo>>;

    /// File-namespace search against the shared media repository.
    async fn search_files(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>>;

    /// Download a media file.
    async fn download(&self, url: &str) -> Result<bytes::Bytes>;
}

#[async_trait]
impl WikiFetcher for mediawiki_client::WikiClient {
    async fn search(&self, lang: &str, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let hits = self.search(lang, query, limit).await?;
        Ok(hits
            .into_iter()
            .map(|h| SearchHit {
                page_id: h.page_id,
                title: h.title,
            })
            .collect())
    }

    async fn page_by_title(&self, lang: &str, title: &str) -> Result<Option<SourcePage>> {
        let page = self.page_by_title(lang, title).await?;
        Ok(page.map(|p| source_page(lang, p)))
    }

    async fn page_by_id(&self, lang: &str, page_id: u64) -> Result<Option<SourcePage>> {
        let page = self.page_by_id(lang, page_id).await?;
        Ok(page.map(|p| source_page(lang, p)))
    }

    async fn langlinks(&self, lang: &str, title: &str) -> Result<Vec<LangLink>> {
        let links = self.langlinks(lang, title).await?;
        Ok(links
            .into_iter()
            .map(|l| LangLink {
                lang: l.lang,
                title: l.title,
            })
            .collect())
    }

    async fn file_info(&self, origin: &str, title: &str) -> Result<Option<MediaInfo>> {
        let info = self.file_info(origin, title).await?;
        Ok(info.map(|i| media_info(origin, i)))
    }

    async fn search_files(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let hits = self.search_files(query, limit).await?;
        Ok(hits
            .into_iter()
            .map(|h| SearchHit {
                page_id: h.page_id,
                title: h.title,
            })
            .collect())
    }

    async fn download(&self, url: &str) -> Result<bytes::Bytes> {
        Ok(self.download(url).await?)
    }
}

fn source_page(lang: &str, page: mediawiki_client::Page) -> SourcePage {
    SourcePage {
        lang: lang.to_string(),
        page_id: page.page_id,
        title: page.title,
        url: page.url,
        extract: page.extract,
        wikitext: page.wikitext,
        page_image: page.page_image,
        image_titles: page.image_titles,
    }
}

fn media_info(origin: &str, info: mediawiki_client::FileInfo) -> MediaInfo {
    MediaInfo {
        title: info.title,
        url: info.url,
        mime: info.mime,
        width: info.width,
        height: info.height,
        size_bytes: info.size,
        author: info.author,
        license: info.license,
        license_url: info.license_url,
        attribution: info.attribution,
        origin: origin.to_string(),
    }
}

// ---------------------------------------------------------------------------
// ImportStore — persistence writes
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ImportStore: Send + Sync {
    /// Whether `user_id` may create content in `workspace_id`.
    async fn can_edit(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn create_entity(&self, entity: NewEntity) -> Result<Uuid>;

    async fn create_article(&self, article: NewArticle) -> Result<Uuid>;

    async fn create_revision(&self, article_id: Uuid, body: &str, created_by: Uuid)
        -> Result<Uuid>;

    async fn create_asset(&self, asset: NewAsset) -> Result<Uuid>;

    async fn create_asset_source(&self, source: NewAssetSource) -> Result<Uuid>;

    async fn create_article_source(&self, source: NewArticleSource) -> Result<Uuid>;

    /// Point the entity at its portrait asset and infobox audio/video list.
    async fn set_entity_media(
        &self,
        entity_id: Uuid,
        portrait_asset_id: Option<Uuid>,
        infobox_media: &[InfoboxMedia],
    ) -> Result<()>;

    /// Append-only audit record. Failures are logged by the store, never
    /// propagated.
    async fn append_audit(&self, entry: NewAuditEntry);
}

#[async_trait]
impl ImportStore for loreweave_store::Store {
    async fn can_edit(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.can_edit(workspace_id, user_id).await?)
    }

    async fn create_entity(&self, entity: NewEntity) -> Result<Uuid> {
        Ok(self.create_entity(entity).await?)
    }

    async fn create_article(&self, article: NewArticle) -> Result<Uuid> {
        Ok(self.create_article(article).await?)
    }

    async fn create_revision(
        &self,
        article_id: Uuid,
        body: &str,
        created_by: Uuid,
    ) -> Result<Uuid> {
        Ok(self.create_revision(article_id, body, created_by).await?)
    }

    async fn create_asset(&self, asset: NewAsset) -> Result<Uuid> {
        Ok(self.create_asset(asset).await?)
    }

    async fn create_asset_source(&self, source: NewAssetSource) -> Result<Uuid> {
        Ok(self.create_asset_source(source).await?)
    }

    async fn create_article_source(&self, source: NewArticleSource) -> Result<Uuid> {
        Ok(self.create_article_source(source).await?)
    }

    async fn set_entity_media(
        &self,
        entity_id: Uuid,
        portrait_asset_id: Option<Uuid>,
        infobox_media: &[InfoboxMedia],
    ) -> Result<()> {
        Ok(self
            .set_entity_media(entity_id, portrait_asset_id, infobox_media)
            .await?)
    }

    async fn append_audit(&self, entry: NewAuditEntry) {
        self.append_audit(entry).await;
    }
}
