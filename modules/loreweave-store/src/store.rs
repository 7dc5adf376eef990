// Postgres persistence for imported entities, articles, and assets.

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use loreweave_common::InfoboxMedia;

use crate::error::Result;

pub struct Store {
    pool: PgPool,
}

/// Parameters for inserting a new entity.
pub struct NewEntity {
    pub workspace_id: Uuid,
    pub name: String,
    pub kind: String,
}

/// Parameters for inserting a new article.
pub struct NewArticle {
    pub workspace_id: Uuid,
    pub entity_id: Uuid,
    pub title: String,
    pub is_draft: bool,
    pub created_by: Uuid,
}

/// Parameters for inserting a new media asset.
pub struct NewAsset {
    pub workspace_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
}

/// License and origin record for one asset.
pub struct NewAssetSource {
    pub asset_id: Uuid,
    pub source_url: String,
    pub author: Option<String>,
    pub license: Option<String>,
    pub license_url: Option<String>,
    pub attribution: Option<String>,
}

/// One source page an article body was derived from.
pub struct NewArticleSource {
    pub article_id: Uuid,
    pub title: String,
    pub url: String,
    pub lang: String,
    pub used_generation: bool,
}

/// One append-only audit entry.
pub struct NewAuditEntry {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub subject_id: Option<Uuid>,
    pub detail: Option<serde_json::Value>,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Whether `user_id` may create content in `workspace_id`. Unknown
    /// workspaces and non-members both come back false.
    pub async fn can_edit(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool> {
        let allowed = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM workspace_members
                WHERE workspace_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(allowed)
    }

    pub async fn create_entity(&self, e: NewEntity) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO entities (workspace_id, name, kind)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(e.workspace_id)
        .bind(&e.name)
        .bind(&e.kind)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn create_article(&self, a: NewArticle) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO articles (workspace_id, entity_id, title, is_draft, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(a.workspace_id)
        .bind(a.entity_id)
        .bind(&a.title)
        .bind(a.is_draft)
        .bind(a.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn create_revision(&self, article_id: Uuid, body: &str, created_by: Uuid) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO revisions (article_id, body, created_by)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(article_id)
        .bind(body)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn create_asset(&self, a: NewAsset) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO assets (workspace_id, file_name, mime_type, storage_path, size_bytes, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(a.workspace_id)
        .bind(&a.file_name)
        .bind(&a.mime_type)
        .bind(&a.storage_path)
        .bind(a.size_bytes)
        .bind(a.uploaded_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn create_asset_source(&self, s: NewAssetSource) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO asset_sources (asset_id, source_url, author, license, license_url, attribution)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(s.asset_id)
        .bind(&s.source_url)
        .bind(&s.author)
        .bind(&s.license)
        .bind(&s.license_url)
        .bind(&s.attribution)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn create_article_source(&self, s: NewArticleSource) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO article_sources (article_id, title, url, lang, used_generation)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(s.article_id)
        .bind(&s.title)
        .bind(&s.url)
        .bind(&s.lang)
        .bind(s.used_generation)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Attach the portrait and any infobox audio/video to an entity.
    pub async fn set_entity_media(
        &self,
        entity_id: Uuid,
        portrait_asset_id: Option<Uuid>,
        infobox_media: &[InfoboxMedia],
    ) -> Result<()> {
        let media_json = if infobox_media.is_empty() {
            None
        } else {
            Some(serde_json::to_value(infobox_media).map_err(anyhow::Error::from)?)
        };

        sqlx::query(
            r#"
            UPDATE entities
            SET portrait_asset_id = $2, infobox_media = $3
            WHERE id = $1
            "#,
        )
        .bind(entity_id)
        .bind(portrait_asset_id)
        .bind(media_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append an audit entry. Logs a warning on failure rather than
    /// propagating; a failed audit write shouldn't abort the import.
    pub async fn append_audit(&self, entry: NewAuditEntry) {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (workspace_id, user_id, action, subject_id, detail)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.workspace_id)
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(entry.subject_id)
        .bind(&entry.detail)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(action = %entry.action, error = %e, "Failed to append audit entry");
        }
    }
}
