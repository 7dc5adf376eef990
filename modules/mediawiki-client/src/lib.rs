pub mod error;
pub mod types;

pub use error::{Result, WikiError};
pub use types::{FileInfo, LangLink, Page, SearchHit};

use types::{PageBody, QueryEnvelope};

/// Per-language Action API endpoint. `{lang}` is substituted at call time.
const API_URL_PATTERN: &str = "https://{lang}.wikipedia.org/w/api.php";

/// Wikimedia Commons Action API endpoint, used for shared media metadata.
const COMMONS_API_URL: &str = "https://commons.wikimedia.org/w/api.php";

/// Identifying user agent per Wikimedia API etiquette.
const USER_AGENT: &str = concat!(
    "loreweave-import/",
    env!("CARGO_PKG_VERSION"),
    " (https://loreweave.app; ops@loreweave.app)"
);

/// Read-only client for the MediaWiki Action API (`formatversion=2`).
///
/// One instance serves every language wiki plus Commons: page queries go to
/// the endpoint derived from the language code, file metadata goes to the
/// origin wiki the file lives on.
pub struct WikiClient {
    client: reqwest::Client,
    api_pattern: String,
    commons_api: String,
}

impl WikiClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_pattern: API_URL_PATTERN.to_string(),
            commons_api: COMMONS_API_URL.to_string(),
        }
    }

    /// Point the client at alternate endpoints. `api_pattern` must contain a
    /// `{lang}` placeholder.
    pub fn with_endpoints(api_pattern: &str, commons_api: &str) -> Self {
        let mut client = Self::new();
        client.api_pattern = api_pattern.to_string();
        client.commons_api = commons_api.to_string();
        client
    }

    fn api_url(&self, lang: &str) -> String {
        self.api_pattern.replace("{lang}", lang)
    }

    /// Endpoint for a media origin: the `commons` pseudo-language maps to the
    /// Commons API, anything else to that language's wiki.
    fn origin_url(&self, origin: &str) -> String {
        if origin == "commons" {
            self.commons_api.clone()
        } else {
            self.api_url(origin)
        }
    }

    /// Issue one `action=query` GET and decode the envelope. API-level errors
    /// come back inside a 200 response and are surfaced as `WikiError::Api`.
    async fn query(&self, api: &str, params: &[(&str, &str)]) -> Result<QueryEnvelope> {
        let mut query: Vec<(&str, &str)> = vec![
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
        ];
        query.extend_from_slice(params);

        let resp = self.client.get(api).query(&query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WikiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: QueryEnvelope = resp.json().await?;
        if let Some(err) = envelope.error {
            return Err(WikiError::Api {
                code: err.code,
                info: err.info,
            });
        }
        Ok(envelope)
    }

    /// Full-text search in the article namespace.
    pub async fn search(&self, lang: &str, search: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let limit = limit.to_string();
        let envelope = self
            .query(
                &self.api_url(lang),
                &[
                    ("list", "search"),
                    ("srsearch", search),
                    ("srnamespace", "0"),
                    ("srlimit", &limit),
                ],
            )
            .await?;

        let hits = envelope
            .query
            .unwrap_or_default()
            .search
            .into_iter()
            .map(|s| SearchHit {
                page_id: s.pageid,
                title: s.title,
            })
            .collect::<Vec<_>>();
        tracing::debug!(lang, search, count = hits.len(), "Wiki search complete");
        Ok(hits)
    }

    /// Fetch a page by exact title, following redirects. `None` when the
    /// title does not exist.
    pub async fn page_by_title(&self, lang: &str, title: &str) -> Result<Option<Page>> {
        self.fetch_page(lang, ("titles", title)).await
    }

    /// Fetch a page by numeric page id. `None` when the id does not exist.
    pub async fn page_by_id(&self, lang: &str, page_id: u64) -> Result<Option<Page>> {
        let id = page_id.to_string();
        self.fetch_page(lang, ("pageids", &id)).await
    }

    async fn fetch_page(&self, lang: &str, selector: (&str, &str)) -> Result<Option<Page>> {
        let envelope = self
            .query(
                &self.api_url(lang),
                &[
                    selector,
                    ("prop", "extracts|revisions|pageimages|images|info"),
                    ("explaintext", "1"),
                    ("rvprop", "content"),
                    ("rvslots", "main"),
                    ("imlimit", "max"),
                    ("inprop", "url"),
                    ("redirects", "1"),
                ],
            )
            .await?;

        let page = match envelope.query.unwrap_or_default().pages.into_iter().next() {
            Some(p) if !p.missing && p.pageid.is_some() => p,
            _ => return Ok(None),
        };
        Ok(Some(into_page(lang, page)))
    }

    /// Cross-language links for a page.
    pub async fn langlinks(&self, lang: &str, title: &str) -> Result<Vec<LangLink>> {
        let envelope = self
            .query(
                &self.api_url(lang),
                &[
                    ("titles", title),
                    ("prop", "langlinks"),
                    ("lllimit", "max"),
                    ("redirects", "1"),
                ],
            )
            .await?;

        let links = envelope
            .query
            .unwrap_or_default()
            .pages
            .into_iter()
            .next()
            .map(|p| p.langlinks)
            .unwrap_or_default()
            .into_iter()
            .map(|l| LangLink {
                lang: l.lang,
                title: l.title,
            })
            .collect();
        Ok(links)
    }

    /// Metadata for one media file on its origin wiki. License fields are
    /// HTML fragments on the wire; they are flattened to plain text here.
    pub async fn file_info(&self, origin: &str, title: &str) -> Result<Option<FileInfo>> {
        let file_title = if title.contains(':') {
            title.to_string()
        } else {
            format!("File:{title}")
        };
        let envelope = self
            .query(
                &self.origin_url(origin),
                &[
                    ("titles", &file_title),
                    ("prop", "imageinfo"),
                    ("iiprop", "url|mime|size|extmetadata"),
                    (
                        "iiextmetadatafilter",
                        "Artist|LicenseShortName|LicenseUrl|Attribution|Credit",
                    ),
                ],
            )
            .await?;

        let page = match envelope.query.unwrap_or_default().pages.into_iter().next() {
            Some(p) if !p.missing => p,
            _ => return Ok(None),
        };
        let Some(info) = page.imageinfo.into_iter().next() else {
            return Ok(None);
        };
        let Some(url) = info.url else {
            return Ok(None);
        };

        let meta = info.extmetadata;
        let text_of = |v: Option<&types::MetaValue>| {
            v.and_then(|m| m.as_text())
                .map(|s| strip_html(&s))
                .filter(|s| !s.is_empty())
        };
        let (author, license, license_url, attribution) = match &meta {
            Some(m) => (
                text_of(m.artist.as_ref()).or_else(|| text_of(m.credit.as_ref())),
                text_of(m.license_short_name.as_ref()),
                text_of(m.license_url.as_ref()),
                text_of(m.attribution.as_ref()),
            ),
            None => (None, None, None, None),
        };

        Ok(Some(FileInfo {
            title: page.title,
            url,
            mime: info.mime.unwrap_or_default(),
            width: info.width,
            height: info.height,
            size: info.size,
            author,
            license,
            license_url,
            attribution,
        }))
    }

    /// Full-text search over Commons file pages (namespace 6).
    pub async fn search_files(&self, search: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let limit = limit.to_string();
        let envelope = self
            .query(
                &self.commons_api,
                &[
                    ("list", "search"),
                    ("srsearch", search),
                    ("srnamespace", "6"),
                    ("srlimit", &limit),
                ],
            )
            .await?;

        let hits = envelope
            .query
            .unwrap_or_default()
            .search
            .into_iter()
            .map(|s| SearchHit {
                page_id: s.pageid,
                title: s.title,
            })
            .collect();
        Ok(hits)
    }

    /// Download a media file by its resolved upload URL.
    pub async fn download(&self, url: &str) -> Result<bytes::Bytes> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WikiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.bytes().await?)
    }
}

impl Default for WikiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn into_page(lang: &str, page: PageBody) -> Page {
    let wikitext = page
        .revisions
        .into_iter()
        .next()
        .and_then(|r| r.slots)
        .and_then(|s| s.main)
        .and_then(|m| m.content)
        .unwrap_or_default();

    let url = page.fullurl.unwrap_or_else(|| {
        format!(
            "https://{lang}.wikipedia.org/wiki/{}",
            page.title.replace(' ', "_")
        )
    });

    Page {
        page_id: page.pageid.unwrap_or_default(),
        title: page.title,
        url,
        extract: page.extract.unwrap_or_default(),
        wikitext,
        page_image: page.pageimage,
        image_titles: page.images.into_iter().map(|i| i.title).collect(),
    }
}

/// Flatten an HTML fragment to plain text: drop tags, decode the handful of
/// entities Wikimedia license strings actually use, collapse whitespace.
pub fn strip_html(fragment: &str) -> String {
    let tag_re = regex::Regex::new(r"<[^>]*>").expect("valid regex");
    let text = tag_re.replace_all(fragment, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
