use serde::Deserialize;

// Wire DTOs for Action API responses, `formatversion=2` only. Fields we do
// not consume are left out; everything optional on the wire is defaulted so
// partial responses decode instead of erroring.

#[derive(Debug, Deserialize)]
pub(crate) struct QueryEnvelope {
    #[serde(default)]
    pub query: Option<QueryBody>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub info: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryBody {
    #[serde(default)]
    pub pages: Vec<PageBody>,
    #[serde(default)]
    pub search: Vec<SearchBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchBody {
    pub pageid: u64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageBody {
    #[serde(default)]
    pub pageid: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub extract: Option<String>,
    #[serde(default)]
    pub fullurl: Option<String>,
    #[serde(default)]
    pub pageimage: Option<String>,
    #[serde(default)]
    pub revisions: Vec<RevisionBody>,
    #[serde(default)]
    pub images: Vec<ImageRefBody>,
    #[serde(default)]
    pub langlinks: Vec<LangLinkBody>,
    #[serde(default)]
    pub imageinfo: Vec<ImageInfoBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RevisionBody {
    #[serde(default)]
    pub slots: Option<SlotsBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlotsBody {
    #[serde(default)]
    pub main: Option<SlotMainBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlotMainBody {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageRefBody {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LangLinkBody {
    pub lang: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageInfoBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub extmetadata: Option<ExtMetadataBody>,
}

/// License metadata values arrive as `{"value": ...}` objects whose value may
/// be an HTML fragment.
#[derive(Debug, Deserialize)]
pub(crate) struct ExtMetadataBody {
    #[serde(rename = "Artist")]
    pub artist: Option<MetaValue>,
    #[serde(rename = "LicenseShortName")]
    pub license_short_name: Option<MetaValue>,
    #[serde(rename = "LicenseUrl")]
    pub license_url: Option<MetaValue>,
    #[serde(rename = "Attribution")]
    pub attribution: Option<MetaValue>,
    #[serde(rename = "Credit")]
    pub credit: Option<MetaValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetaValue {
    #[serde(default)]
    pub value: serde_json::Value,
}

impl MetaValue {
    pub fn as_text(&self) -> Option<String> {
        match &self.value {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

// --- Public result types ---

/// A resolved wiki page with everything the import pipeline consumes.
#[derive(Debug, Clone)]
pub struct Page {
    pub page_id: u64,
    pub title: String,
    pub url: String,
    pub extract: String,
    pub wikitext: String,
    pub page_image: Option<String>,
    pub image_titles: Vec<String>,
}

/// A full-text search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub page_id: u64,
    pub title: String,
}

/// A cross-language link from one page.
#[derive(Debug, Clone)]
pub struct LangLink {
    pub lang: String,
    pub title: String,
}

/// Metadata for one media file, license fields already HTML-stripped.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub title: String,
    pub url: String,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub author: Option<String>,
    pub license: Option<String>,
    pub license_url: Option<String>,
    pub attribution: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_response_decodes() {
        let raw = r#"{
            "query": {
                "pages": [{
                    "pageid": 42,
                    "title": "Example Topic",
                    "fullurl": "https://en.wikipedia.org/wiki/Example_Topic",
                    "extract": "Example Topic is a topic.",
                    "pageimage": "Example.jpg",
                    "revisions": [{"slots": {"main": {"content": "'''Example''' wikitext"}}}],
                    "images": [{"title": "File:Example.jpg"}, {"title": "File:Map.svg"}]
                }]
            }
        }"#;
        let parsed: QueryEnvelope = serde_json::from_str(raw).unwrap();
        let page = &parsed.query.unwrap().pages[0];
        assert_eq!(page.pageid, Some(42));
        assert_eq!(page.images.len(), 2);
        assert_eq!(
            page.revisions[0].slots.as_ref().unwrap().main.as_ref().unwrap().content.as_deref(),
            Some("'''Example''' wikitext")
        );
    }

    #[test]
    fn missing_page_decodes() {
        let raw = r#"{"query": {"pages": [{"title": "Nope", "missing": true}]}}"#;
        let parsed: QueryEnvelope = serde_json::from_str(raw).unwrap();
        let page = &parsed.query.unwrap().pages[0];
        assert!(page.missing);
        assert_eq!(page.pageid, None);
    }

    #[test]
    fn imageinfo_with_extmetadata_decodes() {
        let raw = r#"{
            "query": {
                "pages": [{
                    "pageid": 7,
                    "title": "File:Example.jpg",
                    "imageinfo": [{
                        "url": "https://upload.wikimedia.org/x/Example.jpg",
                        "mime": "image/jpeg",
                        "width": 1024,
                        "height": 768,
                        "size": 204800,
                        "extmetadata": {
                            "Artist": {"value": "<a href=\"https://example.com\">Jane Doe</a>"},
                            "LicenseShortName": {"value": "CC BY-SA 4.0"}
                        }
                    }]
                }]
            }
        }"#;
        let parsed: QueryEnvelope = serde_json::from_str(raw).unwrap();
        let page = &parsed.query.unwrap().pages[0];
        let info = &page.imageinfo[0];
        assert_eq!(info.mime.as_deref(), Some("image/jpeg"));
        assert_eq!(info.width, 1024);
        let meta = info.extmetadata.as_ref().unwrap();
        assert_eq!(meta.license_short_name.as_ref().unwrap().as_text().as_deref(), Some("CC BY-SA 4.0"));
    }

    #[test]
    fn api_error_decodes() {
        let raw = r#"{"error": {"code": "invalidtitle", "info": "Bad title."}}"#;
        let parsed: QueryEnvelope = serde_json::from_str(raw).unwrap();
        let err = parsed.error.unwrap();
        assert_eq!(err.code, "invalidtitle");
    }
}
