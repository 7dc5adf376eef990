// Source page resolution with language fallback.
//
// The preferred language gets one exact fetch. Each fallback language gets a
// direct title fetch and then a search-and-fetch-top-result attempt. Fetch
// errors along the way are logged and treated like misses; the caller only
// learns NotFound after every language is exhausted.

use tracing::{debug, warn};

use loreweave_common::types::SourcePage;

use crate::traits::WikiFetcher;

/// How the caller names the page to import.
#[derive(Debug, Clone)]
pub enum PageRef {
    Id(u64),
    Title(String),
}

/// A resolved source page. `fallback` names the answering language when it
/// differs from the requested one.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub page: SourcePage,
    pub fallback: Option<String>,
}

pub async fn resolve(
    fetcher: &dyn WikiFetcher,
    lang: &str,
    page: &PageRef,
    fallback_langs: &[String],
) -> Option<Resolved> {
    match page {
        PageRef::Id(id) => match fetcher.page_by_id(lang, *id).await {
            Ok(Some(page)) => {
                return Some(Resolved {
                    page,
                    fallback: None,
                })
            }
            Ok(None) => debug!(lang, page_id = *id, "page id not found"),
            Err(err) => warn!(lang, page_id = *id, error = %err, "page fetch failed"),
        },
        PageRef::Title(title) => match fetcher.page_by_title(lang, title).await {
            Ok(Some(page)) => {
                return Some(Resolved {
                    page,
                    fallback: None,
                })
            }
            Ok(None) => debug!(lang, title, "title not found"),
            Err(err) => warn!(lang, title, error = %err, "page fetch failed"),
        },
    }

    // Without a title there is nothing to look up in other languages.
    let PageRef::Title(title) = page else {
        return None;
    };

    for fb in fallback_langs {
        // The exact fetch already ran for the preferred language.
        if fb != lang {
            match fetcher.page_by_title(fb, title).await {
                Ok(Some(page)) => {
                    debug!(lang = %fb, title, "resolved via fallback title fetch");
                    return Some(Resolved {
                        page,
                        fallback: Some(fb.clone()),
                    });
                }
                Ok(None) => {}
                Err(err) => warn!(lang = %fb, title, error = %err, "fallback fetch failed"),
            }
        }

        match fetcher.search(fb, title, 1).await {
            Ok(hits) => {
                if let Some(hit) = hits.first() {
                    match fetcher.page_by_title(fb, &hit.title).await {
                        Ok(Some(page)) => {
                            debug!(lang = %fb, title = %hit.title, "resolved via fallback search");
                            let fallback = (fb != lang).then(|| fb.clone());
                            return Some(Resolved { page, fallback });
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(lang = %fb, title = %hit.title, error = %err, "fallback fetch failed")
                        }
                    }
                }
            }
            Err(err) => warn!(lang = %fb, title, error = %err, "fallback search failed"),
        }
    }

    None
}
