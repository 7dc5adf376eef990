// Cross-language source aggregation.
//
// Expands the base page with its cross-language equivalents, then searches
// the output language for independently-titled pages about the same topic.
// Every step degrades gracefully: a failed fetch drops one source, never the
// aggregation.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use loreweave_common::config::ImportLimits;
use loreweave_common::text::{normalize_topic_title, titles_overlap};
use loreweave_common::types::SourcePage;

use crate::traits::WikiFetcher;

const LANGLINK_CONCURRENCY: usize = 4;
const VERIFICATION_SEARCH_LIMIT: u32 = 10;

/// Collect source pages for synthesis. The base page is always first; at
/// most `max_languages` language pages total, then verification sources up
/// to a combined cap of `max_languages + max_verification_sources`.
pub async fn aggregate(
    fetcher: &dyn WikiFetcher,
    base: SourcePage,
    output_lang: &str,
    limits: &ImportLimits,
) -> Vec<SourcePage> {
    let base_lang = base.lang.clone();
    let base_title = base.title.clone();
    let mut sources = vec![base];

    let links = match fetcher.langlinks(&base_lang, &base_title).await {
        Ok(links) => links,
        Err(err) => {
            warn!(lang = %base_lang, error = %err, "langlink fetch failed");
            Vec::new()
        }
    };

    let language_slots = limits.max_languages.saturating_sub(1);
    let wanted: Vec<_> = links
        .into_iter()
        .filter(|l| l.lang != base_lang)
        .take(language_slots)
        .collect();

    let fetched: Vec<Option<SourcePage>> = stream::iter(wanted.into_iter().map(|link| async move {
        match fetcher.page_by_title(&link.lang, &link.title).await {
            Ok(page) => page,
            Err(err) => {
                warn!(lang = %link.lang, title = %link.title, error = %err, "language fetch failed");
                None
            }
        }
    }))
    .buffered(LANGLINK_CONCURRENCY)
    .collect()
    .await;

    sources.extend(fetched.into_iter().flatten());
    debug!(count = sources.len(), "language aggregation done");

    let cap = limits.max_languages + limits.max_verification_sources;
    if sources.len() >= cap {
        return sources;
    }

    // Verification pass: same-topic pages in the output language that the
    // langlink graph did not already surface.
    let hits = match fetcher
        .search(output_lang, &base_title, VERIFICATION_SEARCH_LIMIT)
        .await
    {
        Ok(hits) => hits,
        Err(err) => {
            warn!(lang = %output_lang, error = %err, "verification search failed");
            return sources;
        }
    };

    let mut seen_ids: HashSet<u64> = sources.iter().map(|s| s.page_id).collect();
    let mut seen_titles: HashSet<(String, String)> = sources
        .iter()
        .map(|s| (s.lang.clone(), normalize_topic_title(&s.title)))
        .collect();

    for hit in hits {
        if sources.len() >= cap {
            break;
        }
        if !titles_overlap(&hit.title, &base_title) {
            continue;
        }
        if seen_ids.contains(&hit.page_id) {
            continue;
        }
        let title_key = (output_lang.to_string(), normalize_topic_title(&hit.title));
        if seen_titles.contains(&title_key) {
            continue;
        }
        match fetcher.page_by_title(output_lang, &hit.title).await {
            Ok(Some(page)) => {
                debug!(title = %page.title, "verification source accepted");
                seen_ids.insert(page.page_id);
                seen_titles.insert(title_key);
                sources.push(page);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(title = %hit.title, error = %err, "verification fetch failed");
            }
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWiki;
    use loreweave_common::types::{LangLink, SearchHit};

    fn limits() -> ImportLimits {
        ImportLimits::default()
    }

    fn page(lang: &str, id: u64, title: &str) -> SourcePage {
        SourcePage {
            lang: lang.to_string(),
            page_id: id,
            title: title.to_string(),
            url: format!("https://{lang}.example.org/wiki/{title}"),
            extract: format!("{title} extract"),
            wikitext: String::new(),
            page_image: None,
            image_titles: Vec::new(),
        }
    }

    fn link(lang: &str, title: &str) -> LangLink {
        LangLink {
            lang: lang.to_string(),
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn test_base_page_always_first() {
        let wiki = MockWiki::new();
        let sources = aggregate(&wiki, page("en", 1, "Topic"), "en", &limits()).await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].lang, "en");
    }

    #[tokio::test]
    async fn test_langlink_pages_follow_in_order() {
        let wiki = MockWiki::new()
            .with_page(page("de", 2, "Thema"))
            .with_page(page("fr", 3, "Sujet"))
            .with_langlinks("en", "Topic", vec![link("de", "Thema"), link("fr", "Sujet")]);
        let sources = aggregate(&wiki, page("en", 1, "Topic"), "en", &limits()).await;
        let langs: Vec<_> = sources.iter().map(|s| s.lang.as_str()).collect();
        assert_eq!(langs, vec!["en", "de", "fr"]);
    }

    #[tokio::test]
    async fn test_failed_language_fetch_dropped() {
        // The French page is missing; aggregation keeps the rest.
        let wiki = MockWiki::new()
            .with_page(page("de", 2, "Thema"))
            .with_langlinks("en", "Topic", vec![link("fr", "Sujet"), link("de", "Thema")]);
        let sources = aggregate(&wiki, page("en", 1, "Topic"), "en", &limits()).await;
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].lang, "de");
    }

    #[tokio::test]
    async fn test_language_count_bounded() {
        let mut wiki = MockWiki::new().with_langlinks(
            "en",
            "Topic",
            vec![
                link("de", "T1"),
                link("fr", "T2"),
                link("es", "T3"),
                link("it", "T4"),
                link("pt", "T5"),
            ],
        );
        for (i, lang) in ["de", "fr", "es", "it", "pt"].iter().enumerate() {
            wiki = wiki.with_page(page(lang, 10 + i as u64, &format!("T{}", i + 1)));
        }
        let sources = aggregate(&wiki, page("en", 1, "Topic"), "en", &limits()).await;
        assert_eq!(sources.len(), limits().max_languages);
    }

    #[tokio::test]
    async fn test_verification_source_needs_title_overlap() {
        let wiki = MockWiki::new()
            .with_page(page("en", 5, "Topic of Interest"))
            .with_page(page("en", 6, "Unrelated Subject"))
            .with_search_hits(
                "en",
                "Topic",
                vec![
                    SearchHit {
                        page_id: 6,
                        title: "Unrelated Subject".to_string(),
                    },
                    SearchHit {
                        page_id: 5,
                        title: "Topic of Interest".to_string(),
                    },
                ],
            );
        let sources = aggregate(&wiki, page("en", 1, "Topic"), "en", &limits()).await;
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].title, "Topic of Interest");
    }

    #[tokio::test]
    async fn test_verification_skips_already_present_page_id() {
        let wiki = MockWiki::new().with_search_hits(
            "en",
            "Topic",
            vec![SearchHit {
                page_id: 1,
                title: "Topic".to_string(),
            }],
        );
        let sources = aggregate(&wiki, page("en", 1, "Topic"), "en", &limits()).await;
        assert_eq!(sources.len(), 1);
    }
}
