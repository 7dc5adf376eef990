// Body synthesis: one markdown article from N source pages.
//
// The generated path asks the configured text backend once, retries once
// with an amended instruction when the output fails validation, and then
// gives up in favor of the deterministic extraction summarizer. Malformed
// model output is a designed repair path here, never an error.

use ai_client::{GenerationRequest, TextGenerator};
use tracing::{debug, warn};

use loreweave_common::config::ImportLimits;
use loreweave_common::text::truncate_chars;
use loreweave_common::types::SourcePage;

const PLACEHOLDER_LANGUAGE: &str = "{{TARGET_LANGUAGE}}";
const PLACEHOLDER_SOURCE_LIST: &str = "{{SOURCE_LIST}}";
const PLACEHOLDER_SOURCE_TEXTS: &str = "{{SOURCE_TEXTS}}";
const PLACEHOLDER_RULES: &str = "{{RULES}}";
const PLACEHOLDER_SOURCE_COUNT: &str = "{{SOURCE_COUNT}}";

const SYSTEM_ROLE: &str =
    "You write encyclopedia articles for a collaborative worldbuilding workspace.";

const RETRY_NOTE: &str = "The previous attempt was too short or contained wiki markup. \
Write several full sections in plain markdown with `##` headings, and no [[...]] or \
{{...}} syntax.";

const FALLBACK_EXCERPT_CHARS: usize = 2000;
const SUMMARY_BULLETS: usize = 5;

/// The synthesized article body plus how it was produced.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub body: String,
    pub used_generation: bool,
}

/// Merge the source pages into one markdown body. Errors surface only from
/// the generation backend itself; every validation failure falls back to the
/// deterministic summarizer instead.
pub async fn synthesize(
    generator: Option<&dyn TextGenerator>,
    sources: &[SourcePage],
    output_lang: &str,
    template: Option<&str>,
    limits: &ImportLimits,
) -> anyhow::Result<Synthesis> {
    let Some(generator) = generator else {
        return Ok(Synthesis {
            body: fallback_summary(sources),
            used_generation: false,
        });
    };

    let prompt = build_prompt(sources, output_lang, template, limits);
    let first = generator
        .generate(GenerationRequest::new(prompt.clone()).system(SYSTEM_ROLE))
        .await?;

    if first.trim().is_empty() {
        warn!("generation returned an empty body, using extraction fallback");
        return Ok(Synthesis {
            body: fallback_summary(sources),
            used_generation: false,
        });
    }

    if let Some(body) = ensure_markdown(&first, sources, limits) {
        return Ok(Synthesis {
            body,
            used_generation: true,
        });
    }

    debug!("first synthesis pass failed validation, retrying");
    let amended = format!("{prompt}\n\n{RETRY_NOTE}");
    let second = generator
        .generate(GenerationRequest::new(amended).system(SYSTEM_ROLE))
        .await?;

    if let Some(body) = ensure_markdown(&second, sources, limits) {
        return Ok(Synthesis {
            body,
            used_generation: true,
        });
    }

    warn!("synthesis failed validation twice, using extraction fallback");
    Ok(Synthesis {
        body: fallback_summary(sources),
        used_generation: false,
    })
}

// ---------------------------------------------------------------------------
// Validation gate
// ---------------------------------------------------------------------------

/// Accept a candidate body only if it is long enough, has at least one
/// heading, and carries no leftover wiki markup. Accepted bodies get a
/// mechanical `## Sources` section when the model omitted one. Running the
/// result through this gate again returns it unchanged.
pub fn ensure_markdown(body: &str, sources: &[SourcePage], limits: &ImportLimits) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.chars().count() < limits.synthesis_min_chars {
        return None;
    }
    if !trimmed.lines().any(|l| l.trim_start().starts_with('#')) {
        return None;
    }
    if trimmed.contains("[[") || trimmed.contains("{{") {
        return None;
    }
    Some(with_sources(trimmed.to_string(), sources))
}

fn with_sources(body: String, sources: &[SourcePage]) -> String {
    // Exact match only: a content heading like "## Sources of the Nile" is
    // not the sources section.
    let has_sources = body.lines().any(|l| l.trim().to_lowercase() == "## sources");
    if has_sources {
        return body;
    }
    let mut out = body;
    out.push_str("\n\n## Sources\n\n");
    out.push_str(&source_links(sources));
    out
}

fn source_links(sources: &[SourcePage]) -> String {
    sources
        .iter()
        .map(|s| format!("- [{}]({}) ({})", s.title, s.url, s.lang))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Prompt assembly
// ---------------------------------------------------------------------------

fn build_prompt(
    sources: &[SourcePage],
    output_lang: &str,
    template: Option<&str>,
    limits: &ImportLimits,
) -> String {
    let rules = rules_block(output_lang);
    let list = source_list(sources);
    let texts = source_texts(sources, limits);
    let count = sources.len().to_string();

    if let Some(tpl) = template {
        let mut replaced = tpl.to_string();
        let mut matched = false;
        for (tag, value) in [
            (PLACEHOLDER_LANGUAGE, output_lang),
            (PLACEHOLDER_SOURCE_LIST, list.as_str()),
            (PLACEHOLDER_SOURCE_TEXTS, texts.as_str()),
            (PLACEHOLDER_RULES, rules.as_str()),
            (PLACEHOLDER_SOURCE_COUNT, count.as_str()),
        ] {
            if replaced.contains(tag) {
                matched = true;
                replaced = replaced.replace(tag, value);
            }
        }
        if matched {
            return replaced;
        }
        // A template with no recognized placeholder still gets the material.
        return format!("{replaced}\n\n{rules}\n\nSources:\n{list}\n\n{texts}");
    }

    let title = sources
        .first()
        .map(|s| s.title.as_str())
        .unwrap_or("the topic");
    format!(
        "Write one encyclopedia article about \"{title}\" from the {count} sources below.\n\n\
         {rules}\n\nSources:\n{list}\n\n{texts}"
    )
}

fn rules_block(output_lang: &str) -> String {
    format!(
        "Formatting rules:\n\
         - Write exclusively in {output_lang}.\n\
         - Output plain markdown only: one `#` title, `##` section headings, paragraphs, lists.\n\
         - No wiki markup: no [[links]], no {{{{templates}}}}, no ref tags.\n\
         - Neutral, encyclopedic tone.\n\
         - Use only the numbered sources given; do not invent facts.\n\
         - Note explicit conflicts between sources and name gaps as gaps.\n\
         - End with a `## Sources` section listing every source as a markdown link."
    )
}

fn source_list(sources: &[SourcePage]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {} ({}) — {}", i + 1, s.title, s.lang, s.url))
        .collect::<Vec<_>>()
        .join("\n")
}

fn source_texts(sources: &[SourcePage], limits: &ImportLimits) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "### Source {}: {} ({})\n{}",
                i + 1,
                s.title,
                s.lang,
                truncate_chars(&s.extract, limits.per_source_char_cap)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ---------------------------------------------------------------------------
// Deterministic fallback
// ---------------------------------------------------------------------------

/// Extraction-based summary used when no backend is configured or when
/// generated output failed validation twice: title, leading-sentence
/// bullets, one excerpt per source, and the sources list.
pub fn fallback_summary(sources: &[SourcePage]) -> String {
    let title = sources
        .first()
        .map(|s| s.title.as_str())
        .unwrap_or("Imported article");
    let mut out = format!("# {title}\n");

    let primary = sources.first().map(|s| s.extract.as_str()).unwrap_or_default();
    let bullets = leading_sentences(primary, SUMMARY_BULLETS);
    if !bullets.is_empty() {
        out.push('\n');
        for b in &bullets {
            out.push_str(&format!("- {b}\n"));
        }
    }

    for s in sources {
        let excerpt = truncate_chars(&s.extract, FALLBACK_EXCERPT_CHARS).trim();
        if excerpt.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {} ({})\n\n{}\n", s.title, s.lang, excerpt));
    }

    out.push_str("\n## Sources\n\n");
    out.push_str(&source_links(sources));
    out
}

fn leading_sentences(text: &str, max: usize) -> Vec<String> {
    let mut out = Vec::new();
    for raw in text.split_inclusive(&['.', '!', '?'][..]) {
        let s = raw.trim();
        if s.chars().filter(|c| c.is_alphanumeric()).count() < 3 {
            continue;
        }
        out.push(s.to_string());
        if out.len() == max {
            break;
        }
    }
    out
}
