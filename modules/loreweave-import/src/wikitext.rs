// Wikitext placement extraction.
//
// Source markup declares two kinds of placement evidence: the infobox
// `image =` parameter and inline `[[File:...]]` links. Both outrank any
// model or heuristic verdict downstream, so parsing errs toward recall:
// unparseable fragments are skipped, never fatal.

use std::collections::HashSet;

use regex::Regex;

use loreweave_common::text::{normalize_media_title, strip_file_prefix};
use loreweave_common::types::ImagePlacement;

/// Extract every declared image placement from raw wikitext. The infobox
/// image comes first, then inline links in document order, deduplicated by
/// normalized title (first occurrence wins).
pub fn parse_placements(wikitext: &str) -> Vec<ImagePlacement> {
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    if let Some((file, caption)) = infobox_image(wikitext) {
        seen.insert(normalize_media_title(&file));
        out.push(ImagePlacement {
            file,
            caption,
            infobox: true,
            section: None,
        });
    }

    let headings = headings(wikitext);
    for (offset, file, caption) in file_links(wikitext) {
        if !seen.insert(normalize_media_title(&file)) {
            continue;
        }
        let section = enclosing_section(&headings, offset);
        out.push(ImagePlacement {
            file,
            caption,
            infobox: false,
            section,
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Infobox parameters
// ---------------------------------------------------------------------------

fn infobox_image(wikitext: &str) -> Option<(String, String)> {
    let image_re = Regex::new(r"(?m)^\s*\|\s*image\s*=\s*(\S.*)$").expect("valid regex");
    let caption_re = Regex::new(r"(?m)^\s*\|\s*caption\s*=\s*(\S.*)$").expect("valid regex");

    let raw = image_re.captures(wikitext)?.get(1)?.as_str();
    let file = clean_file_value(raw);
    if file.is_empty() {
        return None;
    }
    let caption = caption_re
        .captures(wikitext)
        .and_then(|c| c.get(1))
        .map(|m| clean_caption(m.as_str()))
        .unwrap_or_default();
    Some((file, caption))
}

/// An infobox image parameter holds either a bare filename or a full
/// `[[File:...]]` link with modifiers. Reduce both to the filename.
fn clean_file_value(raw: &str) -> String {
    let stripped = raw.trim().trim_start_matches("[[").trim_end_matches("]]");
    let first = stripped.split('|').next().unwrap_or_default();
    strip_file_prefix(first).trim().to_string()
}

// ---------------------------------------------------------------------------
// Inline file links
// ---------------------------------------------------------------------------

/// Scan for `[[File:...]]` links, returning (byte offset, filename, caption)
/// in document order. Captions can nest `[[wiki links]]`, so close brackets
/// are matched by depth rather than by regex.
fn file_links(wikitext: &str) -> Vec<(usize, String, String)> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(rel) = wikitext[cursor..].find("[[") {
        let open = cursor + rel;
        let body_start = open + 2;
        if !is_file_link(&wikitext[body_start..]) {
            cursor = body_start;
            continue;
        }
        let Some(close) = matching_close(wikitext, body_start) else {
            cursor = body_start;
            continue;
        };
        let mut parts = split_top_level(&wikitext[body_start..close]);
        if !parts.is_empty() {
            let file = strip_file_prefix(parts.remove(0)).trim().to_string();
            if !file.is_empty() {
                let caption = parts
                    .iter()
                    .rev()
                    .find(|p| !is_modifier(p))
                    .map(|p| clean_caption(p))
                    .unwrap_or_default();
                out.push((open, file, caption));
            }
        }
        cursor = close + 2;
    }
    out
}

fn is_file_link(rest: &str) -> bool {
    let Some(colon) = rest.find(':') else {
        return false;
    };
    if colon > 12 {
        return false;
    }
    matches!(
        rest[..colon].trim().to_lowercase().as_str(),
        "file" | "image" | "datei" | "fichier" | "archivo" | "ficheiro"
    )
}

/// Find the `]]` closing the link whose body starts at `from`, skipping
/// nested `[[...]]` pairs.
fn matching_close(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = from;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"[[") {
            depth += 1;
            i += 2;
        } else if bytes[i..].starts_with(b"]]") {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

/// Split a link body on `|` at bracket/brace depth zero.
fn split_top_level(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"[[") || bytes[i..].starts_with(b"{{") {
            depth += 1;
            i += 2;
        } else if bytes[i..].starts_with(b"]]") || bytes[i..].starts_with(b"}}") {
            depth = depth.saturating_sub(1);
            i += 2;
        } else if bytes[i] == b'|' && depth == 0 {
            parts.push(&body[start..i]);
            start = i + 1;
            i += 1;
        } else {
            i += 1;
        }
    }
    parts.push(&body[start..]);
    parts
}

/// Rendering modifiers that can appear between the filename and the caption.
fn is_modifier(part: &str) -> bool {
    let p = part.trim().to_lowercase();
    if p.is_empty() {
        return true;
    }
    const BARE: &[&str] = &[
        "thumb",
        "thumbnail",
        "frame",
        "framed",
        "frameless",
        "border",
        "right",
        "left",
        "center",
        "centre",
        "none",
        "baseline",
        "middle",
        "sub",
        "super",
        "top",
        "bottom",
        "text-top",
        "text-bottom",
        "upright",
    ];
    if BARE.contains(&p.as_str()) {
        return true;
    }
    const KEYED: &[&str] = &["alt=", "link=", "lang=", "page=", "class=", "upright="];
    if KEYED.iter().any(|k| p.starts_with(k)) {
        return true;
    }
    // Size specs: 220px, x140px, 220x140px.
    if p.len() > 2
        && p.ends_with("px")
        && p[..p.len() - 2].chars().all(|c| c.is_ascii_digit() || c == 'x')
    {
        return true;
    }
    false
}

fn clean_caption(raw: &str) -> String {
    let ref_re = Regex::new(r"(?s)<ref[^>]*>.*?</ref>|<ref[^>]*/>").expect("valid regex");
    let link_re = Regex::new(r"\[\[(?:[^\[\]|]*\|)?([^\[\]|]*)\]\]").expect("valid regex");

    let no_refs = ref_re.replace_all(raw, "");
    let no_links = link_re.replace_all(&no_refs, "$1");
    let text = no_links.replace("'''", "").replace("''", "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Section headings
// ---------------------------------------------------------------------------

struct Heading {
    offset: usize,
    name: String,
}

fn headings(wikitext: &str) -> Vec<Heading> {
    let re = Regex::new(r"(?m)^\s*={2,6}\s*([^=\n][^\n]*?)\s*={2,6}\s*$").expect("valid regex");
    re.captures_iter(wikitext)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let name = c.get(1)?.as_str().trim().to_string();
            Some(Heading {
                offset: whole.start(),
                name,
            })
        })
        .collect()
}

fn enclosing_section(headings: &[Heading], offset: usize) -> Option<String> {
    headings
        .iter()
        .rev()
        .find(|h| h.offset < offset)
        .map(|h| h.name.clone())
}
