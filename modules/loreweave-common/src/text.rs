// Title and keyword normalization shared by the aggregator, media collector,
// and classifier. All functions are pure.

/// Media titles arrive with mixed casing and optional namespace prefixes
/// (`File:`, `Image:`, plus localized variants on non-English wikis).
pub fn strip_file_prefix(title: &str) -> &str {
    const PREFIXES: &[&str] = &["file:", "image:", "datei:", "fichier:", "archivo:", "ficheiro:"];
    let trimmed = title.trim();
    let lower = trimmed.to_lowercase();
    for prefix in PREFIXES {
        if lower.starts_with(prefix) {
            return trimmed[prefix.len()..].trim_start();
        }
    }
    trimmed
}

/// Canonical dedup key for a media file: lowercased, namespace prefix
/// stripped, extension stripped, underscores treated as spaces.
pub fn normalize_media_title(title: &str) -> String {
    let base = strip_file_prefix(title);
    let without_ext = match base.rfind('.') {
        Some(idx) if base.len() - idx <= 6 => &base[..idx],
        _ => base,
    };
    without_ext.replace('_', " ").trim().to_lowercase()
}

/// Fold common Latin diacritics to their ASCII base letter. Characters
/// outside the table pass through unchanged.
pub fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' | 'Ā' => 'A',
            'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' | 'Ē' => 'E',
            'í' | 'ì' | 'î' | 'ï' | 'ī' | 'į' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'ō' | 'ő' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => 'O',
            'ú' | 'ù' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ý' | 'ÿ' => 'y',
            'ñ' | 'ń' | 'ň' => 'n',
            'ç' | 'ć' | 'č' => 'c',
            'ß' => 's',
            'š' | 'ś' => 's',
            'ž' | 'ź' | 'ż' => 'z',
            'ł' => 'l',
            'đ' | 'ď' => 'd',
            'ť' => 't',
            'ř' => 'r',
            'ğ' => 'g',
            'Ý' => 'Y',
            'Ñ' | 'Ń' => 'N',
            'Ç' | 'Ć' | 'Č' => 'C',
            'Š' | 'Ś' => 'S',
            'Ž' | 'Ź' | 'Ż' => 'Z',
            'Ł' => 'L',
            'Đ' => 'D',
            'Ř' => 'R',
            'Ğ' => 'G',
            other => other,
        })
        .collect()
}

/// Normalize a topic title for cross-language comparison: diacritics folded,
/// parenthetical disambiguation dropped, punctuation stripped, lowercased,
/// whitespace collapsed.
pub fn normalize_topic_title(title: &str) -> String {
    let mut base = title.to_string();
    if let Some(idx) = base.find('(') {
        base.truncate(idx);
    }
    let folded = fold_diacritics(&base);
    let cleaned: String = folded
        .chars()
        .flat_map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().collect::<Vec<_>>()
            } else {
                vec![' ']
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether two topic titles plausibly name the same subject: one normalized
/// title must contain the other. Used to vet verification-search hits.
pub fn titles_overlap(a: &str, b: &str) -> bool {
    let na = normalize_topic_title(a);
    let nb = normalize_topic_title(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    na.contains(&nb) || nb.contains(&na)
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "are", "was", "were", "has", "have",
    "its", "also", "into", "their", "about",
];

/// Significant keywords of a topic title, used to filter media-repository
/// search hits down to plausibly on-topic files.
pub fn topic_keywords(title: &str) -> Vec<String> {
    let normalized = normalize_topic_title(title);
    let mut seen = Vec::new();
    for word in normalized.split_whitespace() {
        if word.len() < 4 || STOPWORDS.contains(&word) {
            continue;
        }
        if !seen.iter().any(|w: &String| w == word) {
            seen.push(word.to_string());
        }
    }
    seen
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_file_prefixes() {
        assert_eq!(strip_file_prefix("File:Castle.jpg"), "Castle.jpg");
        assert_eq!(strip_file_prefix("image:Castle.jpg"), "Castle.jpg");
        assert_eq!(strip_file_prefix("Datei:Burg.png"), "Burg.png");
        assert_eq!(strip_file_prefix("Castle.jpg"), "Castle.jpg");
    }

    #[test]
    fn media_title_normalization_merges_variants() {
        let a = normalize_media_title("File:Old_Castle.JPG");
        let b = normalize_media_title("old castle.jpg");
        let c = normalize_media_title("Image:OLD CASTLE.jpeg");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn normalization_keeps_dotted_names_without_extension() {
        // A trailing segment longer than an extension is part of the name.
        assert_eq!(normalize_media_title("St. Mary Cathedral"), "st. mary cathedral");
    }

    #[test]
    fn topic_title_drops_disambiguation_and_diacritics() {
        assert_eq!(normalize_topic_title("Łódź (city)"), "lodz");
        assert_eq!(normalize_topic_title("São Paulo"), "sao paulo");
    }

    #[test]
    fn overlap_is_bidirectional() {
        assert!(titles_overlap("Example Topic", "example topic (disambiguation)"));
        assert!(titles_overlap("Topic", "Example Topic"));
        assert!(!titles_overlap("Example Topic", "Unrelated Subject"));
    }

    #[test]
    fn keywords_skip_short_and_stop_words() {
        let kw = topic_keywords("The Battle of the Five Armies");
        assert!(kw.contains(&"battle".to_string()));
        assert!(kw.contains(&"armies".to_string()));
        assert!(!kw.contains(&"the".to_string()));
        assert!(!kw.contains(&"of".to_string()));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate_chars(s, 3);
        assert!(t.len() <= 3);
        assert!(s.starts_with(t));
    }
}
