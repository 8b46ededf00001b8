//! Text normalization for episode descriptions and search queries.
//!
//! Two layers run here, in a fixed order:
//!
//! 1. [`clean`] — strips HTML markup, URLs, and email addresses from raw
//!    feed descriptions and collapses whitespace. Malformed markup degrades
//!    to best-effort tag stripping; this function never fails.
//! 2. [`normalize_arabic`] — folds Arabic orthographic variants (diacritics,
//!    tatweel, alef/yaa/haa variants) and applies Unicode NFKC so that
//!    queries and documents agree on a single spelling.
//!
//! Diacritic stripping must run before letter folding: some alef variants
//! differ from the bare letter only by a combining mark.

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"']+"#).unwrap()
});
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\w.\-]+@[\w.\-]+\.\w+").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Extract plain text from a raw (possibly HTML) description.
///
/// Steps, in order: visible-text extraction with a single space between
/// element boundaries, URL removal, email removal, whitespace collapse.
/// Empty input yields an empty string.
pub fn clean(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let text = strip_markup(raw);
    let text = URL_RE.replace_all(&text, " ");
    let text = EMAIL_RE.replace_all(&text, " ");

    // Collapse all whitespace runs to single spaces and trim.
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize Arabic orthography.
///
/// Strips tashkeel (combining diacritics) and tatweel, folds alef variants
/// to bare alef, alef-maksura to yaa, and taa-marbuta to haa, then applies
/// Unicode NFKC. Idempotent.
pub fn normalize_arabic(text: &str) -> String {
    let folded: String = text
        .chars()
        .filter_map(|c| match c {
            // Tashkeel ranges
            '\u{0617}'..='\u{061A}' | '\u{064B}'..='\u{0652}' => None,
            // Tatweel (elongation)
            '\u{0640}' => None,
            // Alef variants (hamza above/below, wasla, madda) -> bare alef
            '\u{0623}' | '\u{0625}' | '\u{0671}' | '\u{0622}' => Some('\u{0627}'),
            // Alef maksura -> yaa
            '\u{0649}' => Some('\u{064A}'),
            // Taa marbuta -> haa
            '\u{0629}' => Some('\u{0647}'),
            other => Some(other),
        })
        .collect();

    folded.nfkc().collect()
}

/// Pull visible text out of HTML markup, one space between elements.
///
/// Uses a tolerant event parser (end-tag matching disabled, `script`/`style`
/// content skipped, entities decoded). If the parser chokes on malformed
/// input we fall back to stripping tag-shaped spans with a regex, so callers
/// always get text back.
fn strip_markup(raw: &str) -> String {
    if !raw.contains('<') {
        return raw.to_string();
    }

    let mut reader = Reader::from_str(raw);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;

    let mut out = String::new();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"script" || name.as_ref() == b"style" {
                    skip_depth += 1;
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if (name.as_ref() == b"script" || name.as_ref() == b"style") && skip_depth > 0 {
                    skip_depth -= 1;
                }
            }
            Ok(Event::Text(e)) => {
                if skip_depth == 0 {
                    let text = e
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    out.push_str(&text);
                    out.push(' ');
                }
            }
            Ok(Event::CData(e)) => {
                if skip_depth == 0 {
                    out.push_str(&String::from_utf8_lossy(&e));
                    out.push(' ');
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => {
                // Malformed markup: best-effort tag stripping of the whole input.
                return TAG_RE.replace_all(raw, " ").into_owned();
            }
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_tags() {
        let cleaned = clean("<p>Hello <b>world</b></p>");
        assert_eq!(cleaned, "Hello world");
        assert!(!cleaned.contains('<'));
        assert!(!cleaned.contains('>'));
    }

    #[test]
    fn test_clean_removes_urls() {
        let cleaned = clean("Check out https://example.com/episode?id=42 for more");
        assert!(!cleaned.contains("http"));
        assert!(cleaned.contains("Check out"));
        assert!(cleaned.contains("for more"));
    }

    #[test]
    fn test_clean_removes_emails() {
        let cleaned = clean("Contact us at team@podcast.fm for feedback");
        assert!(!cleaned.contains('@'));
        assert!(cleaned.contains("Contact us at"));
    }

    #[test]
    fn test_clean_empty_input() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("   \n\t  "), "");
    }

    #[test]
    fn test_clean_collapses_whitespace() {
        assert_eq!(clean("a   b\n\nc\t d"), "a b c d");
    }

    #[test]
    fn test_clean_malformed_markup_best_effort() {
        // Unclosed and mismatched tags must not error out.
        let cleaned = clean("<p>first <b>second</p> third");
        assert!(cleaned.contains("first"));
        assert!(cleaned.contains("second"));
        assert!(cleaned.contains("third"));
        assert!(!cleaned.contains('<'));
    }

    #[test]
    fn test_clean_decodes_entities() {
        assert_eq!(clean("<p>fish &amp; chips</p>"), "fish & chips");
    }

    #[test]
    fn test_clean_skips_script_content() {
        let cleaned = clean("<p>keep</p><script>var x = 1;</script>");
        assert!(cleaned.contains("keep"));
        assert!(!cleaned.contains("var x"));
    }

    #[test]
    fn test_clean_spec_example() {
        let cleaned = clean("<p>مرحبا <a href='http://x.com'>هنا</a></p>");
        assert!(cleaned.contains("مرحبا"));
        assert!(cleaned.contains("هنا"));
        assert!(!cleaned.contains("http://x.com"));
        assert!(!cleaned.contains('<'));
    }

    #[test]
    fn test_normalize_arabic_strips_diacritics() {
        // "مُحَمَّد" with damma/fatha/shadda -> bare letters
        assert_eq!(normalize_arabic("مُحَمَّد"), "محمد");
    }

    #[test]
    fn test_normalize_arabic_strips_tatweel() {
        assert_eq!(normalize_arabic("كتـــاب"), "كتاب");
    }

    #[test]
    fn test_normalize_arabic_folds_alef_variants() {
        assert_eq!(normalize_arabic("أحمد"), "احمد");
        assert_eq!(normalize_arabic("إسلام"), "اسلام");
        assert_eq!(normalize_arabic("آمن"), "امن");
    }

    #[test]
    fn test_normalize_arabic_folds_taa_marbuta_and_maksura() {
        assert_eq!(normalize_arabic("حلقة"), "حلقه");
        assert_eq!(normalize_arabic("مستشفى"), "مستشفي");
    }

    #[test]
    fn test_normalize_arabic_idempotent() {
        let samples = [
            "مُحَمَّد",
            "حلقة تجريبية",
            "أهلاً وسهلاً",
            "كتـــاب عن التاريخ",
            "plain ascii text",
        ];
        for s in samples {
            let once = normalize_arabic(s);
            let twice = normalize_arabic(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_normalize_arabic_passes_latin_through() {
        assert_eq!(normalize_arabic("Tech Podcast 101"), "Tech Podcast 101");
    }
}
