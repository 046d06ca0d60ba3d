//! Markup helpers: plain-text extraction for AI prompts and the
//! glossary/grammar decoration pass.
//!
//! Everything here works on a token stream of tag and text segments, so
//! decoration never rewrites inside a tag and never corrupts attributes.

use crate::types::GlossaryEntry;

enum Segment<'a> {
    Tag(&'a str),
    Text(&'a str),
}

/// Split markup into alternating tag and text segments. A `<` with no
/// closing `>` is treated as literal text rather than dropped.
fn segments(html: &str) -> Vec<Segment<'_>> {
    let mut segs = Vec::new();
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        if lt > 0 {
            segs.push(Segment::Text(&rest[..lt]));
        }
        match rest[lt..].find('>') {
            Some(gt) => {
                segs.push(Segment::Tag(&rest[lt..lt + gt + 1]));
                rest = &rest[lt + gt + 1..];
            }
            None => {
                segs.push(Segment::Text(&rest[lt..]));
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        segs.push(Segment::Text(rest));
    }
    segs
}

/// Element name of a tag segment, without brackets, `/` or attributes.
fn tag_name(tag: &str) -> &str {
    let inner = tag.trim_start_matches('<').trim_start_matches('/');
    let end = inner
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(inner.len());
    &inner[..end]
}

fn is_closing(tag: &str) -> bool {
    tag.starts_with("</")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce markup to plain text for analysis prompts: `<br>` and opening
/// `<p>` become separators, every other tag contributes nothing, and
/// whitespace is normalized.
pub fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    for seg in segments(html) {
        match seg {
            Segment::Text(t) => out.push_str(t),
            Segment::Tag(t) => {
                let name = tag_name(t);
                if name.eq_ignore_ascii_case("br")
                    || (name.eq_ignore_ascii_case("p") && !is_closing(t))
                {
                    out.push('\n');
                }
            }
        }
    }
    collapse_whitespace(&out)
}

/// Reduce markup to plain text where every tag becomes a word separator.
/// Used for the translation and grammar prompts.
pub fn flatten_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    for seg in segments(html) {
        match seg {
            Segment::Text(t) => out.push_str(t),
            Segment::Tag(_) => out.push(' '),
        }
    }
    collapse_whitespace(&out)
}

/// Overlay glossary highlights and grammar underlines onto `html`.
///
/// Matches are found only inside text segments: glossary terms whole-word
/// and case-insensitive, grammar issues as literal substrings. Existing
/// tags pass through untouched.
pub fn decorate(html: &str, glossary: &[GlossaryEntry], issues: &[String]) -> String {
    if glossary.is_empty() && issues.is_empty() {
        return html.to_string();
    }
    let glossed = rewrite_text(html, |text| highlight_glossary(text, glossary));
    rewrite_text(&glossed, |text| underline_issues(text, issues))
}

fn rewrite_text(html: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(html.len());
    for seg in segments(html) {
        match seg {
            Segment::Tag(t) => out.push_str(t),
            Segment::Text(t) => out.push_str(&f(t)),
        }
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte length of a leading case-insensitive match of `needle` in `hay`,
/// or None if `hay` does not start with it.
fn match_len_ignore_case(hay: &str, needle: &str) -> Option<usize> {
    let mut len = 0;
    let mut hay_chars = hay.chars();
    for nc in needle.chars() {
        let hc = hay_chars.next()?;
        if !hc.to_lowercase().eq(nc.to_lowercase()) {
            return None;
        }
        len += hc.len_utf8();
    }
    Some(len)
}

/// Non-overlapping whole-word, case-insensitive matches of `term` in `text`.
fn word_matches(text: &str, term: &str) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut skip_until = 0;
    let mut prev: Option<char> = None;
    for (i, c) in text.char_indices() {
        if i < skip_until {
            prev = Some(c);
            continue;
        }
        if let Some(len) = match_len_ignore_case(&text[i..], term) {
            let before_ok = prev.map_or(true, |p| !is_word_char(p));
            let after_ok = text[i + len..].chars().next().map_or(true, |n| !is_word_char(n));
            if before_ok && after_ok {
                found.push((i, i + len));
                skip_until = i + len;
            }
        }
        prev = Some(c);
    }
    found
}

fn highlight_glossary(text: &str, glossary: &[GlossaryEntry]) -> String {
    // Collect spans for every term against the original text, first term
    // wins on overlap, then rebuild in one pass.
    let mut spans: Vec<(usize, usize, usize)> = Vec::new();
    for (gi, entry) in glossary.iter().enumerate() {
        if entry.term.is_empty() {
            continue;
        }
        for (start, end) in word_matches(text, &entry.term) {
            if spans.iter().all(|&(s, e, _)| end <= s || start >= e) {
                spans.push((start, end, gi));
            }
        }
    }
    if spans.is_empty() {
        return text.to_string();
    }
    spans.sort_by_key(|&(s, _, _)| s);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end, gi) in spans {
        let title = glossary[gi].definition.replace('"', "&quot;");
        out.push_str(&text[cursor..start]);
        out.push_str("<span class=\"glossary-highlight\" title=\"");
        out.push_str(&title);
        out.push_str("\">");
        out.push_str(&text[start..end]);
        out.push_str("</span>");
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn underline_issues(text: &str, issues: &[String]) -> String {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for issue in issues {
        if issue.is_empty() {
            continue;
        }
        let mut from = 0;
        while let Some(pos) = text[from..].find(issue.as_str()) {
            let start = from + pos;
            let end = start + issue.len();
            if spans.iter().all(|&(s, e)| end <= s || start >= e) {
                spans.push((start, end));
            }
            from = end;
        }
    }
    if spans.is_empty() {
        return text.to_string();
    }
    spans.sort_by_key(|&(s, _)| s);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in spans {
        out.push_str(&text[cursor..start]);
        out.push_str("<span class=\"grammar-underline\">");
        out.push_str(&text[start..end]);
        out.push_str("</span>");
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(term: &str, definition: &str) -> GlossaryEntry {
        GlossaryEntry {
            term: term.to_string(),
            definition: definition.to_string(),
        }
    }

    #[test]
    fn strip_markup_turns_breaks_into_separators() {
        assert_eq!(strip_markup("<p>Hello<br>world</p>"), "Hello world");
        assert_eq!(strip_markup("<p>a</p><p>b</p>"), "a b");
    }

    #[test]
    fn strip_markup_fuses_inline_tags() {
        assert_eq!(strip_markup("a<b>c</b>"), "ac");
    }

    #[test]
    fn strip_markup_normalizes_whitespace() {
        assert_eq!(strip_markup("  Hello \n\t world  "), "Hello world");
    }

    #[test]
    fn flatten_tags_separates_around_every_tag() {
        assert_eq!(flatten_tags("a<b>c</b>"), "a c");
    }

    #[test]
    fn unterminated_tag_is_kept_as_text() {
        assert_eq!(strip_markup("a < b"), "a < b");
    }

    #[test]
    fn decorate_wraps_whole_word_matches_case_insensitively() {
        let out = decorate("Rust is great", &[entry("rust", "a language")], &[]);
        assert_eq!(
            out,
            "<span class=\"glossary-highlight\" title=\"a language\">Rust</span> is great"
        );
    }

    #[test]
    fn decorate_skips_partial_word_matches() {
        let out = decorate("Rusty nails", &[entry("rust", "a language")], &[]);
        assert_eq!(out, "Rusty nails");
    }

    #[test]
    fn decorate_never_touches_tags_or_attributes() {
        let out = decorate(
            "<a title=\"rust\">rust</a>",
            &[entry("rust", "a language")],
            &[],
        );
        assert_eq!(
            out,
            "<a title=\"rust\"><span class=\"glossary-highlight\" title=\"a language\">rust</span></a>"
        );
    }

    #[test]
    fn decorate_escapes_quotes_in_definitions() {
        let out = decorate("api", &[entry("api", "an \"interface\"")], &[]);
        assert!(out.contains("title=\"an &quot;interface&quot;\""));
    }

    #[test]
    fn decorate_underlines_literal_grammar_issues() {
        let out = decorate("I is happy and they is sad", &[], &["I is".to_string()]);
        assert_eq!(
            out,
            "<span class=\"grammar-underline\">I is</span> happy and they is sad"
        );
    }

    #[test]
    fn decorate_applies_glossary_then_grammar() {
        let out = decorate(
            "<p>the API is broke</p>",
            &[entry("API", "interface")],
            &["is broke".to_string()],
        );
        assert_eq!(
            out,
            "<p>the <span class=\"glossary-highlight\" title=\"interface\">API</span> \
             <span class=\"grammar-underline\">is broke</span></p>"
        );
    }

    #[test]
    fn decorate_without_terms_or_issues_is_identity() {
        let html = "<p>unchanged <b>markup</b></p>";
        assert_eq!(decorate(html, &[], &[]), html);
    }

    #[test]
    fn overlapping_matches_keep_the_first_term() {
        let out = decorate(
            "big data",
            &[entry("big data", "lots"), entry("data", "facts")],
            &[],
        );
        assert_eq!(
            out,
            "<span class=\"glossary-highlight\" title=\"lots\">big data</span>"
        );
    }
}
