//! Word XML normalisation ahead of template evaluation.
//!
//! Word stores text in runs and freely splits them, so a placeholder typed as
//! `{{ invoice_number }}` can end up spread over several `<w:r>` elements,
//! with spell-check markers in between. This module glues such tags back
//! together and expands the row/cell/paragraph/run tags (`{%tr … %}`,
//! `{%tc … %}`, `{%p … %}`, `{%r … %}`) so the whole enclosing element
//! becomes the loop or condition boundary.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref MARKUP_AFTER_OPEN: Regex = Regex::new(r"\{(?:<[^>]*>)+([{%#])").unwrap();
    static ref MARKUP_BEFORE_CLOSE: Regex = Regex::new(r"([}%#])(?:<[^>]*>)+\}").unwrap();
    static ref TEMPLATE_TAG: Regex =
        Regex::new(r"(?s)\{%.*?%\}|\{\{.*?\}\}|\{#.*?#\}").unwrap();
    static ref XML_MARKUP: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref STRUCTURAL_TAG: Regex = Regex::new(r"(?s)\{%(tr|tc|p|r)\s+(.*?)\s*%\}").unwrap();
}

/// Prepare one Word XML part for the template engine.
pub fn prepare_template_xml(xml: &str) -> String {
    let joined = join_split_delimiters(xml);
    let cleaned = clean_tag_contents(&joined);
    expand_structural_tags(&cleaned)
}

/// Remove markup wedged between the two characters of `{{`, `{%`, `%}`, `}}`.
fn join_split_delimiters(xml: &str) -> String {
    let xml = MARKUP_AFTER_OPEN.replace_all(xml, "{$1");
    MARKUP_BEFORE_CLOSE.replace_all(&xml, "$1}").into_owned()
}

/// Strip markup inside every tag and undo the escaping Word applied to it.
fn clean_tag_contents(xml: &str) -> String {
    TEMPLATE_TAG
        .replace_all(xml, |caps: &Captures| {
            let stripped = XML_MARKUP.replace_all(&caps[0], "");
            unescape_tag_text(&stripped)
        })
        .into_owned()
}

fn unescape_tag_text(text: &str) -> String {
    text.replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"")
        .replace('\u{2018}', "'")
        .replace('\u{2019}', "'")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn element_for(prefix: &str) -> &'static str {
    match prefix {
        "tr" => "w:tr",
        "tc" => "w:tc",
        "p" => "w:p",
        _ => "w:r",
    }
}

/// Replace the element enclosing each `{%tr …%}`-style tag with a plain `{% … %}`.
fn expand_structural_tags(xml: &str) -> String {
    let mut xml = xml.to_string();

    while let Some(caps) = STRUCTURAL_TAG.captures(&xml) {
        let tag = caps.get(0).map_or(0..0, |m| m.range());
        let element = element_for(&caps[1]);
        let replacement = format!("{{% {} %}}", caps[2].trim());

        let range = enclosing_element(&xml, tag.start, tag.end, element).unwrap_or(tag);
        xml.replace_range(range, &replacement);
    }

    xml
}

/// Byte range of the innermost `element` surrounding `start..end`.
fn enclosing_element(
    xml: &str,
    start: usize,
    end: usize,
    element: &str,
) -> Option<std::ops::Range<usize>> {
    let before = &xml[..start];
    let open_plain = before.rfind(&format!("<{element}>"));
    let open_attrs = before.rfind(&format!("<{element} "));
    let open = open_plain.max(open_attrs)?;

    let close_tag = format!("</{element}>");
    let close = xml[end..].find(&close_tag)? + end + close_tag.len();
    Some(open..close)
}
