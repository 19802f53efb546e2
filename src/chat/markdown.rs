//! Render the Markdown subset models tend to produce into HTML.
//!
//! Input is always HTML-escaped before any formatting so model or user
//! text can never inject markup. Code is tokenized first: fenced
//! blocks, then inline code spans, are swapped for placeholders so the
//! heading, emphasis and list rules never rewrite their contents.
//! The remaining rules then apply in order: headings, bold, italic,
//! list items.
//!
//! Rendering is stateless and meant to be re-run on the whole answer
//! after every streamed increment, since a later token can complete
//! an earlier construct (an unterminated fence stays literal until it
//! is closed).
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

const FENCE: &str = "```";

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,3})[ \t]+(.*)$").expect("Invalid heading regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("Invalid bold regex"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("Invalid italic regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("Invalid inline code regex"));
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^-[ \t]+(.*)$").expect("Invalid list regex"));
// Escaped text never holds a raw `<`, so `<N>` can't come from input
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([0-9]+)>").expect("Invalid placeholder regex"));
static LANGUAGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_+#.-]+$").expect("Invalid language regex"));

/// A closed fenced code block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeBlock {
    pub lang: Option<String>,
    pub code: String,
}

/// Escape the characters that are significant in HTML text and
/// attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

/// Byte ranges of each closed fence pair: the whole block including
/// the backticks, and the text between them.
fn fences(text: &str) -> Vec<(Range<usize>, Range<usize>)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = text[pos..].find(FENCE).map(|i| pos + i) {
        let inner_start = start + FENCE.len();
        let Some(inner_end) = text[inner_start..].find(FENCE).map(|i| inner_start + i) else {
            break;
        };
        let end = inner_end + FENCE.len();
        out.push((start..end, inner_start..inner_end));
        pos = end;
    }
    out
}

/// Split an optional language tag off the first line of a fenced
/// block. `rust\nfn main() {}` has the tag `rust`; `print(1)` has
/// none.
fn split_language(inner: &str) -> (Option<&str>, &str) {
    if let Some((first, rest)) = inner.split_once('\n') {
        let first = first.trim();
        if LANGUAGE_TAG.is_match(first) {
            return (Some(first), rest);
        }
    }
    (None, inner)
}

/// The closed fenced code blocks in `text`, unescaped, in order of
/// appearance. This is what a copy control copies.
pub fn code_blocks(text: &str) -> Vec<CodeBlock> {
    fences(text)
        .into_iter()
        .map(|(_, inner)| {
            let (lang, code) = split_language(&text[inner]);
            CodeBlock {
                lang: lang.map(String::from),
                code: code.to_string(),
            }
        })
        .collect()
}

fn placeholder(index: usize) -> String {
    format!("<{}>", index)
}

fn restore(text: &str, protected: &[String]) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| protected.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

fn render_code_block(index: usize, inner: &str) -> String {
    let (lang, code) = split_language(inner);
    format!(
        "<div class=\"code-block\"><span class=\"code-label\">{}</span>\
         <button class=\"copy-btn\" data-block=\"{}\">Copy code</button>\
         <pre><code>{}</code></pre></div>",
        lang.unwrap_or("code"),
        index,
        code
    )
}

/// Render `text` to an HTML fragment.
pub fn render(text: &str) -> String {
    let escaped = escape_html(text);
    let mut protected: Vec<String> = Vec::new();

    // Fenced code blocks
    let mut text = String::with_capacity(escaped.len());
    let mut pos = 0;
    for (block, (whole, inner)) in fences(&escaped).into_iter().enumerate() {
        text.push_str(&escaped[pos..whole.start]);
        text.push_str(&placeholder(protected.len()));
        protected.push(render_code_block(block, &escaped[inner]));
        pos = whole.end;
    }
    text.push_str(&escaped[pos..]);

    // Inline code, which may span lines
    let text = INLINE_CODE
        .replace_all(&text, |caps: &Captures| {
            let code = format!("<code>{}</code>", restore(&caps[1], &protected));
            protected.push(code);
            placeholder(protected.len() - 1)
        })
        .into_owned();

    let text = HEADING.replace_all(&text, |caps: &Captures| {
        let level = caps[1].len();
        format!("<h{level}>{}</h{level}>", &caps[2])
    });
    let text = BOLD.replace_all(&text, "<strong>$1</strong>");
    let text = ITALIC.replace_all(&text, "<em>$1</em>");
    // Each item gets its own list, adjacent items are not merged
    let text = LIST_ITEM.replace_all(&text, "<ul><li>$1</li></ul>");

    restore(&text, &protected)
}
