//! Conversion from the pad backend's rendered HTML to note markup.
//!
//! The conversion rules are a pluggable seam: the sync engine only depends
//! on the `MarkupConverter` trait. `EtherpadHtmlConverter` is a baseline
//! implementation covering what the pad backend actually emits, including
//! the two dialect-specific inline styles the note format uses:
//! strikethrough as `~~text~~` and underline as `==text==`.

/// Converts rendered rich content into the note's markup dialect.
/// Synchronous and pure.
pub trait MarkupConverter: Send + Sync {
    fn to_markup(&self, html: &str) -> String;
}

/// Baseline converter for Etherpad's `getHTML` output.
#[derive(Debug, Default, Clone, Copy)]
pub struct EtherpadHtmlConverter;

#[derive(Clone, Copy)]
enum ListKind {
    Bullet,
    Numbered(usize),
}

impl MarkupConverter for EtherpadHtmlConverter {
    fn to_markup(&self, html: &str) -> String {
        let inner = body_inner(html);
        let mut out = String::with_capacity(inner.len());
        let mut lists: Vec<ListKind> = Vec::new();
        let mut link_targets: Vec<Option<String>> = Vec::new();

        let mut rest = inner;
        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('<') {
                let Some(end) = stripped.find('>') else {
                    // Dangling '<' with no closing bracket: emit literally.
                    out.push('<');
                    rest = stripped;
                    continue;
                };
                let tag_src = &stripped[..end];
                rest = &stripped[end + 1..];
                handle_tag(tag_src, &mut out, &mut lists, &mut link_targets);
            } else if let Some(stripped) = rest.strip_prefix('&') {
                let (decoded, remaining) = decode_entity(stripped);
                out.push_str(&decoded);
                rest = remaining;
            } else {
                let next = rest
                    .find(['<', '&'])
                    .unwrap_or(rest.len());
                push_text(&mut out, &rest[..next]);
                rest = &rest[next..];
            }
        }

        out.trim().to_string()
    }
}

/// Emit character data, collapsing the newlines HTML treats as spaces.
fn push_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '\n' | '\r' => {
                if !out.ends_with([' ', '\n']) && !out.is_empty() {
                    out.push(' ');
                }
            }
            other => out.push(other),
        }
    }
}

fn handle_tag(
    tag_src: &str,
    out: &mut String,
    lists: &mut Vec<ListKind>,
    link_targets: &mut Vec<Option<String>>,
) {
    let tag_src = tag_src.trim().trim_end_matches('/');
    let closing = tag_src.starts_with('/');
    let tag_src = tag_src.trim_start_matches('/');
    let name_end = tag_src
        .find(|c: char| c.is_whitespace())
        .unwrap_or(tag_src.len());
    let name = tag_src[..name_end].to_ascii_lowercase();
    let attrs = &tag_src[name_end..];

    match (name.as_str(), closing) {
        ("br", _) => out.push('\n'),
        ("p" | "div", false) => ensure_blank_line(out),
        ("p" | "div", true) => out.push('\n'),
        ("strong" | "b", _) => out.push_str("**"),
        ("em" | "i", _) => out.push('*'),
        ("s" | "del" | "strike", _) => out.push_str("~~"),
        ("u" | "ins", _) => out.push_str("=="),
        ("code", _) => out.push('`'),
        ("h1" | "h2" | "h3" | "h4" | "h5" | "h6", false) => {
            ensure_blank_line(out);
            let level = name[1..].parse::<usize>().unwrap_or(1);
            out.push_str(&"#".repeat(level));
            out.push(' ');
        }
        ("h1" | "h2" | "h3" | "h4" | "h5" | "h6", true) => out.push('\n'),
        ("ul", false) => lists.push(ListKind::Bullet),
        ("ol", false) => lists.push(ListKind::Numbered(0)),
        ("ul" | "ol", true) => {
            lists.pop();
            if lists.is_empty() {
                ensure_line_break(out);
            }
        }
        ("li", false) => {
            ensure_line_break(out);
            let depth = lists.len().saturating_sub(1);
            out.push_str(&"  ".repeat(depth));
            match lists.last_mut() {
                Some(ListKind::Numbered(n)) => {
                    *n += 1;
                    out.push_str(&format!("{}. ", n));
                }
                _ => out.push_str("- "),
            }
        }
        ("li", true) => {}
        ("a", false) => {
            link_targets.push(attr_value(attrs, "href"));
            out.push('[');
        }
        ("a", true) => {
            out.push(']');
            if let Some(Some(href)) = link_targets.pop() {
                out.push('(');
                out.push_str(&href);
                out.push(')');
            } else {
                out.push_str("()");
            }
        }
        // Structural and unknown tags carry no markup of their own.
        _ => {}
    }
}

fn ensure_blank_line(out: &mut String) {
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
    }
}

fn ensure_line_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Pull a quoted attribute value out of a tag's attribute list.
fn attr_value(attrs: &str, name: &str) -> Option<String> {
    let pos = attrs.find(name)?;
    let after = attrs[pos + name.len()..].trim_start();
    let after = after.strip_prefix('=')?.trim_start();
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        // Unquoted value: runs to the next whitespace.
        let end = after
            .find(|c: char| c.is_whitespace())
            .unwrap_or(after.len());
        return Some(after[..end].to_string());
    }
    let inner = &after[1..];
    let end = inner.find(quote)?;
    Some(inner[..end].to_string())
}

/// Extract the inside of `<body>...</body>` when the document is a full
/// HTML page; otherwise convert the fragment as-is.
fn body_inner(html: &str) -> &str {
    let lower = html.to_ascii_lowercase();
    let Some(open) = lower.find("<body") else {
        return html;
    };
    let Some(open_end) = lower[open..].find('>') else {
        return html;
    };
    let start = open + open_end + 1;
    match lower[start..].rfind("</body>") {
        Some(close) => &html[start..start + close],
        None => &html[start..],
    }
}

/// Decode one HTML entity at the start of `s` (after the `&`). Returns the
/// decoded text and the remaining input.
fn decode_entity(s: &str) -> (String, &str) {
    let Some(semi) = s.find(';') else {
        return ("&".to_string(), s);
    };
    if semi > 10 {
        // Too long to be an entity; treat the ampersand literally.
        return ("&".to_string(), s);
    }
    let name = &s[..semi];
    let rest = &s[semi + 1..];
    let decoded = match name {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        "nbsp" => " ".to_string(),
        _ => {
            let code = name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()));
            match code.and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => return ("&".to_string(), s),
            }
        }
    };
    (decoded, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(html: &str) -> String {
        EtherpadHtmlConverter.to_markup(html)
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(convert("Hello"), "Hello");
    }

    #[test]
    fn full_page_is_reduced_to_body_content() {
        let html = "<!DOCTYPE HTML><html><body>Hello<br></body></html>";
        assert_eq!(convert(html), "Hello");
    }

    #[test]
    fn strikethrough_maps_to_tildes() {
        assert_eq!(convert("a <s>gone</s> b"), "a ~~gone~~ b");
        assert_eq!(convert("<del>gone</del>"), "~~gone~~");
    }

    #[test]
    fn underline_maps_to_highlight_markers() {
        assert_eq!(convert("an <u>important</u> word"), "an ==important== word");
    }

    #[test]
    fn bold_and_italic() {
        assert_eq!(convert("<strong>b</strong> and <em>i</em>"), "**b** and *i*");
        assert_eq!(convert("<b>b</b> <i>i</i>"), "**b** *i*");
    }

    #[test]
    fn line_breaks_become_newlines() {
        assert_eq!(convert("one<br>two<br>three"), "one\ntwo\nthree");
    }

    #[test]
    fn headings_get_hash_prefixes() {
        assert_eq!(convert("<h1>Title</h1>body"), "# Title\nbody");
        assert_eq!(convert("x<h3>Sub</h3>"), "x\n\n### Sub");
    }

    #[test]
    fn unordered_list_items() {
        let html = "<ul><li>one</li><li>two</li></ul>after";
        assert_eq!(convert(html), "- one\n- two\nafter");
    }

    #[test]
    fn ordered_list_items_are_numbered() {
        let html = "<ol><li>first</li><li>second</li></ol>";
        assert_eq!(convert(html), "1. first\n2. second");
    }

    #[test]
    fn nested_lists_are_indented() {
        let html = "<ul><li>outer</li><ul><li>inner</li></ul></ul>";
        assert_eq!(convert(html), "- outer\n  - inner");
    }

    #[test]
    fn links_keep_their_target() {
        let html = r#"<a href="https://example.com">site</a>"#;
        assert_eq!(convert(html), "[site](https://example.com)");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(convert("a &amp; b &lt;c&gt; &#39;d&#39;"), "a & b <c> 'd'");
    }

    #[test]
    fn bare_ampersand_is_literal() {
        assert_eq!(convert("fish & chips"), "fish & chips");
    }

    #[test]
    fn unknown_tags_are_dropped() {
        assert_eq!(convert(r#"<span class="x">kept</span>"#), "kept");
    }
}
