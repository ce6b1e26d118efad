use html_escape::{encode_double_quoted_attribute, encode_text};
use scraper::{ElementRef, Html, Node};

/// Rebuild `html` keeping only allow-listed tags.
///
/// Unknown tags are unwrapped (their text survives), tags that carry
/// executable or embedded content are dropped with their children, and every
/// attribute except an `http(s)` link target is stripped.
pub fn sanitize_summary(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_children(&fragment.root_element(), &mut out);
    out
}

/// Plain-text projection of the summary markup with whitespace collapsed.
pub fn summary_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut raw = String::with_capacity(html.len());
    collect_text(&fragment.root_element(), &mut raw);
    normalize_whitespace(&raw)
}

fn write_children(element: &ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&encode_text(&**text)),
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    write_element(&child_ref, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: &ElementRef, out: &mut String) {
    let tag_name = element.value().name().to_lowercase();

    if should_drop_element(&tag_name) {
        return;
    }
    if !is_allowed_tag(&tag_name) {
        write_children(element, out);
        return;
    }

    if tag_name == "br" {
        out.push_str("<br>");
        return;
    }

    out.push('<');
    out.push_str(&tag_name);
    if tag_name == "a" {
        if let Some(href) = element.value().attr("href").filter(|h| is_safe_link(h)) {
            out.push_str(" href=\"");
            out.push_str(&encode_double_quoted_attribute(href));
            out.push('"');
        }
    }
    out.push('>');

    write_children(element, out);

    out.push_str("</");
    out.push_str(&tag_name);
    out.push('>');
}

fn collect_text(element: &ElementRef, out: &mut String) {
    let tag_name = element.value().name().to_lowercase();
    if should_drop_element(&tag_name) {
        return;
    }
    if tag_name == "br" {
        out.push(' ');
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(&child_ref, out);
                }
            }
            _ => {}
        }
    }

    if is_block_element(&tag_name) {
        out.push(' ');
    }
}

fn is_allowed_tag(tag: &str) -> bool {
    matches!(
        tag,
        "a" | "b" | "strong" | "i" | "em" | "p" | "br" | "ul" | "ol" | "li"
    )
}

fn is_block_element(tag: &str) -> bool {
    matches!(tag, "p" | "div" | "li" | "ul" | "ol")
}

fn should_drop_element(tag: &str) -> bool {
    matches!(
        tag,
        "script" | "style" | "noscript" | "iframe" | "object" | "embed" | "svg" | "template"
    )
}

fn is_safe_link(href: &str) -> bool {
    let href = href.trim().to_ascii_lowercase();
    href.starts_with("https://") || href.starts_with("http://")
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
