use crate::ast::{HtmlNode, TextPiece};
use crate::parser::is_doctype;

/// Elements that never take a closing tag, whatever the source says.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) fn is_void(name: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|v| name.eq_ignore_ascii_case(v))
}

/// Serialize an expanded tree. Output is compact: no whitespace between
/// tags and no trailing newline.
pub fn emit(nodes: &[HtmlNode]) -> String {
    let mut out = String::new();
    emit_nodes(&mut out, nodes);
    out
}

fn emit_nodes(out: &mut String, nodes: &[HtmlNode]) {
    // Adjacent collapsed text lines get a single separating space, the way
    // the newline between them would render.
    let mut prev_collapsed = false;

    for node in nodes {
        match node {
            HtmlNode::Text { pieces, preserve } => {
                let mut rendered = String::new();
                for piece in pieces {
                    match piece {
                        TextPiece::Text(s) => push_escaped_text(&mut rendered, s),
                        TextPiece::Raw(s) => rendered.push_str(s),
                    }
                }
                if *preserve {
                    out.push_str(&rendered);
                    prev_collapsed = false;
                } else {
                    if rendered.is_empty() {
                        continue;
                    }
                    if prev_collapsed {
                        out.push(' ');
                    }
                    out.push_str(&rendered);
                    prev_collapsed = true;
                }
            }
            HtmlNode::Raw { text } => {
                out.push_str(text);
                prev_collapsed = false;
            }
            HtmlNode::Element {
                name,
                self_closing,
                id_parts,
                classes_implicit,
                classes_explicit,
                attrs,
                children,
            } => {
                emit_element(
                    out,
                    name,
                    *self_closing,
                    id_parts,
                    classes_implicit,
                    classes_explicit,
                    attrs,
                    children,
                );
                prev_collapsed = false;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_element(
    out: &mut String,
    name: &str,
    self_closing: bool,
    id_parts: &[String],
    classes_implicit: &[String],
    classes_explicit: &[String],
    attrs: &[(String, String)],
    children: &[HtmlNode],
) {
    if is_doctype(name) {
        let bare = id_parts.is_empty()
            && classes_explicit.is_empty()
            && attrs.is_empty()
            && (classes_implicit.is_empty()
                || (classes_implicit.len() == 1 && classes_implicit[0] == "html"));
        if bare {
            out.push_str("<!DOCTYPE html>");
            return;
        }
    }

    out.push('<');
    out.push_str(name);

    let id: String = id_parts.concat();
    if !id.is_empty() {
        push_attr(out, "id", &id);
    }

    let classes = merge_classes(classes_implicit, classes_explicit);
    if !classes.is_empty() {
        push_attr(out, "class", &classes.join(" "));
    }

    for (attr_name, value) in attrs {
        push_attr(out, attr_name, value);
    }

    if is_doctype(name) {
        out.push('>');
        return;
    }
    if self_closing || is_void(name) {
        out.push_str(" />");
        return;
    }

    out.push('>');
    emit_nodes(out, children);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Implicit classes first, then explicit ones, deduplicated keeping the
/// first occurrence.
fn merge_classes<'a>(implicit: &'a [String], explicit: &'a [String]) -> Vec<&'a str> {
    let mut merged: Vec<&str> = Vec::new();
    for class in implicit.iter().chain(explicit.iter()) {
        if !merged.contains(&class.as_str()) {
            merged.push(class);
        }
    }
    merged
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    push_escaped_attr(out, value);
    out.push('"');
}

/// Attribute values: `&`, `<`, `>` and `"` are never emitted raw.
fn push_escaped_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

/// Text content: metacharacters are escaped but `"` stays as written.
fn push_escaped_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}
