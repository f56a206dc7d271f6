use std::collections::HashMap;

use crate::ast::{AttrPart, Chunk, HtmlNode, Node, SetBody, TextPiece, TextSpan};
use crate::error::{Diagnostic, ErrorKind, Pos};

/// Safety net for macros that invoke themselves, directly or indirectly.
const MAX_EXPANSION_DEPTH: usize = 1000;

/// Marker prefix of invocation-site echo diagnostics.
const ECHO_PREFIX: &str = "in expansion of macro";

/// What a `set` name resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// A plain string; substitutes into spans.
    Literal(String),
    /// A `raw` body; substitutes into spans verbatim, metacharacters and
    /// all. This is the language's escape hatch.
    RawString(String),
    /// A block of template structure, captured already expanded with the
    /// environment at the defining line. Placed only by a line of its own.
    Subtree(Vec<HtmlNode>),
}

/// A stored macro template. The body stays unexpanded until invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub parameterized: bool,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(BoundValue),
    Macro(MacroDef),
}

/// The name environment. `set` and `:macro` share one namespace; a later
/// definition of the same kind replaces the earlier one, while crossing
/// kinds is a conflict.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    map: HashMap<String, Binding>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    fn get(&self, name: &str) -> Option<&Binding> {
        self.map.get(name)
    }

    fn value(&self, name: &str) -> Option<&BoundValue> {
        match self.map.get(name) {
            Some(Binding::Value(v)) => Some(v),
            _ => None,
        }
    }

    fn is_value(&self, name: &str) -> bool {
        matches!(self.map.get(name), Some(Binding::Value(_)))
    }

    /// False when the name is already taken by the other binding kind.
    fn define_value(&mut self, name: &str, value: BoundValue) -> bool {
        if matches!(self.map.get(name), Some(Binding::Macro(_))) {
            return false;
        }
        self.map.insert(name.to_string(), Binding::Value(value));
        true
    }

    fn define_macro(&mut self, name: &str, def: MacroDef) -> bool {
        if matches!(self.map.get(name), Some(Binding::Value(_))) {
            return false;
        }
        self.map.insert(name.to_string(), Binding::Macro(def));
        true
    }
}

/// One evaluated argument of a parameterized invocation.
struct ArgValue {
    /// The argument expanded at the call site (call-by-value).
    nodes: Vec<HtmlNode>,
    /// The argument as inline text, when it has such a reading: a single
    /// text line, or a bare unbound word.
    inline: Option<String>,
}

/// Expand a built tree against `env`, registering bindings in document
/// order. Top-level bindings stay in `env` afterwards, which is what
/// makes header sources work.
pub fn expand(nodes: &[Node], env: &mut Environment, diags: &mut Vec<Diagnostic>) -> Vec<HtmlNode> {
    let mut expander = Expander {
        env,
        diags,
        depth: 0,
    };
    let mut out = Vec::new();
    expander.expand_nodes(nodes, &mut out);
    out
}

// ---------------------------------------------------------------------------
// Expander
// ---------------------------------------------------------------------------

struct Expander<'a> {
    env: &'a mut Environment,
    diags: &'a mut Vec<Diagnostic>,
    depth: usize,
}

impl Expander<'_> {
    fn expand_nodes(&mut self, nodes: &[Node], out: &mut Vec<HtmlNode>) {
        for node in nodes {
            self.expand_node(node, out);
        }
    }

    fn expand_node(&mut self, node: &Node, out: &mut Vec<HtmlNode>) {
        match node {
            Node::Spliced(nodes) => out.extend(nodes.iter().cloned()),

            Node::Text {
                span,
                preserve,
                pos,
            } => {
                // Implicit text collapses before substitution, so that
                // substituted values keep their own spacing.
                let raw = if *preserve {
                    span.raw.clone()
                } else {
                    collapse_whitespace(&span.raw)
                };
                let pieces = self.resolve_pieces(&raw, *pos);
                out.push(HtmlNode::Text {
                    pieces,
                    preserve: *preserve,
                });
            }

            Node::RawBlock {
                lines,
                substitute,
                pos,
            } => {
                let joined = lines.join("\n");
                let text = if *substitute {
                    self.resolve_raw(&joined, *pos)
                } else {
                    joined
                };
                out.push(HtmlNode::Raw { text });
            }

            Node::SetBinding { name, body, pos } => self.register_set(name, body, *pos),

            Node::MacroBinding {
                name,
                parameterized,
                body,
                pos,
            } => {
                let def = MacroDef {
                    parameterized: *parameterized,
                    body: body.clone(),
                };
                if !self.env.define_macro(name, def) {
                    self.diags.push(Diagnostic::new(
                        ErrorKind::NameConflict,
                        *pos,
                        format!("'{}' is already bound by set", name),
                    ));
                }
            }

            Node::MacroArg { index, pos } => {
                self.diags.push(Diagnostic::new(
                    ErrorKind::MacroArityError,
                    *pos,
                    format!("'@{}' placeholder outside a parameterized macro body", index),
                ));
            }

            Node::MacroInvocation {
                name,
                parameterized,
                args,
                pos,
            } => self.invoke_macro(name, *parameterized, args, *pos, out),

            Node::Element {
                name,
                self_closing,
                attrs,
                text,
                children,
                pos,
            } => {
                // A bare bound name on a line of its own inserts the
                // binding instead of opening an element.
                if !*self_closing && attrs.is_empty() && text.is_none() && children.is_empty() {
                    if let Some(value) = self.env.value(name) {
                        match value {
                            BoundValue::Literal(s) => out.push(HtmlNode::text(s.clone(), false)),
                            BoundValue::RawString(s) => {
                                out.push(HtmlNode::Raw { text: s.clone() })
                            }
                            BoundValue::Subtree(nodes) => out.extend(nodes.iter().cloned()),
                        }
                        return;
                    }
                }
                self.expand_element(name, *self_closing, attrs, text.as_ref(), children, *pos, out);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_element(
        &mut self,
        name: &str,
        self_closing: bool,
        attrs: &[AttrPart],
        text: Option<&TextSpan>,
        children: &[Node],
        pos: Pos,
        out: &mut Vec<HtmlNode>,
    ) {
        let mut id_parts = Vec::new();
        let mut classes_implicit = Vec::new();
        let mut classes_explicit = Vec::new();
        let mut pairs = Vec::new();

        for part in attrs {
            match part {
                AttrPart::IdFragment { value } => {
                    id_parts.push(self.resolve_raw(&value.raw, pos));
                }
                AttrPart::Class { word } => {
                    let resolved = self.resolve_raw(word, pos);
                    classes_implicit.extend(resolved.split_whitespace().map(str::to_string));
                }
                AttrPart::ExplicitClass { value } => {
                    let resolved = self.resolve_raw(&value.raw, pos);
                    classes_explicit.extend(resolved.split_whitespace().map(str::to_string));
                }
                AttrPart::Pair { name, value } => {
                    pairs.push((name.clone(), self.resolve_raw(&value.raw, pos)));
                }
            }
        }

        let mut kids = Vec::new();
        if let Some(span) = text {
            let pieces = self.resolve_pieces(&span.raw, pos);
            kids.push(HtmlNode::Text {
                pieces,
                preserve: true,
            });
        }
        self.expand_nodes(children, &mut kids);

        out.push(HtmlNode::Element {
            name: name.to_string(),
            self_closing,
            id_parts,
            classes_implicit,
            classes_explicit,
            attrs: pairs,
            children: kids,
        });
    }

    // -----------------------------------------------------------------------
    // Span resolution
    // -----------------------------------------------------------------------

    /// Resolve the variable references of one span against the current
    /// environment. Only string and raw-string bindings substitute; a
    /// subtree binding inside running text is an error. Raw-string
    /// insertions come back as [`TextPiece::Raw`] so the emitter can
    /// leave them unescaped.
    fn resolve_pieces(&mut self, raw: &str, pos: Pos) -> Vec<TextPiece> {
        let span = TextSpan::new(raw);
        let env = &*self.env;
        let chunks: Vec<Chunk> = span.segment(|name| env.is_value(name));

        let mut pieces: Vec<TextPiece> = Vec::new();
        let mut subtree_refs: Vec<String> = Vec::new();
        let push_text = |pieces: &mut Vec<TextPiece>, s: &str| match pieces.last_mut() {
            Some(TextPiece::Text(text)) => text.push_str(s),
            _ => pieces.push(TextPiece::Text(s.to_string())),
        };

        for chunk in chunks {
            match chunk {
                Chunk::Literal(s) => push_text(&mut pieces, s),
                Chunk::Var(name) => match env.value(name) {
                    Some(BoundValue::Literal(s)) => push_text(&mut pieces, s),
                    Some(BoundValue::RawString(s)) => pieces.push(TextPiece::Raw(s.clone())),
                    Some(BoundValue::Subtree(_)) => {
                        subtree_refs.push(name.to_string());
                        push_text(&mut pieces, name);
                    }
                    None => push_text(&mut pieces, name),
                },
            }
        }
        for name in subtree_refs {
            self.diags.push(Diagnostic::new(
                ErrorKind::BindingKindMismatch,
                pos,
                format!(
                    "subtree binding '{}' cannot be used inside text; put it on a line of its own",
                    name
                ),
            ));
        }
        pieces
    }

    /// Resolve a span into one string. Used for attribute values, ids and
    /// classes, which are escaped as a whole at emission.
    fn resolve_raw(&mut self, raw: &str, pos: Pos) -> String {
        let mut result = String::with_capacity(raw.len());
        for piece in self.resolve_pieces(raw, pos) {
            match piece {
                TextPiece::Text(s) | TextPiece::Raw(s) => result.push_str(&s),
            }
        }
        result
    }

    // -----------------------------------------------------------------------
    // set registration
    // -----------------------------------------------------------------------

    fn register_set(&mut self, name: &str, body: &SetBody, pos: Pos) {
        let value = match body {
            SetBody::Inline(s) => BoundValue::Literal(s.clone()),
            SetBody::Block(nodes) => match nodes.as_slice() {
                // A lone raw block binds the verbatim string; `raw@`
                // substitutes with the environment at the defining line.
                [Node::RawBlock {
                    lines,
                    substitute,
                    pos: raw_pos,
                }] => {
                    let joined = lines.join("\n");
                    let text = if *substitute {
                        self.resolve_raw(&joined, *raw_pos)
                    } else {
                        joined
                    };
                    BoundValue::RawString(text)
                }
                _ => BoundValue::Subtree(self.expand_isolated(nodes)),
            },
        };
        if !self.env.define_value(name, value) {
            self.diags.push(Diagnostic::new(
                ErrorKind::NameConflict,
                pos,
                format!("'{}' is already a macro", name),
            ));
        }
    }

    /// Expand a block against a snapshot of the environment; bindings made
    /// inside it do not leak out.
    fn expand_isolated(&mut self, nodes: &[Node]) -> Vec<HtmlNode> {
        let saved = self.env.clone();
        let mut out = Vec::new();
        self.expand_nodes(nodes, &mut out);
        *self.env = saved;
        out
    }

    // -----------------------------------------------------------------------
    // Macro invocation
    // -----------------------------------------------------------------------

    fn invoke_macro(
        &mut self,
        name: &str,
        parameterized: bool,
        args: &[Node],
        pos: Pos,
        out: &mut Vec<HtmlNode>,
    ) {
        let sigil = if parameterized { '!' } else { '@' };
        let def = match self.env.get(name) {
            None => {
                self.diags.push(Diagnostic::new(
                    ErrorKind::UnknownBinding,
                    pos,
                    format!("undefined macro '{}{}'", sigil, name),
                ));
                return;
            }
            Some(Binding::Value(_)) => {
                self.diags.push(Diagnostic::new(
                    ErrorKind::BindingKindMismatch,
                    pos,
                    format!("'{}' is a set binding, not a macro", name),
                ));
                return;
            }
            Some(Binding::Macro(def)) => def.clone(),
        };

        if def.parameterized != parameterized {
            let hint = if def.parameterized {
                format!("'{}' takes arguments; call it as '!{}'", name, name)
            } else {
                format!("'{}' takes no arguments; invoke it as '@{}'", name, name)
            };
            self.diags.push(Diagnostic::new(
                ErrorKind::BindingKindMismatch,
                pos,
                hint,
            ));
            return;
        }

        if self.depth >= MAX_EXPANSION_DEPTH {
            self.diags.push(Diagnostic::new(
                ErrorKind::MacroRecursion,
                pos,
                format!("expansion of '{}{}' exceeded depth {}", sigil, name, MAX_EXPANSION_DEPTH),
            ));
            return;
        }

        // Arguments are expanded before substitution, so a macro body
        // cannot rebind what an argument already resolved.
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let nodes = self.expand_isolated(std::slice::from_ref(arg));
            let inline = inline_text(arg, &nodes);
            values.push(ArgValue { nodes, inline });
        }

        // Everything from substitution on counts as "inside the body" and
        // is echoed at the invocation.
        let before = self.diags.len();
        let body = if parameterized {
            self.substitute_body(&def.body, &values)
        } else {
            def.body.clone()
        };

        // The body sees a snapshot of the invocation-site environment.
        let saved = self.env.clone();
        self.depth += 1;
        self.expand_nodes(&body, out);
        self.depth -= 1;
        *self.env = saved;

        // Echo body errors at the invocation site, but never echo an echo:
        // nested invocations would otherwise multiply them.
        let echoes: Vec<Diagnostic> = self.diags[before..]
            .iter()
            .filter(|d| !d.message.starts_with(ECHO_PREFIX))
            .map(|d| {
                Diagnostic::new(
                    d.kind,
                    pos,
                    format!("{} '{}{}'", ECHO_PREFIX, sigil, name),
                )
            })
            .collect();
        self.diags.extend(echoes);
    }

    // -----------------------------------------------------------------------
    // Placeholder substitution
    // -----------------------------------------------------------------------

    /// Deep-copy a parameterized body with every `@N` resolved: node
    /// placeholders splice the argument's nodes, span placeholders insert
    /// its inline text.
    fn substitute_body(&mut self, nodes: &[Node], args: &[ArgValue]) -> Vec<Node> {
        let mut out = Vec::new();
        for node in nodes {
            match node {
                Node::MacroArg { index, pos } => match args.get(*index) {
                    Some(arg) => out.push(Node::Spliced(arg.nodes.clone())),
                    None => self.diags.push(Diagnostic::new(
                        ErrorKind::MacroArityError,
                        *pos,
                        format!("'@{}' exceeds the {} provided argument(s)", index, args.len()),
                    )),
                },

                Node::Element {
                    name,
                    self_closing,
                    attrs,
                    text,
                    children,
                    pos,
                } => {
                    let attrs = attrs
                        .iter()
                        .map(|part| self.substitute_attr(part, args, *pos))
                        .collect();
                    let text = text
                        .as_ref()
                        .map(|span| self.substitute_span(span, args, *pos));
                    let children = self.substitute_body(children, args);
                    out.push(Node::Element {
                        name: name.clone(),
                        self_closing: *self_closing,
                        attrs,
                        text,
                        children,
                        pos: *pos,
                    });
                }

                Node::Text {
                    span,
                    preserve,
                    pos,
                } => out.push(Node::Text {
                    span: self.substitute_span(span, args, *pos),
                    preserve: *preserve,
                    pos: *pos,
                }),

                Node::RawBlock {
                    lines,
                    substitute,
                    pos,
                } => out.push(Node::RawBlock {
                    lines: lines
                        .iter()
                        .map(|l| self.substitute_text(l, args, *pos))
                        .collect(),
                    substitute: *substitute,
                    pos: *pos,
                }),

                Node::SetBinding { name, body, pos } => {
                    let body = match body {
                        SetBody::Inline(s) => SetBody::Inline(self.substitute_text(s, args, *pos)),
                        SetBody::Block(nodes) => SetBody::Block(self.substitute_body(nodes, args)),
                    };
                    out.push(Node::SetBinding {
                        name: name.clone(),
                        body,
                        pos: *pos,
                    });
                }

                // A nested definition opens a fresh placeholder scope; its
                // `@N` belong to its own future invocations, not to ours.
                Node::MacroBinding { .. } => out.push(node.clone()),

                Node::MacroInvocation {
                    name,
                    parameterized,
                    args: inner,
                    pos,
                } => out.push(Node::MacroInvocation {
                    name: name.clone(),
                    parameterized: *parameterized,
                    args: self.substitute_body(inner, args),
                    pos: *pos,
                }),

                Node::Spliced(nodes) => out.push(Node::Spliced(nodes.clone())),
            }
        }
        out
    }

    fn substitute_attr(&mut self, part: &AttrPart, args: &[ArgValue], pos: Pos) -> AttrPart {
        match part {
            AttrPart::Pair { name, value } => AttrPart::Pair {
                name: name.clone(),
                value: self.substitute_span(value, args, pos),
            },
            AttrPart::Class { word } => AttrPart::Class {
                word: self.substitute_text(word, args, pos),
            },
            AttrPart::IdFragment { value } => AttrPart::IdFragment {
                value: self.substitute_span(value, args, pos),
            },
            AttrPart::ExplicitClass { value } => AttrPart::ExplicitClass {
                value: self.substitute_span(value, args, pos),
            },
        }
    }

    fn substitute_span(&mut self, span: &TextSpan, args: &[ArgValue], pos: Pos) -> TextSpan {
        TextSpan::new(self.substitute_text(&span.raw, args, pos))
    }

    /// Replace `@N` occurrences in raw text with the argument's inline
    /// reading. `@` not followed by digits stays literal.
    fn substitute_text(&mut self, raw: &str, args: &[ArgValue], pos: Pos) -> String {
        let bytes = raw.as_bytes();
        let mut out = String::with_capacity(raw.len());
        let mut i = 0usize;

        while i < bytes.len() {
            if bytes[i] == b'@' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                let start = i + 1;
                let mut end = start;
                while bytes.get(end).is_some_and(u8::is_ascii_digit) {
                    end += 1;
                }
                let index: usize = raw[start..end].parse().unwrap_or(usize::MAX);
                match args.get(index) {
                    Some(ArgValue {
                        inline: Some(text), ..
                    }) => out.push_str(text),
                    Some(ArgValue { inline: None, .. }) => {
                        self.diags.push(Diagnostic::new(
                            ErrorKind::BindingKindMismatch,
                            pos,
                            format!("structural argument '@{}' used in a text position", &raw[start..end]),
                        ));
                        out.push_str(&raw[i..end]);
                    }
                    None => {
                        self.diags.push(Diagnostic::new(
                            ErrorKind::MacroArityError,
                            pos,
                            format!(
                                "'@{}' exceeds the {} provided argument(s)",
                                &raw[start..end],
                                args.len()
                            ),
                        ));
                        out.push_str(&raw[i..end]);
                    }
                }
                i = end;
            } else {
                let ch_len = utf8_len(bytes[i]);
                out.push_str(&raw[i..i + ch_len]);
                i += ch_len;
            }
        }
        out
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

/// The inline-text reading of an argument, when it has one: the expanded
/// text of a pure text argument, or the bare word of a single unbound
/// element line.
fn inline_text(arg: &Node, expanded: &[HtmlNode]) -> Option<String> {
    if !expanded.is_empty()
        && expanded
            .iter()
            .all(|n| matches!(n, HtmlNode::Text { .. } | HtmlNode::Raw { .. }))
    {
        let mut text = String::new();
        for node in expanded {
            match node {
                HtmlNode::Text { pieces, .. } => {
                    for piece in pieces {
                        match piece {
                            TextPiece::Text(s) | TextPiece::Raw(s) => text.push_str(s),
                        }
                    }
                }
                HtmlNode::Raw { text: t } => text.push_str(t),
                HtmlNode::Element { .. } => unreachable!(),
            }
        }
        return Some(text);
    }

    if let Node::Element {
        name,
        self_closing: false,
        attrs,
        text: None,
        children,
        ..
    } = arg
    {
        if attrs.is_empty() && children.is_empty() {
            return Some(name.clone());
        }
    }
    None
}
