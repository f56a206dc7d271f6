use crate::error::Pos;

/// A run of text that may contain bare-word variable references.
///
/// The language has no `${…}` sigil: a word substitutes iff it is bound at
/// emission time. The raw text is therefore kept as written and segmented
/// against the environment only when the span is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub raw: String,
}

/// One piece of a segmented [`TextSpan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk<'a> {
    Literal(&'a str),
    Var(&'a str),
}

impl TextSpan {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Split the raw text into literal and variable-reference chunks.
    ///
    /// A maximal run of `[A-Za-z0-9_-]` becomes a reference only when
    /// `bound` reports the name as a string-valued binding; every other
    /// run, and every separator, stays literal.
    pub fn segment(&self, bound: impl Fn(&str) -> bool) -> Vec<Chunk<'_>> {
        let mut chunks = Vec::new();
        let s = self.raw.as_str();
        let mut rest = 0usize;
        let mut i = 0usize;
        let bytes = s.as_bytes();

        while i < bytes.len() {
            if is_name_byte(bytes[i]) {
                let start = i;
                while i < bytes.len() && is_name_byte(bytes[i]) {
                    i += 1;
                }
                let word = &s[start..i];
                if bound(word) {
                    if rest < start {
                        chunks.push(Chunk::Literal(&s[rest..start]));
                    }
                    chunks.push(Chunk::Var(word));
                    rest = i;
                }
            } else {
                i += 1;
            }
        }
        if rest < s.len() {
            chunks.push(Chunk::Literal(&s[rest..]));
        }
        chunks
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// One token of an element's attribute list, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrPart {
    /// `name="value"` or `name=value`.
    Pair { name: String, value: TextSpan },
    /// A bare word: an implicit class.
    Class { word: String },
    /// A `#…` token; fragments concatenate into the final `id`.
    IdFragment { value: TextSpan },
    /// The value of a `class="…"` pair, kept apart from implicit classes
    /// so the merge order is stable.
    ExplicitClass { value: TextSpan },
}

/// The parsed classification of a single source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineForm {
    Tag {
        name: String,
        self_closing: bool,
        attrs: Vec<AttrPart>,
        /// Same-line text introduced by `|` after the attributes.
        text: Option<TextSpan>,
    },
    /// A bare text line. `explicit` is true for `|` lines (and quoted
    /// implicit text), which preserve whitespace verbatim.
    Text { span: TextSpan, explicit: bool },
    /// `set name` / `set name = "value"`.
    Set {
        name: String,
        inline_value: Option<String>,
    },
    /// `:macro name` / `:macro !name`.
    MacroDef { name: String, parameterized: bool },
    /// `@name` (nullary) or `!name` (parameterized).
    MacroRef { name: String, parameterized: bool },
    /// `raw` (verbatim) or `raw@` (verbatim with substitution).
    Raw { substitute: bool },
    /// `@N`, a positional placeholder inside a parameterized macro body.
    MacroArg { index: usize },
}

/// How a `set` captured its value at parse time. Classification into a
/// [`crate::expand::BoundValue`] happens during expansion, when the
/// environment is known.
#[derive(Debug, Clone, PartialEq)]
pub enum SetBody {
    /// `set name = "value"` (escapes already resolved); also a bodyless
    /// `set name`, which binds the empty string.
    Inline(String),
    /// `set name` followed by an indented block.
    Block(Vec<Node>),
}

/// A node of the built template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element {
        name: String,
        self_closing: bool,
        attrs: Vec<AttrPart>,
        text: Option<TextSpan>,
        children: Vec<Node>,
        pos: Pos,
    },
    Text {
        span: TextSpan,
        preserve: bool,
        pos: Pos,
    },
    /// A `raw` / `raw@` block; lines are the original source dedented to
    /// the directive's level.
    RawBlock {
        lines: Vec<String>,
        substitute: bool,
        pos: Pos,
    },
    /// Registered into the environment when reached in document order;
    /// never emitted.
    SetBinding {
        name: String,
        body: SetBody,
        pos: Pos,
    },
    MacroBinding {
        name: String,
        parameterized: bool,
        body: Vec<Node>,
        pos: Pos,
    },
    /// `@name` or `!name`. For a parameterized call each entry of `args`
    /// is one direct child line with its subtree.
    MacroInvocation {
        name: String,
        parameterized: bool,
        args: Vec<Node>,
        pos: Pos,
    },
    MacroArg {
        index: usize,
        pos: Pos,
    },
    /// Expansion results spliced into a macro body in place of a
    /// placeholder; passed through untouched by the expander.
    Spliced(Vec<HtmlNode>),
}

impl Node {
    pub fn pos(&self) -> Pos {
        match self {
            Node::Element { pos, .. }
            | Node::Text { pos, .. }
            | Node::RawBlock { pos, .. }
            | Node::SetBinding { pos, .. }
            | Node::MacroBinding { pos, .. }
            | Node::MacroInvocation { pos, .. }
            | Node::MacroArg { pos, .. } => *pos,
            Node::Spliced(_) => Pos::new(0, 0),
        }
    }
}

/// A resolved slice of text content. Substituted raw-string bindings stay
/// verbatim while everything else is escaped at emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPiece {
    Text(String),
    Raw(String),
}

/// The fully expanded tree handed to the emitter: every span resolved,
/// every macro and binding spliced away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlNode {
    Element {
        name: String,
        self_closing: bool,
        id_parts: Vec<String>,
        classes_implicit: Vec<String>,
        classes_explicit: Vec<String>,
        attrs: Vec<(String, String)>,
        children: Vec<HtmlNode>,
    },
    /// Whitespace collapsing already happened during expansion for
    /// implicit text; `preserve: false` only marks the node as a
    /// collapsed line so adjacent ones join with a single space.
    Text {
        pieces: Vec<TextPiece>,
        preserve: bool,
    },
    /// Copied through with no escaping at all.
    Raw { text: String },
}

impl HtmlNode {
    /// Convenience constructor for a single-piece text node.
    pub fn text(text: impl Into<String>, preserve: bool) -> Self {
        HtmlNode::Text {
            pieces: vec![TextPiece::Text(text.into())],
            preserve,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(raw: &str, names: &[&str]) -> Vec<(bool, String)> {
        TextSpan::new(raw)
            .segment(|w| names.contains(&w))
            .into_iter()
            .map(|c| match c {
                Chunk::Literal(s) => (false, s.to_string()),
                Chunk::Var(s) => (true, s.to_string()),
            })
            .collect()
    }

    #[test]
    fn segments_bound_word_at_sentence_end() {
        let chunks = seg("for user.", &["user"]);
        assert_eq!(
            chunks,
            vec![
                (false, "for ".to_string()),
                (true, "user".to_string()),
                (false, ".".to_string()),
            ]
        );
    }

    #[test]
    fn hyphenated_run_is_one_name() {
        // `user-` is a single run and does not match the binding `user`.
        let chunks = seg("user-", &["user"]);
        assert_eq!(chunks, vec![(false, "user-".to_string())]);
    }

    #[test]
    fn unbound_text_is_a_single_literal() {
        let chunks = seg("plain words only", &[]);
        assert_eq!(chunks, vec![(false, "plain words only".to_string())]);
    }
}
