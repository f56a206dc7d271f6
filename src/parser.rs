use crate::ast::{AttrPart, LineForm, Node, SetBody, TextSpan};
use crate::emit::is_void;
use crate::error::{Diagnostic, ErrorKind, Pos};
use crate::lexer::{self, IndentUnit, SourceLine};

/// Parse a full source string into a forest of level-0 nodes.
///
/// Lines that fail to classify are reported and skipped together with
/// their block, so one bad line cannot swallow later errors.
pub fn parse(source: &str, diags: &mut Vec<Diagnostic>) -> Vec<Node> {
    let scan = lexer::scan(source, diags);
    let mut p = Parser {
        lines: scan.lines,
        unit: scan.unit,
        cursor: 0,
    };
    p.parse_block(0, diags)
}

// ---------------------------------------------------------------------------
// Internal parser state
// ---------------------------------------------------------------------------

struct Parser {
    lines: Vec<SourceLine>,
    unit: IndentUnit,
    cursor: usize,
}

impl Parser {
    fn current_level(&self) -> Option<usize> {
        self.lines.get(self.cursor).map(|l| l.level)
    }

    fn next_is_deeper(&self, level: usize) -> bool {
        self.current_level().is_some_and(|l| l > level)
    }

    /// Drop all lines deeper than `level` (after a failed statement).
    fn skip_block(&mut self, level: usize) {
        while self.current_level().is_some_and(|l| l > level) {
            self.cursor += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Block parser
    // -----------------------------------------------------------------------

    /// Parse all consecutive statements at exactly `expected` indentation.
    /// Stops (without consuming) when indentation drops below `expected`.
    fn parse_block(&mut self, expected: usize, diags: &mut Vec<Diagnostic>) -> Vec<Node> {
        let mut nodes = Vec::new();

        loop {
            match self.current_level() {
                None => break,
                Some(l) if l < expected => break,
                Some(l) if l > expected => {
                    // The lexer already validates jumps; this guards the
                    // block structure after a skipped line.
                    let pos = self.lines[self.cursor].pos;
                    diags.push(Diagnostic::new(
                        ErrorKind::IndentationJump,
                        pos,
                        format!("expected level {}, found level {}", expected, l),
                    ));
                    self.skip_block(expected);
                    continue;
                }
                Some(_) => {}
            }
            self.parse_statement(expected, &mut nodes, diags);
        }

        nodes
    }

    // -----------------------------------------------------------------------
    // Statement parser
    // -----------------------------------------------------------------------

    fn parse_statement(&mut self, level: usize, out: &mut Vec<Node>, diags: &mut Vec<Diagnostic>) {
        let line = self.lines[self.cursor].clone();
        self.cursor += 1;
        let pos = line.pos;

        let Some(form) = classify(&line.content, pos, diags) else {
            self.skip_block(level);
            return;
        };

        match form {
            LineForm::Tag {
                name,
                self_closing,
                attrs,
                mut text,
            } => {
                let closed = self_closing || is_void(&name) || is_doctype(&name);
                if closed && text.is_some() {
                    diags.push(Diagnostic::new(
                        ErrorKind::SelfClosingHasChildren,
                        pos,
                        format!("'{}' cannot carry pipe text", name),
                    ));
                    text = None;
                }
                let children = if self.next_is_deeper(level) {
                    let block = self.parse_block(level + 1, diags);
                    if closed {
                        diags.push(Diagnostic::new(
                            ErrorKind::SelfClosingHasChildren,
                            pos,
                            format!("'{}' cannot have a block body", name),
                        ));
                        Vec::new()
                    } else {
                        block
                    }
                } else {
                    Vec::new()
                };
                out.push(Node::Element {
                    name,
                    self_closing,
                    attrs,
                    text,
                    children,
                    pos,
                });
            }

            LineForm::Text { span, explicit } => {
                out.push(Node::Text {
                    span,
                    preserve: explicit,
                    pos,
                });
                // Deeper lines after a text line belong to the same parent.
                if self.next_is_deeper(level) {
                    let siblings = self.parse_block(level + 1, diags);
                    out.extend(siblings);
                }
            }

            LineForm::Set { name, inline_value } => {
                let body = match inline_value {
                    Some(value) => {
                        let body = SetBody::Inline(value);
                        out.push(Node::SetBinding { name, body, pos });
                        if self.next_is_deeper(level) {
                            let siblings = self.parse_block(level + 1, diags);
                            out.extend(siblings);
                        }
                        return;
                    }
                    None if self.next_is_deeper(level) => {
                        SetBody::Block(self.parse_block(level + 1, diags))
                    }
                    // A bodyless `set` binds the empty string.
                    None => SetBody::Inline(String::new()),
                };
                out.push(Node::SetBinding { name, body, pos });
            }

            LineForm::MacroDef {
                name,
                parameterized,
            } => {
                let body = if self.next_is_deeper(level) {
                    self.parse_block(level + 1, diags)
                } else {
                    Vec::new()
                };
                out.push(Node::MacroBinding {
                    name,
                    parameterized,
                    body,
                    pos,
                });
            }

            LineForm::MacroRef {
                name,
                parameterized,
            } => {
                let args = if parameterized {
                    if self.next_is_deeper(level) {
                        self.parse_block(level + 1, diags)
                    } else {
                        Vec::new()
                    }
                } else {
                    if self.next_is_deeper(level) {
                        diags.push(Diagnostic::new(
                            ErrorKind::MacroArityError,
                            pos,
                            format!("macro '@{}' takes no argument block", name),
                        ));
                        self.skip_block(level);
                    }
                    Vec::new()
                };
                out.push(Node::MacroInvocation {
                    name,
                    parameterized,
                    args,
                    pos,
                });
            }

            LineForm::Raw { substitute } => {
                let lines = self.take_raw_lines(level);
                out.push(Node::RawBlock {
                    lines,
                    substitute,
                    pos,
                });
            }

            LineForm::MacroArg { index } => {
                out.push(Node::MacroArg { index, pos });
                if self.next_is_deeper(level) {
                    let siblings = self.parse_block(level + 1, diags);
                    out.extend(siblings);
                }
            }
        }
    }

    /// Capture the block under a `raw` directive verbatim, with the
    /// directive's level+1 indentation prefix removed. Deeper lines keep
    /// their extra indentation.
    fn take_raw_lines(&mut self, directive_level: usize) -> Vec<String> {
        let strip = self.unit.prefix_len(directive_level + 1);
        let mut lines = Vec::new();
        while self.current_level().is_some_and(|l| l > directive_level) {
            let verbatim = &self.lines[self.cursor].verbatim;
            lines.push(verbatim.get(strip..).unwrap_or("").to_string());
            self.cursor += 1;
        }
        lines
    }
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

pub(crate) fn is_doctype(name: &str) -> bool {
    name.eq_ignore_ascii_case("!doctype")
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Classify one stripped line into its [`LineForm`].
fn classify(content: &str, pos: Pos, diags: &mut Vec<Diagnostic>) -> Option<LineForm> {
    if let Some(rest) = content.strip_prefix("set ") {
        return classify_set(rest, pos, diags);
    }

    if content.starts_with(':') {
        return classify_macro_def(content, pos, diags);
    }

    if content == "raw" || content == "raw@" {
        return Some(LineForm::Raw {
            substitute: content.ends_with('@'),
        });
    }
    if content.starts_with("raw ") || content.starts_with("raw@") {
        diags.push(Diagnostic::new(
            ErrorKind::RawBlockMisuse,
            pos,
            "inline content on a raw directive; put it on an indented line",
        ));
        return None;
    }

    // `!DOCTYPE` is a tag form, checked before macro dispatch. `get`
    // also guards against a multibyte char straddling byte 8.
    if let Some(head) = content.get(..8) {
        if head.eq_ignore_ascii_case("!doctype")
            && content[8..]
                .chars()
                .next()
                .map_or(true, |c| c.is_ascii_whitespace())
        {
            let (attrs, text) = parse_attrs(&content[8..], pos, 8, diags);
            return Some(LineForm::Tag {
                name: head.to_string(),
                self_closing: false,
                attrs,
                text,
            });
        }
    }

    if let Some(rest) = content.strip_prefix('@') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            // Indices beyond usize are nonsense input; saturate.
            let index = rest.parse::<usize>().unwrap_or(usize::MAX);
            return Some(LineForm::MacroArg { index });
        }
        if is_name(rest) {
            return Some(LineForm::MacroRef {
                name: rest.to_string(),
                parameterized: false,
            });
        }
        diags.push(Diagnostic::new(
            ErrorKind::UnknownDirective,
            pos,
            format!("'@{}' is not a macro reference or placeholder", rest),
        ));
        return None;
    }

    if let Some(rest) = content.strip_prefix('!') {
        if is_name(rest) {
            return Some(LineForm::MacroRef {
                name: rest.to_string(),
                parameterized: true,
            });
        }
        diags.push(Diagnostic::new(
            ErrorKind::UnknownDirective,
            pos,
            format!("'!{}' is not a macro call", rest),
        ));
        return None;
    }

    if let Some(rest) = content.strip_prefix('|') {
        return Some(LineForm::Text {
            span: TextSpan::new(pipe_text(rest)),
            explicit: true,
        });
    }

    if let Some(form) = classify_tag(content, pos, diags) {
        return Some(form);
    }

    // Implicit text. A fully double-quoted line preserves its interior
    // whitespace; anything else collapses at emission.
    if content.len() >= 2 && content.starts_with('"') && content.ends_with('"') {
        return Some(LineForm::Text {
            span: TextSpan::new(&content[1..content.len() - 1]),
            explicit: true,
        });
    }
    Some(LineForm::Text {
        span: TextSpan::new(content),
        explicit: false,
    })
}

fn classify_set(rest: &str, pos: Pos, diags: &mut Vec<Diagnostic>) -> Option<LineForm> {
    let (name_part, value_part) = match rest.find('=') {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };

    let name = name_part.trim();
    if name.is_empty() {
        diags.push(Diagnostic::new(
            ErrorKind::MalformedAttribute,
            pos,
            "variable name missing after 'set'",
        ));
        return None;
    }
    if !is_name(name) {
        diags.push(Diagnostic::new(
            ErrorKind::MalformedAttribute,
            pos,
            format!("'{}' is not a valid binding name", name),
        ));
        return None;
    }

    let inline_value = match value_part {
        None => None,
        Some(raw) => {
            let raw = raw.trim();
            match unquote(raw) {
                Ok(value) => Some(value),
                Err(message) => {
                    diags.push(Diagnostic::new(ErrorKind::MalformedAttribute, pos, message));
                    return None;
                }
            }
        }
    };

    Some(LineForm::Set {
        name: name.to_string(),
        inline_value,
    })
}

fn classify_macro_def(content: &str, pos: Pos, diags: &mut Vec<Diagnostic>) -> Option<LineForm> {
    let Some(rest) = content.strip_prefix(":macro ") else {
        diags.push(Diagnostic::new(
            ErrorKind::UnknownDirective,
            pos,
            format!("unrecognized directive '{}'", first_word(content)),
        ));
        return None;
    };

    let rest = rest.trim();
    let (parameterized, name) = match rest.strip_prefix('!') {
        Some(name) => (true, name),
        None => (false, rest),
    };

    if !is_name(name) {
        diags.push(Diagnostic::new(
            ErrorKind::UnknownDirective,
            pos,
            if name.is_empty() {
                "macro name missing after ':macro'".to_string()
            } else {
                format!("'{}' is not a valid macro name", name)
            },
        ));
        return None;
    }

    Some(LineForm::MacroDef {
        name: name.to_string(),
        parameterized,
    })
}

fn classify_tag(content: &str, pos: Pos, diags: &mut Vec<Diagnostic>) -> Option<LineForm> {
    let bytes = content.as_bytes();
    let mut i = 0usize;

    // A `<` sigil admits names that would otherwise dispatch as directives.
    let sigil = bytes.first() == Some(&b'<');
    if sigil {
        i += 1;
    }
    let name_start = i;
    if !bytes.get(i).is_some_and(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    while bytes
        .get(i)
        .is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        i += 1;
    }
    let name = &content[name_start..i];

    let self_closing = bytes.get(i) == Some(&b'>');
    if self_closing {
        i += 1;
    }

    // The head must end the line or be followed by whitespace or pipe;
    // anything else (`a.b`, `img>x`) is not a tag line.
    match bytes.get(i) {
        None => {}
        Some(&b) if b.is_ascii_whitespace() || b == b'|' => {}
        Some(_) => return None,
    }

    let (attrs, text) = parse_attrs(&content[i..], pos, i, diags);
    Some(LineForm::Tag {
        name: name.to_string(),
        self_closing,
        attrs,
        text,
    })
}

fn first_word(content: &str) -> &str {
    content.split_ascii_whitespace().next().unwrap_or(content)
}

/// One leading space after `|` is the separator; the rest is verbatim.
fn pipe_text(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}

// ---------------------------------------------------------------------------
// Attribute tokenization
// ---------------------------------------------------------------------------

/// Tokenize the region between a tag head and the end of line: attribute
/// pairs, id fragments, bare classes, and an optional `|` text remainder.
fn parse_attrs(
    region: &str,
    pos: Pos,
    offset: usize,
    diags: &mut Vec<Diagnostic>,
) -> (Vec<AttrPart>, Option<TextSpan>) {
    let bytes = region.as_bytes();
    let mut attrs = Vec::new();
    let mut text = None;
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if bytes[i] == b'|' {
            text = Some(TextSpan::new(pipe_text(&region[i + 1..])));
            break;
        }

        let start = i;
        let mut eq_at = None;
        let mut in_quotes = false;
        let mut pipe_break = false;
        while i < bytes.len() {
            let b = bytes[i];
            if in_quotes {
                match b {
                    b'\\' if i + 1 < bytes.len() => i += 2,
                    b'"' => {
                        in_quotes = false;
                        i += 1;
                    }
                    _ => i += 1,
                }
            } else {
                match b {
                    b'"' => {
                        in_quotes = true;
                        i += 1;
                    }
                    b'|' => {
                        pipe_break = true;
                        break;
                    }
                    b'=' => {
                        if eq_at.is_none() {
                            eq_at = Some(i - start);
                        }
                        i += 1;
                    }
                    b if b.is_ascii_whitespace() => break,
                    _ => i += 1,
                }
            }
        }
        let token_pos = Pos::new(pos.line, pos.column + offset + start);
        if in_quotes {
            diags.push(Diagnostic::new(
                ErrorKind::MalformedAttribute,
                token_pos,
                "unterminated quoted value",
            ));
        }

        classify_attr_token(&region[start..i], eq_at, token_pos, &mut attrs, diags);

        if pipe_break {
            text = Some(TextSpan::new(pipe_text(&region[i + 1..])));
            break;
        }
    }

    (attrs, text)
}

fn classify_attr_token(
    token: &str,
    eq_at: Option<usize>,
    pos: Pos,
    attrs: &mut Vec<AttrPart>,
    diags: &mut Vec<Diagnostic>,
) {
    if let Some(rest) = token.strip_prefix('#') {
        attrs.push(AttrPart::IdFragment {
            value: TextSpan::new(rest),
        });
        return;
    }

    let Some(eq_at) = eq_at else {
        attrs.push(AttrPart::Class {
            word: token.to_string(),
        });
        return;
    };

    let name = &token[..eq_at];
    let raw_value = &token[eq_at + 1..];
    if name.is_empty() {
        diags.push(Diagnostic::new(
            ErrorKind::MalformedAttribute,
            pos,
            "'=' without an attribute name",
        ));
        return;
    }
    if !is_name(name) {
        diags.push(Diagnostic::new(
            ErrorKind::MalformedAttribute,
            pos,
            format!("'{}' is not a valid attribute name", name),
        ));
        return;
    }

    let value = if raw_value.starts_with('"') {
        match unquote(raw_value) {
            Ok(v) => v,
            Err(message) => {
                diags.push(Diagnostic::new(ErrorKind::MalformedAttribute, pos, message));
                return;
            }
        }
    } else {
        raw_value.to_string()
    };

    if name.eq_ignore_ascii_case("class") {
        attrs.push(AttrPart::ExplicitClass {
            value: TextSpan::new(value),
        });
    } else {
        attrs.push(AttrPart::Pair {
            name: name.to_string(),
            value: TextSpan::new(value),
        });
    }
}

/// Strip the surrounding quotes of a `"…"` literal and resolve `\"` and
/// `\\` escapes. Any other backslash is kept as written.
fn unquote(raw: &str) -> Result<String, String> {
    let Some(inner) = raw.strip_prefix('"') else {
        return Err("value must be enclosed in double quotes".to_string());
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                return if chars.as_str().is_empty() {
                    Ok(out)
                } else {
                    Err("unexpected content after closing quote".to_string())
                };
            }
            '\\' => match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err("unterminated quoted value".to_string()),
            },
            other => out.push(other),
        }
    }
    Err("unterminated quoted value".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs_of(line: &str) -> (Vec<AttrPart>, Option<TextSpan>) {
        let mut diags = Vec::new();
        let form = classify(line, Pos::new(1, 1), &mut diags).expect("line should classify");
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        match form {
            LineForm::Tag { attrs, text, .. } => (attrs, text),
            other => panic!("expected a tag, got {other:?}"),
        }
    }

    #[test]
    fn tokenizes_classes_ids_and_pairs() {
        let (attrs, text) = attrs_of(r#"div btn #user- #userId data-value="some \"quoted\" data""#);
        assert!(text.is_none());
        assert_eq!(attrs.len(), 4);
        assert_eq!(
            attrs[0],
            AttrPart::Class {
                word: "btn".to_string()
            }
        );
        assert_eq!(
            attrs[3],
            AttrPart::Pair {
                name: "data-value".to_string(),
                value: TextSpan::new(r#"some "quoted" data"#),
            }
        );
    }

    #[test]
    fn pipe_ends_attributes() {
        let (attrs, text) = attrs_of("p strong | read me");
        assert_eq!(attrs.len(), 1);
        assert_eq!(text.unwrap().raw, "read me");
    }

    #[test]
    fn class_pair_is_kept_separately() {
        let (attrs, _) = attrs_of(r#"div class="a b" c"#);
        assert!(matches!(&attrs[0], AttrPart::ExplicitClass { value } if value.raw == "a b"));
        assert!(matches!(&attrs[1], AttrPart::Class { word } if word == "c"));
    }

    #[test]
    fn trailing_angle_marks_self_closing() {
        let mut diags = Vec::new();
        let form = classify("img> src=\"x.png\"", Pos::new(1, 1), &mut diags).unwrap();
        assert!(matches!(
            form,
            LineForm::Tag {
                self_closing: true,
                ..
            }
        ));
    }

    #[test]
    fn angle_sigil_names_a_custom_element() {
        let mut diags = Vec::new();
        let form = classify("<set x=\"1\"", Pos::new(1, 1), &mut diags).unwrap();
        match form {
            LineForm::Tag { name, attrs, .. } => {
                assert_eq!(name, "set");
                assert_eq!(attrs.len(), 1);
            }
            other => panic!("expected tag, got {other:?}"),
        }
    }

    #[test]
    fn digit_lines_are_implicit_text() {
        let mut diags = Vec::new();
        let form = classify("3 dogs barked", Pos::new(1, 1), &mut diags).unwrap();
        assert!(matches!(form, LineForm::Text { explicit: false, .. }));
    }

    #[test]
    fn unterminated_quote_is_reported() {
        let mut diags = Vec::new();
        classify("div title=\"oops", Pos::new(1, 1), &mut diags);
        assert!(diags
            .iter()
            .any(|d| d.kind == ErrorKind::MalformedAttribute));
    }

    #[test]
    fn raw_with_inline_content_is_misuse() {
        let mut diags = Vec::new();
        assert!(classify("raw <b>hi</b>", Pos::new(1, 1), &mut diags).is_none());
        assert_eq!(diags[0].kind, ErrorKind::RawBlockMisuse);
    }

    #[test]
    fn set_value_must_be_quoted() {
        let mut diags = Vec::new();
        assert!(classify("set user = bare", Pos::new(1, 1), &mut diags).is_none());
        assert_eq!(diags[0].kind, ErrorKind::MalformedAttribute);
    }

    #[test]
    fn multibyte_char_at_the_doctype_boundary_is_not_a_tag() {
        let mut diags = Vec::new();
        let form = classify("!doctyp€", Pos::new(1, 1), &mut diags);
        assert!(form.is_none());
        assert_eq!(diags[0].kind, ErrorKind::UnknownDirective);
    }

    #[test]
    fn macro_arg_placeholder_parses() {
        let mut diags = Vec::new();
        let form = classify("@2", Pos::new(1, 1), &mut diags).unwrap();
        assert_eq!(form, LineForm::MacroArg { index: 2 });
    }
}
