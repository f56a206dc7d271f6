use thiserror::Error;

/// A position in the source, 1-based for both line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Classification of a compile diagnostic.
///
/// The `Display` form is the stable short name printed by the CLI between
/// the position and the message (`file:line:col: kind: message`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Mixed tabs/spaces in a leading prefix, or a prefix that is not a
    /// whole multiple of the detected unit.
    #[error("indentation-unit-conflict")]
    IndentationUnitConflict,
    /// Indentation increased by more than one level at once.
    #[error("indentation-jump")]
    IndentationJump,
    /// Unrecognized leading keyword (`:something`, stray `@`, …).
    #[error("unknown-directive")]
    UnknownDirective,
    /// Unterminated quoted value, `=` without a name, unquoted `set` value.
    #[error("malformed-attribute")]
    MalformedAttribute,
    /// Reference to a name with no binding at expansion time.
    #[error("unknown-binding")]
    UnknownBinding,
    /// A binding used where its kind is not allowed (subtree in a span,
    /// `@` on a parameterized macro, …).
    #[error("binding-kind-mismatch")]
    BindingKindMismatch,
    /// `@N` with no matching argument, or a placeholder outside a
    /// parameterized macro body.
    #[error("macro-arity-error")]
    MacroArityError,
    /// Macro expansion exceeded the depth cap.
    #[error("macro-recursion")]
    MacroRecursion,
    /// The same name defined as both `set` and `:macro`.
    #[error("name-conflict")]
    NameConflict,
    /// Inline content on a `raw` / `raw@` directive line.
    #[error("raw-block-misuse")]
    RawBlockMisuse,
    /// A self-closing or void tag given a block body or pipe text.
    #[error("self-closing-has-children")]
    SelfClosingHasChildren,
}

/// A single compile error with its source position.
///
/// Compilation never stops at the first diagnostic; the compiler collects
/// every error it can reach and returns them as a list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {kind}: {message}")]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, pos: Pos, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    pub fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }
}
