//! Althtml: an indentation-structured templating language that compiles
//! to HTML.
//!
//! The pipeline is a straight line: the lexer splits the source into
//! leveled lines, the parser classifies each line and threads them into a
//! tree, the expander resolves `set` bindings and macros against a single
//! shared namespace, and the emitter serializes the result.
//!
//! ```text
//! set user = "u"
//!
//! html
//!   body
//!     div btn #user- #userId
//!       p | Hello user
//! ```
//!
//! Language surface:
//! - indentation gives the hierarchy; the first indented line fixes the
//!   unit (N spaces or one tab per level)
//! - bare words on a tag line are classes, `#…` tokens build the id,
//!   `name="value"` pairs pass through, `|` starts same-line text
//! - `set name = "…"` / `set name` + block binds a string, a raw block,
//!   or a template subtree; bound names substitute wherever they appear
//!   as whole words in text and attribute values
//! - `:macro name` / `:macro !name` defines macros invoked with `@name`
//!   or called with `!name`, the latter taking its indented child lines
//!   as positional arguments spliced at `@0`, `@1`, …
//! - `raw` / `raw@` blocks copy their lines through untouched (`raw@`
//!   still substitutes bindings)
//! - `tag>` self-closes; void HTML elements self-close on their own
//! - `#// …` comments run to end of line
//!
//! Compilation collects every error it can reach instead of stopping at
//! the first one; [`compile`] returns either the HTML string or the full
//! diagnostic list.

pub mod ast;
pub mod config;
pub mod emit;
pub mod error;
pub mod expand;
pub mod lexer;
pub mod parser;

pub use error::{Diagnostic, ErrorKind, Pos};

use expand::Environment;

/// A compiler whose binding environment survives across calls.
///
/// Feeding header sources through [`Compiler::load_header`] makes their
/// `set` and `:macro` definitions visible to every later
/// [`Compiler::compile`] call; this is the prelude mechanism the CLI
/// builds on.
#[derive(Debug, Default)]
pub struct Compiler {
    env: Environment,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile one source. Top-level bindings made by the source stay in
    /// the compiler afterwards.
    pub fn compile(&mut self, source: &str) -> Result<String, Vec<Diagnostic>> {
        let mut diags = Vec::new();
        let nodes = parser::parse(source, &mut diags);
        let expanded = expand::expand(&nodes, &mut self.env, &mut diags);
        let html = emit::emit(&expanded);
        if diags.is_empty() {
            Ok(html)
        } else {
            Err(diags)
        }
    }

    /// Compile a source for its bindings only, discarding the HTML.
    pub fn load_header(&mut self, source: &str) -> Result<(), Vec<Diagnostic>> {
        self.compile(source).map(|_| ())
    }

    /// Drop every binding accumulated so far.
    pub fn reset_bindings(&mut self) {
        self.env.clear();
    }
}

/// One-shot compilation with a fresh environment.
pub fn compile(source: &str) -> Result<String, Vec<Diagnostic>> {
    Compiler::new().compile(source)
}
