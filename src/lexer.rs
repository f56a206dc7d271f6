use crate::error::{Diagnostic, ErrorKind, Pos};

/// The detected indentation unit for one source.
///
/// The first line with a non-empty leading prefix fixes the unit for the
/// whole compilation: a tab prefix means one tab per level, a space prefix
/// means that many spaces per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentUnit {
    Undetected,
    Spaces(usize),
    Tabs,
}

impl IndentUnit {
    /// Number of leading characters that make up `levels` levels.
    pub fn prefix_len(&self, levels: usize) -> usize {
        match self {
            IndentUnit::Spaces(n) => n * levels,
            IndentUnit::Tabs => levels,
            IndentUnit::Undetected => 0,
        }
    }
}

/// A surviving (non-empty, non-comment) source line.
#[derive(Debug, Clone)]
pub struct SourceLine {
    /// Logical indentation level; 0 for roots.
    pub level: usize,
    /// Content with the comment stripped and surrounding whitespace trimmed.
    pub content: String,
    /// The physical line minus its terminator, kept for raw blocks.
    pub verbatim: String,
    /// Line number and the column of the first content character.
    pub pos: Pos,
}

/// The scanner's output: logical lines plus the unit they were measured in.
#[derive(Debug)]
pub struct Scan {
    pub lines: Vec<SourceLine>,
    pub unit: IndentUnit,
}

/// Split a source string into logical lines.
///
/// Lines that fail indentation validation are reported and dropped; the
/// rest of the source still scans so later errors stay visible.
pub fn scan(source: &str, diags: &mut Vec<Diagnostic>) -> Scan {
    let mut lines = Vec::new();
    let mut unit = IndentUnit::Undetected;
    let mut prev_level = 0usize;

    for (idx, raw) in source.split('\n').enumerate() {
        let verbatim = raw.strip_suffix('\r').unwrap_or(raw);
        let leading_len = verbatim
            .chars()
            .take_while(|&c| c == ' ' || c == '\t')
            .count();
        let leading = &verbatim[..leading_len];
        let content = strip_comment(&verbatim[leading_len..]).trim_end();

        if content.is_empty() {
            continue;
        }

        let pos = Pos::new(idx + 1, leading_len + 1);
        let level = match measure(leading, &mut unit) {
            Ok(level) => level,
            Err(message) => {
                diags.push(Diagnostic::new(ErrorKind::IndentationUnitConflict, pos, message));
                continue;
            }
        };

        if level > prev_level + 1 {
            diags.push(Diagnostic::new(
                ErrorKind::IndentationJump,
                pos,
                format!(
                    "indentation jumped from level {} to level {}",
                    prev_level, level
                ),
            ));
            continue;
        }
        prev_level = level;

        lines.push(SourceLine {
            level,
            content: content.to_string(),
            verbatim: verbatim.to_string(),
            pos,
        });
    }

    Scan { lines, unit }
}

/// Convert a leading-whitespace prefix into a level, detecting the unit on
/// the first indented line.
fn measure(leading: &str, unit: &mut IndentUnit) -> Result<usize, String> {
    if leading.is_empty() {
        return Ok(0);
    }
    if leading.contains(' ') && leading.contains('\t') {
        return Err("mixed tabs and spaces in indentation".to_string());
    }

    if *unit == IndentUnit::Undetected {
        *unit = if leading.starts_with('\t') {
            IndentUnit::Tabs
        } else {
            IndentUnit::Spaces(leading.len())
        };
    }

    match *unit {
        IndentUnit::Tabs => {
            if leading.contains(' ') {
                return Err("expected tab indentation, found spaces".to_string());
            }
            Ok(leading.len())
        }
        IndentUnit::Spaces(width) => {
            if leading.contains('\t') {
                return Err("expected space indentation, found a tab".to_string());
            }
            if leading.len() % width != 0 {
                return Err(format!(
                    "indentation of {} spaces is not a multiple of the unit ({})",
                    leading.len(),
                    width
                ));
            }
            Ok(leading.len() / width)
        }
        IndentUnit::Undetected => unreachable!(),
    }
}

/// Cut the line at an unescaped `#//` marker outside double quotes.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_quotes = false;
    let mut i = 0usize;

    while i < bytes.len() {
        let escaped = i > 0 && bytes[i - 1] == b'\\';
        match bytes[i] {
            b'"' if !escaped => in_quotes = !in_quotes,
            b'#' if !escaped && !in_quotes && bytes[i..].starts_with(b"#//") => {
                return &line[..i];
            }
            _ => {}
        }
        i += 1;
    }
    line
}
