//! Error rendering: the offending source line, a caret under the column,
//! and the classified single-line message.
//!
//! The library never terminates the process — this module only formats.
//! The CLI prints the rendered report and exits non-zero.

use crate::error::Error;

/// Render an error against its source text.
///
/// Without source (pre-parsed modules), only the classified message is
/// produced.
pub fn render(err: &Error, src: Option<&str>) -> String {
    let mut out = String::new();

    if let Some(src) = src {
        let pos = err.pos();
        if pos.line >= 1 {
            if let Some(line) = src.lines().nth(pos.line as usize - 1) {
                out.push_str(line);
                out.push('\n');
                let column = (pos.column.max(1) - 1) as usize;
                out.push_str(&" ".repeat(column));
                out.push_str("^\n");
            }
        }
    }

    out.push_str(&err.to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Pos;
    use pretty_assertions::assert_eq;

    #[test]
    fn caret_points_at_the_column() {
        let err = Error::name("missing", Pos::new(2, 9));
        let src = "x = 1\ny = x + missing";
        assert_eq!(
            render(&err, Some(src)),
            "y = x + missing\n        ^\nNameError: 'missing' is not defined"
        );
    }

    #[test]
    fn without_source_only_the_message_renders() {
        let err = Error::type_error("Cannot divide by zero", Pos::new(1, 1));
        assert_eq!(render(&err, None), "TypeError: Cannot divide by zero");
    }

    #[test]
    fn out_of_range_line_is_tolerated() {
        let err = Error::name("x", Pos::new(99, 1));
        assert_eq!(render(&err, Some("a = 1")), "NameError: 'x' is not defined");
    }
}
