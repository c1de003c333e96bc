//! Text assembly for generated companion files.
//!
//! Output is built line by line through [`SourceWriter`]; there is no
//! post-formatting pass, so whatever the generators write is byte-final.
//! Brace placement is Allman (brace on its own line), indentation is four
//! spaces, matching the engine sources the output sits next to.

// ————————————————————————————————————————————————————————————————————————————
// WRITER
// ————————————————————————————————————————————————————————————————————————————

pub struct SourceWriter {
    buf: String,
    depth: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        SourceWriter { buf: String::new(), depth: 0 }
    }

    pub fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.buf.push('\n');
            return;
        }
        for _ in 0..self.depth {
            self.buf.push_str("    ");
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Header line, then an opening brace on its own line.
    pub fn open(&mut self, header: &str) {
        self.line(header);
        self.line("{");
        self.depth += 1;
    }

    /// Opening brace alone, for a bare scope.
    pub fn open_block(&mut self) {
        self.line("{");
        self.depth += 1;
    }

    /// Closing line at the enclosing depth, e.g. `}` or `};`.
    pub fn close(&mut self, footer: &str) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
        self.line(footer);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl Default for SourceWriter {
    fn default() -> Self {
        SourceWriter::new()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LITERAL FORMATTING
// ————————————————————————————————————————————————————————————————————————————

/// Double literal spelling: integral values keep one fractional digit so
/// the output token is unambiguously a double, everything else uses the
/// shortest round-trip form.
pub fn fmt_double(x: f64) -> String {
    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Double-quoted string literal with the usual escapes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_indents_allman_blocks() {
        let mut w = SourceWriter::new();
        w.open("bool Check()");
        w.open("if (ready)");
        w.line("return true;");
        w.close("}");
        w.line("return false;");
        w.close("}");
        assert_eq!(
            w.into_string(),
            "bool Check()\n{\n    if (ready)\n    {\n        return true;\n    }\n    return false;\n}\n"
        );
    }

    #[test]
    fn blank_lines_carry_no_indentation() {
        let mut w = SourceWriter::new();
        w.open("void F()");
        w.blank();
        w.line("G();");
        w.close("}");
        assert!(w.into_string().contains("{\n\n    G();"));
    }

    #[test]
    fn integral_doubles_keep_a_fraction_digit() {
        assert_eq!(fmt_double(1.0), "1.0");
        assert_eq!(fmt_double(-2.0), "-2.0");
        assert_eq!(fmt_double(1000.0), "1000.0");
        assert_eq!(fmt_double(0.0), "0.0");
    }

    #[test]
    fn fractional_doubles_round_trip_shortest() {
        assert_eq!(fmt_double(0.1), "0.1");
        assert_eq!(fmt_double(6.28318), "6.28318");
        assert_eq!(fmt_double(-0.5), "-0.5");
    }

    #[test]
    fn quoting_escapes_specials() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote("tab\there"), "\"tab\\there\"");
        assert_eq!(quote("back\\slash"), "\"back\\\\slash\"");
    }
}
