//! Indent-aware source text assembly.

/// Accumulates emitted source, tracking the current indentation depth.
#[derive(Debug, Default)]
pub struct CodeWriter {
    buf: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        CodeWriter::default()
    }

    /// Appends one line at the current indentation.
    pub fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    /// Appends an empty line.
    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Appends `header {` and indents.
    pub fn open_block(&mut self, header: &str) {
        self.line(&format!("{header} {{"));
        self.indent += 1;
    }

    /// Dedents and appends `}`.
    pub fn close_block(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    /// Dedents, appends `} header {`, and indents again (`else` arms).
    pub fn chain_block(&mut self, header: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(&format!("}} {header} {{"));
        self.indent += 1;
    }

    /// Dedents and appends `};` (struct definitions).
    pub fn close_block_stmt(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("};");
    }

    /// The assembled text.
    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_indented_inside_blocks() {
        let mut w = CodeWriter::new();
        w.open_block("if (x)");
        w.line("y = 1.0f;");
        w.chain_block("else");
        w.line("y = 0.0f;");
        w.close_block();
        assert_eq!(
            w.finish(),
            "if (x) {\n    y = 1.0f;\n} else {\n    y = 0.0f;\n}\n"
        );
    }

    #[test]
    fn close_never_underflows() {
        let mut w = CodeWriter::new();
        w.close_block();
        assert_eq!(w.finish(), "}\n");
    }
}
