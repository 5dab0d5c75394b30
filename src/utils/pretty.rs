//! Pretty printing: width-aware documents and an indenting line writer.

use pretty::{BoxAllocator, DocAllocator, DocBuilder};

/// Default line width for pretty printing.
pub const DEFAULT_WIDTH: usize = 80;

/// A value that lays itself out as a `pretty` document.
pub trait PrettyPrint {
    /// Build the document.
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D>;

    /// Lay out within `width` columns.
    fn render(&self, width: usize) -> String {
        let mut output = String::new();
        // Writing into a String cannot fail.
        let _ = self.to_doc(&BoxAllocator).render_fmt(width, &mut output);
        output
    }

    /// Lay out within [`DEFAULT_WIDTH`] columns.
    fn to_pretty_string(&self) -> String {
        self.render(DEFAULT_WIDTH)
    }
}

/// Collects output lines, each prefixed with `depth` copies of an indent unit.
#[derive(Debug, Clone)]
pub struct CodeFormatter {
    lines: Vec<String>,
    depth: usize,
    unit: String,
}

impl CodeFormatter {
    /// Empty formatter indenting with `unit`.
    pub fn new(unit: &str) -> Self {
        Self { lines: Vec::new(), depth: 0, unit: unit.to_string() }
    }

    /// One level deeper.
    pub fn indent(&mut self) {
        self.depth += 1;
    }

    /// One level shallower, stopping at zero.
    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Append `text` at the current depth; embedded newlines start new lines.
    pub fn line(&mut self, text: &str) {
        let prefix = self.unit.repeat(self.depth);
        for part in text.split('\n') {
            if part.is_empty() {
                self.lines.push(String::new());
            } else {
                self.lines.push(format!("{}{}", prefix, part));
            }
        }
    }

    /// Run `f` one level deeper.
    pub fn nested<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.indent();
        f(self);
        self.dedent();
    }

    /// `header {`, the nested body, then `}`.
    pub fn block<F: FnOnce(&mut Self)>(&mut self, header: &str, f: F) {
        self.line(&format!("{} {{", header));
        self.nested(f);
        self.line("}");
    }

    /// Every line, newline-terminated.
    pub fn finish(self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in self.lines {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}
