//! Indentation-tracked output buffer.

/// Output buffer for generated kernel-language text.
///
/// Tracks the indentation level and hands out temporary names from a
/// single counter, so `var` and `phi` names never collide within one
/// function.
#[derive(Debug, Default)]
pub struct CodeWriter {
    /// Current indentation level.
    indent: usize,
    /// Generated code output.
    output: String,
    /// Counter for generating unique temporary names.
    temp_counter: u32,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self {
            indent: 0,
            output: String::with_capacity(4096),
            temp_counter: 0,
        }
    }

    /// Generate a unique temporary name with the given prefix.
    pub fn fresh_temp(&mut self, prefix: &str) -> String {
        let n = self.temp_counter;
        self.temp_counter += 1;
        format!("{prefix}{n}")
    }

    /// Increase indentation level.
    pub fn indent(&mut self) {
        self.indent += 1;
    }

    /// Decrease indentation level.
    pub fn dedent(&mut self) {
        debug_assert!(self.indent > 0, "dedent called with zero indent");
        self.indent = self.indent.saturating_sub(1);
    }

    /// Write indentation to output.
    pub fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
    }

    /// Write a string to output.
    pub fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    /// Write a line to output (with indentation and newline).
    pub fn writeln(&mut self, s: &str) {
        self.write_indent();
        self.output.push_str(s);
        self.output.push('\n');
    }

    /// Write pre-rendered lines, re-indented to the current level.
    pub fn write_lines(&mut self, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.newline();
            } else {
                self.writeln(line);
            }
        }
    }

    /// Write a newline.
    pub fn newline(&mut self) {
        self.output.push('\n');
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Take the generated output.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

#[cfg(test)]
mod tests;
