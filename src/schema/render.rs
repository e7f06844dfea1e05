// Textual rendering configuration
//
// Schemas and nodes render as JSON-compatible text. `JsonOptions` controls
// the layout so output is deterministic and diffable.

/// Configuration for `to_json` rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonOptions {
    /// Render offsets, strides, element widths and byte order for leaves
    pub detailed: bool,

    /// Number of `pad` repetitions per nesting level
    pub indent: usize,

    /// Nesting level the output starts at
    pub depth: usize,

    /// String repeated to build indentation
    pub pad: String,

    /// String written after each entry
    pub eoe: String,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            detailed: true,
            indent: 2,
            depth: 0,
            pad: " ".to_string(),
            eoe: "\n".to_string(),
        }
    }
}

impl JsonOptions {
    /// Creates rendering options with default layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-line output with no indentation
    pub fn compact() -> Self {
        Self {
            indent: 0,
            pad: String::new(),
            eoe: String::new(),
            ..Self::default()
        }
    }

    pub fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn pad(mut self, pad: impl Into<String>) -> Self {
        self.pad = pad.into();
        self
    }

    pub fn eoe(mut self, eoe: impl Into<String>) -> Self {
        self.eoe = eoe.into();
        self
    }

    pub(crate) fn write_indent(&self, out: &mut String, depth: usize) {
        for _ in 0..self.indent * depth {
            out.push_str(&self.pad);
        }
    }
}

/// Writes `"key":`
pub(crate) fn write_key(out: &mut String, key: &str) {
    write_quoted(out, key);
    out.push(':');
}

/// Writes `value` as a JSON string literal, escaping as needed
pub(crate) fn write_quoted(out: &mut String, value: &str) {
    match serde_json::to_string(value) {
        Ok(quoted) => out.push_str(&quoted),
        // serializing a &str cannot fail; keep a plain fallback regardless
        Err(_) => {
            out.push('"');
            out.push_str(value);
            out.push('"');
        }
    }
}

/// Renders a sequence of entries between `open` and `close`, one per line,
/// using `write_entry` for the content of each entry.
pub(crate) fn write_block<I, F>(
    out: &mut String,
    options: &JsonOptions,
    depth: usize,
    open: char,
    close: char,
    entries: I,
    mut write_entry: F,
) where
    I: ExactSizeIterator,
    F: FnMut(&mut String, I::Item),
{
    let count = entries.len();
    if count == 0 {
        out.push(open);
        out.push(close);
        return;
    }
    out.push(open);
    out.push_str(&options.eoe);
    for (i, entry) in entries.enumerate() {
        options.write_indent(out, depth + 1);
        write_entry(out, entry);
        if i + 1 < count {
            out.push(',');
        }
        out.push_str(&options.eoe);
    }
    options.write_indent(out, depth);
    out.push(close);
}
