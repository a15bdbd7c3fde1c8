//! Generic ordered configuration block.

const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Directive { name: String, value: String },
    Block { header: String, body: String },
}

/// An ordered sequence of directive lines and nested blocks.
///
/// Nested blocks take pre-rendered body text, which lets a location
/// rendered on its own be embedded into a server unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfBlock {
    entries: Vec<Entry>,
}

impl ConfBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name value;`, or `name;` when `value` is empty.
    pub fn add_directive(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push(Entry::Directive {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Append `header { body }`.
    pub fn add_block(&mut self, header: impl Into<String>, body: impl Into<String>) -> &mut Self {
        self.entries.push(Entry::Block {
            header: header.into(),
            body: body.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                Entry::Directive { name, value } if value.is_empty() => {
                    out.push_str(name);
                    out.push_str(";\n");
                }
                Entry::Directive { name, value } => {
                    out.push_str(name);
                    out.push(' ');
                    out.push_str(value);
                    out.push_str(";\n");
                }
                Entry::Block { header, body } => out.push_str(&wrap(header, body)),
            }
        }
        out
    }
}

/// Render `header {`, the body indented one level, and `}`.
pub fn wrap(header: &str, body: &str) -> String {
    format!("{header} {{\n{}}}\n", indent(body))
}

fn indent(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(INDENT);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_keep_insertion_order() {
        let mut block = ConfBlock::new();
        block
            .add_directive("listen", "443 ssl")
            .add_directive("server_name", "a.example.com")
            .add_directive("internal", "");

        assert_eq!(
            block.render(),
            "listen 443 ssl;\nserver_name a.example.com;\ninternal;\n"
        );
        assert_eq!(block.len(), 3);
    }

    #[test]
    fn test_nested_blocks_indent() {
        let mut inner = ConfBlock::new();
        inner.add_directive("root", "/srv");

        let mut outer = ConfBlock::new();
        outer
            .add_directive("listen", "80")
            .add_block("location /", inner.render());

        assert_eq!(
            wrap("server", &outer.render()),
            "server {\n    listen 80;\n    location / {\n        root /srv;\n    }\n}\n"
        );
    }

    #[test]
    fn test_no_deduplication() {
        let mut block = ConfBlock::new();
        block.add_directive("allow", "10.0.0.1").add_directive("allow", "10.0.0.1");
        assert_eq!(block.render(), "allow 10.0.0.1;\nallow 10.0.0.1;\n");
    }

    #[test]
    fn test_empty_block_body() {
        assert_eq!(wrap("events", ""), "events {\n}\n");
    }
}
