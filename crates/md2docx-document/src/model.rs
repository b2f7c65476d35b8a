//! Owned block/inline tree produced by the parser.

use std::collections::HashMap;

/// A parsed markdown document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    /// Top-level blocks in source order.
    pub blocks: Vec<Block>,
}

impl ParsedDocument {
    /// Iterate every block depth-first, including blocks nested in quotes
    /// and list items.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants::new(&self.blocks)
    }

    /// Every image referenced anywhere in the document, in source order.
    #[must_use]
    pub fn images(&self) -> Vec<&ImageRef> {
        let mut images = Vec::new();
        for block in self.descendants() {
            for content in block.inline_groups() {
                collect_images(content, &mut images);
            }
        }
        images
    }

    /// Plain text of the first level-1 heading, if any.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.descendants().find_map(|block| match block {
            Block::Heading {
                level: 1, content, ..
            } => Some(plain_text(content)),
            _ => None,
        })
    }
}

/// Block-level node.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// ATX or setext heading.
    Heading {
        /// Heading level (1-6).
        level: u8,
        content: Vec<Inline>,
        line: usize,
    },
    /// Paragraph of inline content.
    Paragraph { content: Vec<Inline>, line: usize },
    /// Fenced or indented code block.
    CodeBlock {
        /// Language from the fence info string (`None` for indented blocks).
        language: Option<String>,
        /// `key=value` attributes following the language (`width=` caps a
        /// rendered diagram's width in pixels).
        attrs: HashMap<String, String>,
        /// Code with the trailing newline removed.
        code: String,
        line: usize,
    },
    /// Ordered or unordered list.
    List {
        ordered: bool,
        /// First number of an ordered list (1 for unordered).
        start: u64,
        items: Vec<ListItem>,
        line: usize,
    },
    /// Table with one header row.
    Table {
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
        line: usize,
    },
    /// Block quote (including GFM alerts).
    BlockQuote { blocks: Vec<Block>, line: usize },
    /// Thematic break.
    Rule { line: usize },
}

impl Block {
    /// 1-based source line where the block starts.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Heading { line, .. }
            | Self::Paragraph { line, .. }
            | Self::CodeBlock { line, .. }
            | Self::List { line, .. }
            | Self::Table { line, .. }
            | Self::BlockQuote { line, .. }
            | Self::Rule { line } => *line,
        }
    }

    /// Inline sequences owned directly by this block (not by children).
    fn inline_groups(&self) -> Vec<&[Inline]> {
        match self {
            Self::Heading { content, .. } | Self::Paragraph { content, .. } => {
                vec![content.as_slice()]
            }
            Self::Table { header, rows, .. } => header
                .iter()
                .chain(rows.iter().flatten())
                .map(Vec::as_slice)
                .collect(),
            Self::CodeBlock { .. }
            | Self::List { .. }
            | Self::BlockQuote { .. }
            | Self::Rule { .. } => Vec::new(),
        }
    }
}

/// One list item and the blocks it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub blocks: Vec<Block>,
    /// Task list marker state (`Some(true)` for `- [x]`).
    pub task: Option<bool>,
    pub line: usize,
}

/// Inline span.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link {
        url: String,
        title: String,
        content: Vec<Inline>,
    },
    Image(ImageRef),
    SoftBreak,
    HardBreak,
}

/// An image link (`![alt](url "title")`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Link target exactly as written in the source.
    pub url: String,
    pub alt: String,
    pub title: String,
    pub line: usize,
}

/// Concatenate the visible text of inline spans.
///
/// Soft breaks become spaces, hard breaks become newlines, images contribute
/// their alt text.
#[must_use]
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    push_plain_text(inlines, &mut out);
    out
}

fn push_plain_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::Code(text) => out.push_str(text),
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strikethrough(children)
            | Inline::Link {
                content: children, ..
            } => push_plain_text(children, out),
            Inline::Image(image) => out.push_str(&image.alt),
            Inline::SoftBreak => out.push(' '),
            Inline::HardBreak => out.push('\n'),
        }
    }
}

fn collect_images<'a>(inlines: &'a [Inline], images: &mut Vec<&'a ImageRef>) {
    for inline in inlines {
        match inline {
            Inline::Image(image) => images.push(image),
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strikethrough(children)
            | Inline::Link {
                content: children, ..
            } => collect_images(children, images),
            Inline::Text(_) | Inline::Code(_) | Inline::SoftBreak | Inline::HardBreak => {}
        }
    }
}

/// Depth-first iterator over blocks, see [`ParsedDocument::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Block>,
}

impl<'a> Descendants<'a> {
    fn new(blocks: &'a [Block]) -> Self {
        Self {
            stack: blocks.iter().rev().collect(),
        }
    }
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.stack.pop()?;
        match block {
            Block::BlockQuote { blocks, .. } => self.stack.extend(blocks.iter().rev()),
            Block::List { items, .. } => {
                self.stack
                    .extend(items.iter().rev().flat_map(|item| item.blocks.iter().rev()));
            }
            Block::Heading { .. }
            | Block::Paragraph { .. }
            | Block::CodeBlock { .. }
            | Block::Table { .. }
            | Block::Rule { .. } => {}
        }
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_owned())
    }

    fn paragraph(s: &str, line: usize) -> Block {
        Block::Paragraph {
            content: vec![text(s)],
            line,
        }
    }

    #[test]
    fn test_plain_text_flattens_formatting() {
        let inlines = vec![
            text("a "),
            Inline::Strong(vec![text("b")]),
            Inline::SoftBreak,
            Inline::Code("c".to_owned()),
        ];
        assert_eq!(plain_text(&inlines), "a b c");
    }

    #[test]
    fn test_descendants_visits_nested_blocks_in_order() {
        let doc = ParsedDocument {
            blocks: vec![
                paragraph("one", 1),
                Block::BlockQuote {
                    blocks: vec![paragraph("two", 3)],
                    line: 3,
                },
                Block::List {
                    ordered: false,
                    start: 1,
                    items: vec![
                        ListItem {
                            blocks: vec![paragraph("three", 5)],
                            task: None,
                            line: 5,
                        },
                        ListItem {
                            blocks: vec![paragraph("four", 6)],
                            task: None,
                            line: 6,
                        },
                    ],
                    line: 5,
                },
            ],
        };

        let lines: Vec<usize> = doc.descendants().map(Block::line).collect();
        assert_eq!(lines, vec![1, 3, 3, 5, 5, 6]);
    }

    #[test]
    fn test_images_collects_from_tables_and_links() {
        let image = |url: &str| {
            Inline::Image(ImageRef {
                url: url.to_owned(),
                alt: String::new(),
                title: String::new(),
                line: 1,
            })
        };
        let doc = ParsedDocument {
            blocks: vec![
                Block::Paragraph {
                    content: vec![Inline::Link {
                        url: "https://example.com".to_owned(),
                        title: String::new(),
                        content: vec![image("a.png")],
                    }],
                    line: 1,
                },
                Block::Table {
                    header: vec![vec![text("h")]],
                    rows: vec![vec![vec![image("b.png")]]],
                    line: 3,
                },
            ],
        };

        let urls: Vec<&str> = doc.images().iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_title_is_first_h1() {
        let doc = ParsedDocument {
            blocks: vec![
                Block::Heading {
                    level: 2,
                    content: vec![text("Intro")],
                    line: 1,
                },
                Block::Heading {
                    level: 1,
                    content: vec![text("Main")],
                    line: 3,
                },
            ],
        };
        assert_eq!(doc.title(), Some("Main".to_owned()));
    }
}
