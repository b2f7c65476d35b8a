//! Event-stream to block-tree conversion.
//!
//! [`parse_document`] walks the offset-annotated event stream from
//! [`pulldown_cmark`] with two stacks: one for open block containers and one
//! for open inline spans of the current leaf block. Tight list items emit text
//! without a surrounding paragraph, so an implicit paragraph is opened on the
//! first inline event inside a container and closed at the next block event.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::fence::parse_fence_info;
use crate::lines::LineIndex;
use crate::model::{Block, ImageRef, Inline, ListItem, ParsedDocument, plain_text};
use crate::util::{heading_level_to_num, is_br_tag};

/// Error returned when the markdown collaborator fails.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The underlying parser panicked on this input.
    #[error(
        "markdown parser failed: {0}. Check the document for unbalanced fences or \
         malformed tables, or split it into smaller files"
    )]
    Panicked(String),
}

/// Parser options used for every document.
///
/// GitHub Flavored Markdown extensions are always enabled:
/// - Tables
/// - Strikethrough (`~~text~~`)
/// - Task lists (`- [ ] item`)
#[must_use]
pub fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_GFM
}

/// Parse markdown into an owned block tree.
///
/// # Errors
///
/// Returns [`ParseError::Panicked`] if the parser collaborator panics.
pub fn parse_document(markdown: &str) -> Result<ParsedDocument, ParseError> {
    catch_unwind(AssertUnwindSafe(|| TreeBuilder::new(markdown).build(markdown)))
        .map_err(|payload| ParseError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Open block container.
enum BlockFrame {
    Root(Vec<Block>),
    Quote {
        line: usize,
        blocks: Vec<Block>,
    },
    List {
        line: usize,
        ordered: bool,
        start: u64,
        items: Vec<ListItem>,
    },
    Item {
        line: usize,
        blocks: Vec<Block>,
        task: Option<bool>,
    },
    Paragraph {
        line: usize,
        implicit: bool,
    },
    Heading {
        line: usize,
        level: u8,
    },
    Code {
        line: usize,
        language: Option<String>,
        attrs: HashMap<String, String>,
        code: String,
    },
    Table {
        line: usize,
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
        row: Vec<Vec<Inline>>,
    },
    Cell,
    /// HTML blocks, footnote definitions and other unsupported containers.
    Skipped,
}

impl BlockFrame {
    fn takes_inlines(&self) -> bool {
        matches!(
            self,
            Self::Paragraph { .. } | Self::Heading { .. } | Self::Cell
        )
    }

    fn holds_blocks(&self) -> bool {
        matches!(self, Self::Root(_) | Self::Quote { .. } | Self::Item { .. })
    }
}

/// Open inline span.
struct InlineFrame {
    kind: InlineKind,
    children: Vec<Inline>,
}

enum InlineKind {
    /// Content of a leaf block.
    Root,
    Emphasis,
    Strong,
    Strikethrough,
    Link { url: String, title: String },
    Image { url: String, title: String, line: usize },
    /// Unsupported span whose children are kept unformatted.
    Transparent,
}

struct TreeBuilder {
    lines: LineIndex,
    blocks: Vec<BlockFrame>,
    inlines: Vec<InlineFrame>,
}

impl TreeBuilder {
    fn new(markdown: &str) -> Self {
        Self {
            lines: LineIndex::new(markdown),
            blocks: vec![BlockFrame::Root(Vec::new())],
            inlines: Vec::new(),
        }
    }

    fn build(mut self, markdown: &str) -> ParsedDocument {
        for (event, range) in Parser::new_ext(markdown, parser_options()).into_offset_iter() {
            let line = self.lines.line_of(range.start);
            self.process_event(event, line);
        }

        // Balanced streams leave only the root; close anything left open.
        while self.blocks.len() > 1 {
            self.close_block();
        }

        match self.blocks.pop() {
            Some(BlockFrame::Root(blocks)) => ParsedDocument { blocks },
            _ => ParsedDocument::default(),
        }
    }

    fn process_event(&mut self, event: Event<'_>, line: usize) {
        match event {
            Event::Start(tag) => self.start_tag(tag, line),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text, line),
            Event::Code(code) => self.push_inline(Inline::Code(code.into_string()), line),
            Event::InlineHtml(html) => {
                if is_br_tag(&html) {
                    self.push_inline(Inline::HardBreak, line);
                }
            }
            Event::SoftBreak => self.push_inline(Inline::SoftBreak, line),
            Event::HardBreak => self.push_inline(Inline::HardBreak, line),
            Event::Rule => {
                self.close_implicit_paragraph();
                self.attach(Block::Rule { line });
            }
            Event::TaskListMarker(checked) => {
                if let Some(BlockFrame::Item { task, .. }) = self.blocks.last_mut() {
                    *task = Some(checked);
                }
            }
            Event::Html(_)
            | Event::FootnoteReference(_)
            | Event::InlineMath(_)
            | Event::DisplayMath(_) => {
                // Not supported
            }
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>, line: usize) {
        match tag {
            Tag::Paragraph => {
                self.close_implicit_paragraph();
                self.open_leaf(BlockFrame::Paragraph {
                    line,
                    implicit: false,
                });
            }
            Tag::Heading { level, .. } => {
                self.close_implicit_paragraph();
                self.open_leaf(BlockFrame::Heading {
                    line,
                    level: heading_level_to_num(level),
                });
            }
            Tag::BlockQuote(_) => {
                self.close_implicit_paragraph();
                self.blocks.push(BlockFrame::Quote {
                    line,
                    blocks: Vec::new(),
                });
            }
            Tag::CodeBlock(kind) => {
                self.close_implicit_paragraph();
                let (language, attrs) = match kind {
                    CodeBlockKind::Fenced(ref info) if !info.trim().is_empty() => {
                        let (language, attrs) = parse_fence_info(info);
                        (Some(language), attrs)
                    }
                    _ => (None, HashMap::new()),
                };
                self.blocks.push(BlockFrame::Code {
                    line,
                    language,
                    attrs,
                    code: String::new(),
                });
            }
            Tag::List(start) => {
                self.close_implicit_paragraph();
                self.blocks.push(BlockFrame::List {
                    line,
                    ordered: start.is_some(),
                    start: start.unwrap_or(1),
                    items: Vec::new(),
                });
            }
            Tag::Item => {
                self.blocks.push(BlockFrame::Item {
                    line,
                    blocks: Vec::new(),
                    task: None,
                });
            }
            Tag::Table(_) => {
                self.close_implicit_paragraph();
                self.blocks.push(BlockFrame::Table {
                    line,
                    header: Vec::new(),
                    rows: Vec::new(),
                    row: Vec::new(),
                });
            }
            Tag::TableHead | Tag::TableRow => {}
            Tag::TableCell => self.open_leaf(BlockFrame::Cell),
            Tag::Emphasis => self.open_inline(InlineKind::Emphasis, line),
            Tag::Strong => self.open_inline(InlineKind::Strong, line),
            Tag::Strikethrough => self.open_inline(InlineKind::Strikethrough, line),
            Tag::Link {
                dest_url, title, ..
            } => self.open_inline(
                InlineKind::Link {
                    url: dest_url.into_string(),
                    title: title.into_string(),
                },
                line,
            ),
            Tag::Image {
                dest_url, title, ..
            } => self.open_inline(
                InlineKind::Image {
                    url: dest_url.into_string(),
                    title: title.into_string(),
                    line,
                },
                line,
            ),
            Tag::Superscript | Tag::Subscript => self.open_inline(InlineKind::Transparent, line),
            Tag::HtmlBlock
            | Tag::FootnoteDefinition(_)
            | Tag::MetadataBlock(_)
            | Tag::DefinitionList
            | Tag::DefinitionListTitle
            | Tag::DefinitionListDefinition => {
                self.close_implicit_paragraph();
                self.blocks.push(BlockFrame::Skipped);
            }
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Emphasis
            | TagEnd::Strong
            | TagEnd::Strikethrough
            | TagEnd::Link
            | TagEnd::Image
            | TagEnd::Superscript
            | TagEnd::Subscript => self.close_inline(),
            TagEnd::TableHead => {
                if let Some(BlockFrame::Table { header, row, .. }) = self.blocks.last_mut() {
                    *header = std::mem::take(row);
                }
            }
            TagEnd::TableRow => {
                if let Some(BlockFrame::Table { rows, row, .. }) = self.blocks.last_mut() {
                    rows.push(std::mem::take(row));
                }
            }
            TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::BlockQuote(_)
            | TagEnd::CodeBlock
            | TagEnd::List(_)
            | TagEnd::Item
            | TagEnd::Table
            | TagEnd::TableCell
            | TagEnd::HtmlBlock
            | TagEnd::FootnoteDefinition
            | TagEnd::MetadataBlock(_)
            | TagEnd::DefinitionList
            | TagEnd::DefinitionListTitle
            | TagEnd::DefinitionListDefinition => {
                self.close_implicit_paragraph();
                self.close_block();
            }
        }
    }

    fn text(&mut self, text: &str, line: usize) {
        if let Some(BlockFrame::Code { code, .. }) = self.blocks.last_mut() {
            code.push_str(text);
            return;
        }
        if !self.ensure_inline_context(line) {
            return;
        }
        if let Some(frame) = self.inlines.last_mut() {
            match frame.children.last_mut() {
                Some(Inline::Text(existing)) => existing.push_str(text),
                _ => frame.children.push(Inline::Text(text.to_owned())),
            }
        }
    }

    fn push_inline(&mut self, inline: Inline, line: usize) {
        if !self.ensure_inline_context(line) {
            return;
        }
        if let Some(frame) = self.inlines.last_mut() {
            frame.children.push(inline);
        }
    }

    /// Make sure inline content has somewhere to go.
    ///
    /// Returns false when the current container drops inline content
    /// (HTML blocks and other skipped regions).
    fn ensure_inline_context(&mut self, line: usize) -> bool {
        match self.blocks.last() {
            Some(frame) if frame.takes_inlines() => true,
            Some(frame) if frame.holds_blocks() => {
                self.open_leaf(BlockFrame::Paragraph {
                    line,
                    implicit: true,
                });
                true
            }
            _ => false,
        }
    }

    fn open_leaf(&mut self, frame: BlockFrame) {
        self.blocks.push(frame);
        self.inlines.push(InlineFrame {
            kind: InlineKind::Root,
            children: Vec::new(),
        });
    }

    fn open_inline(&mut self, kind: InlineKind, line: usize) {
        if self.ensure_inline_context(line) {
            self.inlines.push(InlineFrame {
                kind,
                children: Vec::new(),
            });
        }
    }

    fn close_inline(&mut self) {
        // Leaf roots are closed with their block, never by an inline end tag.
        if !matches!(
            self.inlines.last(),
            Some(InlineFrame { kind, .. }) if !matches!(kind, InlineKind::Root)
        ) {
            return;
        }
        let Some(frame) = self.inlines.pop() else {
            return;
        };
        let Some(parent) = self.inlines.last_mut() else {
            return;
        };
        match frame.kind {
            InlineKind::Emphasis => parent.children.push(Inline::Emphasis(frame.children)),
            InlineKind::Strong => parent.children.push(Inline::Strong(frame.children)),
            InlineKind::Strikethrough => {
                parent.children.push(Inline::Strikethrough(frame.children));
            }
            InlineKind::Link { url, title } => parent.children.push(Inline::Link {
                url,
                title,
                content: frame.children,
            }),
            InlineKind::Image { url, title, line } => {
                parent.children.push(Inline::Image(ImageRef {
                    url,
                    alt: plain_text(&frame.children),
                    title,
                    line,
                }));
            }
            InlineKind::Transparent | InlineKind::Root => parent.children.extend(frame.children),
        }
    }

    fn close_implicit_paragraph(&mut self) {
        if matches!(
            self.blocks.last(),
            Some(BlockFrame::Paragraph { implicit: true, .. })
        ) {
            self.close_block();
        }
    }

    /// Pop the innermost block container and attach it to its parent.
    fn close_block(&mut self) {
        let Some(frame) = self.blocks.pop() else {
            return;
        };
        if frame.takes_inlines() {
            // Unclosed spans (only possible on unbalanced input) fold into the root.
            while self
                .inlines
                .last()
                .is_some_and(|f| !matches!(f.kind, InlineKind::Root))
            {
                self.close_inline();
            }
        }

        match frame {
            BlockFrame::Root(blocks) => {
                // Root is never closed here; put it back.
                self.blocks.push(BlockFrame::Root(blocks));
            }
            BlockFrame::Paragraph { line, .. } => {
                let content = self.take_inline_root();
                if !content.is_empty() {
                    self.attach(Block::Paragraph { content, line });
                }
            }
            BlockFrame::Heading { line, level } => {
                let content = self.take_inline_root();
                self.attach(Block::Heading {
                    level,
                    content,
                    line,
                });
            }
            BlockFrame::Cell => {
                let content = self.take_inline_root();
                if let Some(BlockFrame::Table { row, .. }) = self.blocks.last_mut() {
                    row.push(content);
                }
            }
            BlockFrame::Quote { line, blocks } => self.attach(Block::BlockQuote { blocks, line }),
            BlockFrame::Code {
                line,
                language,
                attrs,
                mut code,
            } => {
                if code.ends_with('\n') {
                    code.pop();
                }
                self.attach(Block::CodeBlock {
                    language,
                    attrs,
                    code,
                    line,
                });
            }
            BlockFrame::List {
                line,
                ordered,
                start,
                items,
            } => self.attach(Block::List {
                ordered,
                start,
                items,
                line,
            }),
            BlockFrame::Item { line, blocks, task } => {
                if let Some(BlockFrame::List { items, .. }) = self.blocks.last_mut() {
                    items.push(ListItem { blocks, task, line });
                }
            }
            BlockFrame::Table {
                line, header, rows, ..
            } => self.attach(Block::Table { header, rows, line }),
            BlockFrame::Skipped => {}
        }
    }

    fn take_inline_root(&mut self) -> Vec<Inline> {
        self.inlines
            .pop()
            .map(|frame| frame.children)
            .unwrap_or_default()
    }

    fn attach(&mut self, block: Block) {
        match self.blocks.last_mut() {
            Some(BlockFrame::Root(blocks) | BlockFrame::Quote { blocks, .. }) => {
                blocks.push(block);
            }
            Some(BlockFrame::Item { blocks, .. }) => blocks.push(block),
            _ => tracing::debug!(line = block.line(), "dropping block outside a container"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_owned())
    }

    fn parse(markdown: &str) -> ParsedDocument {
        parse_document(markdown).unwrap()
    }

    #[test]
    fn test_heading_and_mixed_paragraph() {
        let doc = parse("# T\n\nSome *x* text.");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Heading {
                    level: 1,
                    content: vec![text("T")],
                    line: 1,
                },
                Block::Paragraph {
                    content: vec![
                        text("Some "),
                        Inline::Emphasis(vec![text("x")]),
                        text(" text."),
                    ],
                    line: 3,
                },
            ]
        );
    }

    #[test]
    fn test_fenced_code_block_keeps_language_and_line() {
        let doc = parse("intro\n\n```mermaid\ngraph TD\n  A-->B\n```\n");
        let Block::CodeBlock {
            language,
            code,
            line,
            ..
        } = &doc.blocks[1]
        else {
            panic!("expected code block, got {:?}", doc.blocks[1]);
        };
        assert_eq!(language.as_deref(), Some("mermaid"));
        assert_eq!(code, "graph TD\n  A-->B");
        assert_eq!(*line, 3);
    }

    #[test]
    fn test_indented_code_block_has_no_language() {
        let doc = parse("    let x = 1;\n");
        assert!(matches!(
            &doc.blocks[0],
            Block::CodeBlock { language: None, code, .. } if code == "let x = 1;"
        ));
    }

    #[test]
    fn test_tight_list_items_get_implicit_paragraphs() {
        let doc = parse("- one\n- two\n  - nested\n");
        let Block::List {
            ordered, items, ..
        } = &doc.blocks[0]
        else {
            panic!("expected list");
        };
        assert!(!ordered);
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].blocks,
            vec![Block::Paragraph {
                content: vec![text("one")],
                line: 1,
            }]
        );
        assert!(matches!(items[1].blocks[1], Block::List { line: 3, .. }));
    }

    #[test]
    fn test_ordered_list_start() {
        let doc = parse("3. three\n4. four\n");
        assert!(matches!(
            doc.blocks[0],
            Block::List {
                ordered: true,
                start: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_task_list_marker() {
        let doc = parse("- [x] done\n- [ ] todo\n");
        let Block::List { items, .. } = &doc.blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(items[0].task, Some(true));
        assert_eq!(items[1].task, Some(false));
    }

    #[test]
    fn test_table_header_and_rows() {
        let doc = parse("| A | B | C |\n|---|---|---|\n| 1 | 2 | 3 |\n| 4 | 5 | 6 |\n");
        let Block::Table { header, rows, line } = &doc.blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(*line, 1);
        assert_eq!(header.len(), 3);
        assert_eq!(header[0], vec![text("A")]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][2], vec![text("6")]);
    }

    #[test]
    fn test_blockquote_contains_paragraph() {
        let doc = parse("> quoted *text*\n");
        let Block::BlockQuote { blocks, line } = &doc.blocks[0] else {
            panic!("expected quote");
        };
        assert_eq!(*line, 1);
        assert_eq!(
            blocks[0],
            Block::Paragraph {
                content: vec![text("quoted "), Inline::Emphasis(vec![text("text")])],
                line: 1,
            }
        );
    }

    #[test]
    fn test_image_alt_and_line() {
        let doc = parse("text\n\n![A **bold** diagram](img/a.png \"Title\")\n");
        let images = doc.images();
        assert_eq!(
            images,
            vec![&ImageRef {
                url: "img/a.png".to_owned(),
                alt: "A bold diagram".to_owned(),
                title: "Title".to_owned(),
                line: 3,
            }]
        );
    }

    #[test]
    fn test_link_wraps_content() {
        let doc = parse("[see **this**](https://example.com)");
        let Block::Paragraph { content, .. } = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            content[0],
            Inline::Link {
                url: "https://example.com".to_owned(),
                title: String::new(),
                content: vec![text("see "), Inline::Strong(vec![text("this")])],
            }
        );
    }

    #[test]
    fn test_html_block_is_skipped() {
        let doc = parse("<div>\nraw\n</div>\n\nafter\n");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph {
                content: vec![text("after")],
                line: 5,
            }]
        );
    }

    #[test]
    fn test_inline_br_becomes_hard_break() {
        let doc = parse("a<br>b");
        let Block::Paragraph { content, .. } = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(content, &vec![text("a"), Inline::HardBreak, text("b")]);
    }

    #[test]
    fn test_rule_between_paragraphs() {
        let doc = parse("a\n\n---\n\nb\n");
        assert!(matches!(doc.blocks[1], Block::Rule { line: 3 }));
    }

    #[test]
    fn test_empty_document() {
        assert!(parse("").blocks.is_empty());
    }
}
