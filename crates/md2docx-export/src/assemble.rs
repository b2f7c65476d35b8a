//! Second pass over the document: write blocks into the assembly session,
//! joining rendered diagrams and resolved images back in.

use std::collections::HashMap;

use md2docx_diagrams::DiagramLanguage;
use md2docx_docx::{AssemblyError, AssemblySession, ImageOptions, ListItem as DocxListItem, Run};
use md2docx_document::{Block, ImageRef, Inline, ListItem};

use crate::records::{DiagramOutcome, DiagramRecord, ImageTarget, RenderedDiagrams, ResolvedImages};
use crate::result::ExportStatistics;

const ERROR_COLOR: &str = "C00000";
const PLACEHOLDER_COLOR: &str = "808080";

/// Inherited inline formatting.
#[derive(Debug, Clone, Copy, Default)]
struct Format<'a> {
    bold: bool,
    italic: bool,
    strike: bool,
    link: Option<&'a str>,
}

impl Format<'_> {
    fn run(&self, text: &str) -> Run {
        Run {
            text: text.to_owned(),
            bold: self.bold,
            italic: self.italic,
            strike: self.strike,
            link: self.link.map(str::to_owned),
            ..Run::default()
        }
    }
}

/// Content moved out of a container that cannot hold it.
#[derive(Debug)]
enum Deferred<'b> {
    Block(&'b Block),
    Image(&'b ImageRef),
}

pub(crate) struct DocumentWriter<'a> {
    session: &'a mut AssemblySession,
    diagrams: &'a RenderedDiagrams,
    images: &'a ResolvedImages,
    image_options: ImageOptions,
    stats: &'a mut ExportStatistics,
    quote_depth: usize,
}

impl<'a> DocumentWriter<'a> {
    pub(crate) fn new(
        session: &'a mut AssemblySession,
        diagrams: &'a RenderedDiagrams,
        images: &'a ResolvedImages,
        image_options: ImageOptions,
        stats: &'a mut ExportStatistics,
    ) -> Self {
        Self {
            session,
            diagrams,
            images,
            image_options,
            stats,
            quote_depth: 0,
        }
    }

    pub(crate) fn write_blocks(&mut self, blocks: &[Block]) -> Result<(), AssemblyError> {
        for block in blocks {
            self.write_block(block)?;
        }
        Ok(())
    }

    fn write_block(&mut self, block: &Block) -> Result<(), AssemblyError> {
        match block {
            Block::Heading { level, content, .. } => {
                let mut images = Vec::new();
                let runs = inline_runs(content, &mut images);
                self.session.add_heading_runs(&runs, *level)?;
                self.write_images(&images)
            }
            Block::Paragraph { content, .. } => self.write_paragraph(content),
            Block::CodeBlock {
                language,
                attrs,
                code,
                line,
            } => {
                let is_diagram = language.as_deref().and_then(DiagramLanguage::parse).is_some();
                match self.diagrams.get(*line) {
                    Some(record) if is_diagram => {
                        self.write_diagram(record, width_hint(attrs, *line))
                    }
                    _ => self.session.add_code_block(code, language.as_deref()),
                }
            }
            Block::List {
                ordered,
                start,
                items,
                ..
            } => self.write_list(*ordered, *start, items),
            Block::Table { header, rows, .. } => {
                // Cells hold runs only; their images follow the table.
                let mut images = Vec::new();
                let headers: Vec<Vec<Run>> = header
                    .iter()
                    .map(|cell| inline_runs(cell, &mut images))
                    .collect();
                let rows: Vec<Vec<Vec<Run>>> = rows
                    .iter()
                    .map(|row| row.iter().map(|cell| inline_runs(cell, &mut images)).collect())
                    .collect();
                self.session.add_table(&headers, &rows, !headers.is_empty())?;
                self.stats.tables += 1;
                self.write_images(&images)
            }
            Block::BlockQuote { blocks, .. } => self.write_blockquote(blocks),
            Block::Rule { .. } => self.session.add_horizontal_rule(),
        }
    }

    /// Paragraph text, with each image split out into its own paragraph.
    fn write_paragraph(&mut self, content: &[Inline]) -> Result<(), AssemblyError> {
        let mut pending = Vec::new();
        self.emit_inlines(content, Format::default(), &mut pending)?;
        self.flush_runs(&mut pending)
    }

    fn emit_inlines<'c>(
        &mut self,
        inlines: &'c [Inline],
        format: Format<'c>,
        pending: &mut Vec<Run>,
    ) -> Result<(), AssemblyError> {
        for inline in inlines {
            match inline {
                Inline::Image(image) => {
                    self.flush_runs(pending)?;
                    self.write_image(image)?;
                }
                Inline::Emphasis(children) => self.emit_inlines(
                    children,
                    Format {
                        italic: true,
                        ..format
                    },
                    pending,
                )?,
                Inline::Strong(children) => self.emit_inlines(
                    children,
                    Format {
                        bold: true,
                        ..format
                    },
                    pending,
                )?,
                Inline::Strikethrough(children) => self.emit_inlines(
                    children,
                    Format {
                        strike: true,
                        ..format
                    },
                    pending,
                )?,
                Inline::Link { url, content, .. } => self.emit_inlines(
                    content,
                    Format {
                        link: Some(url.as_str()),
                        ..format
                    },
                    pending,
                )?,
                Inline::Text(_) | Inline::Code(_) | Inline::SoftBreak | Inline::HardBreak => {
                    push_leaf(inline, format, pending);
                }
            }
        }
        Ok(())
    }

    fn flush_runs(&mut self, pending: &mut Vec<Run>) -> Result<(), AssemblyError> {
        if pending.iter().all(|run| run.text.trim().is_empty()) {
            pending.clear();
            return Ok(());
        }
        let result = self.add_body_runs(pending);
        pending.clear();
        result
    }

    fn add_body_runs(&mut self, runs: &[Run]) -> Result<(), AssemblyError> {
        if self.quote_depth > 0 {
            self.session.add_blockquote_runs(runs)
        } else {
            self.session.add_runs(runs)
        }
    }

    fn write_images(&mut self, images: &[&ImageRef]) -> Result<(), AssemblyError> {
        for image in images {
            self.write_image(image)?;
        }
        Ok(())
    }

    fn write_image(&mut self, image: &ImageRef) -> Result<(), AssemblyError> {
        let Some(record) = self.images.get(&image.url) else {
            return self.image_placeholder(&image.url, "not resolved");
        };

        let embedded = match &record.target {
            ImageTarget::File(path) => self.session.add_image(path, &self.image_options),
            ImageTarget::Data(data) => {
                let name = if image.alt.is_empty() {
                    "inline image"
                } else {
                    image.alt.as_str()
                };
                self.session
                    .add_image_bytes(data.clone(), name, &self.image_options)
            }
            ImageTarget::Remote(_) => {
                return self.image_placeholder(&image.url, "remote images are not downloaded");
            }
            ImageTarget::Unavailable(reason) => {
                return self.image_placeholder(&image.url, reason);
            }
        };

        match embedded {
            Ok(_) => {
                self.stats.images_embedded += 1;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(image = %image.url, line = image.line, error = %e, "Image not embedded");
                let reason = if e.is_image_error() {
                    e.short_reason().to_owned()
                } else {
                    e.to_string()
                };
                self.image_placeholder(&image.url, &reason)
            }
        }
    }

    fn image_placeholder(&mut self, reference: &str, reason: &str) -> Result<(), AssemblyError> {
        self.stats.images_failed += 1;
        self.add_body_runs(&[Run::text(format!("[Image: {reference} ({reason})]"))
            .italic()
            .color(PLACEHOLDER_COLOR)])
    }

    fn write_diagram(
        &mut self,
        record: &DiagramRecord,
        width: Option<u32>,
    ) -> Result<(), AssemblyError> {
        match &record.outcome {
            DiagramOutcome::Rendered(path) => {
                let options = ImageOptions {
                    max_width: width.unwrap_or(self.image_options.max_width),
                    ..self.image_options
                };
                match self.session.add_image(path, &options) {
                    Ok(_) => {
                        self.stats.diagrams_rendered += 1;
                        Ok(())
                    }
                    Err(e) => {
                        tracing::warn!(line = record.line, error = %e, "Rendered diagram not embedded");
                        self.write_diagram_error(record, &e.to_string())
                    }
                }
            }
            DiagramOutcome::Failed(message) => self.write_diagram_error(record, message),
        }
    }

    /// Error text followed by the original source, in place of the image.
    fn write_diagram_error(
        &mut self,
        record: &DiagramRecord,
        message: &str,
    ) -> Result<(), AssemblyError> {
        self.stats.diagrams_failed += 1;
        let language = record.language.kroki_endpoint();
        self.session.add_runs(&[Run::text(format!(
            "Diagram rendering failed ({language}, line {}): {message}",
            record.line
        ))
        .bold()
        .color(ERROR_COLOR)])?;
        self.session.add_code_block(&record.source, Some(language))
    }

    fn write_list(
        &mut self,
        ordered: bool,
        start: u64,
        items: &[ListItem],
    ) -> Result<(), AssemblyError> {
        let mut entries = Vec::new();
        let mut deferred = Vec::new();
        collect_list_entries(items, 0, &mut entries, &mut deferred);
        self.session.add_list(&entries, ordered, start)?;

        // Content that cannot live inside a list paragraph follows the list.
        for item in deferred {
            match item {
                Deferred::Block(block) => self.write_block(block)?,
                Deferred::Image(image) => self.write_image(image)?,
            }
        }
        Ok(())
    }

    fn write_blockquote(&mut self, blocks: &[Block]) -> Result<(), AssemblyError> {
        self.quote_depth += 1;
        let result = self.write_quoted_blocks(blocks);
        self.quote_depth -= 1;
        result
    }

    fn write_quoted_blocks(&mut self, blocks: &[Block]) -> Result<(), AssemblyError> {
        for block in blocks {
            match block {
                Block::Heading { content, .. } => {
                    let mut images = Vec::new();
                    let runs = inline_runs(content, &mut images);
                    self.session.add_blockquote_runs(&runs)?;
                    self.write_images(&images)?;
                }
                other => self.write_block(other)?,
            }
        }
        Ok(())
    }
}

/// Diagram `width=` fence attribute, in pixels.
fn width_hint(attrs: &HashMap<String, String>, line: usize) -> Option<u32> {
    let value = attrs.get("width")?;
    match value.trim_end_matches("px").parse::<u32>() {
        Ok(width) if width > 0 => Some(width),
        _ => {
            tracing::debug!(line, width = %value, "Ignoring invalid diagram width");
            None
        }
    }
}

fn collect_list_entries<'b>(
    items: &'b [ListItem],
    level: u8,
    out: &mut Vec<DocxListItem>,
    deferred: &mut Vec<Deferred<'b>>,
) {
    for item in items {
        let mut runs = Vec::new();
        if let Some(done) = item.task {
            runs.push(Run::text(if done { "\u{2612} " } else { "\u{2610} " }));
        }
        let mut has_content = false;
        let mut nested = Vec::new();

        for block in &item.blocks {
            match block {
                Block::Paragraph { content, .. } | Block::Heading { content, .. } => {
                    if has_content {
                        push_run(&mut runs, Run::text("\n"));
                    }
                    let mut images = Vec::new();
                    for run in inline_runs(content, &mut images) {
                        push_run(&mut runs, run);
                    }
                    deferred.extend(images.into_iter().map(Deferred::Image));
                    has_content = true;
                }
                Block::CodeBlock { language, code, .. }
                    if language.as_deref().and_then(DiagramLanguage::parse).is_none() =>
                {
                    if has_content {
                        push_run(&mut runs, Run::text("\n"));
                    }
                    push_run(&mut runs, Run::text(code.as_str()).code());
                    has_content = true;
                }
                Block::List { items, .. } => nested.push(items),
                Block::Rule { .. } => {}
                Block::CodeBlock { .. } | Block::Table { .. } | Block::BlockQuote { .. } => {
                    deferred.push(Deferred::Block(block));
                }
            }
        }

        out.push(DocxListItem { runs, level });
        for items in nested {
            collect_list_entries(items, level.saturating_add(1), out, deferred);
        }
    }
}

/// Runs for inline content that cannot hold a drawing (headings, table
/// cells, list items). Images are collected into `images` for the caller to
/// write after the container.
fn inline_runs<'c>(inlines: &'c [Inline], images: &mut Vec<&'c ImageRef>) -> Vec<Run> {
    let mut runs = Vec::new();
    collect_runs(inlines, Format::default(), &mut runs, images);
    runs
}

fn collect_runs<'c>(
    inlines: &'c [Inline],
    format: Format<'c>,
    out: &mut Vec<Run>,
    images: &mut Vec<&'c ImageRef>,
) {
    for inline in inlines {
        match inline {
            Inline::Emphasis(children) => collect_runs(
                children,
                Format {
                    italic: true,
                    ..format
                },
                out,
                images,
            ),
            Inline::Strong(children) => collect_runs(
                children,
                Format {
                    bold: true,
                    ..format
                },
                out,
                images,
            ),
            Inline::Strikethrough(children) => collect_runs(
                children,
                Format {
                    strike: true,
                    ..format
                },
                out,
                images,
            ),
            Inline::Link { url, content, .. } => collect_runs(
                content,
                Format {
                    link: Some(url.as_str()),
                    ..format
                },
                out,
                images,
            ),
            Inline::Image(image) => images.push(image),
            Inline::Text(_) | Inline::Code(_) | Inline::SoftBreak | Inline::HardBreak => {
                push_leaf(inline, format, out);
            }
        }
    }
}

fn push_leaf(inline: &Inline, format: Format<'_>, out: &mut Vec<Run>) {
    let run = match inline {
        Inline::Text(text) => format.run(text),
        Inline::Code(code) => format.run(code).code(),
        Inline::SoftBreak => format.run(" "),
        Inline::HardBreak => format.run("\n"),
        _ => return,
    };
    push_run(out, run);
}

/// Append `run`, merging it into the previous run when formatting matches.
fn push_run(out: &mut Vec<Run>, run: Run) {
    if let Some(last) = out.last_mut()
        && same_format(last, &run)
    {
        last.text.push_str(&run.text);
        return;
    }
    out.push(run);
}

fn same_format(a: &Run, b: &Run) -> bool {
    a.bold == b.bold
        && a.italic == b.italic
        && a.strike == b.strike
        && a.code == b.code
        && a.color == b.color
        && a.link == b.link
}

#[cfg(test)]
mod tests {
    use md2docx_document::parse_document;
    use pretty_assertions::assert_eq;

    use super::*;

    fn paragraph_runs(markdown: &str) -> Vec<Run> {
        let doc = parse_document(markdown).unwrap();
        match &doc.blocks[0] {
            Block::Paragraph { content, .. } => inline_runs(content, &mut Vec::new()),
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn test_mixed_emphasis_runs() {
        assert_eq!(
            paragraph_runs("Some *x* text."),
            vec![
                Run::text("Some "),
                Run::text("x").italic(),
                Run::text(" text.")
            ]
        );
    }

    #[test]
    fn test_nested_formatting_and_links() {
        assert_eq!(
            paragraph_runs("**bold _both_** [`code` link](https://x.io)"),
            vec![
                Run::text("bold ").bold(),
                Run::text("both").bold().italic(),
                Run::text(" "),
                Run::text("code").code().link("https://x.io"),
                Run::text(" link").link("https://x.io"),
            ]
        );
    }

    #[test]
    fn test_soft_breaks_merge_into_text() {
        assert_eq!(
            paragraph_runs("line one\nline two"),
            vec![Run::text("line one line two")]
        );
    }

    #[test]
    fn test_hard_break_becomes_newline() {
        assert_eq!(paragraph_runs("a  \nb"), vec![Run::text("a\nb")]);
    }

    #[test]
    fn test_images_are_collected_instead_of_inlined() {
        let doc = parse_document("see ![chart](c.png) and **![logo](l.svg)**").unwrap();
        let Block::Paragraph { content, .. } = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        let mut images = Vec::new();
        let runs = inline_runs(content, &mut images);

        assert_eq!(runs, vec![Run::text("see  and ")]);
        let urls: Vec<&str> = images.iter().map(|image| image.url.as_str()).collect();
        assert_eq!(urls, vec!["c.png", "l.svg"]);
    }

    #[test]
    fn test_images_in_list_items_are_deferred() {
        let doc = parse_document("- item ![a](a.png)\n  - nested ![b](b.png)\n").unwrap();
        let Block::List { items, .. } = &doc.blocks[0] else {
            panic!("expected list");
        };
        let mut entries = Vec::new();
        let mut deferred = Vec::new();
        collect_list_entries(items, 0, &mut entries, &mut deferred);

        assert_eq!(entries[0].runs, vec![Run::text("item ")]);
        assert_eq!(entries[1].runs, vec![Run::text("nested ")]);
        let urls: Vec<&str> = deferred
            .iter()
            .map(|item| match item {
                Deferred::Image(image) => image.url.as_str(),
                Deferred::Block(block) => panic!("unexpected block {block:?}"),
            })
            .collect();
        assert_eq!(urls, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_width_hint() {
        let attrs = |value: &str| HashMap::from([("width".to_owned(), value.to_owned())]);
        assert_eq!(width_hint(&attrs("320"), 1), Some(320));
        assert_eq!(width_hint(&attrs("320px"), 1), Some(320));
        assert_eq!(width_hint(&attrs("0"), 1), None);
        assert_eq!(width_hint(&attrs("wide"), 1), None);
        assert_eq!(width_hint(&HashMap::new(), 1), None);
    }

    #[test]
    fn test_list_entries_levels_and_tasks() {
        let doc = parse_document("- [x] done\n- [ ] todo\n  - nested\n").unwrap();
        let Block::List { items, .. } = &doc.blocks[0] else {
            panic!("expected list");
        };
        let mut entries = Vec::new();
        let mut deferred = Vec::new();
        collect_list_entries(items, 0, &mut entries, &mut deferred);

        assert_eq!(
            entries,
            vec![
                DocxListItem {
                    runs: vec![Run::text("\u{2612} done")],
                    level: 0
                },
                DocxListItem {
                    runs: vec![Run::text("\u{2610} todo")],
                    level: 0
                },
                DocxListItem {
                    runs: vec![Run::text("nested")],
                    level: 1
                },
            ]
        );
        assert!(deferred.is_empty());
    }

    #[test]
    fn test_diagrams_in_list_items_are_deferred() {
        let doc = parse_document("- item\n\n  ```mermaid\n  graph TD; A-->B\n  ```\n").unwrap();
        let Block::List { items, .. } = &doc.blocks[0] else {
            panic!("expected list");
        };
        let mut entries = Vec::new();
        let mut deferred = Vec::new();
        collect_list_entries(items, 0, &mut entries, &mut deferred);

        assert_eq!(entries.len(), 1);
        assert_eq!(deferred.len(), 1);
        assert!(matches!(deferred[0], Deferred::Block(Block::CodeBlock { .. })));
    }
}
