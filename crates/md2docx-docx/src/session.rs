//! Incremental document assembly.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::ZipWriter;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;

use crate::error::AssemblyError;
use crate::media::{LoadedImage, load_image, read_image_file};
use crate::numbering::{MAX_LEVEL, Numbering};
use crate::package::{
    Relationships, app_properties, content_types, core_properties, root_relationships, settings,
    styles,
};
use crate::style::{DocumentSettings, ImageOptions, ListItem, ParagraphStyle, Run, half_points};
use crate::xml::{RunOverrides, escape, write_run, write_text};

/// English Metric Units per pixel at 96 DPI.
pub const EMU_PER_PIXEL: u64 = 9525;

/// Page margin in twips (1 inch).
const PAGE_MARGIN: u32 = 1440;

/// An embedded image as placed in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// Relationship id referencing the media part.
    pub relationship_id: String,
    /// Part name inside the package (`word/media/image1.png`).
    pub part_name: String,
    /// Displayed size in pixels after fitting.
    pub width: u32,
    pub height: u32,
}

struct MediaPart {
    name: String,
    data: Vec<u8>,
}

/// A document being assembled.
///
/// Content is appended in reading order and kept in memory until
/// [`save`](Self::save) writes the package. All counters belong to the
/// session, so independent sessions never share ids.
pub struct AssemblySession {
    path: PathBuf,
    settings: DocumentSettings,
    title: Option<String>,
    body: String,
    numbering: Numbering,
    relationships: Relationships,
    media: Vec<MediaPart>,
    element_count: usize,
}

impl AssemblySession {
    /// Start a document that will be written to `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, AssemblyError> {
        Self::with_settings(path, DocumentSettings::default())
    }

    /// Start a document with explicit page and font settings.
    pub fn with_settings(
        path: impl Into<PathBuf>,
        settings: DocumentSettings,
    ) -> Result<Self, AssemblyError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(AssemblyError::EmptyPath);
        }
        Ok(Self {
            path,
            settings,
            title: None,
            body: String::new(),
            numbering: Numbering::default(),
            relationships: Relationships::default(),
            media: Vec::new(),
            element_count: 0,
        })
    }

    /// Destination path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of block elements added so far.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Number of media parts embedded so far.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.media.len()
    }

    /// Set the title stored in the document properties.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Add a heading with plain text.
    pub fn add_heading(&mut self, text: &str, level: u8) -> Result<(), AssemblyError> {
        self.add_heading_runs(&[Run::text(text)], level)
    }

    /// Add a heading built from formatted runs.
    pub fn add_heading_runs(&mut self, runs: &[Run], level: u8) -> Result<(), AssemblyError> {
        if !(1..=6).contains(&level) {
            return Err(AssemblyError::InvalidHeadingLevel(level));
        }
        write!(
            self.body,
            r#"<w:p><w:pPr><w:pStyle w:val="Heading{level}"/></w:pPr>"#
        )
        .unwrap();
        self.write_runs(runs, RunOverrides::default());
        self.end_paragraph();
        Ok(())
    }

    /// Add a paragraph of uniformly styled text.
    pub fn add_paragraph(
        &mut self,
        text: &str,
        style: &ParagraphStyle,
    ) -> Result<(), AssemblyError> {
        if style.code && style.font_family.is_some() {
            return Err(AssemblyError::ConflictingStyle(
                "code and font_family cannot be combined",
            ));
        }
        let run = Run {
            text: text.to_owned(),
            bold: style.bold,
            italic: style.italic,
            code: style.code,
            ..Run::default()
        };
        let overrides = RunOverrides {
            font: style.font_family.as_deref(),
            half_points: style.font_size.map(half_points),
            ..RunOverrides::default()
        };
        self.body.push_str("<w:p>");
        self.write_runs(std::slice::from_ref(&run), overrides);
        self.end_paragraph();
        Ok(())
    }

    /// Add a paragraph of mixed runs, including hyperlinks.
    pub fn add_runs(&mut self, runs: &[Run]) -> Result<(), AssemblyError> {
        self.body.push_str("<w:p>");
        self.write_runs(runs, RunOverrides::default());
        self.end_paragraph();
        Ok(())
    }

    /// Add a list; each call mints a new numbering definition.
    ///
    /// `start` is the first number of an ordered list and ignored otherwise.
    pub fn add_list(
        &mut self,
        items: &[ListItem],
        ordered: bool,
        start: u64,
    ) -> Result<(), AssemblyError> {
        if items.is_empty() {
            return Ok(());
        }
        let num_id = self.numbering.add(ordered, if ordered { start } else { 1 });
        for item in items {
            let level = item.level.min(MAX_LEVEL);
            write!(
                self.body,
                concat!(
                    r#"<w:p><w:pPr><w:pStyle w:val="ListParagraph"/>"#,
                    r#"<w:numPr><w:ilvl w:val="{}"/><w:numId w:val="{}"/></w:numPr></w:pPr>"#
                ),
                level, num_id
            )
            .unwrap();
            self.write_runs(&item.runs, RunOverrides::default());
            self.end_paragraph();
        }
        Ok(())
    }

    /// Add a table.
    ///
    /// Rows shorter than the widest row are padded with empty cells. With
    /// `has_header_row` the header cells are bold, shaded, and repeat on each
    /// page.
    pub fn add_table(
        &mut self,
        headers: &[Vec<Run>],
        rows: &[Vec<Vec<Run>>],
        has_header_row: bool,
    ) -> Result<(), AssemblyError> {
        let columns = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(if has_header_row { headers.len() } else { 0 }))
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return Ok(());
        }

        let (page_width, _) = self.settings.page_size.twips();
        let text_width = page_width - 2 * PAGE_MARGIN;
        let column_width = text_width / u32::try_from(columns).unwrap_or(u32::MAX).max(1);

        self.body.push_str(concat!(
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="5000" w:type="pct"/>"#,
            r#"<w:tblLook w:val="04A0" w:firstRow="1" w:lastRow="0" w:firstColumn="0" w:lastColumn="0" w:noHBand="0" w:noVBand="1"/>"#,
            r#"</w:tblPr><w:tblGrid>"#
        ));
        for _ in 0..columns {
            write!(self.body, r#"<w:gridCol w:w="{column_width}"/>"#).unwrap();
        }
        self.body.push_str("</w:tblGrid>");

        if has_header_row {
            self.body
                .push_str("<w:tr><w:trPr><w:tblHeader/></w:trPr>");
            for index in 0..columns {
                let cell = headers.get(index).map_or(&[][..], Vec::as_slice);
                self.write_cell(cell, column_width, true);
            }
            self.body.push_str("</w:tr>");
        }

        for row in rows {
            self.body.push_str("<w:tr>");
            for index in 0..columns {
                let cell = row.get(index).map_or(&[][..], Vec::as_slice);
                self.write_cell(cell, column_width, false);
            }
            self.body.push_str("</w:tr>");
        }

        // A table directly before sectPr or another table merges in Word.
        self.body.push_str("</w:tbl><w:p/>");
        self.element_count += 1;
        Ok(())
    }

    fn write_cell(&mut self, runs: &[Run], width: u32, header: bool) {
        write!(
            self.body,
            r#"<w:tc><w:tcPr><w:tcW w:w="{width}" w:type="dxa"/>"#
        )
        .unwrap();
        if header {
            self.body
                .push_str(r#"<w:shd w:val="clear" w:color="auto" w:fill="D9D9D9"/>"#);
        }
        self.body.push_str("</w:tcPr><w:p>");
        self.write_runs(
            runs,
            RunOverrides {
                bold: header,
                ..RunOverrides::default()
            },
        );
        self.body.push_str("</w:p></w:tc>");
    }

    /// Add a preformatted code block, optionally labelled with its language.
    pub fn add_code_block(
        &mut self,
        code: &str,
        language: Option<&str>,
    ) -> Result<(), AssemblyError> {
        if let Some(language) = language.filter(|l| !l.is_empty()) {
            write!(
                self.body,
                r#"<w:p><w:pPr><w:pStyle w:val="CodeLanguage"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#,
                escape(language)
            )
            .unwrap();
        }
        self.body
            .push_str(r#"<w:p><w:pPr><w:pStyle w:val="CodeBlock"/></w:pPr><w:r>"#);
        write_text(&mut self.body, code);
        self.body.push_str("</w:r>");
        self.end_paragraph();
        Ok(())
    }

    /// Add a block quote of plain text; `\n` becomes a line break.
    pub fn add_blockquote(&mut self, text: &str) -> Result<(), AssemblyError> {
        self.add_blockquote_runs(&[Run::text(text)])
    }

    /// Add a block quote paragraph built from formatted runs.
    pub fn add_blockquote_runs(&mut self, runs: &[Run]) -> Result<(), AssemblyError> {
        self.body
            .push_str(r#"<w:p><w:pPr><w:pStyle w:val="Quote"/></w:pPr>"#);
        self.write_runs(runs, RunOverrides::default());
        self.end_paragraph();
        Ok(())
    }

    /// Add a paragraph with a bottom border.
    pub fn add_horizontal_rule(&mut self) -> Result<(), AssemblyError> {
        self.body.push_str(concat!(
            r#"<w:p><w:pPr><w:pBdr><w:bottom w:val="single" w:sz="6" w:space="1" w:color="auto"/>"#,
            r#"</w:pBdr></w:pPr>"#
        ));
        self.end_paragraph();
        Ok(())
    }

    /// Embed an image file in its own paragraph.
    ///
    /// # Errors
    ///
    /// [`AssemblyError::ImageNotFound`], [`AssemblyError::ImageAccessDenied`]
    /// or [`AssemblyError::ImageDimensions`] when the file cannot be used.
    /// Nothing is added to the document on error.
    pub fn add_image(
        &mut self,
        path: &Path,
        options: &ImageOptions,
    ) -> Result<EmbeddedImage, AssemblyError> {
        let data = read_image_file(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let image = load_image(data, &name)?;
        Ok(self.embed(image, &name, options))
    }

    /// Embed image bytes (for example a decoded data URI).
    pub fn add_image_bytes(
        &mut self,
        data: Vec<u8>,
        name: &str,
        options: &ImageOptions,
    ) -> Result<EmbeddedImage, AssemblyError> {
        let image = load_image(data, name)?;
        Ok(self.embed(image, name, options))
    }

    fn embed(
        &mut self,
        image: LoadedImage,
        description: &str,
        options: &ImageOptions,
    ) -> EmbeddedImage {
        let index = self.media.len() + 1;
        let media_name = format!("image{index}.{}", image.extension);
        let relationship_id = self.relationships.add_image(&media_name);
        let (width, height) = options.fit(image.width, image.height);
        let cx = u64::from(width) * EMU_PER_PIXEL;
        let cy = u64::from(height) * EMU_PER_PIXEL;
        let description = escape(description);

        write!(
            self.body,
            concat!(
                r#"<w:p><w:pPr><w:jc w:val="{jc}"/></w:pPr><w:r><w:drawing>"#,
                r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
                r#"<wp:docPr id="{id}" name="Picture {id}" descr="{descr}"/>"#,
                r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
                r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{id}" name="{media}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
                r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
            ),
            jc = options.alignment.as_xml(),
            cx = cx,
            cy = cy,
            id = index,
            descr = description,
            media = media_name,
            rel = relationship_id,
        )
        .unwrap();
        self.end_paragraph();

        tracing::debug!(media = %media_name, width, height, "Embedded image");
        self.media.push(MediaPart {
            name: media_name.clone(),
            data: image.data,
        });

        EmbeddedImage {
            relationship_id,
            part_name: format!("word/media/{media_name}"),
            width,
            height,
        }
    }

    /// Write the package next to the destination and atomically move it
    /// into place. Returns the size of the written file in bytes.
    pub fn save(&self) -> Result<u64, AssemblyError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| AssemblyError::Io { path, source }
        };

        let mut temp = tempfile::Builder::new()
            .prefix(".md2docx-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(io_error(dir))?;
        self.write_package(temp.as_file_mut())
            .map_err(|e| match e {
                ZipError::Io(source) => AssemblyError::Io {
                    path: self.path.clone(),
                    source,
                },
                other => AssemblyError::Package(other.to_string()),
            })?;

        let file = temp
            .persist(&self.path)
            .map_err(|e| AssemblyError::Io {
                path: self.path.clone(),
                source: e.error,
            })?;
        let size = file.metadata().map_err(io_error(&self.path))?.len();

        tracing::debug!(path = %self.path.display(), size, elements = self.element_count, "Saved document");
        Ok(size)
    }

    /// Drop the session and everything it holds.
    pub fn dispose(self) {
        tracing::debug!(path = %self.path.display(), "Disposed assembly session");
    }

    fn write_package<W: Write + Seek>(&self, writer: W) -> Result<(), ZipError> {
        let mut zip = ZipWriter::new(writer);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        // Already-compressed media gains nothing from deflate.
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let extensions: BTreeSet<&'static str> = self
            .media
            .iter()
            .filter_map(|m| media_extension(&m.name))
            .collect();

        let parts = [
            ("[Content_Types].xml", content_types(&extensions)),
            ("_rels/.rels", root_relationships()),
            ("docProps/core.xml", core_properties(self.title.as_deref())),
            ("docProps/app.xml", app_properties()),
            ("word/document.xml", self.document_xml()),
            ("word/styles.xml", styles(&self.settings)),
            ("word/numbering.xml", self.numbering.to_xml()),
            ("word/settings.xml", settings()),
            ("word/_rels/document.xml.rels", self.relationships.to_xml()),
        ];
        for (name, content) in parts {
            zip.start_file(name, deflated)?;
            zip.write_all(content.as_bytes())?;
        }

        for media in &self.media {
            zip.start_file(format!("word/media/{}", media.name), stored)?;
            zip.write_all(&media.data)?;
        }

        zip.finish()?;
        Ok(())
    }

    fn document_xml(&self) -> String {
        let (width, height) = self.settings.page_size.twips();
        let mut xml = String::with_capacity(self.body.len() + 1024);
        xml.push_str(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
            r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
            r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
            r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><w:body>"#
        ));
        xml.push_str(&self.body);
        write!(
            xml,
            concat!(
                r#"<w:sectPr><w:pgSz w:w="{}" w:h="{}"/>"#,
                r#"<w:pgMar w:top="{m}" w:right="{m}" w:bottom="{m}" w:left="{m}" w:header="708" w:footer="708" w:gutter="0"/>"#,
                r#"</w:sectPr></w:body></w:document>"#
            ),
            width,
            height,
            m = PAGE_MARGIN
        )
        .unwrap();
        xml
    }

    fn write_runs(&mut self, runs: &[Run], overrides: RunOverrides<'_>) {
        for run in runs {
            if let Some(url) = run.link.as_deref() {
                let id = self.relationships.add_hyperlink(url);
                write!(self.body, r#"<w:hyperlink r:id="{id}" w:history="1">"#).unwrap();
                write_run(
                    &mut self.body,
                    run,
                    &self.settings.code_font,
                    RunOverrides {
                        style: Some("Hyperlink"),
                        ..overrides
                    },
                );
                self.body.push_str("</w:hyperlink>");
            } else {
                write_run(&mut self.body, run, &self.settings.code_font, overrides);
            }
        }
    }

    fn end_paragraph(&mut self) {
        self.body.push_str("</w:p>");
        self.element_count += 1;
    }
}

fn media_extension(name: &str) -> Option<&'static str> {
    match name.rsplit('.').next()? {
        "png" => Some("png"),
        "jpeg" => Some("jpeg"),
        "gif" => Some("gif"),
        "bmp" => Some("bmp"),
        _ => None,
    }
}
