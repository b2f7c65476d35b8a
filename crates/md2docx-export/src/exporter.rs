//! Export pipeline: parse, render diagrams, resolve images, assemble.

use std::io::ErrorKind;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::Instant;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use md2docx_diagrams::{
    CancellationToken, Cancelled, DEFAULT_DPI, DiagramFormat, DiagramLanguage, DiagramRenderer,
    RenderError, RenderRequest, STANDARD_DPI, rasterize_svg, sanitize_svg,
};
use md2docx_docx::{AssemblyError, AssemblySession, DocumentSettings, ImageOptions};
use md2docx_document::{Block, ImageRef, ParsedDocument, parse_document};
use percent_encoding::percent_decode_str;

use crate::assemble::DocumentWriter;
use crate::progress::{ExportStage, ProgressSink};
use crate::records::{
    DiagramOutcome, DiagramRecord, ImageRecord, ImageTarget, RenderedDiagrams, ResolvedImages,
};
use crate::resolver::{ImageFormat, ImagePathResolver, ImageSource, classify, detect_format};
use crate::result::{ExportFailure, ExportResult, ExportStatistics, FailureKind};
use crate::run::ExportRun;

const PARSE_GUIDANCE: &str =
    "Check the document for unbalanced code fences or malformed tables, or split it into smaller files.";

/// Input of one export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub markdown: String,
    /// Markdown file path; relative image references resolve against its directory.
    pub source_path: Option<PathBuf>,
    pub destination: PathBuf,
}

impl ExportRequest {
    #[must_use]
    pub fn new(markdown: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            markdown: markdown.into(),
            source_path: None,
            destination: destination.into(),
        }
    }

    #[must_use]
    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// Why the pipeline stopped early.
enum Abort {
    Cancelled,
    Failed(ExportFailure),
}

impl From<Cancelled> for Abort {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<ExportFailure> for Abort {
    fn from(failure: ExportFailure) -> Self {
        Self::Failed(failure)
    }
}

/// Markdown to docx exporter.
///
/// One exporter can run any number of exports; every call owns its own
/// [`ExportRun`] and [`AssemblySession`].
pub struct Exporter {
    renderer: DiagramRenderer,
    image_options: ImageOptions,
    document: DocumentSettings,
    temp_dir: PathBuf,
    svg_scale: f32,
}

impl Exporter {
    /// Create an exporter rendering diagrams with `renderer`.
    #[must_use]
    pub fn new(renderer: DiagramRenderer) -> Self {
        Self {
            renderer,
            image_options: ImageOptions::default(),
            document: DocumentSettings::default(),
            temp_dir: std::env::temp_dir(),
            svg_scale: dpi_scale(DEFAULT_DPI),
        }
    }

    /// Size limits and alignment for embedded images and diagrams.
    #[must_use]
    pub fn image_options(mut self, options: ImageOptions) -> Self {
        self.image_options = options;
        self
    }

    /// Page size and fonts of generated documents.
    #[must_use]
    pub fn document_settings(mut self, settings: DocumentSettings) -> Self {
        self.document = settings;
        self
    }

    /// Directory for rendered diagrams and rasterized SVG images.
    #[must_use]
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// DPI used when rasterizing SVG images referenced from markdown.
    #[must_use]
    pub fn svg_dpi(mut self, dpi: u32) -> Self {
        self.svg_scale = dpi_scale(dpi);
        self
    }

    /// Run one export.
    ///
    /// Returns `Ok` with a failed [`ExportResult`] for validation, setup,
    /// parse, and save failures; failed diagrams and images are reported in
    /// the result of a successful export. Temp files created by this call
    /// are gone when it returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` fired before the document was saved.
    pub fn export(
        &self,
        request: &ExportRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExportResult, Cancelled> {
        let started = Instant::now();
        let mut run = ExportRun::new(&self.temp_dir, progress, cancel.clone());

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_pipeline(request, &mut run)))
            .unwrap_or_else(|payload| {
                Err(Abort::Failed(ExportFailure::new(
                    FailureKind::Unexpected,
                    panic_message(payload.as_ref()),
                )))
            });
        run.cleanup();
        let duration = started.elapsed();

        match outcome {
            Ok(mut result) => {
                result.statistics.duration = duration;
                tracing::info!(
                    output = %request.destination.display(),
                    bytes = result.statistics.output_bytes,
                    diagrams = result.statistics.diagrams_rendered,
                    elapsed = ?duration,
                    "Export complete"
                );
                Ok(result)
            }
            Err(Abort::Cancelled) => {
                tracing::info!("Export cancelled");
                Err(Cancelled)
            }
            Err(Abort::Failed(failure)) => {
                tracing::warn!(kind = %failure.kind, "Export failed: {}", failure.message);
                Ok(ExportResult::failed(failure, duration))
            }
        }
    }

    fn run_pipeline(
        &self,
        request: &ExportRequest,
        run: &mut ExportRun<'_>,
    ) -> Result<ExportResult, Abort> {
        validate(request)?;
        if let Some(parent) = request.destination.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir(parent, "output")?;
        }
        create_dir(&self.temp_dir, "temp")?;

        run.check_cancelled()?;
        run.report(ExportStage::Parse, 0, "Parsing markdown");
        let document = parse_document(&request.markdown).map_err(|e| {
            ExportFailure::new(FailureKind::Parse, e.to_string()).with_guidance(PARSE_GUIDANCE)
        })?;
        run.report(
            ExportStage::Parse,
            10,
            format!("Parsed {} blocks", document.blocks.len()),
        );

        run.check_cancelled()?;
        let diagrams = self.render_diagrams(&document, run)?;

        run.check_cancelled()?;
        let resolver = ImagePathResolver::new(request.source_path.as_deref());
        let images = self.resolve_images(&document, &resolver, run)?;

        run.check_cancelled()?;
        run.report(ExportStage::Assemble, 70, "Assembling document");
        let mut statistics = ExportStatistics::default();
        let mut session =
            AssemblySession::with_settings(&request.destination, self.document.clone())
                .map_err(assembly_failure)?;
        if let Some(title) = document.title() {
            session.set_title(title);
        }
        DocumentWriter::new(
            &mut session,
            &diagrams,
            &images,
            self.image_options,
            &mut statistics,
        )
        .write_blocks(&document.blocks)
        .map_err(assembly_failure)?;
        statistics.elements = session.element_count();

        run.check_cancelled()?;
        run.report(ExportStage::Assemble, 90, "Saving document");
        statistics.output_bytes = session.save().map_err(assembly_failure)?;
        session.dispose();

        run.report(ExportStage::Complete, 100, "Export complete");
        Ok(ExportResult {
            success: true,
            output_path: Some(request.destination.clone()),
            failure: None,
            statistics,
            diagrams: diagrams.into_records(),
            images: images.into_records(),
        })
    }

    fn render_diagrams(
        &self,
        document: &ParsedDocument,
        run: &mut ExportRun<'_>,
    ) -> Result<RenderedDiagrams, Abort> {
        let blocks: Vec<(DiagramLanguage, &str, usize)> = document
            .descendants()
            .filter_map(|block| match block {
                Block::CodeBlock {
                    language: Some(language),
                    code,
                    line,
                    ..
                } => DiagramLanguage::parse(language).map(|lang| (lang, code.as_str(), *line)),
                _ => None,
            })
            .collect();
        let total = blocks.len();

        if total == 0 {
            run.report(ExportStage::Render, 60, "No diagrams to render");
            return Ok(RenderedDiagrams::default());
        }
        run.report(
            ExportStage::Render,
            20,
            format!("Rendering {total} diagrams with {}", self.renderer.backend_name()),
        );

        let mut rendered = RenderedDiagrams::default();
        for (index, (language, source, line)) in blocks.into_iter().enumerate() {
            run.check_cancelled()?;
            let request = RenderRequest {
                language,
                source: source.to_owned(),
                destination: run.temp_path(DiagramFormat::Png.extension()),
                format: DiagramFormat::Png,
            };

            let outcome = match self.renderer.render(&request, run.cancel_token()) {
                Ok(diagram) => DiagramOutcome::Rendered(diagram.path),
                Err(RenderError::Cancelled) => return Err(Abort::Cancelled),
                Err(e) => {
                    tracing::warn!(line, language = language.kroki_endpoint(), error = %e, "Diagram rendering failed");
                    DiagramOutcome::Failed(e.to_string())
                }
            };
            rendered.insert(DiagramRecord {
                source: source.to_owned(),
                line,
                language,
                outcome,
            });

            run.report(
                ExportStage::Render,
                percent_between(20, 60, index + 1, total),
                format!("Rendered diagram {}/{total}", index + 1),
            );
        }
        Ok(rendered)
    }

    fn resolve_images(
        &self,
        document: &ParsedDocument,
        resolver: &ImagePathResolver,
        run: &mut ExportRun<'_>,
    ) -> Result<ResolvedImages, Abort> {
        let references = document.images();
        run.report(
            ExportStage::Resolve,
            60,
            format!("Resolving {} images", references.len()),
        );

        let mut images = ResolvedImages::default();
        for image in references {
            if images.contains(&image.url) {
                continue;
            }
            run.check_cancelled()?;
            images.insert(self.resolve_image(image, resolver, run));
        }

        run.report(
            ExportStage::Resolve,
            70,
            format!("Resolved {} images", images.len()),
        );
        Ok(images)
    }

    fn resolve_image(
        &self,
        image: &ImageRef,
        resolver: &ImagePathResolver,
        run: &mut ExportRun<'_>,
    ) -> ImageRecord {
        let reference = image.url.as_str();
        let is_svg = detect_format(reference) == ImageFormat::Svg;

        let target = match classify(reference) {
            ImageSource::Url => ImageTarget::Remote(reference.to_owned()),
            ImageSource::DataUri => match decode_data_uri(reference) {
                Ok(data) if is_svg => self.rasterize_to_temp(&String::from_utf8_lossy(&data), run),
                Ok(data) => ImageTarget::Data(data),
                Err(reason) => ImageTarget::Unavailable(reason),
            },
            ImageSource::Absolute | ImageSource::Relative => {
                let path = resolver
                    .resolve_path(reference)
                    .unwrap_or_else(|| PathBuf::from(reference));
                if is_svg && path.is_file() {
                    match std::fs::read_to_string(&path) {
                        Ok(svg) => self.rasterize_to_temp(&svg, run),
                        Err(e) => ImageTarget::Unavailable(e.to_string()),
                    }
                } else {
                    ImageTarget::File(path)
                }
            }
        };

        if let ImageTarget::Unavailable(reason) = &target {
            tracing::warn!(image = reference, line = image.line, reason = %reason, "Image unavailable");
        }

        ImageRecord {
            original: reference.to_owned(),
            resolved: resolver
                .resolve_path(reference)
                .map(|path| path.to_string_lossy().into_owned()),
            alt: image.alt.clone(),
            line: image.line,
            target,
        }
    }

    /// Rasterize SVG markup into a run-owned temp PNG.
    fn rasterize_to_temp(&self, svg: &str, run: &mut ExportRun<'_>) -> ImageTarget {
        let png = rasterize_svg(&sanitize_svg(svg), self.svg_scale)
            .or_else(|_| rasterize_svg(svg, self.svg_scale));
        match png {
            Ok(png) => {
                let path = run.temp_path("png");
                match std::fs::write(&path, png) {
                    Ok(()) => ImageTarget::File(path),
                    Err(e) => ImageTarget::Unavailable(format!("cannot write rasterized SVG: {e}")),
                }
            }
            Err(e) => ImageTarget::Unavailable(format!("cannot rasterize SVG: {e}")),
        }
    }
}

fn validate(request: &ExportRequest) -> Result<(), ExportFailure> {
    if request.markdown.trim().is_empty() {
        return Err(ExportFailure::new(
            FailureKind::Validation,
            "markdown content is empty",
        ));
    }
    if request.destination.as_os_str().is_empty() {
        return Err(ExportFailure::new(
            FailureKind::Validation,
            "destination path is empty",
        ));
    }
    Ok(())
}

fn create_dir(dir: &Path, purpose: &str) -> Result<(), ExportFailure> {
    std::fs::create_dir_all(dir).map_err(|e| {
        let kind = if e.kind() == ErrorKind::PermissionDenied {
            FailureKind::Permission
        } else {
            FailureKind::Io
        };
        ExportFailure::new(
            kind,
            format!("cannot create {purpose} directory {}: {e}", dir.display()),
        )
    })
}

/// Categorize an error from building or saving the document.
fn assembly_failure(err: AssemblyError) -> ExportFailure {
    let kind = match err.io_kind() {
        Some(ErrorKind::PermissionDenied) => FailureKind::Permission,
        Some(ErrorKind::StorageFull | ErrorKind::QuotaExceeded) => FailureKind::DiskFull,
        Some(_) => FailureKind::Io,
        None => FailureKind::Assembly,
    };
    ExportFailure::new(kind, err.to_string())
}

/// Decode the payload of a `data:` URI.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, String> {
    let rest = uri.trim().get(5..).unwrap_or("");
    let Some((meta, payload)) = rest.split_once(',') else {
        return Err("malformed data URI".to_owned());
    };
    if meta.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        let cleaned: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        BASE64_STANDARD
            .decode(cleaned)
            .map_err(|e| format!("invalid base64 payload: {e}"))
    } else {
        Ok(percent_decode_str(payload).collect())
    }
}

#[allow(clippy::cast_precision_loss)]
fn dpi_scale(dpi: u32) -> f32 {
    dpi as f32 / STANDARD_DPI as f32
}

fn percent_between(from: u8, to: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return to;
    }
    let span = usize::from(to - from);
    let offset = span * done.min(total) / total;
    from + u8::try_from(offset).unwrap_or(to - from)
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
