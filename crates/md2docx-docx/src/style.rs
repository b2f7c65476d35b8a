//! Formatting options accepted by the session.

/// Paragraph-level formatting for [`AssemblySession::add_paragraph`](crate::AssemblySession::add_paragraph).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParagraphStyle {
    pub bold: bool,
    pub italic: bool,
    /// Monospace font (the document's code font). Cannot be combined with
    /// `font_family`.
    pub code: bool,
    pub font_family: Option<String>,
    /// Size in points.
    pub font_size: Option<f32>,
}

/// A run of text with uniform formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    /// Text; `\n` becomes a line break.
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub code: bool,
    /// Text color as `RRGGBB`.
    pub color: Option<String>,
    /// External hyperlink target.
    pub link: Option<String>,
}

impl Run {
    /// Plain text run.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    #[must_use]
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    #[must_use]
    pub fn strike(mut self) -> Self {
        self.strike = true;
        self
    }

    #[must_use]
    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }

    #[must_use]
    pub fn color(mut self, rgb: impl Into<String>) -> Self {
        self.color = Some(rgb.into());
        self
    }

    #[must_use]
    pub fn link(mut self, url: impl Into<String>) -> Self {
        self.link = Some(url.into());
        self
    }
}

/// One entry of a list passed to [`AssemblySession::add_list`](crate::AssemblySession::add_list).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListItem {
    pub runs: Vec<Run>,
    /// Nesting level, 0 for top-level items.
    pub level: u8,
}

/// Horizontal placement of an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

impl Alignment {
    pub(crate) fn as_xml(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

/// Size limits and placement for embedded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    /// Maximum width in pixels.
    pub max_width: u32,
    /// Maximum height in pixels.
    pub max_height: u32,
    pub maintain_aspect_ratio: bool,
    pub alignment: Alignment,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            max_width: 600,
            max_height: 800,
            maintain_aspect_ratio: true,
            alignment: Alignment::Center,
        }
    }
}

impl ImageOptions {
    /// Fit `width` x `height` pixels into the limits.
    ///
    /// With aspect preservation the image is scaled uniformly and never
    /// upscaled; otherwise each side is clamped independently.
    ///
    /// Scaled sides are rounded to whole pixels and kept at least 1px, so a
    /// side that would shrink below one pixel (a 10000x1 strip fitted to
    /// 600px wide) stays 1px and the aspect ratio drifts. Once both scaled
    /// sides are 100px or more, rounding keeps the ratio within 1%.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (width, height);
        }
        if !self.maintain_aspect_ratio {
            return (width.min(self.max_width), height.min(self.max_height));
        }
        let scale = (f64::from(self.max_width) / f64::from(width))
            .min(f64::from(self.max_height) / f64::from(height))
            .min(1.0);
        let scaled = |v: u32| ((f64::from(v) * scale).round() as u32).max(1);
        (scaled(width), scaled(height))
    }
}

/// Page size of the generated document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Parse a page size name (`a4`, `letter`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Some(Self::A4),
            "letter" => Some(Self::Letter),
            _ => None,
        }
    }

    /// Width and height in twentieths of a point.
    pub(crate) fn twips(self) -> (u32, u32) {
        match self {
            Self::A4 => (11906, 16838),
            Self::Letter => (12240, 15840),
        }
    }
}

/// Document-wide settings fixed at session creation.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSettings {
    pub page_size: PageSize,
    pub body_font: String,
    /// Body text size in points.
    pub font_size: f32,
    pub code_font: String,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            body_font: "Calibri".to_owned(),
            font_size: 11.0,
            code_font: "Consolas".to_owned(),
        }
    }
}

/// Convert a point size to the half-points WordprocessingML uses.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn half_points(points: f32) -> u32 {
    (points * 2.0).round().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_scales_down_uniformly() {
        let options = ImageOptions {
            max_width: 600,
            max_height: 800,
            ..ImageOptions::default()
        };
        assert_eq!(options.fit(1200, 600), (600, 300));
        assert_eq!(options.fit(400, 1600), (200, 800));
    }

    #[test]
    fn test_fit_never_upscales() {
        assert_eq!(ImageOptions::default().fit(100, 50), (100, 50));
    }

    #[test]
    fn test_fit_without_aspect_clamps_each_side() {
        let options = ImageOptions {
            max_width: 100,
            max_height: 100,
            maintain_aspect_ratio: false,
            alignment: Alignment::Left,
        };
        assert_eq!(options.fit(300, 50), (100, 50));
    }

    #[test]
    fn test_fit_preserves_aspect_across_sizes() {
        let sides = [1, 7, 50, 99, 320, 600, 601, 1000, 1234, 4096, 10_000];
        let bounds = [(600, 800), (250, 400), (1000, 100)];
        for (max_width, max_height) in bounds {
            let options = ImageOptions {
                max_width,
                max_height,
                ..ImageOptions::default()
            };
            for width in sides {
                for height in sides {
                    let (w, h) = options.fit(width, height);
                    let case = format!("{width}x{height} in {max_width}x{max_height} -> {w}x{h}");
                    assert!(w >= 1 && h >= 1, "{case}");
                    assert!(w <= max_width && h <= max_height, "{case}");
                    assert!(w <= width && h <= height, "{case}");
                    if w >= 100 && h >= 100 {
                        let natural = f64::from(width) / f64::from(height);
                        let fitted = f64::from(w) / f64::from(h);
                        assert!((fitted / natural - 1.0).abs() <= 0.01, "{case}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_fit_extreme_ratio_clamps_to_one_pixel() {
        assert_eq!(ImageOptions::default().fit(10_000, 1), (600, 1));
        assert_eq!(ImageOptions::default().fit(1, 10_000), (1, 800));
    }

    #[test]
    fn test_page_size_parse() {
        assert_eq!(PageSize::parse("Letter"), Some(PageSize::Letter));
        assert_eq!(PageSize::parse("a4"), Some(PageSize::A4));
        assert_eq!(PageSize::parse("legal"), None);
    }

    #[test]
    fn test_half_points() {
        assert_eq!(half_points(11.0), 22);
        assert_eq!(half_points(10.5), 21);
    }
}
