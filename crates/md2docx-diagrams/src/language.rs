//! Diagram languages and output formats.
//!
//! A fenced block is a diagram when its info string names one of the
//! languages below; everything else stays an ordinary code block.

/// Supported diagram languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagramLanguage {
    Mermaid,
    PlantUml,
    C4PlantUml,
    GraphViz,
    D2,
    Ditaa,
    BlockDiag,
    SeqDiag,
    ActDiag,
    NwDiag,
    Erd,
    Nomnoml,
    Svgbob,
    WaveDrom,
    Bpmn,
}

impl DiagramLanguage {
    /// Parse language from a code fence info string.
    ///
    /// Accepts both direct names (`mermaid`) and `kroki-` prefixed names
    /// (`kroki-mermaid`). Matching is case-insensitive.
    ///
    /// Returns None if the language is not a supported diagram type.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let lang = lower.strip_prefix("kroki-").unwrap_or(&lower);

        match lang {
            "mermaid" | "mmd" => Some(Self::Mermaid),
            "plantuml" | "puml" => Some(Self::PlantUml),
            "c4plantuml" => Some(Self::C4PlantUml),
            "graphviz" | "dot" => Some(Self::GraphViz),
            "d2" => Some(Self::D2),
            "ditaa" => Some(Self::Ditaa),
            "blockdiag" => Some(Self::BlockDiag),
            "seqdiag" => Some(Self::SeqDiag),
            "actdiag" => Some(Self::ActDiag),
            "nwdiag" => Some(Self::NwDiag),
            "erd" => Some(Self::Erd),
            "nomnoml" => Some(Self::Nomnoml),
            "svgbob" => Some(Self::Svgbob),
            "wavedrom" => Some(Self::WaveDrom),
            "bpmn" => Some(Self::Bpmn),
            _ => None,
        }
    }

    /// Kroki endpoint name for this diagram type.
    #[must_use]
    pub fn kroki_endpoint(self) -> &'static str {
        match self {
            Self::Mermaid => "mermaid",
            Self::PlantUml => "plantuml",
            Self::C4PlantUml => "c4plantuml",
            Self::GraphViz => "graphviz",
            Self::D2 => "d2",
            Self::Ditaa => "ditaa",
            Self::BlockDiag => "blockdiag",
            Self::SeqDiag => "seqdiag",
            Self::ActDiag => "actdiag",
            Self::NwDiag => "nwdiag",
            Self::Erd => "erd",
            Self::Nomnoml => "nomnoml",
            Self::Svgbob => "svgbob",
            Self::WaveDrom => "wavedrom",
            Self::Bpmn => "bpmn",
        }
    }

    /// Guess the language from a file extension (for standalone diagram files).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mmd" | "mermaid" => Some(Self::Mermaid),
            "puml" | "plantuml" | "pu" => Some(Self::PlantUml),
            "dot" | "gv" => Some(Self::GraphViz),
            "d2" => Some(Self::D2),
            "bpmn" => Some(Self::Bpmn),
            _ => None,
        }
    }
}

/// Output format for a rendered diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagramFormat {
    /// Vector markup written as-is.
    Svg,
    /// Raster image with an alpha channel (default, embeddable everywhere).
    #[default]
    Png,
}

impl DiagramFormat {
    /// Parse format from a string such as a CLI flag or fence attribute.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// File extension (without dot).
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }
}
