//! Static package parts and the document relationship table.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::style::{DocumentSettings, half_points};
use crate::xml::escape;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// Ids reserved for the fixed document relationships.
const FIXED_RELATIONSHIPS: [(&str, &str); 3] = [
    (
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles",
        "styles.xml",
    ),
    (
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering",
        "numbering.xml",
    ),
    (
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings",
        "settings.xml",
    ),
];

#[derive(Debug)]
struct Relationship {
    id: String,
    kind: &'static str,
    target: String,
    external: bool,
}

/// Relationships of `word/document.xml`.
///
/// Ids are minted once, when the image or hyperlink is added.
#[derive(Debug, Default)]
pub(crate) struct Relationships {
    entries: Vec<Relationship>,
}

impl Relationships {
    pub(crate) fn add_image(&mut self, media_name: &str) -> String {
        self.push(REL_IMAGE, format!("media/{media_name}"), false)
    }

    pub(crate) fn add_hyperlink(&mut self, url: &str) -> String {
        self.push(REL_HYPERLINK, url.to_owned(), true)
    }

    fn push(&mut self, kind: &'static str, target: String, external: bool) -> String {
        let id = format!("rId{}", FIXED_RELATIONSHIPS.len() + self.entries.len() + 1);
        self.entries.push(Relationship {
            id: id.clone(),
            kind,
            target,
            external,
        });
        id
    }

    pub(crate) fn to_xml(&self) -> String {
        let mut xml = String::from(XML_HEADER);
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (index, (kind, target)) in FIXED_RELATIONSHIPS.iter().enumerate() {
            write!(
                xml,
                r#"<Relationship Id="rId{}" Type="{kind}" Target="{target}"/>"#,
                index + 1
            )
            .unwrap();
        }
        for rel in &self.entries {
            write!(
                xml,
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                rel.id,
                rel.kind,
                escape(&rel.target)
            )
            .unwrap();
            if rel.external {
                xml.push_str(r#" TargetMode="External""#);
            }
            xml.push_str("/>");
        }
        xml.push_str("</Relationships>");
        xml
    }
}

/// `[Content_Types].xml` covering the given media extensions.
pub(crate) fn content_types(media_extensions: &BTreeSet<&'static str>) -> String {
    let mut xml = String::from(XML_HEADER);
    xml.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    for ext in media_extensions {
        write!(
            xml,
            r#"<Default Extension="{ext}" ContentType="{}"/>"#,
            media_content_type(ext)
        )
        .unwrap();
    }
    for (part, content_type) in [
        (
            "/word/document.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
        ),
        (
            "/word/styles.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
        ),
        (
            "/word/numbering.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml",
        ),
        (
            "/word/settings.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml",
        ),
        (
            "/docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml",
        ),
        (
            "/docProps/app.xml",
            "application/vnd.openxmlformats-officedocument.extended-properties+xml",
        ),
    ] {
        write!(
            xml,
            r#"<Override PartName="{part}" ContentType="{content_type}"/>"#
        )
        .unwrap();
    }
    xml.push_str("</Types>");
    xml
}

fn media_content_type(ext: &str) -> &'static str {
    match ext {
        "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "image/png",
    }
}

pub(crate) fn root_relationships() -> String {
    format!(
        concat!(
            "{}",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
            r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
            r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>"#,
            "</Relationships>"
        ),
        XML_HEADER
    )
}

pub(crate) fn core_properties(title: Option<&str>) -> String {
    let mut xml = String::from(XML_HEADER);
    xml.push_str(concat!(
        r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
        r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
        r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#
    ));
    if let Some(title) = title {
        write!(xml, "<dc:title>{}</dc:title>", escape(title)).unwrap();
    }
    xml.push_str("<dc:creator>md2docx</dc:creator></cp:coreProperties>");
    xml
}

pub(crate) fn app_properties() -> String {
    format!(
        concat!(
            "{}",
            r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">"#,
            "<Application>md2docx {}</Application></Properties>"
        ),
        XML_HEADER,
        env!("CARGO_PKG_VERSION")
    )
}

pub(crate) fn settings() -> String {
    format!(
        concat!(
            "{}",
            r#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:defaultTabStop w:val="720"/><w:compat><w:compatSetting w:name="compatibilityMode" "#,
            r#"w:uri="http://schemas.microsoft.com/office/word" w:val="15"/></w:compat></w:settings>"#
        ),
        XML_HEADER
    )
}

/// `word/styles.xml` for the given settings.
pub(crate) fn styles(settings: &DocumentSettings) -> String {
    const HEADING_SIZES: [f32; 6] = [20.0, 16.0, 14.0, 12.0, 11.0, 11.0];

    let body_font = escape(&settings.body_font);
    let code_font = escape(&settings.code_font);
    let body_size = half_points(settings.font_size);
    let code_size = half_points((settings.font_size - 1.5).max(6.0));

    let mut xml = String::from(XML_HEADER);
    xml.push_str(
        r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    );
    write!(
        xml,
        concat!(
            r#"<w:docDefaults><w:rPrDefault><w:rPr>"#,
            r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:eastAsia="{font}" w:cs="{font}"/>"#,
            r#"<w:sz w:val="{size}"/><w:szCs w:val="{size}"/><w:lang w:val="en-US"/></w:rPr></w:rPrDefault>"#,
            r#"<w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="259" w:lineRule="auto"/></w:pPr></w:pPrDefault>"#,
            r#"</w:docDefaults>"#
        ),
        font = body_font,
        size = body_size
    )
    .unwrap();

    xml.push_str(r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#);

    for (index, size) in HEADING_SIZES.iter().enumerate() {
        let level = index + 1;
        let color = if level <= 2 { "2F5496" } else { "1F3763" };
        write!(
            xml,
            concat!(
                r#"<w:style w:type="paragraph" w:styleId="Heading{level}"><w:name w:val="heading {level}"/>"#,
                r#"<w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/>"#,
                r#"<w:pPr><w:keepNext/><w:spacing w:before="240" w:after="80"/><w:outlineLvl w:val="{outline}"/></w:pPr>"#,
                r#"<w:rPr><w:b/><w:color w:val="{color}"/><w:sz w:val="{size}"/><w:szCs w:val="{size}"/></w:rPr></w:style>"#
            ),
            level = level,
            outline = index,
            color = color,
            size = half_points(*size)
        )
        .unwrap();
    }

    xml.push_str(concat!(
        r#"<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/>"#,
        r#"<w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:spacing w:after="60"/><w:contextualSpacing/></w:pPr></w:style>"#
    ));

    write!(
        xml,
        concat!(
            r#"<w:style w:type="paragraph" w:styleId="CodeBlock"><w:name w:val="Code Block"/><w:basedOn w:val="Normal"/>"#,
            r#"<w:pPr><w:pBdr>"#,
            r#"<w:top w:val="single" w:sz="4" w:space="4" w:color="D0D0D0"/>"#,
            r#"<w:left w:val="single" w:sz="4" w:space="4" w:color="D0D0D0"/>"#,
            r#"<w:bottom w:val="single" w:sz="4" w:space="4" w:color="D0D0D0"/>"#,
            r#"<w:right w:val="single" w:sz="4" w:space="4" w:color="D0D0D0"/>"#,
            r#"</w:pBdr><w:shd w:val="clear" w:color="auto" w:fill="F5F5F5"/>"#,
            r#"<w:spacing w:after="160" w:line="240" w:lineRule="auto"/></w:pPr>"#,
            r#"<w:rPr><w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:cs="{font}"/><w:sz w:val="{size}"/><w:szCs w:val="{size}"/></w:rPr></w:style>"#
        ),
        font = code_font,
        size = code_size
    )
    .unwrap();

    xml.push_str(concat!(
        r#"<w:style w:type="paragraph" w:styleId="CodeLanguage"><w:name w:val="Code Language"/><w:basedOn w:val="Normal"/>"#,
        r#"<w:pPr><w:keepNext/><w:spacing w:after="0"/></w:pPr><w:rPr><w:color w:val="808080"/><w:sz w:val="16"/></w:rPr></w:style>"#
    ));

    xml.push_str(concat!(
        r#"<w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/><w:basedOn w:val="Normal"/><w:qFormat/>"#,
        r#"<w:pPr><w:pBdr><w:left w:val="single" w:sz="18" w:space="8" w:color="BFBFBF"/></w:pBdr>"#,
        r#"<w:ind w:left="720" w:right="720"/></w:pPr><w:rPr><w:i/><w:color w:val="666666"/></w:rPr></w:style>"#
    ));

    xml.push_str(concat!(
        r#"<w:style w:type="character" w:styleId="Hyperlink"><w:name w:val="Hyperlink"/>"#,
        r#"<w:rPr><w:color w:val="0563C1"/><w:u w:val="single"/></w:rPr></w:style>"#
    ));

    xml.push_str(concat!(
        r#"<w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/>"#,
        r#"<w:tblPr><w:tblBorders>"#,
        r#"<w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"</w:tblBorders><w:tblCellMar><w:left w:w="108" w:type="dxa"/><w:right w:w="108" w:type="dxa"/></w:tblCellMar></w:tblPr></w:style>"#
    ));

    xml.push_str("</w:styles>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_ids_follow_fixed_parts() {
        let mut rels = Relationships::default();
        assert_eq!(rels.add_image("image1.png"), "rId4");
        assert_eq!(rels.add_hyperlink("https://example.com/?a=1&b=2"), "rId5");

        let xml = rels.to_xml();
        assert!(xml.contains(r#"Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml""#));
        assert!(xml.contains(r#"Target="media/image1.png"/>"#));
        assert!(xml.contains(r#"Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>"#));
    }

    #[test]
    fn test_content_types_lists_media_extensions() {
        let extensions = BTreeSet::from(["jpeg", "png"]);
        let xml = content_types(&extensions);
        assert!(xml.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(xml.contains(r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#));
        assert!(xml.contains(r#"PartName="/word/numbering.xml""#));
    }

    #[test]
    fn test_core_properties_title_escaped() {
        let xml = core_properties(Some("R&D <notes>"));
        assert!(xml.contains("<dc:title>R&amp;D &lt;notes&gt;</dc:title>"));
        assert!(!core_properties(None).contains("dc:title"));
    }

    #[test]
    fn test_styles_use_configured_fonts() {
        let settings = DocumentSettings {
            body_font: "Georgia".to_owned(),
            code_font: "Fira Code".to_owned(),
            font_size: 12.0,
            ..DocumentSettings::default()
        };
        let xml = styles(&settings);
        assert!(xml.contains(r#"w:ascii="Georgia""#));
        assert!(xml.contains(r#"w:ascii="Fira Code""#));
        assert!(xml.contains(r#"<w:sz w:val="24"/>"#));
        for level in 1..=6 {
            assert!(xml.contains(&format!(r#"w:styleId="Heading{level}""#)));
        }
    }
}
