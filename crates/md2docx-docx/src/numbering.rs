//! List numbering definitions (`word/numbering.xml`).

use std::fmt::Write;

/// Deepest list level WordprocessingML supports (0-based).
pub(crate) const MAX_LEVEL: u8 = 8;

const BULLETS: [&str; 3] = ["\u{2022}", "\u{25E6}", "\u{25AA}"];
const ORDERED_FORMATS: [&str; 3] = ["decimal", "lowerLetter", "lowerRoman"];

#[derive(Debug, Clone, Copy)]
struct ListDefinition {
    ordered: bool,
    start: u64,
}

/// Numbering definitions minted by one session.
///
/// Every list gets its own abstract definition so ordered lists restart at
/// their own start number. List `n` (0-based) uses `abstractNumId = n` and
/// `numId = n + 1`.
#[derive(Debug, Default)]
pub(crate) struct Numbering {
    lists: Vec<ListDefinition>,
}

impl Numbering {
    /// Register a list and return its `numId`.
    pub(crate) fn add(&mut self, ordered: bool, start: u64) -> usize {
        self.lists.push(ListDefinition { ordered, start });
        self.lists.len()
    }

    pub(crate) fn to_xml(&self) -> String {
        let mut xml = String::from(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#
        ));

        // All abstractNum elements must precede the num elements.
        for (abstract_id, list) in self.lists.iter().enumerate() {
            write!(
                xml,
                r#"<w:abstractNum w:abstractNumId="{abstract_id}"><w:multiLevelType w:val="hybridMultilevel"/>"#
            )
            .unwrap();
            for level in 0..=MAX_LEVEL {
                write_level(&mut xml, *list, level);
            }
            xml.push_str("</w:abstractNum>");
        }

        for abstract_id in 0..self.lists.len() {
            let num_id = abstract_id + 1;
            write!(
                xml,
                r#"<w:num w:numId="{num_id}"><w:abstractNumId w:val="{abstract_id}"/></w:num>"#
            )
            .unwrap();
        }

        xml.push_str("</w:numbering>");
        xml
    }
}

fn write_level(xml: &mut String, list: ListDefinition, level: u8) {
    let cycle = usize::from(level) % 3;
    let start = if level == 0 { list.start } else { 1 };
    let indent = 720 * (u32::from(level) + 1);

    write!(xml, r#"<w:lvl w:ilvl="{level}"><w:start w:val="{start}"/>"#).unwrap();
    if list.ordered {
        write!(
            xml,
            r#"<w:numFmt w:val="{}"/><w:lvlText w:val="%{}."/>"#,
            ORDERED_FORMATS[cycle],
            level + 1
        )
        .unwrap();
    } else {
        write!(
            xml,
            r#"<w:numFmt w:val="bullet"/><w:lvlText w:val="{}"/>"#,
            BULLETS[cycle]
        )
        .unwrap();
    }
    write!(
        xml,
        r#"<w:lvlJc w:val="left"/><w:pPr><w:ind w:left="{indent}" w:hanging="360"/></w:pPr></w:lvl>"#
    )
    .unwrap();
}
