//! WordprocessingML fragments.

use std::borrow::Cow;
use std::fmt::Write;

use crate::style::Run;

/// Escape text for element content and attribute values.
///
/// Characters XML 1.0 does not allow (most C0 controls, U+FFFE, U+FFFF)
/// are dropped.
pub(crate) fn escape(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_forbidden) {
        return quick_xml::escape::escape(text);
    }
    let cleaned: String = text.chars().filter(|&c| !is_forbidden(c)).collect();
    Cow::Owned(quick_xml::escape::escape(&cleaned).into_owned())
}

fn is_forbidden(c: char) -> bool {
    matches!(
        c,
        '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}'
    )
}

/// Extra run properties applied on top of a [`Run`]'s own flags.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RunOverrides<'a> {
    pub style: Option<&'a str>,
    pub font: Option<&'a str>,
    pub half_points: Option<u32>,
    pub bold: bool,
}

/// Append `<w:r>` for `run`, turning `\n` into `<w:br/>`.
pub(crate) fn write_run(out: &mut String, run: &Run, code_font: &str, overrides: RunOverrides<'_>) {
    out.push_str("<w:r>");
    write_run_properties(out, run, code_font, overrides);
    write_text(out, &run.text);
    out.push_str("</w:r>");
}

/// Append `<w:t>` elements for `text`, separating lines with `<w:br/>`.
pub(crate) fn write_text(out: &mut String, text: &str) {
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            out.push_str("<w:br/>");
        }
        if !line.is_empty() {
            write!(out, r#"<w:t xml:space="preserve">{}</w:t>"#, escape(line)).unwrap();
        }
    }
}

fn write_run_properties(out: &mut String, run: &Run, code_font: &str, overrides: RunOverrides<'_>) {
    let font = if run.code { Some(code_font) } else { overrides.font };
    let has_props = overrides.style.is_some()
        || font.is_some()
        || run.bold
        || overrides.bold
        || run.italic
        || run.strike
        || run.color.is_some()
        || overrides.half_points.is_some()
        || run.code;
    if !has_props {
        return;
    }

    // Element order follows the CT_RPr sequence.
    out.push_str("<w:rPr>");
    if let Some(style) = overrides.style {
        write!(out, r#"<w:rStyle w:val="{style}"/>"#).unwrap();
    }
    if let Some(font) = font {
        let font = escape(font);
        write!(
            out,
            r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:cs="{font}"/>"#
        )
        .unwrap();
    }
    if run.bold || overrides.bold {
        out.push_str("<w:b/>");
    }
    if run.italic {
        out.push_str("<w:i/>");
    }
    if run.strike {
        out.push_str("<w:strike/>");
    }
    if let Some(color) = &run.color {
        write!(out, r#"<w:color w:val="{}"/>"#, escape(color)).unwrap();
    }
    if let Some(size) = overrides.half_points {
        write!(out, r#"<w:sz w:val="{size}"/><w:szCs w:val="{size}"/>"#).unwrap();
    }
    if run.code {
        out.push_str(r#"<w:shd w:val="clear" w:color="auto" w:fill="F0F0F0"/>"#);
    }
    out.push_str("</w:rPr>");
}
