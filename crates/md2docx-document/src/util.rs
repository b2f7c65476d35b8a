//! Small helpers shared by the parser.

use pulldown_cmark::HeadingLevel;

/// Convert heading level enum to number (1-6).
#[must_use]
pub(crate) fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Whether an inline HTML fragment is a line break tag (`<br>`, `<br/>`, `<br />`).
pub(crate) fn is_br_tag(html: &str) -> bool {
    let tag = html.trim().to_ascii_lowercase();
    let Some(inner) = tag.strip_prefix('<').and_then(|t| t.strip_suffix('>')) else {
        return false;
    };
    inner.trim_end_matches('/').trim() == "br"
}
