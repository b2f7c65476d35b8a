//! SVG cleanup before rasterization.
//!
//! Diagram tools emit SVG meant for browsers: HTML labels inside
//! `<foreignObject>`, unclosed `<br>` tags, HTML entities. A strict XML
//! parser rejects all of these, so they are rewritten before `resvg` sees
//! the markup.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

static FOREIGN_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<foreignObject\b[^>]*/>|<foreignObject\b.*?</foreignObject>")
        .expect("invalid foreignObject regex")
});

static VOID_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|hr|img|input|meta|link|col|wbr)\b([^>]*?)\s*/?>")
        .expect("invalid void tag regex")
});

static VOID_CLOSE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(br|hr|img|input|meta|link|col|wbr)\s*>").expect("invalid close tag regex")
});

static SVG_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<svg\b[^>]*>").expect("invalid svg root regex"));

/// Named HTML entities that are not predefined in XML.
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", "&#160;"),
    ("&ndash;", "&#8211;"),
    ("&mdash;", "&#8212;"),
    ("&hellip;", "&#8230;"),
    ("&laquo;", "&#171;"),
    ("&raquo;", "&#187;"),
    ("&copy;", "&#169;"),
];

/// Rewrite browser-oriented SVG into markup a strict XML parser accepts.
///
/// - strips `<foreignObject>` islands
/// - closes void tags (`<br>` becomes `<br/>`) and drops stray `</br>`
/// - replaces HTML-only named entities with numeric references
/// - adds the SVG namespace to the root element when missing
#[must_use]
pub fn sanitize_svg(svg: &str) -> String {
    let svg = FOREIGN_OBJECT.replace_all(svg, "");
    let svg = VOID_CLOSE_TAG.replace_all(&svg, "");
    let svg = VOID_TAG.replace_all(&svg, "<$1$2/>");

    let mut svg = svg.into_owned();
    for (entity, replacement) in HTML_ENTITIES {
        if svg.contains(entity) {
            svg = svg.replace(entity, replacement);
        }
    }

    ensure_namespace(&svg).into_owned()
}

fn ensure_namespace(svg: &str) -> Cow<'_, str> {
    let Some(root) = SVG_ROOT.find(svg) else {
        return Cow::Borrowed(svg);
    };
    if root.as_str().contains("xmlns=") {
        return Cow::Borrowed(svg);
    }
    let insert_at = root.start() + "<svg".len();
    let mut out = String::with_capacity(svg.len() + SVG_NAMESPACE.len() + 10);
    out.push_str(&svg[..insert_at]);
    out.push_str(" xmlns=\"");
    out.push_str(SVG_NAMESPACE);
    out.push('"');
    out.push_str(&svg[insert_at..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_strips_foreign_object() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><g><foreignObject width="10"><div>Label<br></div></foreignObject><rect/></g></svg>"#;
        assert_eq!(
            sanitize_svg(svg),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g><rect/></g></svg>"#
        );
    }

    #[test]
    fn test_strips_self_closing_foreign_object() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><foreignObject width="1"/><rect/></svg>"#;
        assert_eq!(
            sanitize_svg(svg),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect/></svg>"#
        );
    }

    #[test]
    fn test_closes_void_tags() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text>a<br>b<br/>c<BR class="x"></br></text></svg>"#;
        assert_eq!(
            sanitize_svg(svg),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><text>a<br/>b<br/>c<BR class="x"/></text></svg>"#
        );
    }

    #[test]
    fn test_replaces_html_entities() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text>a&nbsp;b &amp; c</text></svg>"#;
        assert_eq!(
            sanitize_svg(svg),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><text>a&#160;b &amp; c</text></svg>"#
        );
    }

    #[test]
    fn test_adds_missing_namespace() {
        let svg = r#"<?xml version="1.0"?><svg width="10" height="10"><rect/></svg>"#;
        assert_eq!(
            sanitize_svg(svg),
            r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect/></svg>"#
        );
    }

    #[test]
    fn test_clean_svg_unchanged() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1 1"><rect width="1" height="1"/></svg>"#;
        assert_eq!(sanitize_svg(svg), svg);
    }
}
