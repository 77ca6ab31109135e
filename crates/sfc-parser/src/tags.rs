//! Built-in tag tables and tag-name helpers.
//!
//! Lookups are case-sensitive: `<Button>` is a component candidate while
//! `<button>` is not.

/// HTML tags.
const HTML_TAGS: &[&str] = &[
    "html", "body", "base", "head", "link", "meta", "style", "title", "address", "article",
    "aside", "footer", "header", "h1", "h2", "h3", "h4", "h5", "h6", "nav", "section", "div",
    "dd", "dl", "dt", "figcaption", "figure", "picture", "hr", "img", "li", "main", "ol", "p",
    "pre", "ul", "a", "b", "abbr", "bdi", "bdo", "br", "cite", "code", "data", "dfn", "em", "i",
    "kbd", "mark", "q", "rp", "rt", "ruby", "s", "samp", "small", "span", "strong", "sub", "sup",
    "time", "u", "var", "wbr", "area", "audio", "map", "track", "video", "embed", "object",
    "param", "source", "canvas", "script", "noscript", "del", "ins", "caption", "col",
    "colgroup", "table", "thead", "tbody", "td", "th", "tr", "button", "datalist", "fieldset",
    "form", "input", "label", "legend", "meter", "optgroup", "option", "output", "progress",
    "select", "textarea", "details", "dialog", "menu", "summary", "template", "blockquote",
    "iframe", "tfoot",
];

/// SVG tags.
const SVG_TAGS: &[&str] = &[
    "svg", "animate", "animateMotion", "animateTransform", "circle", "clipPath",
    "color-profile", "defs", "desc", "discard", "ellipse", "feBlend", "feColorMatrix",
    "feComponentTransfer", "feComposite", "feConvolveMatrix", "feDiffuseLighting",
    "feDisplacementMap", "feDistanceLight", "feDropShadow", "feFlood", "feFuncA", "feFuncB",
    "feFuncG", "feFuncR", "feGaussianBlur", "feImage", "feMerge", "feMergeNode", "feMorphology",
    "feOffset", "fePointLight", "feSpecularLighting", "feSpotLight", "feTile", "feTurbulence",
    "filter", "foreignObject", "g", "hatch", "hatchpath", "image", "line", "linearGradient",
    "marker", "mask", "mesh", "meshgradient", "meshpatch", "meshrow", "metadata", "mpath",
    "path", "pattern", "polygon", "polyline", "radialGradient", "rect", "set", "solidcolor",
    "stop", "switch", "symbol", "text", "textPath", "title", "tspan", "unknown", "use", "view",
];

/// Void (self-closing) HTML tags.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Check if a tag is an HTML element.
pub fn is_html_tag(tag: &str) -> bool {
    HTML_TAGS.contains(&tag)
}

/// Check if a tag is an SVG element.
pub fn is_svg_tag(tag: &str) -> bool {
    SVG_TAGS.contains(&tag)
}

/// Check if a tag is a void element.
pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Whether a tag is one of the built-in markup tags rather than a component.
pub fn is_builtin_tag(tag: &str) -> bool {
    is_html_tag(tag) || is_svg_tag(tag) || is_void_tag(tag)
}

/// `my-button` -> `myButton`. Only a hyphen followed by a word character is
/// folded; other hyphens are kept.
pub fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('-', Some(&next)) if next.is_alphanumeric() || next == '_' => {
                out.extend(next.to_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Uppercase the first character.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The identifier a template tag would resolve to if it named a component.
pub fn component_name(tag: &str) -> String {
    capitalize(&camelize(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_case_sensitive() {
        assert!(is_builtin_tag("button"));
        assert!(!is_builtin_tag("Button"));
        assert!(is_builtin_tag("clipPath"));
        assert!(is_builtin_tag("wbr"));
        assert!(!is_builtin_tag("my-button"));
    }

    #[test]
    fn test_component_name() {
        assert_eq!(camelize("my-fancy-button"), "myFancyButton");
        assert_eq!(camelize("trailing-"), "trailing-");
        assert_eq!(component_name("my-button"), "MyButton");
        assert_eq!(component_name("HelloWorld"), "HelloWorld");
        assert_eq!(capitalize(""), "");
    }
}
