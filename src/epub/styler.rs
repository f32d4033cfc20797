//! Chapter CSS assembly and the layout parameters every other part of the
//! renderer derives from.

use log::warn;
use regex::Regex;
use std::sync::LazyLock;

use super::dom::{Document, NodeId};
use super::parser::EpubParser;
use super::resolver::{ResourceResolver, resolve_relative_path};
use super::types::LayoutInfo;
use crate::settings::{ReaderSettings, Theme};

pub const CONTENT_CLASS: &str = "epub-content";

pub const UA_STYLES: &str = "
p { text-indent: 1.5em; }
p.first, p.no-indent { text-indent: 0; }
h1 { font-size: 1.5em; font-weight: bold; }
h2 { font-size: 1.4em; font-weight: bold; }
h3 { font-size: 1.3em; font-weight: bold; }
h4, h5, h6 { font-size: 1.1em; font-weight: bold; }
figure { margin: 0; padding: 0; }
";

/// Block tags whose vertical margins and paddings are snapped to the grid.
pub const GRID_BLOCK_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "blockquote", "div", "section", "article", "ul",
    "ol", "li", "pre", "figure", "dt", "dd",
];

const LINE_HEIGHT_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "div", "li", "blockquote", "pre", "dt", "dd", "th",
    "td",
];

const BASE_FONT_PX: f64 = 16.0;

static BODY_SELECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|[}\s,])body([\s.#\[:{,])").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeColors {
    pub color: &'static str,
    pub background: &'static str,
}

pub fn theme_colors(theme: Theme) -> ThemeColors {
    match theme {
        Theme::Dark => ThemeColors {
            color: "#dedede",
            background: "#000000",
        },
        Theme::Sepia => ThemeColors {
            color: "#5f4b32",
            background: "#f6f1d1",
        },
        Theme::Light | Theme::System => ThemeColors {
            color: "#000000",
            background: "#ffffff",
        },
    }
}

/// Height of one text line in pixels; every vertical distance in a page is
/// a multiple of it.
pub fn grid_unit(font_size: u32) -> f64 {
    (f64::from(font_size) * 0.16 * 1.6).round()
}

pub fn base_font_px(font_size: u32) -> f64 {
    BASE_FONT_PX * f64::from(font_size) / 100.0
}

/// Font scale the UA stylesheet gives a heading tag.
pub fn heading_scale(tag: &str) -> Option<f64> {
    match tag {
        "h1" => Some(1.5),
        "h2" => Some(1.4),
        "h3" => Some(1.3),
        "h4" | "h5" | "h6" => Some(1.1),
        _ => None,
    }
}

/// Two columns when the container is landscape.
pub fn compute_layout_info(margin: f64, container_width: f64, container_height: f64) -> LayoutInfo {
    let is_two_column = container_width > container_height;
    let gap = if is_two_column && margin == 0.0 {
        16.0
    } else {
        margin
    };
    let column_width = if is_two_column {
        ((container_width - margin * 2.0 - gap) / 2.0).floor()
    } else {
        container_width - margin * 2.0
    };
    let columns = if is_two_column { 2.0 } else { 1.0 };
    LayoutInfo {
        column_width,
        gap,
        page_stride: (column_width + gap) * columns,
        container_width,
        margin,
        is_two_column,
    }
}

/// Rewrites bare `body` selectors so chapter rules stay inside the content
/// container.
pub fn rewrite_body_selectors(css: &str) -> String {
    let mut current = css.to_string();
    loop {
        let next = BODY_SELECTOR
            .replace_all(&current, format!("${{1}}.{CONTENT_CLASS}${{2}}"))
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Collects the UA sheet, the chapter's `<style>` blocks and its linked
/// stylesheets into one CSS text.
pub fn resolve_combined_styles(
    parser: &EpubParser,
    resolver: &mut ResourceResolver,
    doc: &Document,
    base_href: &str,
) -> String {
    let mut combined = format!("/* UA Styles */\n{UA_STYLES}\n");

    for tag in doc.elements_by_tag(doc.root(), &["style"]) {
        let css = doc.text_content(tag);
        combined.push_str(&resolver.resolve_urls_in_css(parser, &css, base_href));
        combined.push('\n');
    }

    for link in doc.elements_by_tag(doc.root(), &["link"]) {
        if doc.attr(link, "rel") != Some("stylesheet") {
            continue;
        }
        let Some(href) = doc.attr(link, "href") else {
            continue;
        };
        let resolved = resolve_relative_path(href, base_href);
        let css = parser.get_file_as_text(&parser.resolve_path(&resolved));
        if css.is_empty() {
            warn!("Failed to load stylesheet: {resolved}");
            continue;
        }
        let css = resolver.resolve_urls_in_css(parser, &css, &resolved);
        combined.push_str(&format!("\n/* {href} */\n{css}\n"));
    }

    rewrite_body_selectors(&combined)
}

/// Everything the surface needs to lay a chapter out with the current
/// reader settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentStyle {
    pub layout: LayoutInfo,
    pub grid_unit: f64,
    pub font_size: u32,
    pub font_family: String,
    pub colors: ThemeColors,
    pub container_height: f64,
    pub invert_images: bool,
    /// Declarations for the content container itself.
    pub host_css: String,
    /// Rules injected next to the chapter CSS.
    pub injected_css: String,
}

impl ContentStyle {
    pub fn base_font_px(&self) -> f64 {
        base_font_px(self.font_size)
    }
}

pub fn content_style(
    settings: &ReaderSettings,
    prefers_dark: bool,
    container_width: f64,
    container_height: f64,
) -> ContentStyle {
    let layout = compute_layout_info(f64::from(settings.margin), container_width, container_height);
    let grid = grid_unit(settings.font_size);
    let colors = theme_colors(settings.theme.effective(prefers_dark));
    let font_family = &settings.font_family;

    let host_css = format!(
        "box-sizing: border-box; font-size: {}%; font-family: {font_family}; color: {}; \
         background: {}; padding: 0 {}px; width: 100%; column-width: {}px; column-gap: {}px; \
         column-fill: auto; height: 100%; overflow: visible; position: relative; margin: 0; \
         widows: 1; orphans: 1;",
        settings.font_size,
        colors.color,
        colors.background,
        layout.margin,
        layout.column_width,
        layout.gap,
    );

    let line_height_selectors = LINE_HEIGHT_TAGS
        .iter()
        .map(|tag| format!(".{CONTENT_CLASS} {tag}"))
        .collect::<Vec<_>>()
        .join(",\n");
    let invert = if settings.invert_images {
        "filter: invert(1) hue-rotate(180deg);"
    } else {
        ""
    };
    let injected_css = format!(
        ".{CONTENT_CLASS} * {{ font-family: {font_family} !important; color: {color} !important; \
         line-height: 1 !important; }}\n\
         {line_height_selectors} {{ line-height: {grid}px !important; }}\n\
         .{CONTENT_CLASS} img {{ display: block !important; margin: 0 auto !important; \
         max-width: 100% !important; max-height: {container_height}px !important; \
         break-inside: avoid; box-sizing: border-box; object-fit: contain; {invert} }}\n\
         .{CONTENT_CLASS} svg {{ display: block !important; margin: 0 auto !important; \
         max-width: 100% !important; max-height: {container_height}px !important; \
         break-inside: avoid; {invert} }}\n",
        color = colors.color,
    );

    ContentStyle {
        layout,
        grid_unit: grid,
        font_size: settings.font_size,
        font_family: font_family.clone(),
        colors,
        container_height,
        invert_images: settings.invert_images,
        host_css,
        injected_css,
    }
}

/// Vertical box edges of a block element in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxEdges {
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub padding_top: f64,
    pub padding_bottom: f64,
}

/// Parses a CSS length; `em` is relative to `em_px`.
pub fn parse_length(value: &str, em_px: f64) -> Option<f64> {
    let value = value.trim().trim_end_matches("!important").trim();
    if value == "0" {
        return Some(0.0);
    }
    let (number, factor) = if let Some(number) = value.strip_suffix("px") {
        (number, 1.0)
    } else if let Some(number) = value.strip_suffix("rem") {
        (number, BASE_FONT_PX)
    } else if let Some(number) = value.strip_suffix("em") {
        (number, em_px)
    } else if let Some(number) = value.strip_suffix("pt") {
        (number, 4.0 / 3.0)
    } else {
        return None;
    };
    number.trim().parse::<f64>().ok().map(|n| n * factor)
}

fn ua_margin_em(tag: &str) -> f64 {
    match tag {
        "p" | "ul" | "ol" | "dl" | "pre" | "blockquote" => 1.0,
        "h1" => 0.67,
        "h2" => 0.83,
        "h3" => 1.0,
        "h4" => 1.33,
        "h5" => 1.67,
        "h6" => 2.33,
        _ => 0.0,
    }
}

/// Top and bottom values of a `margin`/`padding` longhand, falling back to
/// the shorthand.
fn vertical_edges(doc: &Document, id: NodeId, property: &str, em_px: f64) -> (Option<f64>, Option<f64>) {
    let shorthand: Vec<Option<f64>> = doc
        .style_property(id, property)
        .map(|value| {
            value
                .trim_end_matches("!important")
                .split_whitespace()
                .map(|part| parse_length(part, em_px))
                .collect()
        })
        .unwrap_or_default();
    let (short_top, short_bottom) = match shorthand.as_slice() {
        [all] => (*all, *all),
        [vertical, _] => (*vertical, *vertical),
        [top, _, bottom] | [top, _, bottom, _] => (*top, *bottom),
        _ => (None, None),
    };
    let top = doc
        .style_property(id, &format!("{property}-top"))
        .and_then(|value| parse_length(&value, em_px))
        .or(short_top);
    let bottom = doc
        .style_property(id, &format!("{property}-bottom"))
        .and_then(|value| parse_length(&value, em_px))
        .or(short_bottom);
    (top, bottom)
}

/// The margins and paddings an element ends up with: inline declarations
/// first, then the UA defaults.
pub fn computed_box(doc: &Document, id: NodeId, font_size: u32) -> BoxEdges {
    let tag = doc.tag_name(id).unwrap_or_default();
    let em_px = base_font_px(font_size) * heading_scale(tag).unwrap_or(1.0);
    let default_margin = ua_margin_em(tag) * em_px;
    let (margin_top, margin_bottom) = vertical_edges(doc, id, "margin", em_px);
    let (padding_top, padding_bottom) = vertical_edges(doc, id, "padding", em_px);
    BoxEdges {
        margin_top: margin_top.unwrap_or(default_margin),
        margin_bottom: margin_bottom.unwrap_or(default_margin),
        padding_top: padding_top.unwrap_or(0.0),
        padding_bottom: padding_bottom.unwrap_or(0.0),
    }
}

/// Rounds block margins and paddings to the nearest grid unit and pins them
/// with inline `!important` declarations.
pub fn snap_margins_to_grid(doc: &mut Document, root: NodeId, font_size: u32) {
    let grid = grid_unit(font_size);
    if grid <= 0.0 {
        return;
    }
    for id in doc.elements_by_tag(root, GRID_BLOCK_TAGS) {
        let edges = computed_box(doc, id, font_size);
        let sides = [
            ("margin-top", edges.margin_top),
            ("margin-bottom", edges.margin_bottom),
            ("padding-top", edges.padding_top),
            ("padding-bottom", edges.padding_bottom),
        ];
        for (property, value) in sides {
            if value > 0.0 {
                let snapped = (value / grid).round() * grid;
                doc.set_style_property(id, property, &format!("{snapped}px !important"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compute_layout_portrait() {
        let layout = compute_layout_info(20.0, 600.0, 800.0);
        assert!(!layout.is_two_column);
        assert_eq!(layout.gap, 20.0);
        assert_eq!(layout.column_width, 560.0);
        assert_eq!(layout.page_stride, 580.0);
    }

    #[test]
    fn test_compute_layout_landscape() {
        let layout = compute_layout_info(20.0, 1000.0, 600.0);
        assert!(layout.is_two_column);
        assert_eq!(layout.column_width, 470.0);
        assert_eq!(layout.page_stride, 980.0);

        let layout = compute_layout_info(0.0, 1001.0, 600.0);
        assert_eq!(layout.gap, 16.0);
        assert_eq!(layout.column_width, 492.0);
        assert_eq!(layout.page_stride, 1016.0);
    }

    #[test]
    fn test_grid_unit() {
        assert_eq!(grid_unit(100), 26.0);
        assert_eq!(grid_unit(150), 38.0);
        assert_eq!(grid_unit(80), 20.0);
    }

    #[test]
    fn test_rewrite_body_selectors() {
        assert_eq!(
            rewrite_body_selectors("body { margin: 0 }"),
            ".epub-content { margin: 0 }"
        );
        assert_eq!(
            rewrite_body_selectors("p{}BODY.x{} body,body{}"),
            "p{}.epub-content.x{} .epub-content,.epub-content{}"
        );
        assert_eq!(rewrite_body_selectors(".tbody { }"), ".tbody { }");
        assert_eq!(rewrite_body_selectors("somebody {}"), "somebody {}");
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length("12px", 16.0), Some(12.0));
        assert_eq!(parse_length("1.5em", 16.0), Some(24.0));
        assert_eq!(parse_length("0", 16.0), Some(0.0));
        assert_eq!(parse_length("13px !important", 16.0), Some(13.0));
        assert_eq!(parse_length("auto", 16.0), None);
    }

    #[test]
    fn test_theme_colors() {
        assert_eq!(theme_colors(Theme::Dark).color, "#dedede");
        assert_eq!(theme_colors(Theme::Sepia).background, "#f6f1d1");
        assert_eq!(theme_colors(Theme::System), theme_colors(Theme::Light));
    }

    #[test]
    fn test_content_style_injects_grid_and_invert() {
        let settings = ReaderSettings {
            invert_images: true,
            ..ReaderSettings::default()
        };
        let style = content_style(&settings, true, 600.0, 800.0);
        assert_eq!(style.colors.color, "#dedede");
        assert_eq!(style.grid_unit, 26.0);
        assert!(style.injected_css.contains("line-height: 26px !important"));
        assert!(style.injected_css.contains("max-height: 800px !important"));
        assert!(style.injected_css.contains("invert(1)"));
        assert!(style.host_css.contains("column-width: 560px"));
        assert!(style.host_css.contains("padding: 0 20px"));
    }

    #[test]
    fn test_snap_margins_to_grid() {
        let mut doc = Document::parse_html(
            r#"<body><h1>T</h1><p style="margin-bottom: 30px">a</p><div>b</div><span>c</span></body>"#,
        );
        let root = doc.root();
        snap_margins_to_grid(&mut doc, root, 100);

        let h1 = doc.elements_by_tag(root, &["h1"])[0];
        let p = doc.elements_by_tag(root, &["p"])[0];
        let div = doc.elements_by_tag(root, &["div"])[0];
        // 0.67 * 24px rounds to one 26px line.
        assert_eq!(doc.style_property(h1, "margin-top").as_deref(), Some("26px !important"));
        assert_eq!(doc.style_property(p, "margin-top").as_deref(), Some("26px !important"));
        assert_eq!(doc.style_property(p, "margin-bottom").as_deref(), Some("26px !important"));
        assert_eq!(doc.style_property(div, "margin-top"), None);

        let edges = computed_box(&doc, p, 100);
        assert_eq!(edges.margin_bottom, 26.0);
        assert_eq!(edges.padding_top, 0.0);
    }

    #[test]
    fn test_computed_box_shorthand() {
        let mut doc = Document::new("div");
        let root = doc.root();
        let p = doc.append_element(root, "p");
        doc.set_attr(p, "style", "margin: 10px 0 2em; padding: 4px");
        let edges = computed_box(&doc, p, 100);
        assert_eq!(edges.margin_top, 10.0);
        assert_eq!(edges.margin_bottom, 32.0);
        assert_eq!(edges.padding_top, 4.0);
        assert_eq!(edges.padding_bottom, 4.0);
    }
}
