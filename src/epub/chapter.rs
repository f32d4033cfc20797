//! Turns one spine document into the content tree the surface mounts.

use log::debug;

use super::dom::Document;
use super::parser::EpubParser;
use super::resolver::ResourceResolver;
use super::styler::{CONTENT_CLASS, resolve_combined_styles};

/// Reads, resolves and restyles the chapter at `href` (relative to the OPF).
pub fn load_chapter(parser: &EpubParser, resolver: &mut ResourceResolver, href: &str) -> Document {
    let source = parser.get_file_as_text(&parser.resolve_path(href));
    if source.is_empty() {
        debug!("Chapter {href} is empty or missing");
    }
    let mut doc = Document::parse_html(&source);
    resolver.resolve_images(parser, &mut doc, href);
    ResourceResolver::resolve_links(&mut doc);
    let css = resolve_combined_styles(parser, resolver, &doc, href);
    build_content_root(&doc, &css)
}

/// A `div.epub-content` carrying the body's attributes, the combined CSS
/// as its first child, then the body's children.
pub fn build_content_root(source: &Document, css: &str) -> Document {
    let mut content = Document::new("div");
    let root = content.root();
    content.set_attr(root, "class", CONTENT_CLASS);

    let body = source.elements_by_tag(source.root(), &["body"]).first().copied();
    if let Some(body) = body {
        for (name, value) in source.attrs(body) {
            if name == "class" {
                let classes = format!("{CONTENT_CLASS} {value}");
                content.set_attr(root, "class", classes.trim());
            } else {
                content.set_attr(root, name, value);
            }
        }
    }

    let style = content.append_element(root, "style");
    content.append_text(style, css);

    if let Some(body) = body {
        for &child in source.children(body) {
            content.copy_subtree(source, child, root);
        }
    }
    content
}
