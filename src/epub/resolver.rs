//! Turns archive references inside a chapter (images, stylesheet urls,
//! links) into something the host can load without the archive.

use eyre::Result;
use image::ImageReader;
use log::{debug, warn};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use super::dom::Document;
use super::parser::EpubParser;

const URL_PREFIX: &str = "blob:quire/";

static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(['"]?([^'")]*)['"]?\)"#).unwrap());

/// Collapses `.`, `..` and empty segments.
pub fn normalize_path(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            _ => stack.push(part),
        }
    }
    stack.join("/")
}

/// Resolves `path` against the directory of `base_href`. Absolute and
/// remote paths are returned unchanged.
pub fn resolve_relative_path(path: &str, base_href: &str) -> String {
    if path.starts_with("http") || path.starts_with('/') {
        return path.to_string();
    }
    let base_dir = match base_href.rfind('/') {
        Some(index) => &base_href[..=index],
        None => "",
    };
    normalize_path(&format!("{base_dir}{path}"))
}

fn media_type_for(path: &str) -> &'static str {
    let extension = path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "css" => "text/css",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

fn image_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Resource bytes held on behalf of an object URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub media_type: &'static str,
}

#[derive(Debug, Clone)]
struct CachedResource {
    url: String,
    dimensions: Option<(u32, u32)>,
}

#[derive(Debug, Default)]
pub struct ResourceResolver {
    cache: HashMap<String, CachedResource>,
    blobs: HashMap<String, Arc<Blob>>,
}

impl ResourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object URL for an archive resource, fetching it on first use.
    fn object_url(&mut self, parser: &EpubParser, resolved_path: &str) -> Option<CachedResource> {
        if let Some(cached) = self.cache.get(resolved_path) {
            return Some(cached.clone());
        }
        let Some(data) = parser.get_file(resolved_path) else {
            warn!("Resource not found in archive: {resolved_path}");
            return None;
        };
        let media_type = media_type_for(resolved_path);
        let dimensions = if media_type.starts_with("image/") {
            match image_dimensions(&data) {
                Ok(dimensions) => Some(dimensions),
                Err(err) => {
                    warn!("Failed to decode image {resolved_path}: {err}");
                    None
                }
            }
        } else {
            None
        };

        let url = format!("{URL_PREFIX}{}", Uuid::new_v4());
        self.blobs
            .insert(url.clone(), Arc::new(Blob { data, media_type }));
        let cached = CachedResource { url, dimensions };
        self.cache.insert(resolved_path.to_string(), cached.clone());
        debug!("Registered {resolved_path} as {}", cached.url);
        Some(cached)
    }

    /// Points `img` and SVG `image` elements at object URLs and records the
    /// decoded size of bitmap images as `width`/`height`.
    pub fn resolve_images(&mut self, parser: &EpubParser, doc: &mut Document, base_href: &str) {
        let images = doc.elements_by_tag(doc.root(), &["img", "image"]);
        for image in images {
            let Some(source) = doc
                .attr(image, "src")
                .or_else(|| doc.attr(image, "xlink:href"))
                .or_else(|| doc.attr(image, "href"))
                .map(str::to_string)
            else {
                continue;
            };
            let resolved_path = resolve_relative_path(&source, base_href);
            let Some(resource) = self.object_url(parser, &resolved_path) else {
                continue;
            };

            if doc.tag_name(image) == Some("image") {
                doc.set_attr(image, "xlink:href", &resource.url);
                doc.set_attr(image, "href", &resource.url);
            } else {
                if let Some((width, height)) = resource.dimensions {
                    doc.set_attr(image, "width", &width.to_string());
                    doc.set_attr(image, "height", &height.to_string());
                }
                doc.set_attr(image, "src", &resource.url);
            }
        }
    }

    /// Non-fragment links keep their target in `data-internal-link` and stop
    /// navigating on their own.
    pub fn resolve_links(doc: &mut Document) {
        for link in doc.elements_by_tag(doc.root(), &["a"]) {
            let Some(href) = doc.attr(link, "href").map(str::to_string) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            doc.set_attr(link, "data-internal-link", &href);
            doc.set_attr(link, "href", "#");
        }
    }

    /// Rewrites `url(...)` references in a stylesheet found at `base_href`.
    pub fn resolve_urls_in_css(&mut self, parser: &EpubParser, css: &str, base_href: &str) -> String {
        CSS_URL
            .replace_all(css, |caps: &Captures<'_>| {
                let original = &caps[1];
                if original.is_empty() || original.starts_with("data:") || original.starts_with("http") {
                    return caps[0].to_string();
                }
                let resolved_path = resolve_relative_path(original, base_href);
                match self.object_url(parser, &resolved_path) {
                    Some(resource) => format!("url(\"{}\")", resource.url),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// The resource behind an object URL, while it is still live.
    pub fn blob(&self, url: &str) -> Option<Arc<Blob>> {
        self.blobs.get(url).cloned()
    }

    pub fn object_url_count(&self) -> usize {
        self.blobs.len()
    }

    /// Revokes every object URL created so far.
    pub fn destroy(&mut self) {
        debug!("Revoking {} object URLs", self.blobs.len());
        self.blobs.clear();
        self.cache.clear();
    }
}
