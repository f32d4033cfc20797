//! Reads the package document, spine and NCX table of contents out of an
//! EPUB archive held in memory.

use eyre::{Result, WrapErr};
use log::{debug, warn};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

use super::resolver::resolve_relative_path;
use super::types::{EpubMetadata, EpubPackage, ManifestItem, NavPoint, SpineItem};
use super::xml::{parse_xml, XmlElement};

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";
const FALLBACK_CHAPTER_SIZE: u64 = 1000;

struct ArchiveEntry {
    data: Vec<u8>,
    size: u64,
}

pub struct EpubParser {
    entries: HashMap<String, ArchiveEntry>,
    opf_path: String,
    opf_dir: String,
    opf: Option<XmlElement>,
}

impl EpubParser {
    /// Opens the archive. Unreadable entries are skipped; a buffer that is
    /// not a zip archive is an error.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).wrap_err("Not a valid EPUB archive")?;
        let mut entries = HashMap::new();
        for index in 0..archive.len() {
            let mut file = match archive.by_index(index) {
                Ok(file) => file,
                Err(err) => {
                    warn!("Skipping unreadable archive entry {index}: {err}");
                    continue;
                }
            };
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let size = file.size();
            let mut data = Vec::new();
            if let Err(err) = file.read_to_end(&mut data) {
                warn!("Skipping archive entry {name}: {err}");
                continue;
            }
            entries.insert(name, ArchiveEntry { data, size });
        }
        Ok(Self {
            entries,
            opf_path: String::new(),
            opf_dir: String::new(),
            opf: None,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Self::new(bytes)
    }

    /// Parses the package. Missing or malformed documents fall back to
    /// defaults instead of failing.
    pub fn load(&mut self) -> EpubPackage {
        self.opf_path = self.find_opf_path();
        self.opf_dir = match self.opf_path.rfind('/') {
            Some(index) => self.opf_path[..=index].to_string(),
            None => String::new(),
        };
        debug!("Package document at {:?}", self.opf_path);

        self.opf = parse_xml(&self.get_file_as_text(&self.opf_path));
        let Some(opf) = self.opf.as_ref() else {
            warn!("Package document {:?} is missing or malformed", self.opf_path);
            return EpubPackage {
                opf_path: self.opf_path.clone(),
                ..EpubPackage::default()
            };
        };

        let metadata = parse_metadata(opf);
        let manifest = parse_manifest(opf);
        let spine = self.parse_spine(opf, &manifest);
        let toc = self.parse_toc(&manifest);
        EpubPackage {
            metadata,
            manifest,
            spine,
            toc,
            opf_path: self.opf_path.clone(),
        }
    }

    /// Archive path of a package-relative href.
    pub fn resolve_path(&self, path: &str) -> String {
        if let Some(stripped) = path.strip_prefix('/') {
            return stripped.to_string();
        }
        if path.starts_with("http") {
            return path.to_string();
        }
        format!("{}{path}", self.opf_dir)
    }

    /// Bytes of a package-relative href.
    pub fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        let full_path = self.resolve_path(path);
        self.entries
            .get(&full_path)
            .map(|entry| entry.data.clone())
    }

    /// Text of an archive path, as stored; empty when there is no such entry.
    pub fn get_file_as_text(&self, path: &str) -> String {
        self.entries
            .get(path)
            .map(|entry| String::from_utf8_lossy(&entry.data).into_owned())
            .unwrap_or_default()
    }

    pub fn opf_dir(&self) -> &str {
        &self.opf_dir
    }

    fn find_opf_path(&self) -> String {
        parse_xml(&self.get_file_as_text("META-INF/container.xml"))
            .and_then(|doc| {
                doc.find("rootfile")
                    .and_then(|rootfile| rootfile.attr("full-path"))
                    .map(str::to_string)
            })
            .unwrap_or_default()
    }

    fn parse_spine(&self, opf: &XmlElement, manifest: &[ManifestItem]) -> Vec<SpineItem> {
        opf.select_children("spine", "itemref")
            .into_iter()
            .map(|itemref| {
                let idref = itemref.attr("idref").unwrap_or_default().to_string();
                let linear = itemref.attr("linear") != Some("no");
                let size = manifest
                    .iter()
                    .find(|item| item.id == idref)
                    .and_then(|item| self.entries.get(&self.resolve_path(&item.href)))
                    .map_or(0, |entry| {
                        if entry.size == 0 {
                            FALLBACK_CHAPTER_SIZE
                        } else {
                            entry.size
                        }
                    });
                SpineItem {
                    idref,
                    size,
                    linear,
                }
            })
            .collect()
    }

    fn parse_toc(&self, manifest: &[ManifestItem]) -> Vec<NavPoint> {
        let Some(ncx_item) = manifest.iter().find(|item| item.media_type == NCX_MEDIA_TYPE) else {
            return Vec::new();
        };
        let Some(ncx) = parse_xml(&self.get_file_as_text(&self.resolve_path(&ncx_item.href)))
        else {
            warn!("Table of contents {:?} is missing or malformed", ncx_item.href);
            return Vec::new();
        };
        ncx.select_children("navMap", "navPoint")
            .into_iter()
            .map(parse_nav_point)
            .collect()
    }

    /// Href of the cover image, tried in order: the EPUB 2 cover meta, an
    /// EPUB 3 `cover-image` item, the first image on the guide's cover page,
    /// then any image item whose id mentions "cover".
    pub fn cover_image_href(&self) -> Option<String> {
        let opf = self.opf.as_ref()?;
        let manifest = parse_manifest(opf);

        let meta_cover = opf
            .descendants_named("meta")
            .into_iter()
            .find(|meta| meta.attr("name") == Some("cover"))
            .and_then(|meta| meta.attr("content"))
            .and_then(|id| manifest.iter().find(|item| item.id == id))
            .filter(|item| item.media_type.starts_with("image/"));
        if let Some(item) = meta_cover {
            return Some(item.href.clone());
        }

        if let Some(item) = manifest.iter().find(|item| {
            item.properties
                .as_deref()
                .is_some_and(|properties| properties.contains("cover-image"))
        }) {
            return Some(item.href.clone());
        }

        if let Some(href) = self.cover_from_guide(opf) {
            return Some(href);
        }

        manifest
            .iter()
            .find(|item| {
                item.media_type.starts_with("image/") && item.id.to_lowercase().contains("cover")
            })
            .map(|item| item.href.clone())
    }

    fn cover_from_guide(&self, opf: &XmlElement) -> Option<String> {
        let page_href = opf
            .select_children("guide", "reference")
            .into_iter()
            .find(|reference| reference.attr("type") == Some("cover"))?
            .attr("href")?;
        let page_path = page_href.split('#').next().unwrap_or_default();
        let page = self.get_file_as_text(&self.resolve_path(page_path));
        if page.is_empty() {
            return None;
        }
        let document = Html::parse_document(&page);
        let selector = Selector::parse("img, image").ok()?;
        let source = document.select(&selector).find_map(|image| {
            let element = image.value();
            element.attr("src").or_else(|| element.attr("href"))
        })?;
        // Image sources are relative to the cover page, not the package.
        Some(resolve_relative_path(source, page_path))
    }
}

fn text_of(metadata: Option<&XmlElement>, name: &str) -> Option<String> {
    let text = metadata?.find(name)?.text();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn parse_metadata(opf: &XmlElement) -> EpubMetadata {
    let metadata = opf.find("metadata");
    let defaults = EpubMetadata::default();
    EpubMetadata {
        title: text_of(metadata, "title").unwrap_or(defaults.title),
        creator: text_of(metadata, "creator").unwrap_or(defaults.creator),
        language: text_of(metadata, "language"),
        identifier: text_of(metadata, "identifier"),
        publisher: text_of(metadata, "publisher"),
    }
}

fn parse_manifest(opf: &XmlElement) -> Vec<ManifestItem> {
    opf.select_children("manifest", "item")
        .into_iter()
        .map(|item| ManifestItem {
            id: item.attr("id").unwrap_or_default().to_string(),
            href: item.attr("href").unwrap_or_default().to_string(),
            media_type: item.attr("media-type").unwrap_or_default().to_string(),
            properties: item.attr("properties").map(str::to_string),
        })
        .collect()
}

fn parse_nav_point(element: &XmlElement) -> NavPoint {
    let label = element
        .select_children("navLabel", "text")
        .first()
        .map(|text| text.text().trim().to_string())
        .unwrap_or_default();
    let content = element
        .find("content")
        .and_then(|content| content.attr("src"))
        .unwrap_or_default()
        .to_string();
    NavPoint {
        id: element.attr("id").unwrap_or_default().to_string(),
        label,
        content,
        children: element.children_named("navPoint").map(parse_nav_point).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

    const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <metadata>
    <dc:title>Sample</dc:title>
    <dc:creator>Jane Doe</dc:creator>
    <dc:language>en</dc:language>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="c1" href="text/one.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/two.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover-img" href="images/cover.png" media-type="image/png"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="c1"/>
    <itemref idref="c2" linear="no"/>
    <itemref idref="ghost"/>
  </spine>
</package>"#;

    const NCX: &str = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/">
  <navMap>
    <navPoint id="n1"><navLabel><text>One</text></navLabel><content src="text/one.xhtml"/>
      <navPoint id="n1a"><navLabel><text>One A</text></navLabel><content src="text/one.xhtml#a"/></navPoint>
    </navPoint>
    <navPoint id="n2"><navLabel><text>Two</text></navLabel><content src="text/two.xhtml"/></navPoint>
  </navMap>
</ncx>"#;

    fn sample() -> EpubParser {
        let bytes = archive(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
            ("OEBPS/toc.ncx", NCX),
            ("OEBPS/text/one.xhtml", "<html><body><p>One</p></body></html>"),
            ("OEBPS/text/two.xhtml", ""),
            ("OEBPS/images/cover.png", "png"),
        ]);
        EpubParser::new(bytes).unwrap()
    }

    #[test]
    fn test_load_package() {
        let mut parser = sample();
        let package = parser.load();
        assert_eq!(package.opf_path, "OEBPS/content.opf");
        assert_eq!(parser.opf_dir(), "OEBPS/");
        assert_eq!(package.metadata.title, "Sample");
        assert_eq!(package.metadata.creator, "Jane Doe");
        assert_eq!(package.metadata.language.as_deref(), Some("en"));
        assert_eq!(package.metadata.publisher, None);
        assert_eq!(package.manifest.len(), 4);
    }

    #[test]
    fn test_spine_sizes_and_linear() {
        let mut parser = sample();
        let package = parser.load();
        let sizes: Vec<u64> = package.spine.iter().map(|item| item.size).collect();
        assert_eq!(sizes, vec![36, FALLBACK_CHAPTER_SIZE, 0]);
        assert!(package.spine[0].linear);
        assert!(!package.spine[1].linear);
    }

    #[test]
    fn test_nested_toc() {
        let mut parser = sample();
        let package = parser.load();
        assert_eq!(package.toc.len(), 2);
        assert_eq!(package.toc[0].label, "One");
        assert_eq!(package.toc[0].children.len(), 1);
        assert_eq!(package.toc[0].children[0].content, "text/one.xhtml#a");
        assert!(package.toc[1].children.is_empty());
    }

    #[test]
    fn test_resolve_path() {
        let mut parser = sample();
        parser.load();
        assert_eq!(parser.resolve_path("text/one.xhtml"), "OEBPS/text/one.xhtml");
        assert_eq!(parser.resolve_path("/abs/file.css"), "abs/file.css");
        assert_eq!(parser.resolve_path("https://x.org/a"), "https://x.org/a");
        assert_eq!(parser.get_file("images/cover.png"), Some(b"png".to_vec()));
        assert_eq!(parser.get_file_as_text("nope"), "");
    }

    #[test]
    fn test_cover_from_meta() {
        let mut parser = sample();
        parser.load();
        assert_eq!(parser.cover_image_href().as_deref(), Some("images/cover.png"));
    }

    #[test]
    fn test_cover_from_guide_page() {
        let opf = r#"<package><metadata/><manifest>
            <item id="page" href="text/cover.xhtml" media-type="application/xhtml+xml"/>
          </manifest><spine/>
          <guide><reference type="cover" href="text/cover.xhtml#top"/></guide></package>"#;
        let bytes = archive(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", opf),
            ("OEBPS/text/cover.xhtml", r#"<html><body><img src="../images/c.jpg"/></body></html>"#),
        ]);
        let mut parser = EpubParser::new(bytes).unwrap();
        parser.load();
        assert_eq!(parser.cover_image_href().as_deref(), Some("images/c.jpg"));
    }

    #[test]
    fn test_missing_container_gives_defaults() {
        let mut parser = EpubParser::new(archive(&[("mimetype", "application/epub+zip")])).unwrap();
        let package = parser.load();
        assert_eq!(package.metadata.title, "Unknown Title");
        assert!(package.spine.is_empty());
        assert!(parser.cover_image_href().is_none());
    }

    #[test]
    fn test_not_a_zip() {
        assert!(EpubParser::new(b"plain text".to_vec()).is_err());
    }
}
