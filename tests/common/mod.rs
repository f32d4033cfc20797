#![allow(dead_code)]

use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

/// Size every chapter is padded to, so progress weights are equal.
pub const CHAPTER_SIZE: usize = 1000;

/// A paragraph of `count` ten-letter words. At 120x130 each word fills one
/// line and each column holds five lines.
pub fn words_chapter(count: usize) -> String {
    let words = vec!["abcdefghij"; count].join(" ");
    padded_chapter(&format!(r#"<p class="first" style="margin: 0">{words}</p>"#))
}

/// Wraps `body` in an XHTML document of exactly `CHAPTER_SIZE` bytes.
pub fn padded_chapter(body: &str) -> String {
    let bare = format!("<html><head><!----></head><body>{body}</body></html>");
    let padding = "x".repeat(CHAPTER_SIZE.saturating_sub(bare.len()));
    format!("<html><head><!--{padding}--></head><body>{body}</body></html>")
}

pub fn opf(chapters: usize) -> String {
    let manifest: String = (1..=chapters)
        .map(|index| {
            format!(
                r#"<item id="c{index}" href="text/c{index}.xhtml" media-type="application/xhtml+xml"/>"#
            )
        })
        .collect();
    let spine: String = (1..=chapters)
        .map(|index| format!(r#"<itemref idref="c{index}"/>"#))
        .collect();
    format!(
        r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/" version="2.0">
  <metadata>
    <dc:title>Three Chapters</dc:title>
    <dc:creator>A. Writer</dc:creator>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="cover-img" href="images/cover.png" media-type="image/png"/>
    {manifest}
  </manifest>
  <spine toc="ncx">{spine}</spine>
</package>"#
    )
}

pub const NCX: &str = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/">
  <navMap>
    <navPoint id="n1"><navLabel><text>Opening</text></navLabel><content src="text/c1.xhtml"/></navPoint>
    <navPoint id="n2"><navLabel><text>Middle</text></navLabel><content src="text/c2.xhtml"/></navPoint>
    <navPoint id="n3"><navLabel><text>Ending</text></navLabel><content src="text/c3.xhtml"/></navPoint>
  </navMap>
</ncx>"#;

pub fn archive(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(name.as_str(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Three equally sized chapters of one, two and six pages at 120x130.
pub fn three_chapter_book() -> Vec<u8> {
    let chapters = [words_chapter(3), words_chapter(8), words_chapter(30)];
    let mut files = vec![
        ("META-INF/container.xml".to_string(), CONTAINER.as_bytes().to_vec()),
        ("OEBPS/content.opf".to_string(), opf(chapters.len()).into_bytes()),
        ("OEBPS/toc.ncx".to_string(), NCX.as_bytes().to_vec()),
        ("OEBPS/images/cover.png".to_string(), b"cover".to_vec()),
    ];
    for (index, chapter) in chapters.iter().enumerate() {
        files.push((
            format!("OEBPS/text/c{}.xhtml", index + 1),
            chapter.clone().into_bytes(),
        ));
    }
    archive(&files)
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::new(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// One chapter showing an image stored next to the text directory.
pub fn illustrated_book() -> Vec<u8> {
    let chapter = r#"<html><body><p class="first">Figure</p><img src="../images/figure.png" alt="figure"/></body></html>"#;
    archive(&[
        ("META-INF/container.xml".to_string(), CONTAINER.as_bytes().to_vec()),
        ("OEBPS/content.opf".to_string(), opf(1).into_bytes()),
        ("OEBPS/text/c1.xhtml".to_string(), chapter.as_bytes().to_vec()),
        ("OEBPS/images/figure.png".to_string(), png(40, 40)),
    ])
}
