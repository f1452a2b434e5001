//! DOCX extraction: paragraph text from `word/document.xml`.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{estimate_pages, ExtractError, RawExtraction};
use crate::models::SourceFormat;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCUMENT_XML: &str = "word/document.xml";
const APP_XML: &str = "docProps/app.xml";
const MEDIA_PREFIX: &str = "word/media/";

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn extract_docx(bytes: &[u8]) -> Result<RawExtraction, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::corrupt(SourceFormat::Docx, e.to_string()))?;

    let has_images = archive.file_names().any(|n| n.starts_with(MEDIA_PREFIX));

    let document_xml = read_entry_bounded(&mut archive, DOCUMENT_XML)?
        .ok_or_else(|| ExtractError::corrupt(SourceFormat::Docx, "word/document.xml not found"))?;
    let text = paragraphs_to_text(&document_xml)?;

    // app.xml is optional and advisory; a broken one falls back to the estimate.
    let declared_pages = read_entry_bounded(&mut archive, APP_XML)
        .ok()
        .flatten()
        .and_then(|xml| declared_page_count(&xml));
    let page_count = declared_pages.unwrap_or_else(|| estimate_pages(&text));

    Ok(RawExtraction {
        text,
        page_count,
        has_images,
        used_fallback_ocr: false,
    })
}

fn read_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Option<Vec<u8>>, ExtractError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractError::corrupt(SourceFormat::Docx, e.to_string())),
    };
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::corrupt(SourceFormat::Docx, e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::corrupt(
            SourceFormat::Docx,
            format!("ZIP entry {name} exceeds size limit ({MAX_XML_ENTRY_BYTES} bytes)"),
        ));
    }
    Ok(Some(out))
}

/// `w:t` runs are concatenated; `w:p` ends a line, `w:tab` is a tab and
/// `w:br`/`w:cr` break the line.
fn paragraphs_to_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" | b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::corrupt(SourceFormat::Docx, e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::corrupt(SourceFormat::Docx, e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn declared_page_count(xml: &[u8]) -> Option<u32> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_pages = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => in_pages = e.local_name().as_ref() == b"Pages",
            Ok(Event::Text(te)) if in_pages => {
                let pages: u32 = te.unescape().ok()?.trim().parse().ok()?;
                return (pages > 0).then_some(pages);
            }
            Ok(Event::End(_)) => in_pages = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::minimal_docx;

    #[test]
    fn test_paragraphs_become_lines() {
        let bytes = minimal_docx(&["Jane Doe", "Lead developer &amp; mentor"], &[]);
        let out = extract_docx(&bytes).unwrap();
        assert_eq!(out.text, "Jane Doe\nLead developer & mentor\n");
        assert!(!out.has_images);
        assert_eq!(out.page_count, 1);
    }

    #[test]
    fn test_media_entries_flag_images() {
        let bytes = minimal_docx(&["Jane"], &[("word/media/image1.png", b"\x89PNG")]);
        assert!(extract_docx(&bytes).unwrap().has_images);
    }

    #[test]
    fn test_declared_page_count_wins() {
        let app = b"<?xml version=\"1.0\"?><Properties><Pages>3</Pages><Words>412</Words></Properties>";
        let bytes = minimal_docx(&["Jane"], &[("docProps/app.xml", app)]);
        assert_eq!(extract_docx(&bytes).unwrap().page_count, 3);
    }

    #[test]
    fn test_tabs_and_breaks() {
        let xml = br#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>Rust</w:t><w:tab/><w:t>Go</w:t><w:br/><w:t>SQL</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(paragraphs_to_text(xml).unwrap(), "Rust\tGo\nSQL\n");
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        assert!(matches!(
            extract_docx(b"definitely not a zip"),
            Err(ExtractError::CorruptDocument {
                format: SourceFormat::Docx,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_document_xml_is_corrupt() {
        use std::io::Write;
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        assert!(extract_docx(&buf).is_err());
    }
}
