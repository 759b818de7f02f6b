//! DOCX and PPTX text extraction.
//!
//! Both formats are ZIP archives of XML parts. DOCX keeps its body in
//! `word/document.xml` with text in `<w:t>` runs and paragraphs in `<w:p>`.
//! PPTX has one `ppt/slides/slideN.xml` per slide with text in `<a:t>` runs.

use crate::error::{Result, StudyError};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>> {
    zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| StudyError::Extraction(format!("not a ZIP archive: {}", e)))
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<String> {
    let mut xml = String::new();
    archive
        .by_name(name)
        .map_err(|e| StudyError::Extraction(format!("missing {}: {}", name, e)))?
        .read_to_string(&mut xml)?;
    Ok(xml)
}

/// Collect the text of `text_tag` runs, one line per `para_tag` paragraph.
fn collect_runs(xml: &str, text_tag: &[u8], para_tag: &[u8]) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == text_tag => in_text = true,
            Ok(Event::End(e)) => {
                let name = e.name();
                if name.as_ref() == text_tag {
                    in_text = false;
                } else if name.as_ref() == para_tag && !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            Ok(Event::Text(e)) if in_text => {
                let run = e
                    .unescape()
                    .map_err(|e| StudyError::Extraction(format!("malformed XML: {}", e)))?;
                text.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(StudyError::Extraction(format!("malformed XML: {}", e))),
            _ => {}
        }
    }

    Ok(text)
}

pub fn extract_docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_part(&mut archive, "word/document.xml")?;
    collect_runs(&xml, b"w:t", b"w:p")
}

/// Slide number from a part name like `ppt/slides/slide12.xml`.
fn slide_index(name: &str) -> Option<u32> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

pub fn extract_pptx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_index(name).map(|i| (i, name.to_string())))
        .collect();
    if slides.is_empty() {
        return Err(StudyError::Extraction("no slides found".to_string()));
    }
    slides.sort_by_key(|(i, _)| *i);

    let mut text = String::new();
    for (_, name) in &slides {
        let xml = read_part(&mut archive, name)?;
        let slide = collect_runs(&xml, b"a:t", b"a:p")?;
        if !slide.trim().is_empty() {
            text.push_str(slide.trim_end());
            text.push('\n');
        }
    }

    Ok(text)
}
