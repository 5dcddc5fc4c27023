//! Small PDF and PPTX files built on the fly for tests

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Write a PDF with one line of Courier text per page
pub(crate) fn write_pdf(path: &Path, pages: &[&str]) {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = document.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content should encode"),
        ));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::from(page_id));
    }

    let page_count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    document.save(path).expect("should save PDF");
}

/// Slide XML with one `a:p` paragraph per entry
pub(crate) fn slide_xml(paragraphs: &[&str]) -> String {
    let mut body = String::new();
    for text in paragraphs {
        write!(body, "<a:p><a:r><a:t>{}</a:t></a:r></a:p>", text).expect("write to String");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody>{}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
        body
    )
}

/// Write a PPTX archive holding the given slides, stored in reverse order
pub(crate) fn write_pptx(path: &Path, slides: &[&[&str]]) {
    let file = File::create(path).expect("should create PPTX");
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    writer
        .start_file("[Content_Types].xml", options)
        .expect("should start entry");
    writer
        .write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types/>"#)
        .expect("should write entry");

    for (index, paragraphs) in slides.iter().enumerate().rev() {
        writer
            .start_file(format!("ppt/slides/slide{}.xml", index + 1), options)
            .expect("should start slide");
        writer
            .write_all(slide_xml(paragraphs).as_bytes())
            .expect("should write slide");
    }

    writer
        .start_file("ppt/slides/_rels/slide1.xml.rels", options)
        .expect("should start entry");
    writer
        .write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Relationships/>"#)
        .expect("should write entry");

    writer.finish().expect("should finish PPTX");
}
