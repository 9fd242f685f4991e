//! Common utilities for E2E tests.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

pub const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

pub const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/></Relationships>"#;

pub const WORKBOOK_LOCKED: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr defaultThemeVersion="166925"/><workbookProtection workbookAlgorithmName="SHA-512" workbookHashValue="kLhvh0Q7" workbookSaltValue="Zm9v" workbookSpinCount="100000" lockStructure="1"/><bookViews><workbookView xWindow="0" yWindow="0" windowWidth="28800" windowHeight="12300"/></bookViews><sheets><sheet name="Locked" sheetId="1" r:id="rId1"/><sheet name="Open" sheetId="2" r:id="rId2"/></sheets></workbook>"#;

pub const WORKBOOK_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Locked" sheetId="1" r:id="rId1"/><sheet name="Open" sheetId="2" r:id="rId2"/></sheets></workbook>"#;

pub const SHEET_LOCKED: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1"/><sheetData><row r="1"><c r="A1"><v>42</v></c></row></sheetData><sheetProtection algorithmName="SHA-512" hashValue="o3d8pX1z" saltValue="c2FsdA==" spinCount="100000" sheet="1" objects="1" scenarios="1"/><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

pub const SHEET_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1"/><sheetData><row r="1"><c r="A1"><v>7</v></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

pub const SHEET_LEGACY_LOCK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/><sheetProtection password="CC3D" sheet="1" objects="1" scenarios="1"/></worksheet>"#;

/// Parts of a typical two-sheet workbook, keyed by entry name
pub fn standard_parts(workbook: &str, sheet1: &str, sheet2: &str) -> Vec<(String, Vec<u8>)> {
    vec![
        ("[Content_Types].xml".into(), CONTENT_TYPES.as_bytes().to_vec()),
        ("_rels/.rels".into(), ROOT_RELS.as_bytes().to_vec()),
        ("xl/workbook.xml".into(), workbook.as_bytes().to_vec()),
        ("xl/_rels/workbook.xml.rels".into(), WORKBOOK_RELS.as_bytes().to_vec()),
        ("xl/worksheets/sheet1.xml".into(), sheet1.as_bytes().to_vec()),
        ("xl/worksheets/sheet2.xml".into(), sheet2.as_bytes().to_vec()),
        ("xl/styles.xml".into(), b"<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"/>".to_vec()),
        ("xl/vbaProject.bin".into(), vec![0xD0, 0xCF, 0x11, 0xE0, 0x00, 0xFF, 0x7F]),
    ]
}

/// Write a workbook archive made of `parts` to `dir/name`
pub fn write_workbook(dir: &Path, name: &str, parts: &[(String, Vec<u8>)]) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipWriter::new(File::create(&path).expect("create workbook"));
    let options = SimpleFileOptions::default();
    for (entry, data) in parts {
        zip.start_file(entry.as_str(), options).expect("start entry");
        zip.write_all(data).expect("write entry");
    }
    zip.finish().expect("finish workbook");
    path
}

/// Read every file entry of the archive at `path`
pub fn read_parts(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive = ZipArchive::new(File::open(path).expect("open archive")).expect("read archive");
    let mut parts = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).expect("read entry");
        if entry.is_dir() {
            continue;
        }
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("read entry data");
        parts.insert(entry.name().to_string(), data);
    }
    parts
}

/// Read one entry of the archive at `path` as text
pub fn read_part(path: &Path, name: &str) -> String {
    let parts = read_parts(path);
    let data = parts
        .get(name)
        .unwrap_or_else(|| panic!("missing part {name}"));
    String::from_utf8(data.clone()).expect("utf-8 part")
}

/// Count `<localName ` start tags (unprefixed documents only)
pub fn count_elements(xml: &str, local_name: &str) -> usize {
    xml.matches(&format!("<{local_name} ")).count() + xml.matches(&format!("<{local_name}/")).count()
}

/// Element tree of an XML document with whitespace-only text removed
pub fn normalized_events(xml: &str) -> Vec<String> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    reader.expand_empty_elements(true);
    let mut events = Vec::new();
    loop {
        match reader.read_event().expect("valid xml") {
            Event::Eof => break,
            Event::Decl(_) => {}
            Event::Start(e) => events.push(format!("<{}", String::from_utf8_lossy(&e))),
            Event::End(e) => events.push(format!("</{}", String::from_utf8_lossy(&e))),
            Event::Text(e) => events.push(String::from_utf8_lossy(&e).into_owned()),
            other => events.push(format!("{other:?}")),
        }
    }
    events
}
