//! Minimal single-sheet XLSX writer and reader.
//!
//! Output is byte-for-byte deterministic: parts are written in a fixed order,
//! every zip entry carries the DOS epoch as its modification time, and no
//! document properties (author, creation date) are emitted. Cell text is
//! written as inline strings so there is no shared string table to order.

use crate::error::{CaptureError, Result};
use crate::slots::REPORT_SLOT;
use std::fmt::Write as _;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Excel's hard limit on cell text, counted in UTF-16 code units.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Excel's limit on sheet name length.
const MAX_SHEET_NAME_CHARS: usize = 31;

const SHEET_PATH: &str = "xl/worksheets/sheet1.xml";
const WORKBOOK_PATH: &str = "xl/workbook.xml";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Style index of the bold header cells in `styles.xml`.
const HEADER_STYLE: u32 = 1;

/// A fixed column: header text and width in characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub header: &'static str,
    pub width: u32,
}

/// Sheet name and rows read back from a workbook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetContents {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Serialize one sheet: a bold header row followed by `rows`.
pub fn write_workbook<'a, const N: usize>(
    sheet_name: &str,
    columns: &[Column; N],
    rows: impl IntoIterator<Item = [&'a str; N]>,
) -> Result<Vec<u8>> {
    if sheet_name.is_empty() || sheet_name.chars().count() > MAX_SHEET_NAME_CHARS {
        return Err(CaptureError::Encoding(format!(
            "sheet name must be 1..={} characters: {:?}",
            MAX_SHEET_NAME_CHARS, sheet_name
        )));
    }

    let sheet = sheet_xml(columns, rows)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", content_types_xml()),
        ("_rels/.rels", root_rels_xml()),
        (WORKBOOK_PATH, workbook_xml(sheet_name)),
        ("xl/_rels/workbook.xml.rels", workbook_rels_xml()),
        ("xl/styles.xml", styles_xml()),
        (SHEET_PATH, sheet),
    ];

    for (path, xml) in parts {
        zip.start_file(path, options)?;
        zip.write_all(xml.as_bytes())
            .map_err(|e| CaptureError::Encoding(format!("{}: {}", path, e)))?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Read the sheet name and every row's cell text.
pub fn read_workbook(bytes: &[u8]) -> Result<SheetContents> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CaptureError::decode(REPORT_SLOT, e))?;

    let workbook = read_part(&mut archive, WORKBOOK_PATH)?;
    let name = attribute_after(&workbook, "<sheet ", "name")
        .ok_or_else(|| CaptureError::decode(REPORT_SLOT, "workbook has no sheet"))?;

    let sheet = read_part(&mut archive, SHEET_PATH)?;
    let rows = parse_rows(&sheet);

    Ok(SheetContents { name, rows })
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, path: &str) -> Result<String> {
    let mut entry = archive
        .by_name(path)
        .map_err(|e| CaptureError::decode(REPORT_SLOT, format!("{}: {}", path, e)))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| CaptureError::decode(REPORT_SLOT, format!("{}: {}", path, e)))?;
    Ok(xml)
}

fn sheet_xml<'a, const N: usize>(
    columns: &[Column; N],
    rows: impl IntoIterator<Item = [&'a str; N]>,
) -> Result<String> {
    let mut data = String::new();
    let mut row_count = 1;

    write_row(&mut data, 1, columns.map(|c| c.header), Some(HEADER_STYLE))?;
    for (i, cells) in rows.into_iter().enumerate() {
        row_count = i + 2;
        write_row(&mut data, row_count, cells, None)?;
    }

    let mut xml = String::with_capacity(data.len() + 1024);
    xml.push_str(XML_DECL);
    let _ = write!(xml, r#"<worksheet xmlns="{}">"#, MAIN_NS);
    let _ = write!(
        xml,
        r#"<dimension ref="A1:{}{}"/>"#,
        column_name(N.saturating_sub(1)),
        row_count
    );
    xml.push_str("<cols>");
    for (i, column) in columns.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#,
            n = i + 1,
            w = column.width
        );
    }
    xml.push_str("</cols><sheetData>");
    xml.push_str(&data);
    xml.push_str("</sheetData></worksheet>");
    Ok(xml)
}

fn write_row<const N: usize>(
    out: &mut String,
    row: usize,
    cells: [&str; N],
    style: Option<u32>,
) -> Result<()> {
    let _ = write!(out, r#"<row r="{}">"#, row);
    for (col, text) in cells.iter().enumerate() {
        let len = text.encode_utf16().count();
        if len > MAX_CELL_CHARS {
            return Err(CaptureError::Encoding(format!(
                "cell {}{} has {} UTF-16 code units (max {})",
                column_name(col),
                row,
                len,
                MAX_CELL_CHARS
            )));
        }
        let _ = write!(out, r#"<c r="{}{}" t="inlineStr""#, column_name(col), row);
        if let Some(s) = style {
            let _ = write!(out, r#" s="{}""#, s);
        }
        out.push_str(r#"><is><t xml:space="preserve">"#);
        escape_cell_into(out, text);
        out.push_str("</t></is></c>");
    }
    out.push_str("</row>");
    Ok(())
}

/// Spreadsheet column name for a zero-based index (`0 → A`, `26 → AA`).
fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Escape text for XML, replacing characters XML 1.0 cannot carry with U+FFFD.
fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        push_escaped(out, ch);
    }
}

/// Escape cell text. On top of XML escaping, the `_` opening a literal
/// `_xHHHH_` is written as `_x005F_` so spreadsheet readers keep the text.
fn escape_cell_into(out: &mut String, text: &str) {
    for (i, ch) in text.char_indices() {
        if ch == '_' && is_cell_escape(&text[i..]) {
            out.push_str("_x005F_");
        } else {
            push_escaped(out, ch);
        }
    }
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        // Raw CR is folded into LF by conforming parsers.
        '\r' => out.push_str("&#13;"),
        '\t' | '\n' => out.push(ch),
        c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {
            out.push(char::REPLACEMENT_CHARACTER)
        }
        c => out.push(c),
    }
}

/// True if `text` starts with `_xHHHH_`.
fn is_cell_escape(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 7
        && bytes[0] == b'_'
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#13;", "\r")
        .replace("&#xD;", "\r")
        .replace("&amp;", "&")
}

/// Resolve `_xHHHH_` sequences in unescaped cell text, left to right.
fn decode_cell_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = if is_cell_escape(tail) {
            u32::from_str_radix(&tail[2..6], 16)
                .ok()
                .and_then(char::from_u32)
        } else {
            None
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &tail[7..];
            }
            None => {
                out.push('_');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Value of `attr` on the first element starting with `tag`.
fn attribute_after(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let start = xml.find(tag)?;
    let element = &xml[start..start + xml[start..].find('>')?];
    let needle = format!(r#"{}=""#, attr);
    let value_start = element.find(&needle)? + needle.len();
    let value_len = element[value_start..].find('"')?;
    Some(unescape(&element[value_start..value_start + value_len]))
}

/// Cell texts of every `<row>`, in document order.
fn parse_rows(xml: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find("<row ") {
        let Some(len) = rest[start..].find("</row>") else {
            break;
        };
        let row = &rest[start..start + len];
        rows.push(parse_cells(row));
        rest = &rest[start + len + "</row>".len()..];
    }

    rows
}

fn parse_cells(row: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut rest = row;

    while let Some(open) = rest.find("<t") {
        let after = &rest[open + 2..];
        // `<t>` or `<t attr...>`; anything else is a different tag.
        if !(after.starts_with('>') || after.starts_with(' ')) {
            rest = after;
            continue;
        }
        let Some(body_start) = after.find('>') else {
            break;
        };
        let body = &after[body_start + 1..];
        let Some(body_len) = body.find("</t>") else {
            break;
        };
        cells.push(decode_cell_escapes(&unescape(&body[..body_len])));
        rest = &body[body_len + "</t>".len()..];
    }

    cells
}

fn content_types_xml() -> String {
    format!(
        concat!(
            "{decl}",
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#,
            r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
            r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
            "</Types>"
        ),
        decl = XML_DECL
    )
}

fn root_rels_xml() -> String {
    format!(
        r#"{}<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
        XML_DECL, PKG_REL_NS, REL_NS
    )
}

fn workbook_xml(sheet_name: &str) -> String {
    let mut name = String::new();
    escape_into(&mut name, sheet_name);
    format!(
        r#"{}<workbook xmlns="{}" xmlns:r="{}"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        XML_DECL, MAIN_NS, REL_NS, name
    )
}

fn workbook_rels_xml() -> String {
    format!(
        concat!(
            "{decl}",
            r#"<Relationships xmlns="{pkg}">"#,
            r#"<Relationship Id="rId1" Type="{rel}/worksheet" Target="worksheets/sheet1.xml"/>"#,
            r#"<Relationship Id="rId2" Type="{rel}/styles" Target="styles.xml"/>"#,
            "</Relationships>"
        ),
        decl = XML_DECL,
        pkg = PKG_REL_NS,
        rel = REL_NS
    )
}

fn styles_xml() -> String {
    format!(
        concat!(
            "{decl}",
            r#"<styleSheet xmlns="{ns}">"#,
            r#"<fonts count="2">"#,
            r#"<font><sz val="11"/><name val="Calibri"/></font>"#,
            r#"<font><b/><sz val="11"/><name val="Calibri"/></font>"#,
            "</fonts>",
            r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
            r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
            r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
            r#"<cellXfs count="2">"#,
            r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
            r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/>"#,
            "</cellXfs>",
            r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
            "</styleSheet>"
        ),
        decl = XML_DECL,
        ns = MAIN_NS
    )
}
