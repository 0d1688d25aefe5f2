//! File-to-text loading by extension.
//!
//! [`load_text`] returns `Ok(None)` for extensions it does not recognize,
//! `Err` when a recognized file cannot be read or parsed, and `Ok(Some)`
//! otherwise. The engine treats both `None` and `Err` as an ingest failure.
//!
//! | Extension | Conversion |
//! |-----------|------------|
//! | `.txt` | UTF-8 as is |
//! | `.pdf`, `.docx`, `.xlsx` | [`extract`](crate::extract) |
//! | `.csv` | one line per record, fields tab-separated |
//! | `.html` | tags stripped, common entities decoded |
//! | `.md` | rendered to plain text with `pulldown-cmark` |
//! | `.json` | parsed and pretty-printed |

use std::path::Path;

use anyhow::{Context, Result};
use pulldown_cmark::{Event, Parser, TagEnd};

use crate::extract::{extract_text, BinaryFormat};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "pdf", "docx", "csv", "xlsx", "html", "md", "json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Pdf,
    Docx,
    Csv,
    Xlsx,
    Html,
    Markdown,
    Json,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let kind = match ext.as_str() {
            "txt" => FileKind::Text,
            "pdf" => FileKind::Pdf,
            "docx" => FileKind::Docx,
            "csv" => FileKind::Csv,
            "xlsx" => FileKind::Xlsx,
            "html" => FileKind::Html,
            "md" => FileKind::Markdown,
            "json" => FileKind::Json,
            _ => return None,
        };
        Some(kind)
    }
}

/// Load `path` as plain text, or `None` if its format is unsupported.
pub fn load_text(path: &Path) -> Result<Option<String>> {
    let Some(kind) = FileKind::from_path(path) else {
        return Ok(None);
    };

    let text = match kind {
        FileKind::Pdf | FileKind::Docx | FileKind::Xlsx => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let format = match kind {
                FileKind::Pdf => BinaryFormat::Pdf,
                FileKind::Docx => BinaryFormat::Docx,
                _ => BinaryFormat::Xlsx,
            };
            extract_text(&bytes, format)?
        }
        _ => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match kind {
                FileKind::Csv => csv_to_text(&content)?,
                FileKind::Html => strip_html_tags(&content),
                FileKind::Markdown => markdown_to_text(&content),
                FileKind::Json => json_to_text(&content)?,
                _ => content,
            }
        }
    };
    Ok(Some(text))
}

fn csv_to_text(content: &str) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record.context("Malformed CSV record")?;
        lines.push(record.iter().collect::<Vec<_>>().join("\t"));
    }
    Ok(lines.join("\n"))
}

fn json_to_text(content: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(content).context("Invalid JSON")?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Remove HTML tags and decode the common entities.
///
/// `<script>` and `<style>` bodies are dropped with their tags.
pub fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        result.push_str(&rest[..open]);
        let after = &rest[open..];
        let lower: String = after.chars().take(8).collect::<String>().to_ascii_lowercase();
        let skip_to = if lower.starts_with("<script") {
            find_ci(after, "</script>")
        } else if lower.starts_with("<style") {
            find_ci(after, "</style>")
        } else {
            None
        };

        rest = match skip_to.or_else(|| after.find('>').map(|i| i + 1)) {
            Some(end) => &after[end..],
            None => "",
        };
    }
    result.push_str(rest);

    let decoded = result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte offset just past the first case-insensitive match of `needle`.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(needle)
        .map(|i| i + needle.len())
}

fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::{zip_bytes, DOCX_XML, SHARED_STRINGS_XML, SHEET_XML};
    use tempfile::TempDir;

    fn write(tmp: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = tmp.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn unsupported_extension_is_none() {
        let tmp = TempDir::new().unwrap();
        let exe = write(&tmp, "tool.exe", b"MZ");
        assert!(load_text(&exe).unwrap().is_none());
        let bare = write(&tmp, "README", b"hello");
        assert!(load_text(&bare).unwrap().is_none());
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(FileKind::from_path(Path::new("A.TXT")), Some(FileKind::Text));
        assert_eq!(FileKind::from_path(Path::new("b.Md")), Some(FileKind::Markdown));
    }

    #[test]
    fn loads_plain_text_and_json() {
        let tmp = TempDir::new().unwrap();
        let txt = write(&tmp, "notes.txt", "héllo\nworld".as_bytes());
        assert_eq!(load_text(&txt).unwrap().unwrap(), "héllo\nworld");

        let json = write(&tmp, "data.json", br#"{"a":[1,2]}"#);
        let text = load_text(&json).unwrap().unwrap();
        assert_eq!(text, "{\n  \"a\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn invalid_json_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let json = write(&tmp, "bad.json", b"{not json");
        assert!(load_text(&json).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_text(&tmp.path().join("gone.txt")).is_err());
    }

    #[test]
    fn csv_rows_become_lines() {
        let tmp = TempDir::new().unwrap();
        let csv = write(&tmp, "risks.csv", b"id,risk\n1,\"phishing, email\"\n2,outage\n");
        let text = load_text(&csv).unwrap().unwrap();
        assert_eq!(text, "id\trisk\n1\tphishing, email\n2\toutage");
    }

    #[test]
    fn html_tags_scripts_and_entities() {
        let html = "<html><head><style>p { color: red }</style><SCRIPT>alert(1)</SCRIPT></head>\n<body><p>Fish &amp; chips</p>\n<p>a &lt; b</p></body></html>";
        assert_eq!(strip_html_tags(html), "Fish & chips\na < b");
    }

    #[test]
    fn markdown_renders_to_plain_text() {
        let tmp = TempDir::new().unwrap();
        let md = write(
            &tmp,
            "policy.md",
            b"# Policy\n\nUse **strong** passwords\nand `mfa`.\n\n- one\n- two\n",
        );
        let text = load_text(&md).unwrap().unwrap();
        assert_eq!(text, "Policy\nUse strong passwords and mfa.\none\ntwo");
    }

    #[test]
    fn office_formats_go_through_extract() {
        let tmp = TempDir::new().unwrap();
        let docx = write(&tmp, "a.docx", &zip_bytes(&[("word/document.xml", DOCX_XML)]));
        assert!(load_text(&docx).unwrap().unwrap().contains("Access control policy"));

        let xlsx = write(
            &tmp,
            "b.xlsx",
            &zip_bytes(&[
                ("xl/sharedStrings.xml", SHARED_STRINGS_XML),
                ("xl/worksheets/sheet1.xml", SHEET_XML),
            ]),
        );
        assert!(load_text(&xlsx).unwrap().unwrap().contains("Owner"));

        let pdf = write(&tmp, "c.pdf", b"not a pdf");
        assert!(load_text(&pdf).is_err());
    }
}
