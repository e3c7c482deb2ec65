//! Plain-text extraction for uploaded documents.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{DocumentBody, DocumentKind};

/// Turn a document body into plain text according to its kind.
pub fn extract_text(kind: DocumentKind, body: &DocumentBody) -> Result<String> {
    match (kind, body) {
        (DocumentKind::Text, DocumentBody::Text(t)) => Ok(t.clone()),
        (DocumentKind::Text, DocumentBody::Bytes(b)) => Ok(decode_utf8(b)),
        (DocumentKind::Markdown, DocumentBody::Text(t)) => Ok(markdown_to_text(t)),
        (DocumentKind::Markdown, DocumentBody::Bytes(b)) => Ok(markdown_to_text(&decode_utf8(b))),
        (DocumentKind::Pdf, DocumentBody::Bytes(b)) => pdf_to_text(b),
        (DocumentKind::Pdf, DocumentBody::Text(_)) => Err(Error::validation("PDF documents must be uploaded as bytes")),
    }
}

/// Like `extract_text`, but PDF parsing runs on the blocking pool. A panic inside
/// the parser surfaces as a validation error instead of unwinding the caller.
pub async fn extract_document(kind: DocumentKind, body: DocumentBody) -> Result<String> {
    match (kind, body) {
        (DocumentKind::Pdf, DocumentBody::Bytes(bytes)) => tokio::task::spawn_blocking(move || pdf_to_text(&bytes))
            .await
            .map_err(|e| {
                warn!(error = %e, "PDF extraction task aborted");
                Error::validation("PDF extraction failed")
            })?,
        (kind, body) => extract_text(kind, &body),
    }
}

fn decode_utf8(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Concatenated page text of a PDF.
pub fn pdf_to_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| Error::validation(format!("PDF extraction failed: {e}")))?;
    debug!(bytes = bytes.len(), chars = text.chars().count(), "extracted PDF text");
    Ok(text)
}

/// Strip Markdown markup, keeping the readable text.
pub fn markdown_to_text(md: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in md.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            out.push(line.to_string());
            continue;
        }
        if is_rule(trimmed) {
            continue;
        }
        let body = trimmed.trim_start_matches('#').trim_start();
        let body = body.strip_prefix('>').map_or(body, str::trim_start);
        let body = strip_list_marker(body);
        out.push(strip_inline(body));
    }
    out.join("\n").trim().to_string()
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3 && (compact.chars().all(|c| c == '-') || compact.chars().all(|c| c == '*') || compact.chars().all(|c| c == '_'))
}

fn strip_list_marker(line: &str) -> &str {
    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest;
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest;
        }
    }
    line
}

/// Remove emphasis, inline code, link targets and HTML tags from one line.
fn strip_inline(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' | '_' | '`' => {}
            '!' if chars.get(i + 1) == Some(&'[') => {}
            ']' if chars.get(i + 1) == Some(&'(') => {
                // skip "(target)"
                match chars[i + 1..].iter().position(|&c| c == ')') {
                    Some(close) => i += close + 1,
                    None => out.push(']'),
                }
            }
            '[' => {}
            '<' => match chars[i..].iter().position(|&c| c == '>') {
                Some(close) if chars.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == '/') => i += close,
                _ => out.push('<'),
            },
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Replace control characters (other than tab and line breaks) with spaces and trim.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() && !matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_pdf_is_a_validation_error() {
        let err = extract_document(DocumentKind::Pdf, DocumentBody::Bytes(b"%PDF-1.4\n garbage".to_vec()))
            .await
            .expect_err("not a PDF");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn non_pdf_documents_extract_inline() {
        let out = extract_document(DocumentKind::Markdown, DocumentBody::Text("# 見出し".into())).await.expect("markdown");
        assert_eq!(out, "見出し");
    }

    #[test]
    fn text_passes_through() {
        let out = extract_text(DocumentKind::Text, &DocumentBody::Bytes("こんにちは".as_bytes().to_vec())).expect("text");
        assert_eq!(out, "こんにちは");
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let out = extract_text(DocumentKind::Text, &DocumentBody::Bytes(vec![b'a', 0xff, b'b'])).expect("text");
        assert_eq!(out, "a\u{fffd}b");
    }

    #[test]
    fn markdown_markup_is_removed() {
        let md = "# Title\n\nSome **bold** and _em_ text with `code`.\n\n- item [link](https://example.com)\n1. first\n> quote <br/>\n---\n```\nlet x = 1;\n```";
        let text = markdown_to_text(md);
        assert_eq!(text, "Title\n\nSome bold and em text with code.\n\nitem link\nfirst\nquote \nlet x = 1;");
    }

    #[test]
    fn markdown_images_keep_alt_text() {
        assert_eq!(markdown_to_text("![diagram](img.png) after"), "diagram after");
    }

    #[test]
    fn pdf_requires_bytes_and_valid_data() {
        assert!(matches!(extract_text(DocumentKind::Pdf, &DocumentBody::Text("x".into())), Err(Error::Validation(_))));
        assert!(matches!(pdf_to_text(b"not a pdf"), Err(Error::Validation(_))));
    }

    #[test]
    fn sanitize_replaces_control_characters() {
        assert_eq!(sanitize("\u{0}a\u{7}b\tc\n"), "a b\tc");
    }
}
