//! Contract details read from uploaded PDFs
//!
//! Text is pulled from the page content streams with lopdf, then scanned
//! for labelled lines such as `Licensor: Acme Media` or
//! `Start Date: March 1, 2024`.

use crate::errors::{AppError, Result};
use chrono::NaiveDate;
use lopdf::content::Content;
use lopdf::{Document, Object};
use tracing::{debug, warn};

/// Labels whose value names the licensor
const LICENSOR_LABELS: &[&str] = &["licensor", "licensor name"];

/// Labels whose value is the contract start date
const START_DATE_LABELS: &[&str] = &[
    "start date",
    "contract start date",
    "effective date",
    "commencement date",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%m/%d/%Y"];

/// Contract fields found in a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentDetails {
    pub licensor: Option<String>,
    pub start_date: Option<NaiveDate>,
}

impl DocumentDetails {
    pub fn is_empty(&self) -> bool {
        self.licensor.is_none() && self.start_date.is_none()
    }
}

/// Extract the text of every page, one line per text line of the PDF
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let doc = Document::load_mem(bytes).map_err(|e| AppError::InvalidFormat {
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (page_num, page_id) in pages {
        let content = match doc.get_page_content(page_id).and_then(|data| Content::decode(&data)) {
            Ok(content) => content,
            Err(e) => {
                warn!(page = page_num, error = %e, "Unreadable page content, skipping");
                continue;
            }
        };

        let mut line = String::new();
        for operation in &content.operations {
            match operation.operator.as_str() {
                "Tj" | "TJ" => push_strings(&mut line, &operation.operands),
                // Move to the next line, then show the string (always the last operand)
                "'" | "\"" => {
                    flush_line(&mut text, &mut line);
                    let last = operation.operands.len().saturating_sub(1);
                    push_strings(&mut line, &operation.operands[last..]);
                }
                "Td" | "TD" | "T*" | "Tm" | "ET" => flush_line(&mut text, &mut line),
                _ => {}
            }
        }
        flush_line(&mut text, &mut line);
    }

    if text.trim().is_empty() {
        return Err(AppError::InvalidFormat {
            message: "No text content extracted from PDF".to_string(),
        });
    }

    Ok(text)
}

fn push_strings(line: &mut String, operands: &[Object]) {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => line.push_str(&String::from_utf8_lossy(bytes)),
            Object::Array(items) => push_strings(line, items),
            _ => {}
        }
    }
}

fn flush_line(text: &mut String, line: &mut String) {
    let trimmed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if !trimmed.is_empty() {
        text.push_str(&trimmed);
        text.push('\n');
    }
    line.clear();
}

/// Scan labelled lines for the licensor and start date. The first match wins.
pub fn parse_details(text: &str) -> DocumentDetails {
    let mut details = DocumentDetails::default();

    for line in text.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = label.trim().to_lowercase();
        let value = value.trim().trim_end_matches('.').trim();
        if value.is_empty() {
            continue;
        }

        if details.licensor.is_none() && LICENSOR_LABELS.contains(&label.as_str()) {
            details.licensor = Some(value.to_string());
        } else if details.start_date.is_none() && START_DATE_LABELS.contains(&label.as_str()) {
            details.start_date = parse_date(value);
        }
    }

    details
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Read contract details from PDF bytes off the async runtime.
///
/// Unreadable documents yield `None`; they never fail an upload.
pub async fn read_details(bytes: Vec<u8>) -> Option<DocumentDetails> {
    let extracted = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes)).await;

    match extracted {
        Ok(Ok(text)) => {
            let details = parse_details(&text);
            debug!(
                licensor = details.licensor.is_some(),
                start_date = details.start_date.is_some(),
                "Contract details read"
            );
            Some(details)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Could not read contract text");
            None
        }
        Err(e) => {
            warn!(error = %e, "Contract text extraction aborted");
            None
        }
    }
}

/// Single-page PDF with one text line per entry of `lines`
#[cfg(test)]
pub(crate) fn sample_pdf(lines: &[&str]) -> Vec<u8> {
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_page_lines() {
        let pdf = sample_pdf(&["MASTER LICENSE AGREEMENT", "Licensor:   Acme   Media"]);
        let text = extract_pdf_text(&pdf).unwrap();
        assert_eq!(text, "MASTER LICENSE AGREEMENT\nLicensor: Acme Media\n");
    }

    #[test]
    fn test_not_a_pdf() {
        let err = extract_pdf_text(b"%PDF-1.7 truncated").unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat { .. }));
    }

    #[test]
    fn test_parse_details() {
        let details = parse_details(
            "LICENSE AGREEMENT\nLicensor: Acme Media LLC.\nLicensee: Globex\nEffective Date: March 1, 2024\n",
        );
        assert_eq!(details.licensor.as_deref(), Some("Acme Media LLC"));
        assert_eq!(details.start_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_parse_details_date_formats() {
        for (line, expected) in [
            ("Start Date: 2023-07-15", (2023, 7, 15)),
            ("Contract Start Date: 07/15/2023", (2023, 7, 15)),
            ("Commencement Date: 15 July 2023", (2023, 7, 15)),
        ] {
            let (y, m, d) = expected;
            assert_eq!(parse_details(line).start_date, NaiveDate::from_ymd_opt(y, m, d), "{}", line);
        }
        assert_eq!(parse_details("Start Date: sometime soon").start_date, None);
    }

    #[test]
    fn test_unlabelled_text_has_no_details() {
        assert!(parse_details("This agreement is made between two parties.").is_empty());
        assert!(parse_details("Licensor:").is_empty());
    }

    #[tokio::test]
    async fn test_read_details() {
        let pdf = sample_pdf(&["Licensor: Initech", "Start Date: 2024-01-31"]);
        let details = read_details(pdf).await.unwrap();
        assert_eq!(details.licensor.as_deref(), Some("Initech"));
        assert_eq!(details.start_date, NaiveDate::from_ymd_opt(2024, 1, 31));

        assert!(read_details(b"not a pdf".to_vec()).await.is_none());
    }
}
