use axum::body::Bytes;
use futures::{Stream, StreamExt, future, stream};

use crate::{inquiries::Inquiry, store::StoreError};

pub const EXPORT_HEADER: [&str; 6] = ["id", "name", "email", "location", "message", "createdAt"];
pub const EXPORT_FILENAME: &str = "export.csv";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to encode csv row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush csv row: {0}")]
    Flush(String),
    #[error("failed to read inquiry for export: {0}")]
    Store(#[from] StoreError),
}

/// Lazily encodes `inquiries` as CSV, one chunk per row, header first.
///
/// Rows are pulled from `inquiries` only when the consumer polls, so the
/// transport can write them out incrementally. An `Err` item ends the export.
pub fn encode<S>(inquiries: S) -> impl Stream<Item = Result<Bytes, ExportError>> + Send
where
    S: Stream<Item = Result<Inquiry, StoreError>> + Send,
{
    let header = stream::once(future::ready(encode_record(EXPORT_HEADER)));
    let rows = inquiries.map(|row| {
        row.map_err(ExportError::from)
            .and_then(|inquiry| encode_inquiry(&inquiry))
    });
    header.chain(rows).scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        *failed = item.is_err();
        future::ready(Some(item))
    })
}

fn encode_inquiry(inquiry: &Inquiry) -> Result<Bytes, ExportError> {
    let id = inquiry.id.to_string();
    let created_at = inquiry.created_at.to_rfc3339();
    encode_record([
        id.as_str(),
        inquiry.name.as_str(),
        inquiry.email.as_str(),
        inquiry.location.as_str(),
        inquiry.message.as_str(),
        created_at.as_str(),
    ])
}

fn encode_record<'a>(fields: impl IntoIterator<Item = &'a str>) -> Result<Bytes, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let buffer = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.to_string()))?;
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use futures::TryStreamExt;

    use super::*;

    fn inquiry(id: i64, name: &str, message: &str) -> Inquiry {
        Inquiry {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            location: "Abuja".to_string(),
            message: message.to_string(),
            created_at: Utc
                .with_ymd_and_hms(2026, 1, id as u32, 8, 30, 0)
                .single()
                .expect("valid time"),
        }
    }

    fn rows(inquiries: Vec<Inquiry>) -> impl Stream<Item = Result<Inquiry, StoreError>> + Send {
        stream::iter(inquiries.into_iter().map(Ok))
    }

    async fn render(inquiries: Vec<Inquiry>) -> String {
        let chunks: Vec<Bytes> = encode(rows(inquiries)).try_collect().await.expect("encode");
        let bytes: Vec<u8> = chunks.iter().flat_map(|chunk| chunk.iter().copied()).collect();
        String::from_utf8(bytes).expect("utf8")
    }

    #[tokio::test]
    async fn header_comes_first_then_rows_in_input_order() {
        let csv = render(vec![inquiry(2, "Bola", "Second"), inquiry(1, "Ada", "First")]).await;
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "id,name,email,location,message,createdAt");
        assert!(lines[1].starts_with("2,Bola,bola@example.com,Abuja,Second,2026-01-02T08:30:00"));
        assert!(lines[2].starts_with("1,Ada,"));
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn quotes_fields_with_separators() {
        let csv = render(vec![inquiry(1, "Ada", "Hello, \"team\"\nsecond line")]).await;
        assert!(csv.contains("\"Hello, \"\"team\"\"\nsecond line\""));
    }

    #[tokio::test]
    async fn empty_input_still_emits_header() {
        let csv = render(Vec::new()).await;
        assert_eq!(csv, "id,name,email,location,message,createdAt\r\n");
    }

    #[tokio::test]
    async fn rows_are_produced_one_chunk_each() {
        let chunks: Vec<Bytes> =
            encode(rows(vec![inquiry(1, "Ada", "First"), inquiry(2, "Bola", "Next")]))
                .try_collect()
                .await
                .expect("encode");
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn store_failure_ends_the_export_after_emitted_rows() {
        let source = stream::iter(vec![
            Ok(inquiry(1, "Ada", "First")),
            Err(StoreError::Unavailable("connection reset".to_string())),
            Ok(inquiry(2, "Bola", "Never sent")),
        ]);
        let items: Vec<Result<Bytes, ExportError>> = encode(source).collect().await;

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].is_ok());
        assert!(matches!(items[2], Err(ExportError::Store(_))));
    }
}
