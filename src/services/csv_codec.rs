// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! CSV mapping for customer import and export.
//!
//! Import only maps columns to raw strings; validation belongs to the
//! ledger so that rows from any source are checked the same way.

use crate::error::{AppError, Result};
use crate::models::Customer;
use crate::time_utils::format_date;
use serde::Serialize;

/// One data row read from an import file. Values are trimmed; empty cells
/// are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    /// 1-based data row number (the header is not counted)
    pub row: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub registration_date: Option<String>,
    pub stamps_received: Option<String>,
    pub completion_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Id,
    Name,
    Mobile,
    RegistrationDate,
    StampsReceived,
    CompletionDate,
    Status,
}

/// Map a header cell to a column. Matching ignores case, spaces,
/// underscores and dashes, so `Customer ID`, `customer_id` and `id` agree.
fn column_for(header: &str) -> Option<Column> {
    let key: String = header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    match key.as_str() {
        "customerid" | "id" => Some(Column::Id),
        "name" | "customername" => Some(Column::Name),
        "mobile" | "mobilenumber" | "phone" => Some(Column::Mobile),
        "registrationdate" => Some(Column::RegistrationDate),
        "stampsreceived" | "stamps" => Some(Column::StampsReceived),
        "completiondate" => Some(Column::CompletionDate),
        "status" => Some(Column::Status),
        _ => None,
    }
}

/// Result of reading an import file: mapped rows plus rows the CSV reader
/// itself could not decode.
#[derive(Debug, Default)]
pub struct ParsedImport {
    pub rows: Vec<ImportRow>,
    pub unreadable: Vec<(usize, String)>,
}

/// Parse an uploaded CSV document.
pub fn parse_import(data: &[u8]) -> Result<ParsedImport> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| AppError::Validation(format!("Unreadable CSV header: {}", e)))?
        .clone();

    let columns: Vec<Option<Column>> = headers.iter().map(column_for).collect();
    if columns.iter().all(Option::is_none) {
        return Err(AppError::Validation(
            "CSV header has no recognised columns".to_string(),
        ));
    }

    let mut parsed = ParsedImport::default();
    for (index, record) in reader.records().enumerate() {
        let row_number = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                parsed.unreadable.push((row_number, e.to_string()));
                continue;
            }
        };

        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut row = ImportRow {
            row: row_number,
            ..ImportRow::default()
        };
        for (cell, column) in record.iter().zip(&columns) {
            let Some(column) = column else { continue };
            if cell.is_empty() {
                continue;
            }
            let value = Some(cell.to_string());
            match column {
                Column::Id => row.id = value,
                Column::Name => row.name = value,
                Column::Mobile => row.mobile = value,
                Column::RegistrationDate => row.registration_date = value,
                Column::StampsReceived => row.stamps_received = value,
                Column::CompletionDate => row.completion_date = value,
                Column::Status => row.status = value,
            }
        }
        parsed.rows.push(row);
    }

    Ok(parsed)
}

/// Flat export row.
#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Customer ID")]
    id: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Mobile")]
    mobile: &'a str,
    #[serde(rename = "Registration Date")]
    registration_date: String,
    #[serde(rename = "Stamps Received")]
    stamps_received: u8,
    #[serde(rename = "Completion Date")]
    completion_date: String,
    #[serde(rename = "Status")]
    status: &'static str,
}

/// Render customers as CSV in the order given.
pub fn write_export(customers: &[Customer]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for customer in customers {
        writer
            .serialize(ExportRow {
                id: &customer.id,
                name: &customer.name,
                mobile: &customer.mobile,
                registration_date: format_date(customer.registration_date),
                stamps_received: customer.stamps_received,
                completion_date: customer.completion_date.map(format_date).unwrap_or_default(),
                status: customer.status().as_str(),
            })
            .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV encode failed: {}", e)))?;
    }

    // An empty export still gets a header line.
    if customers.is_empty() {
        writer
            .write_record([
                "Customer ID",
                "Name",
                "Mobile",
                "Registration Date",
                "Stamps Received",
                "Completion Date",
                "Status",
            ])
            .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV encode failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_header_aliases() {
        assert_eq!(column_for("Customer ID"), Some(Column::Id));
        assert_eq!(column_for("id"), Some(Column::Id));
        assert_eq!(column_for("customer_id"), Some(Column::Id));
        assert_eq!(column_for("stampsReceived"), Some(Column::StampsReceived));
        assert_eq!(column_for("Stamps Received"), Some(Column::StampsReceived));
        assert_eq!(column_for("Completion-Date"), Some(Column::CompletionDate));
        assert_eq!(column_for("favourite colour"), None);
    }

    #[test]
    fn test_parse_import_maps_columns_and_skips_blank_lines() {
        let data = b"name,mobile,Stamps Received,notes\n\
                     Asha,9988776655,2,regular\n\
                     ,,,\n\
                     Ravi, 9123456780 ,,\n";
        let parsed = parse_import(data).unwrap();

        assert!(parsed.unreadable.is_empty());
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].row, 1);
        assert_eq!(parsed.rows[0].name.as_deref(), Some("Asha"));
        assert_eq!(parsed.rows[0].stamps_received.as_deref(), Some("2"));
        assert_eq!(parsed.rows[1].row, 3);
        assert_eq!(parsed.rows[1].mobile.as_deref(), Some("9123456780"));
        assert_eq!(parsed.rows[1].stamps_received, None);
    }

    #[test]
    fn test_parse_import_rejects_unknown_header() {
        let err = parse_import(b"foo,bar\n1,2\n").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_write_export_format() {
        let registered = Utc.with_ymd_and_hms(2025, 2, 3, 10, 0, 0).unwrap();
        let mut done = Customer::new(
            "RK-100001".into(),
            "Asha, Jr".into(),
            "9988776655".into(),
            registered,
        );
        for _ in 0..6 {
            done.push_stamp("admin", registered + chrono::Duration::days(4));
        }
        let fresh = Customer::new("RK-100002".into(), "Ravi".into(), "9123456780".into(), registered);

        let out = write_export(&[done, fresh]).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            lines[0],
            "Customer ID,Name,Mobile,Registration Date,Stamps Received,Completion Date,Status"
        );
        assert_eq!(
            lines[1],
            "RK-100001,\"Asha, Jr\",9988776655,2025-02-03,6,2025-02-07,Completed"
        );
        assert_eq!(lines[2], "RK-100002,Ravi,9123456780,2025-02-03,0,,Active");
    }

    #[test]
    fn test_write_export_empty_has_header() {
        let out = write_export(&[]).unwrap();
        assert!(out.starts_with("Customer ID,Name,Mobile"));
    }
}
