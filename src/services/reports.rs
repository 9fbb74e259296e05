use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, XlsxError};
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::entities::submissions;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Spreadsheet generation failed: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Report has too many rows")]
    TooManyRows,
}

/// The two fixed export layouts, selected as `format=1` or `format=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(try_from = "u8")]
pub enum ReportFormat {
    EmployeeData,
    GreyCards,
}

impl TryFrom<u8> for ReportFormat {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ReportFormat::EmployeeData),
            2 => Ok(ReportFormat::GreyCards),
            other => Err(format!("Unknown report format {}, expected 1 or 2", other)),
        }
    }
}

impl ReportFormat {
    pub fn sheet_name(self) -> &'static str {
        match self {
            ReportFormat::EmployeeData => "Employee Data",
            ReportFormat::GreyCards => "Employee Grey Cards",
        }
    }

    pub fn headers(self) -> &'static [&'static str] {
        match self {
            ReportFormat::EmployeeData => &["Last Name", "First Name", "CIN", "TE ID", "Date of Birth"],
            ReportFormat::GreyCards => &["Last Name", "First Name", "Grey Card Number", "TE ID"],
        }
    }

    fn file_prefix(self) -> &'static str {
        match self {
            ReportFormat::EmployeeData => "employee_data_format1",
            ReportFormat::GreyCards => "employee_grey_cards_format2",
        }
    }

    fn row(self, submission: &submissions::Model) -> Vec<String> {
        match self {
            ReportFormat::EmployeeData => vec![
                submission.last_name.clone(),
                submission.first_name.clone(),
                submission.cin.clone(),
                submission.te_id.clone(),
                submission.date_of_birth.format("%Y-%m-%d").to_string(),
            ],
            ReportFormat::GreyCards => vec![
                submission.last_name.clone(),
                submission.first_name.clone(),
                submission.grey_card_number.clone(),
                submission.te_id.clone(),
            ],
        }
    }
}

pub struct Report {
    pub filename: String,
    pub content: Vec<u8>,
}

pub fn build_report(
    format: ReportFormat,
    rows: &[submissions::Model],
    generated_at: DateTime<Utc>,
) -> Result<Report, ReportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(format.sheet_name())?;

    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xDDDDDD))
        .set_align(FormatAlign::Center);

    for (col, title) in format.headers().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (idx, submission) in rows.iter().enumerate() {
        let row = u32::try_from(idx + 1).map_err(|_| ReportError::TooManyRows)?;
        for (col, value) in format.row(submission).iter().enumerate() {
            worksheet.write_string(row, col as u16, value)?;
        }
    }

    worksheet.autofit();

    Ok(Report {
        filename: format!(
            "{}_{}.xlsx",
            format.file_prefix(),
            generated_at.format("%Y%m%d_%H%M%S")
        ),
        content: workbook.save_to_buffer()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{DataType, Range, Reader, Xlsx};
    use chrono::{NaiveDate, TimeZone};
    use std::io::Cursor;

    fn submission(id: i32, last: &str, plant: &str) -> submissions::Model {
        submissions::Model {
            id,
            first_name: "Jane".into(),
            last_name: last.into(),
            cin: format!("AB{}", id),
            te_id: format!("TE{}", id),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 3, 7).unwrap(),
            grey_card_number: format!("{}-B-9", id),
            plant: plant.into(),
            cin_file_path: String::new(),
            picture_file_path: String::new(),
            grey_card_file_path: String::new(),
            admin_id: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn read_sheet(bytes: &[u8], sheet: &str) -> Range<DataType> {
        let mut workbook = Xlsx::new(Cursor::new(bytes.to_vec())).unwrap();
        workbook.worksheet_range(sheet).unwrap().unwrap()
    }

    fn cell(range: &Range<DataType>, row: usize, col: usize) -> String {
        match range.get((row, col)) {
            Some(DataType::String(s)) => s.clone(),
            other => panic!("expected string at ({}, {}), got {:?}", row, col, other),
        }
    }

    #[test]
    fn test_format_selector() {
        assert_eq!(ReportFormat::try_from(1).unwrap(), ReportFormat::EmployeeData);
        assert_eq!(ReportFormat::try_from(2).unwrap(), ReportFormat::GreyCards);
        assert!(ReportFormat::try_from(3).is_err());
    }

    #[test]
    fn test_employee_data_layout() {
        let rows = vec![submission(1, "Doe", "P1"), submission(2, "Smith", "P1")];
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap();
        let report = build_report(ReportFormat::EmployeeData, &rows, at).unwrap();

        assert_eq!(report.filename, "employee_data_format1_20240501_130405.xlsx");

        let range = read_sheet(&report.content, "Employee Data");
        assert_eq!(range.get_size(), (3, 5));
        assert_eq!(cell(&range, 0, 0), "Last Name");
        assert_eq!(cell(&range, 0, 4), "Date of Birth");
        assert_eq!(cell(&range, 1, 0), "Doe");
        assert_eq!(cell(&range, 1, 2), "AB1");
        assert_eq!(cell(&range, 1, 4), "1990-03-07");
        assert_eq!(cell(&range, 2, 0), "Smith");
    }

    #[test]
    fn test_grey_card_layout() {
        let rows = vec![submission(7, "Doe", "P1")];
        let report = build_report(ReportFormat::GreyCards, &rows, Utc::now()).unwrap();

        assert!(report.filename.starts_with("employee_grey_cards_format2_"));

        let range = read_sheet(&report.content, "Employee Grey Cards");
        assert_eq!(range.get_size(), (2, 4));
        assert_eq!(cell(&range, 0, 2), "Grey Card Number");
        assert_eq!(cell(&range, 1, 2), "7-B-9");
        assert_eq!(cell(&range, 1, 3), "TE7");
    }

    #[test]
    fn test_empty_report_has_header_only() {
        let report = build_report(ReportFormat::GreyCards, &[], Utc::now()).unwrap();
        let range = read_sheet(&report.content, "Employee Grey Cards");
        assert_eq!(range.get_size(), (1, 4));
        assert_eq!(cell(&range, 0, 0), "Last Name");
    }
}
