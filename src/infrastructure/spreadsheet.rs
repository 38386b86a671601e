//! Registration workbook reader (calamine)
//!
//! Turns one monthly "자동차 등록" workbook into a [`WideSheet`]. Reshaping and
//! taxonomy collapse happen in the aggregation stage.

use crate::domain::registration::{PROVINCES, WideRow, WideSheet};
use crate::infrastructure::config::defaults;
use crate::infrastructure::parsing_error::{ExtractionError, ExtractionResult};
use calamine::{Data, Reader, open_workbook_auto};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 0-based sheet row holding the region header
const HEADER_ROW: usize = 2;

static FILE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})년_(\d{1,2})월").expect("file date regex is valid"));

/// `2024년_3월_자동차_등록자료.xlsx` → 202403
pub fn date_from_file_name(file_name: &str) -> Option<u32> {
    let caps = FILE_DATE.captures(file_name)?;
    let year: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    (1..=12).contains(&month).then_some(year * 100 + month)
}

/// `.xlsx` files in `dir`, sorted by name
pub fn list_workbooks(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_xlsx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
        if path.is_file() && is_xlsx {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Non-negative count; "1,234" strings accepted, anything else is 0
fn cell_count(cell: Option<&String>) -> u64 {
    cell.and_then(|text| text.replace(',', "").trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .map_or(0, |v| v as u64)
}

/// Sheet grid at absolute positions (row 0 = first sheet row)
fn sheet_grid(range: &calamine::Range<Data>) -> Vec<Vec<Option<String>>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let mut grid: Vec<Vec<Option<String>>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells: Vec<Option<String>> = vec![None; start_col as usize];
        cells.extend(row.iter().map(cell_text));
        grid.push(cells);
    }
    grid
}

/// Wide sheet from a grid: columns 0..3 are fuel/type/usage, provinces located by header text
pub fn wide_sheet_from_grid(date: u32, grid: &[Vec<Option<String>>], source: &str) -> ExtractionResult<WideSheet> {
    let header = grid
        .get(HEADER_ROW)
        .ok_or_else(|| ExtractionError::workbook(source, "header row missing"))?;

    let mut provinces = Vec::new();
    let mut columns = Vec::new();
    for province in PROVINCES {
        match header.iter().position(|h| h.as_deref() == Some(province)) {
            Some(col) => {
                provinces.push(province.to_string());
                columns.push(col);
            }
            None => warn!("{}: province column '{}' not found", source, province),
        }
    }
    if columns.is_empty() {
        return Err(ExtractionError::workbook(source, "no province columns in header"));
    }

    let cell = |row: &[Option<String>], col: usize| row.get(col).cloned().flatten();
    let rows = grid
        .iter()
        .skip(HEADER_ROW + 1)
        .filter(|row| row.iter().any(Option::is_some))
        .map(|row| WideRow {
            fuel_label: cell(row, 0),
            vehicle_type: cell(row, 1),
            usage: cell(row, 2),
            counts: columns.iter().map(|&c| cell_count(row.get(c).and_then(Option::as_ref))).collect(),
        })
        .collect();

    Ok(WideSheet { date, provinces, rows })
}

/// Read the first "연료별" sheet of a monthly workbook
pub fn read_registration_workbook(path: &Path) -> ExtractionResult<WideSheet> {
    let source = path.display().to_string();
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let date = date_from_file_name(file_name)
        .ok_or_else(|| ExtractionError::workbook(&source, "file name carries no YYYY년_M월 date"))?;

    let mut workbook = open_workbook_auto(path).map_err(|e| ExtractionError::workbook(&source, e))?;
    let sheet_name = workbook
        .sheet_names()
        .into_iter()
        .find(|name| name.contains(defaults::REGISTRATION_SHEET_MARKER))
        .ok_or_else(|| ExtractionError::workbook(&source, "no 연료별 sheet"))?;
    debug!("{}: using sheet '{}'", file_name, sheet_name);

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ExtractionError::workbook(&source, e))?;
    let sheet = wide_sheet_from_grid(date, &sheet_grid(&range), &source)?;

    info!("📊 {}: {} rows, {} provinces", file_name, sheet.rows.len(), sheet.provinces.len());
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<Option<String>> {
        cells
            .iter()
            .map(|c| if c.is_empty() { None } else { Some((*c).to_string()) })
            .collect()
    }

    #[test]
    fn test_date_from_file_name() {
        assert_eq!(date_from_file_name("2024년_3월_자동차_등록자료_통계.xlsx"), Some(202403));
        assert_eq!(date_from_file_name("2023년_12월.xlsx"), Some(202312));
        assert_eq!(date_from_file_name("2023년_13월.xlsx"), None);
        assert_eq!(date_from_file_name("summary.xlsx"), None);
    }

    #[test]
    fn test_wide_sheet_from_grid() -> anyhow::Result<()> {
        let grid = vec![
            row(&["연료별 등록현황"]),
            row(&[]),
            row(&["연료", "차종", "용도", "계", "서울", "부산"]),
            row(&["전기", "화물", "계", "30", "10", "20"]),
            row(&["", "", "관용", "1", "1", "0"]),
            row(&["경유", "화물", "계", "1,500", "700", "x"]),
        ];
        let sheet = wide_sheet_from_grid(202401, &grid, "test.xlsx")?;

        assert_eq!(sheet.provinces, vec!["서울", "부산"]);
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].counts, vec![10, 20]);
        assert_eq!(sheet.rows[1].fuel_label, None);
        assert_eq!(sheet.rows[2].counts, vec![700, 0]);
        Ok(())
    }

    #[test]
    fn test_missing_header_is_workbook_error() {
        let err = wide_sheet_from_grid(202401, &[row(&["a"])], "bad.xlsx").err();
        assert!(matches!(err, Some(ExtractionError::Workbook { .. })));
    }
}
