//! Spreadsheet import and export for member rosters.
//!
//! Uploaded lists arrive in whatever shape the club's administrators
//! exported them: Dutch, Spanish or English headers, inconsistent casing,
//! numbers stored as text. The importer classifies headers against a
//! multilingual keyword table and normalizes each data row into a member
//! candidate, dropping rows that lack the required fields.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use rust_xlsxwriter::Workbook;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Member, MemberSource, NewMember, Roster, DEFAULT_AMOUNT_PAID};

/// Columns written by the roster export, in order.
const EXPORT_COLUMNS: [&str; 6] = [
    "member_number",
    "first_name",
    "last_name",
    "email",
    "phone",
    "year",
];

/// Target fields a header column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    MemberNumber,
    FirstName,
    LastName,
    Email,
    Phone,
    AmountPaid,
    Year,
}

/// One classification rule: a header matches on exact equality or on any
/// substring, after lower-casing and trimming.
struct HeaderRule {
    field: Field,
    exact: &'static [&'static str],
    contains: &'static [&'static str],
}

/// Ordered classification table; the first matching rule wins. The bare
/// "naam" pattern would swallow "achternaam" and "familienaam", so it sits
/// below every more specific rule.
const HEADER_RULES: &[HeaderRule] = &[
    HeaderRule {
        field: Field::MemberNumber,
        exact: &["lid nr"],
        contains: &["lidnummer", "member", "nummer"],
    },
    HeaderRule {
        field: Field::FirstName,
        exact: &["nombre"],
        contains: &["voornaam", "first"],
    },
    HeaderRule {
        field: Field::LastName,
        exact: &["apellido"],
        contains: &["achternaam", "last", "familienaam"],
    },
    HeaderRule {
        field: Field::Email,
        exact: &["mail-adres"],
        contains: &["mail", "email", "e-mail"],
    },
    HeaderRule {
        field: Field::Phone,
        exact: &["telefoonnr."],
        contains: &["telefoon", "phone", "tel"],
    },
    HeaderRule {
        field: Field::AmountPaid,
        exact: &["betaald"],
        contains: &["bedrag", "amount", "paid"],
    },
    HeaderRule {
        field: Field::Year,
        exact: &["status"],
        contains: &["jaar", "year"],
    },
    HeaderRule {
        field: Field::FirstName,
        exact: &[],
        contains: &["naam"],
    },
];

fn classify_header(label: &str) -> Option<Field> {
    let normalized = label.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    HEADER_RULES.iter().find_map(|rule| {
        let exact = rule.exact.iter().any(|candidate| normalized == *candidate);
        let partial = rule.contains.iter().any(|needle| normalized.contains(needle));
        (exact || partial).then_some(rule.field)
    })
}

/// Column index per target field; fields without a recognized header stay
/// unmapped.
#[derive(Debug, Default, Clone, Copy)]
struct ColumnMap {
    member_number: Option<usize>,
    first_name: Option<usize>,
    last_name: Option<usize>,
    email: Option<usize>,
    phone: Option<usize>,
    amount_paid: Option<usize>,
    year: Option<usize>,
}

impl ColumnMap {
    fn set(&mut self, field: Field, index: usize) {
        let slot = match field {
            Field::MemberNumber => &mut self.member_number,
            Field::FirstName => &mut self.first_name,
            Field::LastName => &mut self.last_name,
            Field::Email => &mut self.email,
            Field::Phone => &mut self.phone,
            Field::AmountPaid => &mut self.amount_paid,
            Field::Year => &mut self.year,
        };
        *slot = Some(index);
    }
}

fn map_headers(header_row: &[Data]) -> ColumnMap {
    let mut map = ColumnMap::default();
    for (index, cell) in header_row.iter().enumerate() {
        let Some(label) = cell_to_string(cell) else {
            continue;
        };
        if let Some(field) = classify_header(&label) {
            // A later matching column takes the field over an earlier one.
            map.set(field, index);
        }
    }
    map
}

/// Parse an uploaded spreadsheet into member candidates for the 2025 roster.
///
/// Rows missing any of member number, first name, last name or email are
/// dropped silently. Fails only when the buffer is not a spreadsheet at all
/// or the sheet has no data rows below the header.
pub fn parse_members(data: &[u8]) -> Result<Vec<NewMember>, AppError> {
    let (_, range) = read_sheet(data)?;
    if range.height() < 2 {
        return Err(AppError::Parse(
            "Spreadsheet must contain a header row and at least one data row".to_string(),
        ));
    }
    Ok(candidates_from(&range))
}

/// Diagnostic view of an uploaded spreadsheet, for troubleshooting files
/// the importer does not recognize.
#[derive(Debug, Serialize)]
pub struct SheetDiagnostics {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub sample_rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub parsed_members: usize,
    pub first_member: Option<NewMember>,
}

/// Decode a spreadsheet and report its raw shape alongside what the
/// importer would make of it. Unlike [`parse_members`] this does not treat
/// a missing data row as an error.
pub fn inspect(data: &[u8]) -> Result<SheetDiagnostics, AppError> {
    let (sheet_name, range) = read_sheet(data)?;

    let headers: Vec<String> = range
        .rows()
        .next()
        .map(|row| row.iter().map(cell_display).collect())
        .unwrap_or_default();
    let sample_rows: Vec<Vec<String>> = range
        .rows()
        .take(5)
        .map(|row| row.iter().map(cell_display).collect())
        .collect();

    let candidates = if range.height() < 2 {
        Vec::new()
    } else {
        candidates_from(&range)
    };

    Ok(SheetDiagnostics {
        sheet_name,
        headers,
        sample_rows,
        total_rows: range.height(),
        parsed_members: candidates.len(),
        first_member: candidates.into_iter().next(),
    })
}

/// Write a roster to an xlsx buffer with the export column set.
pub fn write_roster(members: &[Member], sheet_name: &str) -> Result<Vec<u8>, AppError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    for (col, label) in EXPORT_COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *label)?;
    }
    for (index, member) in members.iter().enumerate() {
        let row = index as u32 + 1;
        sheet.write_string(row, 0, &member.member_number)?;
        sheet.write_string(row, 1, &member.first_name)?;
        sheet.write_string(row, 2, &member.last_name)?;
        sheet.write_string(row, 3, &member.email)?;
        sheet.write_string(row, 4, &member.phone)?;
        sheet.write_number(row, 5, member.year)?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn read_sheet(data: &[u8]) -> Result<(String, Range<Data>), AppError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))?;
    let sheet_name = workbook.sheet_names().first().cloned().unwrap_or_default();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Parse("Spreadsheet contains no sheets".to_string()))??;
    Ok((sheet_name, range))
}

fn candidates_from(range: &Range<Data>) -> Vec<NewMember> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let map = map_headers(header_row);
    tracing::debug!("Classified spreadsheet headers: {:?}", map);

    rows.filter_map(|row| normalize_row(row, &map)).collect()
}

fn normalize_row(row: &[Data], map: &ColumnMap) -> Option<NewMember> {
    let member_number = required_cell(row, map.member_number)?;
    let first_name = required_cell(row, map.first_name)?;
    let last_name = required_cell(row, map.last_name)?;
    let email = required_cell(row, map.email)?.to_lowercase();

    let phone = optional_cell(row, map.phone)
        .and_then(cell_to_string)
        .unwrap_or_default();
    let amount_paid = optional_cell(row, map.amount_paid)
        .and_then(cell_to_f64)
        .unwrap_or(DEFAULT_AMOUNT_PAID);
    let year = optional_cell(row, map.year)
        .and_then(cell_to_f64)
        .map(|value| value as i32)
        .unwrap_or_else(|| Roster::Y2025.year());

    Some(NewMember {
        member_number,
        first_name,
        last_name,
        email,
        phone,
        amount_paid,
        year,
        is_active: true,
        source: MemberSource::List2025,
    })
}

fn optional_cell(row: &[Data], index: Option<usize>) -> Option<&Data> {
    row.get(index?)
}

fn required_cell(row: &[Data], index: Option<usize>) -> Option<String> {
    cell_to_string(optional_cell(row, index)?)
}

/// Stringified cell content, trimmed; `None` for empty or blank cells.
/// Whole numbers stored as floats print without a trailing fraction.
fn cell_to_string(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Numeric cell content; `None` unless the cell holds or parses to a
/// finite number.
fn cell_to_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) if f.is_finite() => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn cell_display(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_sheet(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_header_classification_language_variants() {
        assert_eq!(classify_header("Apellido"), Some(Field::LastName));
        assert_eq!(classify_header("Achternaam"), Some(Field::LastName));
        assert_eq!(classify_header("  LAST NAME "), Some(Field::LastName));
        assert_eq!(classify_header("Familienaam"), Some(Field::LastName));
        assert_eq!(classify_header("Nombre"), Some(Field::FirstName));
        assert_eq!(classify_header("Voornaam"), Some(Field::FirstName));
        assert_eq!(classify_header("naam"), Some(Field::FirstName));
        assert_eq!(classify_header("LID NR"), Some(Field::MemberNumber));
        assert_eq!(classify_header("Lidnummer"), Some(Field::MemberNumber));
        assert_eq!(classify_header("MAIL-ADRES"), Some(Field::Email));
        assert_eq!(classify_header("E-mail"), Some(Field::Email));
        assert_eq!(classify_header("TELEFOONNR."), Some(Field::Phone));
        assert_eq!(classify_header("Phone"), Some(Field::Phone));
        assert_eq!(classify_header("BETAALD"), Some(Field::AmountPaid));
        assert_eq!(classify_header("Bedrag Betaald"), Some(Field::AmountPaid));
        assert_eq!(classify_header("Status"), Some(Field::Year));
        assert_eq!(classify_header("Jaar"), Some(Field::Year));
        assert_eq!(classify_header("Opmerkingen"), None);
        assert_eq!(classify_header(""), None);
    }

    #[test]
    fn test_import_administrative_export_format() {
        let data = build_sheet(&[
            &["Apellido", "Nombre", "LID NR", "MAIL-ADRES", "TELEFOONNR.", "BETAALD", "Status"],
            &["García", "Ana", "1001", "Ana@Example.com", "612345678", "35", "2025"],
        ]);

        let members = parse_members(&data).unwrap();
        assert_eq!(members.len(), 1);

        let member = &members[0];
        assert_eq!(member.member_number, "1001");
        assert_eq!(member.first_name, "Ana");
        assert_eq!(member.last_name, "García");
        assert_eq!(member.email, "ana@example.com");
        assert_eq!(member.phone, "612345678");
        assert_eq!(member.amount_paid, 35.0);
        assert_eq!(member.year, 2025);
        assert!(member.is_active);
        assert_eq!(member.source, MemberSource::List2025);
    }

    #[test]
    fn test_numeric_cells_stringify_without_decimal_noise() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Lidnummer").unwrap();
        sheet.write_string(0, 1, "Voornaam").unwrap();
        sheet.write_string(0, 2, "Achternaam").unwrap();
        sheet.write_string(0, 3, "Email").unwrap();
        sheet.write_string(0, 4, "Bedrag").unwrap();
        sheet.write_number(1, 0, 1001).unwrap();
        sheet.write_string(1, 1, "Ana").unwrap();
        sheet.write_string(1, 2, "García").unwrap();
        sheet.write_string(1, 3, "ana@example.com").unwrap();
        sheet.write_number(1, 4, 42.5).unwrap();
        let data = workbook.save_to_buffer().unwrap();

        let members = parse_members(&data).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].member_number, "1001");
        assert_eq!(members[0].amount_paid, 42.5);
    }

    #[test]
    fn test_rows_missing_required_cells_are_dropped() {
        let data = build_sheet(&[
            &["LID NR", "Voornaam", "Achternaam", "Email"],
            &["1001", "Ana", "García", "ana@example.com"],
            &["1002", "", "Peeters", "jan@example.com"],
            &["1003", "Jan", "Peeters", "   "],
        ]);

        let members = parse_members(&data).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].member_number, "1001");
    }

    #[test]
    fn test_optional_columns_fall_back_to_defaults() {
        let data = build_sheet(&[
            &["LID NR", "Voornaam", "Achternaam", "Email", "Betaald", "Jaar"],
            &["1001", "Ana", "García", "ana@example.com", "gratis", "n/a"],
            &["1002", "Jan", "Peeters", "jan@example.com", "0", "2026"],
        ]);

        let members = parse_members(&data).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].amount_paid, DEFAULT_AMOUNT_PAID);
        assert_eq!(members[0].year, 2025);
        assert_eq!(members[0].phone, "");
        // A parseable zero is a real amount, not a missing one.
        assert_eq!(members[1].amount_paid, 0.0);
        assert_eq!(members[1].year, 2026);
    }

    #[test]
    fn test_unreadable_or_headerless_input_is_parse_error() {
        let err = parse_members(b"not a spreadsheet").unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));

        let data = build_sheet(&[&["LID NR", "Voornaam", "Achternaam", "Email"]]);
        let err = parse_members(&data).unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn test_later_matching_columns_win_the_field() {
        let data = build_sheet(&[
            &["LID NR", "Voornaam", "Achternaam", "Email", "E-mailadres"],
            &["1001", "Ana", "García", "stale@example.com", "current@example.com"],
        ]);

        let members = parse_members(&data).unwrap();
        assert_eq!(members[0].email, "current@example.com");
    }

    #[test]
    fn test_inspect_reports_headers_and_sample_rows() {
        let data = build_sheet(&[
            &["LID NR", "Voornaam", "Achternaam", "Email"],
            &["1001", "Ana", "García", "ana@example.com"],
        ]);

        let report = inspect(&data).unwrap();
        assert_eq!(report.headers, ["LID NR", "Voornaam", "Achternaam", "Email"]);
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.sample_rows.len(), 2);
        assert_eq!(report.parsed_members, 1);
        assert_eq!(report.first_member.as_ref().unwrap().member_number, "1001");
    }

    #[test]
    fn test_exported_roster_parses_back_through_importer() {
        let member = Member {
            id: "b2f7c8aa-0000-0000-0000-000000000000".to_string(),
            member_number: "1001".to_string(),
            first_name: "Ana".to_string(),
            last_name: "García".to_string(),
            email: "ana@example.com".to_string(),
            phone: "612345678".to_string(),
            amount_paid: 35.0,
            year: 2025,
            is_active: true,
            source: MemberSource::List2025,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let data = write_roster(&[member.clone()], "Members 2025").unwrap();

        let report = inspect(&data).unwrap();
        assert_eq!(report.sheet_name, "Members 2025");

        let parsed = parse_members(&data).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].member_number, member.member_number);
        assert_eq!(parsed[0].email, member.email);
        assert_eq!(parsed[0].year, 2025);
    }
}
