//! Turns the exported sheet into normalized [`StudentRecord`]s.
//!
//! Parsing is strict at the document level (a CSV reader error fails the
//! whole load) and forgiving at the cell level: a cell that does not coerce
//! to its target type simply becomes `None`.

use std::collections::{HashMap, HashSet};
use std::io::Read;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use tracing::{info, warn};

use crate::error::RosterResult;
use crate::models::{Enrollment, Gender, Placement, StudentRecord};

/// Column headers of the published sheet. A rename at the source leaves the
/// matching field empty.
pub mod headers {
    pub const SERIAL: &str = "S.No.";
    pub const ROLL_NO: &str = "Roll No";
    pub const NAME: &str = "Name of Student";
    pub const COLLEGE_EMAIL: &str = "College Email Id";
    pub const PERSONAL_EMAIL: &str = "Personal Email Id";
    pub const PHONE: &str = "Phone Number";
    pub const COURSE: &str = "Course";
    pub const GENDER: &str = "Gender";
    pub const DATE_OF_BIRTH: &str = "Date of Birth";
    pub const CURRENT_COURSE_SCORE: &str = "Current Course Score";
    pub const CURRENT_COURSE_PERCENTAGE: &str = "Current Course Percentage";
    pub const UG_BOARD: &str = "UG Board/University";
    pub const UG_PROGRAM: &str = "UG Program";
    pub const UG_BRANCH: &str = "UG Branch/Specialization";
    pub const UG_PERCENTAGE: &str = "UG percentage";
    pub const UG_END_YEAR: &str = "UG End Year";
    pub const CLASS12_PERCENTAGE: &str = "Class 12 %";
    pub const CLASS12_YOP: &str = "12th YOP";
    pub const CLASS10_PERCENTAGE: &str = "Class 10 %";
    pub const CLASS10_YOP: &str = "10th YOP";
    pub const INTERNSHIP_COMPANY: &str = "Mandatory Internship Company Name";
    pub const INTERNSHIP_TITLE: &str = "Mandatory Internship Job Title";
    pub const INTERNSHIP_DURATION: &str = "Mandatory Internship Duration";
    pub const EXPERIENCE_MONTHS: &str = "Total Full Time Experience (In months)";
    pub const WORK1_COMPANY: &str = "Work Experience 1 Company Name";
    pub const WORK1_TITLE: &str = "Work Experience 1 Job Title";
    pub const WORK1_DURATION: &str = "Work Experience 1 Duration";
    pub const WORK2_COMPANY: &str = "Work Experience 2 Company Name";
    pub const WORK2_TITLE: &str = "Work Experience 2 Job Title";
    pub const WORK2_DURATION: &str = "Work Experience 2 Duration";
    pub const CATEGORY: &str = "Student Category";
    pub const SUMMER_ENROLLED: &str = "Is Student Enrolled (Summer Internship 2025)";
    pub const SUMMER_STATUS: &str = "Status (Summer Internship 2025)";
    pub const PLACEMENT_ENROLLED: &str = "Is Student Enrolled (Campus Placement 2026)";
    pub const PLACEMENT_STATUS: &str = "Status (Campus Placement 2026)";
    pub const STATE: &str = "State";
    pub const BLOOD_GROUP: &str = "Blood Group";
    pub const LANGUAGES: &str = "Languages Known";
    pub const ACHIEVEMENTS: &str = "Achievements";
    pub const COMMENTS: &str = "Comments";
}

const DATE_OF_BIRTH_FORMAT: &str = "%d/%m/%Y";

/// What happened to one data row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Admitted(StudentRecord),
    /// Roll number or name is blank; the row is not a student.
    Skipped,
    /// The row names a student but cannot join the batch.
    Rejected(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub students: Vec<StudentRecord>,
    pub rows_read: usize,
    pub skipped: usize,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

/// Reads a whole CSV document and returns every admitted student in sheet order.
pub fn parse_students<R: Read>(input: R) -> RosterResult<IngestReport> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(input);
    let columns = ColumnIndex::new(reader.headers()?);

    let mut report = IngestReport::default();
    let mut seen_roll_numbers = HashSet::new();

    for result in reader.records() {
        let record = result?;
        report.rows_read += 1;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row = Row {
            record: &record,
            columns: &columns,
        };
        let next_id = report.students.len() as i64 + 1;

        match evaluate_row(&row, next_id, &mut seen_roll_numbers) {
            RowOutcome::Admitted(student) => report.students.push(student),
            RowOutcome::Skipped => report.skipped += 1,
            RowOutcome::Rejected(reason) => {
                warn!(line, %reason, "rejected roster row");
                report.rejected.push(RejectedRow { line, reason });
            }
        }
    }

    if report.skipped > 0 {
        warn!(
            skipped = report.skipped,
            "rows without roll number or name were left out"
        );
    }
    info!(
        rows = report.rows_read,
        admitted = report.students.len(),
        skipped = report.skipped,
        rejected = report.rejected.len(),
        "roster ingested"
    );

    Ok(report)
}

/// Convenience wrapper over [`parse_students`] for an in-memory document.
pub fn parse_students_str(text: &str) -> RosterResult<IngestReport> {
    parse_students(text.as_bytes())
}

fn evaluate_row(row: &Row<'_>, next_id: i64, seen: &mut HashSet<String>) -> RowOutcome {
    let (Some(roll_no), Some(name)) = (row.text(headers::ROLL_NO), row.text(headers::NAME)) else {
        return RowOutcome::Skipped;
    };

    if !seen.insert(roll_no.to_string()) {
        return RowOutcome::Rejected(format!("duplicate roll number {roll_no}"));
    }

    RowOutcome::Admitted(build_record(row, next_id, roll_no, name))
}

fn build_record(row: &Row<'_>, next_id: i64, roll_no: &str, name: &str) -> StudentRecord {
    let experience_months = to_int(row.text(headers::EXPERIENCE_MONTHS)).unwrap_or(0);

    StudentRecord {
        id: to_int(row.text(headers::SERIAL)).unwrap_or(next_id),
        roll_no: roll_no.to_string(),
        name: name.to_string(),
        college_email: row.owned(headers::COLLEGE_EMAIL),
        personal_email: row.owned(headers::PERSONAL_EMAIL),
        phone: row.owned(headers::PHONE),
        course: row.owned(headers::COURSE),
        gender: normalize_gender(row.text(headers::GENDER)),
        date_of_birth: parse_date_of_birth(row.text(headers::DATE_OF_BIRTH)),
        state: row.owned(headers::STATE),
        blood_group: row.owned(headers::BLOOD_GROUP),
        category: row.owned(headers::CATEGORY),
        current_course_score: to_number(row.text(headers::CURRENT_COURSE_SCORE)),
        current_course_percentage: row.owned(headers::CURRENT_COURSE_PERCENTAGE),
        ug_board: row.owned(headers::UG_BOARD),
        ug_program: row.owned(headers::UG_PROGRAM),
        ug_branch: row.owned(headers::UG_BRANCH),
        ug_percentage: to_number(row.text(headers::UG_PERCENTAGE)),
        ug_end_year: to_year(row.text(headers::UG_END_YEAR)),
        class12_percentage: to_number(row.text(headers::CLASS12_PERCENTAGE)),
        class12_yop: to_year(row.text(headers::CLASS12_YOP)),
        class10_percentage: to_number(row.text(headers::CLASS10_PERCENTAGE)),
        class10_yop: to_year(row.text(headers::CLASS10_YOP)),
        total_experience: months_to_years(experience_months),
        internship: Placement {
            company: row.owned(headers::INTERNSHIP_COMPANY),
            title: row.owned(headers::INTERNSHIP_TITLE),
            duration: row.owned(headers::INTERNSHIP_DURATION),
        },
        work_experience_1: Placement {
            company: row.owned(headers::WORK1_COMPANY),
            title: row.owned(headers::WORK1_TITLE),
            duration: row.owned(headers::WORK1_DURATION),
        },
        work_experience_2: Placement {
            company: row.owned(headers::WORK2_COMPANY),
            title: row.owned(headers::WORK2_TITLE),
            duration: row.owned(headers::WORK2_DURATION),
        },
        summer_internship: Enrollment {
            enrolled: to_bool(row.text(headers::SUMMER_ENROLLED)),
            status: row.owned(headers::SUMMER_STATUS),
        },
        campus_placement: Enrollment {
            enrolled: to_bool(row.text(headers::PLACEMENT_ENROLLED)),
            status: row.owned(headers::PLACEMENT_STATUS),
        },
        languages: split_list(row.text(headers::LANGUAGES)),
        achievements: split_list(row.text(headers::ACHIEVEMENTS)),
        comments: row.owned(headers::COMMENTS),
    }
}

struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(headers: &StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| (header.trim_start_matches('\u{feff}').trim().to_string(), idx))
            .collect();
        Self { positions }
    }
}

struct Row<'a> {
    record: &'a StringRecord,
    columns: &'a ColumnIndex,
}

impl<'a> Row<'a> {
    /// Trimmed cell under `header`; blank cells and missing columns are `None`.
    fn text(&self, header: &str) -> Option<&'a str> {
        let idx = *self.columns.positions.get(header)?;
        let value = self.record.get(idx)?.trim();
        (!value.is_empty()).then_some(value)
    }

    fn owned(&self, header: &str) -> Option<String> {
        self.text(header).map(str::to_string)
    }
}

/// Keeps digits, `.` and `-`, then parses as a float.
pub fn to_number(value: Option<&str>) -> Option<f64> {
    let cleaned: String = value?
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Keeps digits and `-`, then reads the leading integer (`"12-3"` is 12).
pub fn to_int(value: Option<&str>) -> Option<i64> {
    let cleaned: String = value?
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    let (negative, rest) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let magnitude = digits.parse::<i64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn to_year(value: Option<&str>) -> Option<i32> {
    to_int(value).and_then(|year| i32::try_from(year).ok())
}

pub fn to_bool(value: Option<&str>) -> Option<bool> {
    let normalized = value?.trim().to_lowercase();
    match normalized.as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" | "-" | "na" | "n/a" => Some(false),
        _ => None,
    }
}

/// `F` anywhere wins over `M`, so "Female" is never read as male.
pub fn normalize_gender(value: Option<&str>) -> Option<Gender> {
    let upper = value?.to_uppercase();
    if upper.contains('F') {
        Some(Gender::Female)
    } else if upper.contains('M') {
        Some(Gender::Male)
    } else {
        None
    }
}

pub fn parse_date_of_birth(value: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value?.trim(), DATE_OF_BIRTH_FORMAT).ok()
}

/// Months of experience to years, rounded to one decimal.
pub fn months_to_years(months: i64) -> f64 {
    (months as f64 / 12.0 * 10.0).round() / 10.0
}

fn split_list(value: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = value?
        .split([',', ';'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "S.No.,Roll No,Name of Student,Gender,Date of Birth,UG Program,UG Branch/Specialization,UG percentage,UG End Year,Class 12 %,Total Full Time Experience (In months),Is Student Enrolled (Summer Internship 2025),State,Languages Known";

    fn sheet(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn numbers_strip_decorations() {
        assert_eq!(to_number(Some("88.5%")), Some(88.5));
        assert_eq!(to_number(Some("1,234.5")), Some(1234.5));
        assert_eq!(to_number(Some("-3")), Some(-3.0));
        assert_eq!(to_number(Some("N/A")), None);
        assert_eq!(to_number(Some("1.2.3")), None);
        assert_eq!(to_number(None), None);
    }

    #[test]
    fn integers_read_leading_digits() {
        assert_eq!(to_int(Some("24 months")), Some(24));
        assert_eq!(to_int(Some("2019")), Some(2019));
        assert_eq!(to_int(Some("12-3")), Some(12));
        assert_eq!(to_int(Some("-7")), Some(-7));
        assert_eq!(to_int(Some("7.9")), Some(79));
        assert_eq!(to_int(Some("none")), None);
        assert_eq!(to_int(Some("-")), None);
    }

    #[test]
    fn booleans_follow_fixed_vocabulary() {
        for yes in ["Yes", "y", "TRUE", "1"] {
            assert_eq!(to_bool(Some(yes)), Some(true), "{yes}");
        }
        for no in ["No", "n", "false", "0", "-", "NA", "n/a"] {
            assert_eq!(to_bool(Some(no)), Some(false), "{no}");
        }
        assert_eq!(to_bool(Some("maybe")), None);
        assert_eq!(to_bool(None), None);
    }

    #[test]
    fn gender_checks_female_first() {
        assert_eq!(normalize_gender(Some("Female")), Some(Gender::Female));
        assert_eq!(normalize_gender(Some("f")), Some(Gender::Female));
        assert_eq!(normalize_gender(Some("Male")), Some(Gender::Male));
        assert_eq!(normalize_gender(Some("M")), Some(Gender::Male));
        assert_eq!(normalize_gender(Some("other")), None);
    }

    #[test]
    fn experience_months_round_to_one_decimal() {
        assert_eq!(months_to_years(18), 1.5);
        assert_eq!(months_to_years(7), 0.6);
        assert_eq!(months_to_years(24), 2.0);
        assert_eq!(months_to_years(0), 0.0);
    }

    #[test]
    fn date_of_birth_parses_day_month_year() {
        assert_eq!(
            parse_date_of_birth(Some("05/11/2001")),
            NaiveDate::from_ymd_opt(2001, 11, 5)
        );
        assert_eq!(parse_date_of_birth(Some("2001-11-05")), None);
        assert_eq!(parse_date_of_birth(Some("31/02/2001")), None);
    }

    #[test]
    fn three_row_sheet_admits_identified_students() {
        let text = sheet(&[
            "1,R1,Alice,F,01/02/2000,BBA,Finance,88,2021,90,24,yes,Kerala,\"English, Hindi\"",
            "2,R2,Bob,,,,,,,,,,,",
            "3,,Carol,F,,,,,,,,,,",
        ]);
        let report = parse_students_str(&text).unwrap();

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.students.len(), 2);

        let alice = &report.students[0];
        assert_eq!(alice.roll_no, "R1");
        assert_eq!(alice.total_experience, 2.0);
        assert_eq!(alice.ug_percentage, Some(88.0));
        assert_eq!(alice.gender, Some(Gender::Female));
        assert_eq!(alice.ug_end_year, Some(2021));
        assert_eq!(alice.summer_internship.enrolled, Some(true));
        assert_eq!(
            alice.languages,
            Some(vec!["English".to_string(), "Hindi".to_string()])
        );

        let bob = &report.students[1];
        assert_eq!(bob.total_experience, 0.0);
        assert_eq!(bob.ug_percentage, None);
        assert_eq!(bob.gender, None);
        assert_eq!(bob.ug_end_year, None);
        assert_eq!(bob.state, None);
    }

    #[test]
    fn blank_name_is_skipped_even_with_roll_number() {
        let text = sheet(&["1,R100,   ,M,,,,,,,,,,"]);
        let report = parse_students_str(&text).unwrap();
        assert!(report.students.is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn missing_serial_uses_admitted_position() {
        let text = sheet(&["x,R1,Alice,,,,,,,,,,,", ",,,,,,,,,,,,,", ",R2,Bob,,,,,,,,,,,"]);
        let report = parse_students_str(&text).unwrap();
        let ids: Vec<i64> = report.students.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn duplicate_roll_numbers_are_rejected_after_first() {
        let text = sheet(&["1,R1,Alice,,,,,,,,,,,", "2,R1,Alicia,,,,,,,,,,,"]);
        let report = parse_students_str(&text).unwrap();
        assert_eq!(report.students.len(), 1);
        assert_eq!(report.students[0].name, "Alice");
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].reason.contains("R1"));
    }

    #[test]
    fn ingestion_is_repeatable() {
        let text = sheet(&[
            "1,R1,Alice,F,01/02/2000,BBA,Finance,88,2021,90,24,yes,Kerala,English",
            "2,R2,Bob,M,,,,72,2020,,6,no,Goa,",
        ]);
        let first = parse_students_str(&text).unwrap();
        let second = parse_students_str(&text).unwrap();
        assert_eq!(first.students, second.students);
    }

    #[test]
    fn renamed_header_leaves_field_empty() {
        let text = "Roll No,Name of Student,UG %\nR1,Alice,91\n";
        let report = parse_students_str(text).unwrap();
        assert_eq!(report.students.len(), 1);
        assert_eq!(report.students[0].ug_percentage, None);
    }

    #[test]
    fn invalid_utf8_fails_the_whole_document() {
        let mut bytes = b"Roll No,Name of Student\nR1,".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let err = parse_students(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, crate::error::RosterError::MalformedDocument(_)));
    }
}
