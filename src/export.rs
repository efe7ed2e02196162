//! Field-subset exports of the roster as CSV or JSON text.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{RosterError, RosterResult};
use crate::models::StudentRecord;

const UTF8_BOM: char = '\u{feff}';
/// Rough per-cell size used for the export size estimate.
const ESTIMATED_BYTES_PER_CELL: usize = 25;
const COMPLETENESS_TARGET: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportField {
    RollNo,
    Name,
    CollegeEmail,
    PersonalEmail,
    Phone,
    Course,
    Gender,
    DateOfBirth,
    UgProgram,
    UgBranch,
    UgPercentage,
    UgEndYear,
    Class12Percentage,
    Class10Percentage,
    TotalExperience,
    State,
    Achievements,
}

impl ExportField {
    pub const ALL: [ExportField; 17] = [
        ExportField::RollNo,
        ExportField::Name,
        ExportField::CollegeEmail,
        ExportField::PersonalEmail,
        ExportField::Phone,
        ExportField::Course,
        ExportField::Gender,
        ExportField::DateOfBirth,
        ExportField::UgProgram,
        ExportField::UgBranch,
        ExportField::UgPercentage,
        ExportField::UgEndYear,
        ExportField::Class12Percentage,
        ExportField::Class10Percentage,
        ExportField::TotalExperience,
        ExportField::State,
        ExportField::Achievements,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ExportField::RollNo => "rollNo",
            ExportField::Name => "name",
            ExportField::CollegeEmail => "collegeEmail",
            ExportField::PersonalEmail => "personalEmail",
            ExportField::Phone => "phone",
            ExportField::Course => "course",
            ExportField::Gender => "gender",
            ExportField::DateOfBirth => "dateOfBirth",
            ExportField::UgProgram => "ugProgram",
            ExportField::UgBranch => "ugBranch",
            ExportField::UgPercentage => "ugPercentage",
            ExportField::UgEndYear => "ugEndYear",
            ExportField::Class12Percentage => "class12Percentage",
            ExportField::Class10Percentage => "class10Percentage",
            ExportField::TotalExperience => "totalExperience",
            ExportField::State => "state",
            ExportField::Achievements => "achievements",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportField::RollNo => "Roll Number",
            ExportField::Name => "Name",
            ExportField::CollegeEmail => "College Email",
            ExportField::PersonalEmail => "Personal Email",
            ExportField::Phone => "Phone",
            ExportField::Course => "Course",
            ExportField::Gender => "Gender",
            ExportField::DateOfBirth => "Date of Birth",
            ExportField::UgProgram => "UG Program",
            ExportField::UgBranch => "UG Branch",
            ExportField::UgPercentage => "UG Percentage",
            ExportField::UgEndYear => "UG End Year",
            ExportField::Class12Percentage => "Class 12 %",
            ExportField::Class10Percentage => "Class 10 %",
            ExportField::TotalExperience => "Experience (years)",
            ExportField::State => "State",
            ExportField::Achievements => "Achievements",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ExportField::RollNo | ExportField::Name | ExportField::Course => "Basic",
            ExportField::CollegeEmail | ExportField::PersonalEmail | ExportField::Phone => {
                "Contact"
            }
            ExportField::Gender | ExportField::DateOfBirth => "Personal",
            ExportField::UgProgram
            | ExportField::UgBranch
            | ExportField::UgPercentage
            | ExportField::UgEndYear
            | ExportField::Class12Percentage
            | ExportField::Class10Percentage => "Academic",
            ExportField::TotalExperience => "Professional",
            ExportField::State => "Geographic",
            ExportField::Achievements => "Achievements",
        }
    }

    pub fn from_id(id: &str) -> RosterResult<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.id() == id)
            .ok_or_else(|| RosterError::UnknownField(id.to_string()))
    }

    fn value(&self, student: &StudentRecord) -> Cell {
        let text = |value: &Option<String>| value.clone().map_or(Cell::Empty, Cell::Text);
        let number = |value: Option<f64>| value.map_or(Cell::Empty, Cell::Number);

        match self {
            ExportField::RollNo => Cell::Text(student.roll_no.clone()),
            ExportField::Name => Cell::Text(student.name.clone()),
            ExportField::CollegeEmail => text(&student.college_email),
            ExportField::PersonalEmail => text(&student.personal_email),
            ExportField::Phone => text(&student.phone),
            ExportField::Course => text(&student.course),
            ExportField::Gender => student
                .gender
                .map_or(Cell::Empty, |g| Cell::Text(g.as_str().to_string())),
            ExportField::DateOfBirth => student.date_of_birth.map_or(Cell::Empty, |d| {
                Cell::Text(d.format("%d/%m/%Y").to_string())
            }),
            ExportField::UgProgram => text(&student.ug_program),
            ExportField::UgBranch => text(&student.ug_branch),
            ExportField::UgPercentage => number(student.ug_percentage),
            ExportField::UgEndYear => student
                .ug_end_year
                .map_or(Cell::Empty, |year| Cell::Integer(year.into())),
            ExportField::Class12Percentage => number(student.class12_percentage),
            ExportField::Class10Percentage => number(student.class10_percentage),
            ExportField::TotalExperience => Cell::Number(student.total_experience),
            ExportField::State => text(&student.state),
            ExportField::Achievements => student
                .achievements
                .as_ref()
                .map_or(Cell::Empty, |items| Cell::Text(items.join("; "))),
        }
    }
}

impl fmt::Display for ExportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Comma-separated field ids, as typed on the command line.
pub fn parse_field_list(list: &str) -> RosterResult<Vec<ExportField>> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ExportField::from_id)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
    Integer(i64),
    Empty,
}

impl Cell {
    fn is_filled(&self) -> bool {
        match self {
            Cell::Text(text) => !text.is_empty(),
            Cell::Number(_) | Cell::Integer(_) => true,
            Cell::Empty => false,
        }
    }

    fn to_csv(&self) -> String {
        let raw = match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Integer(n) => n.to_string(),
            Cell::Empty => String::new(),
        };
        quote_csv(&raw)
    }

    fn to_json(&self) -> Value {
        match self {
            Cell::Text(text) => Value::String(text.clone()),
            Cell::Number(n) => json!(n),
            Cell::Integer(n) => json!(n),
            Cell::Empty => Value::String(String::new()),
        }
    }
}

/// Wraps in double quotes, doubles inner quotes, flattens line breaks.
pub fn quote_csv(raw: &str) -> String {
    let cleaned = raw.replace('"', "\"\"").replace('\n', " ").replace('\r', "");
    format!("\"{cleaned}\"")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPreset {
    #[default]
    Full,
    Academic,
    Geographic,
    Achievements,
    Contacts,
}

impl ReportPreset {
    pub fn id(&self) -> &'static str {
        match self {
            ReportPreset::Full => "full",
            ReportPreset::Academic => "academic",
            ReportPreset::Geographic => "geographic",
            ReportPreset::Achievements => "achievements",
            ReportPreset::Contacts => "contacts",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportPreset::Full => "Complete Student Report",
            ReportPreset::Academic => "Academic Performance Report",
            ReportPreset::Geographic => "Geographic Distribution Report",
            ReportPreset::Achievements => "Achievements Report",
            ReportPreset::Contacts => "Contact Information Report",
        }
    }

    pub fn fields(&self) -> Vec<ExportField> {
        use ExportField::*;
        match self {
            ReportPreset::Full => vec![
                RollNo,
                Name,
                CollegeEmail,
                PersonalEmail,
                Phone,
                Course,
                Gender,
                UgProgram,
                UgPercentage,
                Class12Percentage,
                Class10Percentage,
                TotalExperience,
                State,
                Achievements,
            ],
            ReportPreset::Academic => vec![
                RollNo,
                Name,
                UgProgram,
                UgBranch,
                UgPercentage,
                UgEndYear,
                Class12Percentage,
                Class10Percentage,
                Achievements,
            ],
            ReportPreset::Geographic => vec![RollNo, Name, State, Course, Gender],
            ReportPreset::Achievements => vec![RollNo, Name, Course, Achievements, UgPercentage],
            ReportPreset::Contacts => {
                vec![RollNo, Name, CollegeEmail, PersonalEmail, Phone, Course]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub preset: ReportPreset,
    /// Empty means the preset's own field list.
    pub fields: Vec<ExportField>,
    pub format: ExportFormat,
    /// Matched against name, roll number and course.
    pub search: Option<String>,
    pub min_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCompleteness {
    pub field: &'static str,
    pub completeness: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub total_records: usize,
    pub fields_with_data: Vec<FieldCompleteness>,
    pub avg_completeness: u32,
    pub estimated_size_kb: usize,
    pub has_incomplete_data: bool,
}

pub fn data_quality(students: &[StudentRecord], fields: &[ExportField]) -> Option<DataQuality> {
    if students.is_empty() || fields.is_empty() {
        return None;
    }

    let total = students.len();
    let fields_with_data: Vec<FieldCompleteness> = fields
        .iter()
        .map(|field| {
            let filled = students
                .iter()
                .filter(|s| field.value(s).is_filled())
                .count();
            FieldCompleteness {
                field: field.id(),
                completeness: (filled as f64 * 100.0 / total as f64).round() as u32,
            }
        })
        .collect();

    let avg = fields_with_data
        .iter()
        .map(|f| f64::from(f.completeness))
        .sum::<f64>()
        / fields_with_data.len() as f64;
    let estimated_size_kb =
        ((total * fields.len() * ESTIMATED_BYTES_PER_CELL) as f64 / 1024.0).round() as usize;

    Some(DataQuality {
        total_records: total,
        fields_with_data,
        avg_completeness: avg.round() as u32,
        estimated_size_kb,
        has_incomplete_data: avg < COMPLETENESS_TARGET,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub record_count: usize,
    pub content: String,
}

pub fn build_export(
    students: &[StudentRecord],
    request: &ExportRequest,
    generated_at: DateTime<Utc>,
) -> RosterResult<ExportArtifact> {
    let fields = if request.fields.is_empty() {
        request.preset.fields()
    } else {
        request.fields.clone()
    };
    if fields.is_empty() {
        return Err(RosterError::NoFieldsSelected);
    }

    let selected: Vec<&StudentRecord> = match request.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => {
            let term = term.to_lowercase();
            students
                .iter()
                .filter(|s| {
                    s.name.to_lowercase().contains(&term)
                        || s.roll_no.to_lowercase().contains(&term)
                        || s.course
                            .as_deref()
                            .is_some_and(|c| c.to_lowercase().contains(&term))
                })
                .collect()
        }
        _ => students.iter().collect(),
    };

    let required = request.min_records.max(1);
    if selected.len() < required {
        return Err(RosterError::InsufficientRecords {
            found: selected.len(),
            required,
        });
    }

    let content = match request.format {
        ExportFormat::Csv => render_csv(&selected, &fields),
        ExportFormat::Json => {
            let quality = data_quality(students, &fields);
            render_json(&selected, &fields, request.preset, quality, generated_at)?
        }
    };

    Ok(ExportArtifact {
        file_name: format!(
            "{}_report_{}.{}",
            request.preset.id(),
            generated_at.format("%Y-%m-%d"),
            request.format.extension()
        ),
        mime_type: request.format.mime_type(),
        record_count: selected.len(),
        content,
    })
}

fn render_csv(students: &[&StudentRecord], fields: &[ExportField]) -> String {
    let header = fields
        .iter()
        .map(|f| quote_csv(f.id()))
        .collect::<Vec<_>>()
        .join(",");

    let mut lines = Vec::with_capacity(students.len() + 1);
    lines.push(header);
    for student in students {
        let row = fields
            .iter()
            .map(|f| f.value(student).to_csv())
            .collect::<Vec<_>>()
            .join(",");
        lines.push(row);
    }

    let mut out = String::new();
    out.push(UTF8_BOM);
    out.push_str(&lines.join("\n"));
    out
}

fn render_json(
    students: &[&StudentRecord],
    fields: &[ExportField],
    preset: ReportPreset,
    quality: Option<DataQuality>,
    generated_at: DateTime<Utc>,
) -> RosterResult<String> {
    let data: Vec<Value> = students
        .iter()
        .map(|student| {
            let row: Map<String, Value> = fields
                .iter()
                .map(|f| (f.id().to_string(), f.value(student).to_json()))
                .collect();
            Value::Object(row)
        })
        .collect();

    let document = json!({
        "metadata": {
            "reportType": preset.id(),
            "generatedAt": generated_at.to_rfc3339(),
            "totalRecords": data.len(),
            "fields": fields.iter().map(ExportField::id).collect::<Vec<_>>(),
            "dataQuality": quality,
        },
        "data": data,
    });

    Ok(serde_json::to_string_pretty(&document)?)
}
