use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const GENERAL_SPECIALIZATION: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Employer, job title and duration of one internship or prior job.
/// Each part is read from its own column and may be missing on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub company: Option<String>,
    pub title: Option<String>,
    pub duration: Option<String>,
}

impl Placement {
    pub fn is_empty(&self) -> bool {
        self.company.is_none() && self.title.is_none() && self.duration.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub enrolled: Option<bool>,
    pub status: Option<String>,
}

/// One normalized student of the batch.
///
/// Records are built once per fetch and never mutated afterwards. Every
/// field that could not be read from its cell is `None`; `total_experience`
/// is the only field that falls back to zero, since a blank experience cell
/// means the student is a fresher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: i64,
    pub roll_no: String,
    pub name: String,
    pub college_email: Option<String>,
    pub personal_email: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub state: Option<String>,
    pub blood_group: Option<String>,
    pub category: Option<String>,
    pub current_course_score: Option<f64>,
    pub current_course_percentage: Option<String>,
    pub ug_board: Option<String>,
    pub ug_program: Option<String>,
    pub ug_branch: Option<String>,
    pub ug_percentage: Option<f64>,
    pub ug_end_year: Option<i32>,
    pub class12_percentage: Option<f64>,
    pub class12_yop: Option<i32>,
    pub class10_percentage: Option<f64>,
    pub class10_yop: Option<i32>,
    /// Years, rounded to one decimal.
    pub total_experience: f64,
    pub internship: Placement,
    pub work_experience_1: Placement,
    pub work_experience_2: Placement,
    pub summer_internship: Enrollment,
    pub campus_placement: Enrollment,
    pub languages: Option<Vec<String>>,
    pub achievements: Option<Vec<String>>,
    pub comments: Option<String>,
}

impl StudentRecord {
    /// Minimal record with only identity set, everything else absent.
    pub fn new(id: i64, roll_no: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            roll_no: roll_no.into(),
            name: name.into(),
            college_email: None,
            personal_email: None,
            phone: None,
            course: None,
            gender: None,
            date_of_birth: None,
            state: None,
            blood_group: None,
            category: None,
            current_course_score: None,
            current_course_percentage: None,
            ug_board: None,
            ug_program: None,
            ug_branch: None,
            ug_percentage: None,
            ug_end_year: None,
            class12_percentage: None,
            class12_yop: None,
            class10_percentage: None,
            class10_yop: None,
            total_experience: 0.0,
            internship: Placement::default(),
            work_experience_1: Placement::default(),
            work_experience_2: Placement::default(),
            summer_internship: Enrollment::default(),
            campus_placement: Enrollment::default(),
            languages: None,
            achievements: None,
            comments: None,
        }
    }

    /// UG branch, else UG program, else "General".
    pub fn specialization(&self) -> &str {
        self.ug_branch
            .as_deref()
            .or(self.ug_program.as_deref())
            .unwrap_or(GENERAL_SPECIALIZATION)
    }

    pub fn has_experience(&self) -> bool {
        self.total_experience > 0.0
    }

    /// Completed years of age on `today`, if the date of birth is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let born = self.date_of_birth?;
        let mut age = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            age -= 1;
        }
        Some(age)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub search: Option<String>,
    pub specialization: Option<String>,
    pub gender: Option<String>,
    pub graduation_year: Option<String>,
    pub state: Option<String>,
    pub ug_degree: Option<String>,
    pub experience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenderSplit {
    pub male: usize,
    pub female: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExperienceSplit {
    pub fresher: usize,
    pub experienced: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatistics {
    pub total_students: usize,
    pub gender_distribution: GenderSplit,
    pub specialization_distribution: Vec<CategoryCount>,
    pub state_distribution: Vec<CategoryCount>,
    /// Mean over students with a UG percentage, two decimals; zero when none have one.
    pub average_ug_percentage: f64,
    pub experience_distribution: ExperienceSplit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandCount {
    pub label: &'static str,
    pub count: usize,
}

/// Counts per band plus the number of records that had a value at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bands: Vec<BandCount>,
    pub defined: usize,
}

impl Histogram {
    /// Share of the defined cohort falling into `band`, in percent.
    pub fn share(&self, band: &BandCount) -> f64 {
        if self.defined == 0 {
            0.0
        } else {
            band.count as f64 * 100.0 / self.defined as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicSummary {
    pub average_ug_percentage: Option<f64>,
    pub average_class12_percentage: Option<f64>,
    pub average_class10_percentage: Option<f64>,
    pub ug_grades: Histogram,
    pub top_programs: Vec<CategoryCount>,
    pub top_performers: Vec<StudentRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotePriority {
    Low,
    #[default]
    Medium,
    High,
}

impl NotePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotePriority::Low => "low",
            NotePriority::Medium => "medium",
            NotePriority::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(NotePriority::Low),
            "medium" => Some(NotePriority::Medium),
            "high" => Some(NotePriority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteCategory {
    #[default]
    General,
    Academic,
    Behavioral,
    Meeting,
    FollowUp,
}

impl NoteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteCategory::General => "general",
            NoteCategory::Academic => "academic",
            NoteCategory::Behavioral => "behavioral",
            NoteCategory::Meeting => "meeting",
            NoteCategory::FollowUp => "follow-up",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "general" => Some(NoteCategory::General),
            "academic" => Some(NoteCategory::Academic),
            "behavioral" => Some(NoteCategory::Behavioral),
            "meeting" => Some(NoteCategory::Meeting),
            "follow-up" => Some(NoteCategory::FollowUp),
            _ => None,
        }
    }
}

/// An annotation kept in the local store, keyed by roll number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub roll_no: String,
    pub content: String,
    pub author: String,
    pub priority: NotePriority,
    pub category: NoteCategory,
    pub tags: Vec<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub roll_no: String,
    pub content: String,
    pub author: String,
    pub priority: NotePriority,
    pub category: NoteCategory,
    pub tags: Vec<String>,
    pub is_private: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NoteQuery {
    pub priority: Option<NotePriority>,
    pub category: Option<NoteCategory>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialization_falls_back_to_program_then_general() {
        let mut student = StudentRecord::new(1, "R1", "Alice");
        assert_eq!(student.specialization(), "General");

        student.ug_program = Some("B.Com".to_string());
        assert_eq!(student.specialization(), "B.Com");

        student.ug_branch = Some("Finance".to_string());
        assert_eq!(student.specialization(), "Finance");
    }

    #[test]
    fn age_counts_completed_years() {
        let mut student = StudentRecord::new(1, "R1", "Alice");
        student.date_of_birth = NaiveDate::from_ymd_opt(2000, 6, 15);

        let before_birthday = NaiveDate::from_ymd_opt(2026, 6, 14).unwrap();
        let on_birthday = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        assert_eq!(student.age_on(before_birthday), Some(25));
        assert_eq!(student.age_on(on_birthday), Some(26));
    }

    #[test]
    fn age_is_unknown_without_birth_date() {
        let student = StudentRecord::new(1, "R1", "Alice");
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(student.age_on(today), None);
    }

    #[test]
    fn histogram_share_uses_defined_count() {
        let histogram = Histogram {
            bands: vec![BandCount {
                label: "90%+",
                count: 23,
            }],
            defined: 92,
        };
        assert!((histogram.share(&histogram.bands[0]) - 25.0).abs() < 1e-9);
    }
}
