use crate::models::{FilterOptions, StudentRecord};

pub const FRESHER: &str = "fresher";
pub const EXPERIENCED: &str = "experienced";

/// Keeps the students matching every active filter, in their original order.
pub fn filter_students(students: &[StudentRecord], filters: &FilterOptions) -> Vec<StudentRecord> {
    students
        .iter()
        .filter(|student| matches(student, filters))
        .cloned()
        .collect()
}

pub fn matches(student: &StudentRecord, filters: &FilterOptions) -> bool {
    if let Some(term) = active(&filters.search) {
        if !matches_search(student, term) {
            return false;
        }
    }

    if let Some(specialization) = active(&filters.specialization) {
        if !contains_ignore_case(student.specialization(), specialization) {
            return false;
        }
    }

    if let Some(gender) = active(&filters.gender) {
        if student.gender.map(|g| g.as_str()) != Some(gender) {
            return false;
        }
    }

    if let Some(bucket) = active(&filters.experience) {
        match bucket {
            FRESHER if student.has_experience() => return false,
            EXPERIENCED if !student.has_experience() => return false,
            _ => {}
        }
    }

    if let Some(state) = active(&filters.state) {
        if student.state.as_deref() != Some(state) {
            return false;
        }
    }

    if let Some(degree) = active(&filters.ug_degree) {
        if !contains_ignore_case(student.ug_program.as_deref().unwrap_or(""), degree) {
            return false;
        }
    }

    if let Some(year) = active(&filters.graduation_year) {
        if student.ug_end_year.map(|y| y.to_string()).as_deref() != Some(year) {
            return false;
        }
    }

    true
}

/// Any of the searchable fields contains `term`, ignoring case.
pub fn matches_search(student: &StudentRecord, term: &str) -> bool {
    let term = term.to_lowercase();
    searchable_fields(student).any(|field| field.to_lowercase().contains(&term))
}

fn searchable_fields(student: &StudentRecord) -> impl Iterator<Item = &str> {
    let scalars = [
        Some(student.name.as_str()),
        Some(student.roll_no.as_str()),
        student.college_email.as_deref(),
        student.personal_email.as_deref(),
        student.ug_branch.as_deref(),
        student.ug_program.as_deref(),
        student.internship.company.as_deref(),
        student.work_experience_1.company.as_deref(),
        student.work_experience_2.company.as_deref(),
        student.internship.title.as_deref(),
        student.work_experience_1.title.as_deref(),
        student.work_experience_2.title.as_deref(),
    ];

    let lists = student
        .languages
        .iter()
        .chain(student.achievements.iter())
        .flatten()
        .map(String::as_str);

    scalars.into_iter().flatten().chain(lists)
}

/// The empty string and the literal "all" mean no constraint. Anything else,
/// whitespace included, is matched as given.
fn active(value: &Option<String>) -> Option<&str> {
    let value = value.as_deref()?;
    (!value.is_empty() && value != "all").then_some(value)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
