//! Single-field ordering of a student collection.

use std::cmp::Ordering;
use std::fmt;

use crate::models::StudentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    RollNo,
    UgPercentage,
    TotalExperience,
    UgEndYear,
    Class12Percentage,
    Class10Percentage,
}

impl SortKey {
    pub const ALL: [SortKey; 7] = [
        SortKey::Name,
        SortKey::RollNo,
        SortKey::UgPercentage,
        SortKey::TotalExperience,
        SortKey::UgEndYear,
        SortKey::Class12Percentage,
        SortKey::Class10Percentage,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::RollNo => "rollNo",
            SortKey::UgPercentage => "ugPercentage",
            SortKey::TotalExperience => "totalExperience",
            SortKey::UgEndYear => "ugEndYear",
            SortKey::Class12Percentage => "class12Percentage",
            SortKey::Class10Percentage => "class10Percentage",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.id() == id)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

enum SortValue<'a> {
    Text(&'a str),
    Number(f64),
}

fn sort_value(student: &StudentRecord, key: SortKey) -> SortValue<'_> {
    match key {
        SortKey::Name => SortValue::Text(&student.name),
        SortKey::RollNo => SortValue::Text(&student.roll_no),
        SortKey::UgPercentage => SortValue::Number(student.ug_percentage.unwrap_or(0.0)),
        SortKey::TotalExperience => SortValue::Number(student.total_experience),
        SortKey::UgEndYear => SortValue::Number(student.ug_end_year.unwrap_or(0) as f64),
        SortKey::Class12Percentage => {
            SortValue::Number(student.class12_percentage.unwrap_or(0.0))
        }
        SortKey::Class10Percentage => {
            SortValue::Number(student.class10_percentage.unwrap_or(0.0))
        }
    }
}

/// Sorts by the field named `key`. An unknown key leaves the order as is.
pub fn sort_students(
    students: &[StudentRecord],
    key: &str,
    order: SortOrder,
) -> Vec<StudentRecord> {
    match SortKey::from_id(key) {
        Some(key) => sort_students_by(students, key, order),
        None => students.to_vec(),
    }
}

/// Returns a sorted copy. Ties keep their input order in both directions;
/// a missing number sorts as zero.
pub fn sort_students_by(
    students: &[StudentRecord],
    key: SortKey,
    order: SortOrder,
) -> Vec<StudentRecord> {
    let mut sorted = students.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = compare(&sort_value(a, key), &sort_value(b, key));
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
    sorted
}

fn compare(a: &SortValue<'_>, b: &SortValue<'_>) -> Ordering {
    match (a, b) {
        (SortValue::Text(a), SortValue::Text(b)) => collate(a, b),
        (SortValue::Number(a), SortValue::Number(b)) => {
            a.partial_cmp(b).unwrap_or(Ordering::Equal)
        }
        _ => Ordering::Equal,
    }
}

/// Case-insensitive first, so "bob" sits next to "Bob" rather than after "Zed";
/// exact text only breaks ties.
pub fn collate(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| b.cmp(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(roll_no: &str, name: &str, ug: Option<f64>) -> StudentRecord {
        let mut s = StudentRecord::new(0, roll_no, name);
        s.ug_percentage = ug;
        s
    }

    fn rolls(students: &[StudentRecord]) -> Vec<&str> {
        students.iter().map(|s| s.roll_no.as_str()).collect()
    }

    #[test]
    fn names_collate_ignoring_case() {
        let students = vec![
            student("R1", "zed", None),
            student("R2", "Bob", None),
            student("R3", "alice", None),
        ];
        let sorted = sort_students(&students, "name", SortOrder::Ascending);
        assert_eq!(rolls(&sorted), vec!["R3", "R2", "R1"]);
    }

    #[test]
    fn lowercase_precedes_uppercase_on_ties() {
        assert_eq!(collate("bob", "Bob"), Ordering::Less);
        assert_eq!(collate("Bob", "bob"), Ordering::Greater);
        assert_eq!(collate("Bob", "Bob"), Ordering::Equal);
    }

    #[test]
    fn descending_numeric_places_missing_with_zero() {
        let students = vec![
            student("R1", "A", None),
            student("R2", "B", Some(72.0)),
            student("R3", "C", Some(0.0)),
            student("R4", "D", Some(91.5)),
        ];
        let sorted = sort_students(&students, "ugPercentage", SortOrder::Descending);
        assert_eq!(rolls(&sorted), vec!["R4", "R2", "R1", "R3"]);
    }

    #[test]
    fn unknown_key_keeps_order() {
        let students = vec![
            student("R2", "B", Some(50.0)),
            student("R1", "A", Some(90.0)),
        ];
        let sorted = sort_students(&students, "favouriteColour", SortOrder::Descending);
        assert_eq!(sorted, students);
    }

    #[test]
    fn input_is_not_mutated() {
        let students = vec![student("R2", "B", None), student("R1", "A", None)];
        let before = students.clone();
        let _ = sort_students(&students, "rollNo", SortOrder::Ascending);
        assert_eq!(students, before);
    }

    #[test]
    fn experience_and_years_sort_numerically() {
        let mut a = student("R1", "A", None);
        a.total_experience = 2.5;
        a.ug_end_year = Some(2019);
        let mut b = student("R2", "B", None);
        b.total_experience = 0.6;
        b.ug_end_year = Some(2022);

        let students = vec![a, b];
        let by_exp = sort_students_by(&students, SortKey::TotalExperience, SortOrder::Ascending);
        assert_eq!(rolls(&by_exp), vec!["R2", "R1"]);
        let by_year = sort_students_by(&students, SortKey::UgEndYear, SortOrder::Descending);
        assert_eq!(rolls(&by_year), vec!["R2", "R1"]);
    }

    #[test]
    fn every_key_round_trips_through_its_id() {
        for key in SortKey::ALL {
            assert_eq!(SortKey::from_id(key.id()), Some(key));
        }
    }
}
