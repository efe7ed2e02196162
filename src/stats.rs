//! Batch-level aggregates for the dashboard views.
//!
//! Everything here is a pure function of the collection and recomputes from
//! scratch; callers decide when a recomputation is worth it.

use std::collections::HashMap;

use crate::models::{
    AcademicSummary, BandCount, BatchStatistics, CategoryCount, ExperienceSplit, Gender,
    GenderSplit, Histogram, StudentRecord,
};

pub const TOP_PROGRAMS: usize = 6;
pub const TOP_PERFORMERS: usize = 6;
const UNKNOWN_PROGRAM: &str = "Unknown";

/// Half-open interval `[min, max)`; an open end is unbounded.
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub label: &'static str,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Band {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value < max)
    }
}

pub const UG_GRADE_BANDS: [Band; 5] = [
    Band {
        label: "90%+",
        min: Some(90.0),
        max: None,
    },
    Band {
        label: "80-89%",
        min: Some(80.0),
        max: Some(90.0),
    },
    Band {
        label: "70-79%",
        min: Some(70.0),
        max: Some(80.0),
    },
    Band {
        label: "60-69%",
        min: Some(60.0),
        max: Some(70.0),
    },
    Band {
        label: "Below 60%",
        min: None,
        max: Some(60.0),
    },
];

/// Mean over the students where `field` is defined.
pub fn mean<F>(students: &[StudentRecord], field: F) -> Option<f64>
where
    F: Fn(&StudentRecord) -> Option<f64>,
{
    let (sum, count) = students
        .iter()
        .filter_map(field)
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Count per category, in the order categories were first seen.
/// Students for which `key` yields `None` are not counted.
pub fn distribution<F>(students: &[StudentRecord], key: F) -> Vec<CategoryCount>
where
    F: Fn(&StudentRecord) -> Option<String>,
{
    let mut counts: Vec<CategoryCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for label in students.iter().filter_map(key) {
        match positions.get(&label) {
            Some(&idx) => counts[idx].count += 1,
            None => {
                positions.insert(label.clone(), counts.len());
                counts.push(CategoryCount { label, count: 1 });
            }
        }
    }

    counts
}

/// The `n` largest categories. Equal counts keep first-seen order.
pub fn top_categories(mut counts: Vec<CategoryCount>, n: usize) -> Vec<CategoryCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}

/// Counts defined values per band. A value matching no band is still part of `defined`.
pub fn histogram<F>(students: &[StudentRecord], field: F, bands: &[Band]) -> Histogram
where
    F: Fn(&StudentRecord) -> Option<f64>,
{
    let values: Vec<f64> = students.iter().filter_map(field).collect();
    let bands = bands
        .iter()
        .map(|band| BandCount {
            label: band.label,
            count: values.iter().filter(|v| band.contains(**v)).count(),
        })
        .collect();

    Histogram {
        bands,
        defined: values.len(),
    }
}

pub fn ug_grade_distribution(students: &[StudentRecord]) -> Histogram {
    histogram(students, |s| s.ug_percentage, &UG_GRADE_BANDS)
}

/// Highest `n` students by `field`, skipping those without a value.
/// Ties keep collection order.
pub fn top_n_by<F>(students: &[StudentRecord], field: F, n: usize) -> Vec<StudentRecord>
where
    F: Fn(&StudentRecord) -> Option<f64>,
{
    let mut ranked: Vec<(f64, &StudentRecord)> = students
        .iter()
        .filter_map(|s| field(s).map(|value| (value, s)))
        .collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    ranked.into_iter().take(n).map(|(_, s)| s.clone()).collect()
}

pub fn batch_statistics(students: &[StudentRecord]) -> BatchStatistics {
    let mut gender = GenderSplit::default();
    let mut experience = ExperienceSplit::default();

    for student in students {
        match student.gender {
            Some(Gender::Male) => gender.male += 1,
            Some(Gender::Female) => gender.female += 1,
            None => gender.unknown += 1,
        }
        if student.has_experience() {
            experience.experienced += 1;
        } else {
            experience.fresher += 1;
        }
    }

    BatchStatistics {
        total_students: students.len(),
        gender_distribution: gender,
        specialization_distribution: distribution(students, |s| {
            Some(s.specialization().to_string())
        }),
        state_distribution: distribution(students, |s| s.state.clone()),
        average_ug_percentage: round2(mean(students, |s| s.ug_percentage).unwrap_or(0.0)),
        experience_distribution: experience,
    }
}

pub fn academic_summary(students: &[StudentRecord]) -> AcademicSummary {
    let programs = distribution(students, |s| {
        Some(
            s.ug_program
                .clone()
                .unwrap_or_else(|| UNKNOWN_PROGRAM.to_string()),
        )
    });

    AcademicSummary {
        average_ug_percentage: mean(students, |s| s.ug_percentage),
        average_class12_percentage: mean(students, |s| s.class12_percentage),
        average_class10_percentage: mean(students, |s| s.class10_percentage),
        ug_grades: ug_grade_distribution(students),
        top_programs: top_categories(programs, TOP_PROGRAMS),
        top_performers: top_n_by(students, |s| s.ug_percentage, TOP_PERFORMERS),
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: i64, ug: Option<f64>) -> StudentRecord {
        let mut s = StudentRecord::new(id, format!("R{id}"), format!("Student {id}"));
        s.ug_percentage = ug;
        s
    }

    #[test]
    fn mean_ignores_missing_values() {
        let students = vec![student(1, Some(80.0)), student(2, None), student(3, Some(90.0))];
        assert_eq!(mean(&students, |s| s.ug_percentage), Some(85.0));
        assert_eq!(mean(&students, |s| s.class12_percentage), None);
    }

    #[test]
    fn distribution_keeps_first_seen_order() {
        let mut students = vec![student(1, None), student(2, None), student(3, None)];
        students[0].ug_branch = Some("Finance".to_string());
        students[1].ug_program = Some("BBA".to_string());
        students[2].ug_branch = Some("Finance".to_string());

        let dist = distribution(&students, |s| Some(s.specialization().to_string()));
        assert_eq!(
            dist,
            vec![
                CategoryCount {
                    label: "Finance".to_string(),
                    count: 2
                },
                CategoryCount {
                    label: "BBA".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn top_categories_breaks_ties_by_first_seen() {
        let counts = vec![
            CategoryCount {
                label: "a".to_string(),
                count: 1,
            },
            CategoryCount {
                label: "b".to_string(),
                count: 3,
            },
            CategoryCount {
                label: "c".to_string(),
                count: 1,
            },
        ];
        let labels: Vec<String> = top_categories(counts, 2)
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(labels, vec!["b", "a"]);
    }

    #[test]
    fn grade_bands_are_half_open() {
        let students: Vec<StudentRecord> = [90.0, 89.99, 80.0, 79.5, 70.0, 60.0, 59.9]
            .into_iter()
            .enumerate()
            .map(|(i, pct)| student(i as i64, Some(pct)))
            .collect();
        let counts: Vec<usize> = ug_grade_distribution(&students)
            .bands
            .iter()
            .map(|b| b.count)
            .collect();
        assert_eq!(counts, vec![1, 2, 2, 1, 1]);
    }

    #[test]
    fn band_counts_sum_to_defined_not_cohort() {
        let students: Vec<StudentRecord> = (0..100)
            .map(|i| {
                let ug = if i < 8 { None } else { Some(50.0 + (i % 50) as f64) };
                student(i, ug)
            })
            .collect();

        let histogram = ug_grade_distribution(&students);
        let total: usize = histogram.bands.iter().map(|b| b.count).sum();
        assert_eq!(histogram.defined, 92);
        assert_eq!(total, 92);
    }

    #[test]
    fn top_n_is_stable_and_skips_missing() {
        let students = vec![
            student(1, Some(75.0)),
            student(2, None),
            student(3, Some(88.0)),
            student(4, Some(75.0)),
        ];
        let ids: Vec<i64> = top_n_by(&students, |s| s.ug_percentage, 3)
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![3, 1, 4]);
    }

    #[test]
    fn batch_statistics_counts_every_student() {
        let mut students = vec![student(1, Some(88.0)), student(2, Some(71.34)), student(3, None)];
        students[0].gender = Some(Gender::Female);
        students[0].total_experience = 2.0;
        students[1].gender = Some(Gender::Male);
        students[1].state = Some("Goa".to_string());

        let stats = batch_statistics(&students);
        assert_eq!(stats.total_students, 3);
        assert_eq!(
            stats.gender_distribution,
            GenderSplit {
                male: 1,
                female: 1,
                unknown: 1
            }
        );
        assert_eq!(stats.experience_distribution.experienced, 1);
        assert_eq!(stats.experience_distribution.fresher, 2);
        assert_eq!(stats.average_ug_percentage, 79.67);
        assert_eq!(stats.state_distribution.len(), 1);
        assert_eq!(stats.specialization_distribution[0].label, "General");
        assert_eq!(stats.specialization_distribution[0].count, 3);
    }

    #[test]
    fn academic_summary_labels_missing_program_unknown() {
        let mut students = vec![student(1, Some(91.0)), student(2, Some(65.0))];
        students[0].ug_program = Some("BBA".to_string());

        let summary = academic_summary(&students);
        assert_eq!(summary.top_performers[0].id, 1);
        assert_eq!(summary.average_ug_percentage, Some(78.0));
        assert_eq!(summary.average_class10_percentage, None);
        let labels: Vec<&str> = summary
            .top_programs
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        assert_eq!(labels, vec!["BBA", "Unknown"]);
    }
}
