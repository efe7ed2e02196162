use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::StudentRecord;
use crate::risk;
use crate::stats;

const TOP_SPECIALIZATIONS: usize = 8;
const TOP_STATES: usize = 10;

pub fn build_report(
    batch_label: Option<&str>,
    generated_on: NaiveDate,
    students: &[StudentRecord],
) -> String {
    let batch = stats::batch_statistics(students);
    let academic = stats::academic_summary(students);
    let tiers = risk::tier_summary(students);
    let at_risk = risk::at_risk_students(students);

    let mut output = String::new();
    let label = batch_label.unwrap_or("current batch");

    let _ = writeln!(output, "# MBA Batch Report");
    let _ = writeln!(output, "Generated for {} on {}", label, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    if students.is_empty() {
        let _ = writeln!(output, "No students loaded for this batch.");
        return output;
    }

    let gender = &batch.gender_distribution;
    let experience = &batch.experience_distribution;
    let _ = writeln!(output, "- Students: {}", batch.total_students);
    let _ = writeln!(
        output,
        "- Gender: {} male, {} female, {} unrecorded",
        gender.male, gender.female, gender.unknown
    );
    let _ = writeln!(
        output,
        "- Experience: {} freshers, {} experienced",
        experience.fresher, experience.experienced
    );
    let _ = writeln!(
        output,
        "- Average UG score: {:.2}%",
        batch.average_ug_percentage
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## UG Grade Bands");
    if academic.ug_grades.defined == 0 {
        let _ = writeln!(output, "No UG percentages recorded.");
    } else {
        for band in academic.ug_grades.bands.iter() {
            let _ = writeln!(
                output,
                "- {}: {} ({:.0}% of {} with UG%)",
                band.label,
                band.count,
                academic.ug_grades.share(band),
                academic.ug_grades.defined
            );
        }
        let _ = writeln!(
            output,
            "- Tiers: {} high, {} average, {} struggling",
            tiers.high, tiers.average, tiers.struggling
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Specializations");
    let specializations =
        stats::top_categories(batch.specialization_distribution.clone(), TOP_SPECIALIZATIONS);
    for entry in specializations.iter() {
        let _ = writeln!(output, "- {}: {}", entry.label, entry.count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## States");
    let states = stats::top_categories(batch.state_distribution.clone(), TOP_STATES);
    if states.is_empty() {
        let _ = writeln!(output, "No states recorded.");
    } else {
        for entry in states.iter() {
            let _ = writeln!(output, "- {}: {}", entry.label, entry.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");
    if academic.top_performers.is_empty() {
        let _ = writeln!(output, "No UG percentages recorded.");
    } else {
        for student in academic.top_performers.iter() {
            let _ = writeln!(
                output,
                "- {} ({}) UG {}% in {}",
                student.name,
                student.roll_no,
                student.ug_percentage.unwrap_or_default(),
                student.specialization()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Attention");
    if at_risk.is_empty() {
        let _ = writeln!(output, "No students below the attention thresholds.");
    } else {
        for entry in at_risk.iter() {
            let reasons: Vec<String> = entry.reasons.iter().map(|r| r.to_string()).collect();
            let _ = writeln!(
                output,
                "- {} ({}): {}",
                entry.name,
                entry.roll_no,
                reasons.join(", ")
            );
        }
    }

    output
}
