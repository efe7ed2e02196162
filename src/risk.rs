use std::fmt;

use serde::Serialize;

use crate::models::StudentRecord;

pub const HIGH_PERFORMER_MIN: f64 = 85.0;
pub const STRUGGLING_BELOW: f64 = 70.0;
pub const SCHOOL_SCORE_RISK_BELOW: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    High,
    Average,
    Struggling,
}

pub fn performance_tier(ug_percentage: f64) -> PerformanceTier {
    if ug_percentage >= HIGH_PERFORMER_MIN {
        PerformanceTier::High
    } else if ug_percentage >= STRUGGLING_BELOW {
        PerformanceTier::Average
    } else {
        PerformanceTier::Struggling
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierSummary {
    pub high: usize,
    pub average: usize,
    pub struggling: usize,
    /// Students with a UG percentage; the denominator for tier shares.
    pub defined: usize,
}

impl TierSummary {
    pub fn share(&self, count: usize) -> f64 {
        count as f64 * 100.0 / self.defined.max(1) as f64
    }
}

pub fn tier_summary(students: &[StudentRecord]) -> TierSummary {
    let mut summary = TierSummary::default();
    for pct in students.iter().filter_map(|s| s.ug_percentage) {
        summary.defined += 1;
        match performance_tier(pct) {
            PerformanceTier::High => summary.high += 1,
            PerformanceTier::Average => summary.average += 1,
            PerformanceTier::Struggling => summary.struggling += 1,
        }
    }
    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "indicator", content = "value", rename_all = "camelCase")]
pub enum RiskReason {
    LowUgPercentage(f64),
    LowClass12Percentage(f64),
    LowClass10Percentage(f64),
}

impl fmt::Display for RiskReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskReason::LowUgPercentage(v) => write!(f, "UG {v}% < {STRUGGLING_BELOW}%"),
            RiskReason::LowClass12Percentage(v) => {
                write!(f, "Class 12 {v}% < {SCHOOL_SCORE_RISK_BELOW}%")
            }
            RiskReason::LowClass10Percentage(v) => {
                write!(f, "Class 10 {v}% < {SCHOOL_SCORE_RISK_BELOW}%")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtRiskStudent {
    pub roll_no: String,
    pub name: String,
    pub reasons: Vec<RiskReason>,
}

/// Reasons `student` needs attention; only scores that are present count.
pub fn risk_reasons(student: &StudentRecord) -> Vec<RiskReason> {
    let mut reasons = Vec::new();
    if let Some(v) = student.ug_percentage.filter(|v| *v < STRUGGLING_BELOW) {
        reasons.push(RiskReason::LowUgPercentage(v));
    }
    if let Some(v) = student
        .class12_percentage
        .filter(|v| *v < SCHOOL_SCORE_RISK_BELOW)
    {
        reasons.push(RiskReason::LowClass12Percentage(v));
    }
    if let Some(v) = student
        .class10_percentage
        .filter(|v| *v < SCHOOL_SCORE_RISK_BELOW)
    {
        reasons.push(RiskReason::LowClass10Percentage(v));
    }
    reasons
}

pub fn at_risk_students(students: &[StudentRecord]) -> Vec<AtRiskStudent> {
    students
        .iter()
        .filter_map(|student| {
            let reasons = risk_reasons(student);
            (!reasons.is_empty()).then(|| AtRiskStudent {
                roll_no: student.roll_no.clone(),
                name: student.name.clone(),
                reasons,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_student(
        ug: Option<f64>,
        class12: Option<f64>,
        class10: Option<f64>,
    ) -> StudentRecord {
        let mut student = StudentRecord::new(1, "R1", "Avery Lee");
        student.ug_percentage = ug;
        student.class12_percentage = class12;
        student.class10_percentage = class10;
        student
    }

    #[test]
    fn tiers_follow_expected_thresholds() {
        assert_eq!(performance_tier(92.0), PerformanceTier::High);
        assert_eq!(performance_tier(85.0), PerformanceTier::High);
        assert_eq!(performance_tier(84.9), PerformanceTier::Average);
        assert_eq!(performance_tier(70.0), PerformanceTier::Average);
        assert_eq!(performance_tier(69.9), PerformanceTier::Struggling);
    }

    #[test]
    fn tier_summary_skips_missing_scores() {
        let students = vec![
            sample_student(Some(90.0), None, None),
            sample_student(Some(72.0), None, None),
            sample_student(None, None, None),
            sample_student(Some(55.0), None, None),
        ];
        let summary = tier_summary(&students);
        assert_eq!(
            summary,
            TierSummary {
                high: 1,
                average: 1,
                struggling: 1,
                defined: 3
            }
        );
        assert!((summary.share(summary.high) - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn any_low_score_flags_student() {
        let student = sample_student(Some(80.0), Some(74.0), None);
        assert_eq!(
            risk_reasons(&student),
            vec![RiskReason::LowClass12Percentage(74.0)]
        );

        let student = sample_student(Some(60.0), Some(60.0), Some(60.0));
        assert_eq!(risk_reasons(&student).len(), 3);
    }

    #[test]
    fn missing_scores_are_not_risks() {
        let students = vec![
            sample_student(None, None, None),
            sample_student(Some(88.0), Some(90.0), Some(95.0)),
        ];
        assert!(at_risk_students(&students).is_empty());
    }
}
