use crate::errors::{Result, RosterError};
use crate::models::{Score, ScoreField};
use crate::store::RecordStore;
use serde::Serialize;

/// Weighted mean of whichever fields are set; `None` when none are.
pub fn average_score(score: &Score) -> Option<f64> {
    let mut sum = 0.0;
    let mut weight = 0.0;
    for field in ScoreField::ALL {
        if let Some(v) = field.value(score) {
            sum += v * field.weight();
            weight += field.weight();
        }
    }
    if weight > 0.0 {
        Some(sum / weight)
    } else {
        None
    }
}

/// Half-up rounding to one decimal: `floor(10*x + 0.5) / 10`.
pub fn round_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentScoreRow {
    pub student_id: String,
    pub student_code: String,
    pub full_name: String,
    pub oral: Option<f64>,
    pub test15: Option<f64>,
    pub test45: Option<f64>,
    pub midterm: Option<f64>,
    #[serde(rename = "final")]
    pub final_exam: Option<f64>,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub class_id: String,
    pub class_name: String,
    pub subject_id: String,
    pub subject_name: String,
    pub rows: Vec<StudentScoreRow>,
    pub class_average: Option<f64>,
    pub students_without_data: usize,
}

/// One row per student currently in the class, in roster order.
pub fn class_report(store: &RecordStore, class_id: &str, subject_id: &str) -> Result<ClassReport> {
    let class = store
        .find_class(class_id)
        .ok_or_else(|| RosterError::not_found("class"))?;
    let subject = store
        .find_subject(subject_id)
        .ok_or_else(|| RosterError::not_found("subject"))?;
    let scores = store.scores_for(class_id, subject_id);

    let mut rows = Vec::new();
    let mut averages = Vec::new();
    let mut without = 0usize;
    for student in store.students_by_class(class_id) {
        let score = scores.iter().find(|s| s.student_id == student.id);
        let average = score.and_then(average_score);
        match average {
            Some(a) => averages.push(a),
            None => without += 1,
        }
        rows.push(StudentScoreRow {
            student_id: student.id,
            student_code: student.student_code,
            full_name: student.full_name,
            oral: score.and_then(|s| s.oral),
            test15: score.and_then(|s| s.test15),
            test45: score.and_then(|s| s.test45),
            midterm: score.and_then(|s| s.midterm),
            final_exam: score.and_then(|s| s.final_exam),
            average: average.map(round_1_decimal),
        });
    }

    Ok(ClassReport {
        class_id: class.id,
        class_name: class.name,
        subject_id: subject.id,
        subject_name: subject.name,
        rows,
        class_average: mean(&averages).map(round_1_decimal),
        students_without_data: without,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectClassSummary {
    pub class_id: String,
    pub class_name: String,
    pub graded_students: usize,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectReport {
    pub subject_id: String,
    pub subject_name: String,
    pub classes: Vec<SubjectClassSummary>,
}

pub fn subject_report(store: &RecordStore, subject_id: &str) -> Result<SubjectReport> {
    let subject = store
        .find_subject(subject_id)
        .ok_or_else(|| RosterError::not_found("subject"))?;
    let classes = store
        .classes()
        .into_iter()
        .map(|c| {
            let averages: Vec<f64> = store
                .scores_for(&c.id, subject_id)
                .iter()
                .filter_map(average_score)
                .collect();
            SubjectClassSummary {
                graded_students: averages.len(),
                average: mean(&averages).map(round_1_decimal),
                class_id: c.id,
                class_name: c.name,
            }
        })
        .collect();
    Ok(SubjectReport {
        subject_id: subject.id,
        subject_name: subject.name,
        classes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(oral: Option<f64>, final_exam: Option<f64>) -> Score {
        Score {
            id: "x".into(),
            student_id: "s".into(),
            class_id: None,
            subject_id: "m".into(),
            oral,
            test15: None,
            test45: None,
            midterm: None,
            final_exam,
            updated_at: None,
        }
    }

    #[test]
    fn absent_fields_drop_out_of_the_weights() {
        let avg = average_score(&score(Some(8.0), Some(9.0))).expect("average");
        assert!((avg - 8.75).abs() < 1e-9);
    }

    #[test]
    fn no_fields_means_no_average() {
        assert_eq!(average_score(&score(None, None)), None);
    }

    #[test]
    fn zero_is_a_real_mark() {
        assert_eq!(average_score(&score(Some(0.0), None)), Some(0.0));
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_1_decimal(8.75), 8.8);
        assert_eq!(round_1_decimal(8.74), 8.7);
        assert_eq!(round_1_decimal(7.0), 7.0);
    }
}
