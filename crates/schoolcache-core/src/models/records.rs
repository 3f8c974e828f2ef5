//! Per-student records: fees, grades and attendance.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::numeric::{number_or_zero, optional_number};
use super::staff::{Class, Teacher};
use super::student::Student;
use crate::schema::DEFAULT_MAX_SCORE;

// ============================================================================
// Fees
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
}

impl FeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeStatus::Pending => "pending",
            FeeStatus::Paid => "paid",
            FeeStatus::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    #[serde(default)]
    pub id: String,
    pub student_id: Option<String>,
    #[serde(default, deserialize_with = "number_or_zero")]
    pub amount: f64,
    #[serde(default)]
    pub status: FeeStatus,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<Box<Student>>,
}

impl Fee {
    pub fn is_paid(&self) -> bool {
        self.status == FeeStatus::Paid
    }

    /// True when the fee is unpaid and its due date lies strictly before `now`.
    /// Due dates are taken as midnight UTC of the given day.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        if self.is_paid() {
            return false;
        }
        match self.due_date {
            Some(due) => due.and_time(NaiveTime::MIN).and_utc() < now,
            None => false,
        }
    }
}

// ============================================================================
// Grades
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    #[serde(default)]
    pub id: String,
    pub student_id: Option<String>,
    pub teacher_id: Option<String>,
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "number_or_zero")]
    pub score: f64,
    #[serde(default, deserialize_with = "optional_number")]
    pub max_score: Option<f64>,
    pub exam_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<Box<Student>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teachers: Option<Box<Teacher>>,
}

impl Grade {
    /// Max score with the schema default applied when the row has none.
    pub fn effective_max_score(&self) -> f64 {
        self.max_score.unwrap_or(DEFAULT_MAX_SCORE)
    }

    pub fn score_display(&self) -> String {
        format!("{}/{}", self.score, self.effective_max_score())
    }
}

// ============================================================================
// Attendance
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    #[default]
    Absent,
    Late,
    Excused,
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceStatus::Present => write!(f, "Present"),
            AttendanceStatus::Absent => write!(f, "Absent"),
            AttendanceStatus::Late => write!(f, "Late"),
            AttendanceStatus::Excused => write!(f, "Excused"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attendance {
    #[serde(default)]
    pub id: String,
    pub student_id: Option<String>,
    pub class_id: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub status: AttendanceStatus,
    pub marked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<Box<Student>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Box<Class>>,
    /// Teacher who marked the record, embedded through `marked_by`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teachers: Option<Box<Teacher>>,
}

impl Attendance {
    pub fn is_present(&self) -> bool {
        self.status == AttendanceStatus::Present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fee_parses_partial_projection() {
        let fee: Fee = serde_json::from_value(serde_json::json!({
            "id": "f1",
            "amount": "250.00",
            "status": "overdue",
            "due_date": "2024-03-01"
        }))
        .unwrap();
        assert_eq!(fee.amount, 250.0);
        assert_eq!(fee.status, FeeStatus::Overdue);
        assert_eq!(fee.paid_date, None);
        assert!(fee.students.is_none());
    }

    #[test]
    fn test_fee_past_due_uses_midnight_utc() {
        let fee = Fee {
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..Default::default()
        };
        let same_day = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let day_before = Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap();
        assert!(fee.is_past_due(same_day));
        assert!(!fee.is_past_due(day_before));

        let paid = Fee {
            status: FeeStatus::Paid,
            ..fee
        };
        assert!(!paid.is_past_due(same_day));
    }

    #[test]
    fn test_grade_default_max_score() {
        let grade: Grade = serde_json::from_value(serde_json::json!({
            "subject": "Physics",
            "score": 72
        }))
        .unwrap();
        assert_eq!(grade.max_score, None);
        assert_eq!(grade.effective_max_score(), DEFAULT_MAX_SCORE);
        assert_eq!(grade.score_display(), "72/100");
    }

    #[test]
    fn test_attendance_embeds_marker() {
        let record: Attendance = serde_json::from_value(serde_json::json!({
            "id": "a1",
            "status": "present",
            "date": "2024-05-02",
            "teachers": { "full_name": "Ada Byron" }
        }))
        .unwrap();
        assert!(record.is_present());
        assert_eq!(record.teachers.unwrap().full_name, "Ada Byron");
    }
}
