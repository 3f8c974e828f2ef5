//! Student dashboard summary.
//!
//! Combines a student's profile, embedded fees, grades, attendance and the
//! latest announcements into one view, with every figure computed by the
//! functions in [`crate::metrics`].

use chrono::{DateTime, NaiveDate, Utc};

use crate::metrics;
use crate::models::{Announcement, Attendance, FeeStatus, Grade, Student};

/// Grades shown in the recent grades list.
pub const RECENT_GRADES: usize = 5;

/// Announcements shown on the dashboard.
pub const RECENT_ANNOUNCEMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct GradeLine {
    pub subject: String,
    pub score: String,
    pub percentage: f64,
    pub exam_date: Option<NaiveDate>,
}

impl GradeLine {
    fn from_grade(grade: &Grade) -> Self {
        Self {
            subject: grade.subject.clone().unwrap_or_else(|| "Unknown".to_string()),
            score: grade.score_display(),
            percentage: metrics::grade_percentage(grade),
            exam_date: grade.exam_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentDashboard {
    pub id: String,
    pub full_name: String,
    pub class_label: String,
    pub school_id: Option<String>,
    pub gpa: f64,
    pub attendance_percentage: f64,
    pub attendance_records: usize,
    pub fee_status: FeeStatus,
    pub outstanding_balance: f64,
    pub recent_grades: Vec<GradeLine>,
    pub recent_announcements: Vec<Announcement>,
}

impl StudentDashboard {
    /// `grades` and `announcements` are expected newest first, as the
    /// catalog queries return them. Fees are read from the student's
    /// embedded fee summary.
    pub fn build(
        student: &Student,
        grades: &[Grade],
        attendance: &[Attendance],
        announcements: &[Announcement],
        now: DateTime<Utc>,
    ) -> Self {
        let fees = student.fees();
        Self {
            id: student.id.clone(),
            full_name: student.full_name.clone(),
            class_label: student.class_label(),
            school_id: student.student_id.clone(),
            gpa: metrics::gpa(grades),
            attendance_percentage: metrics::attendance_percentage(attendance),
            attendance_records: attendance.len(),
            fee_status: metrics::fee_status(fees, now),
            outstanding_balance: metrics::outstanding_balance(fees),
            recent_grades: metrics::recent(grades, RECENT_GRADES)
                .iter()
                .map(GradeLine::from_grade)
                .collect(),
            recent_announcements: metrics::recent(announcements, RECENT_ANNOUNCEMENTS).to_vec(),
        }
    }

    pub fn gpa_display(&self) -> String {
        format!("{:.1}", self.gpa)
    }

    pub fn attendance_display(&self) -> String {
        if self.attendance_records == 0 {
            return "No records".to_string();
        }
        format!("{:.0}%", self.attendance_percentage)
    }
}

/// The student record linked to a signed-in user.
pub fn find_student_for_user<'a>(students: &'a [Student], user_id: &str) -> Option<&'a Student> {
    if user_id.is_empty() {
        return None;
    }
    students
        .iter()
        .find(|s| s.user_id.as_deref() == Some(user_id))
}
