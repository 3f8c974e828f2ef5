use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::records::{Attendance, Fee, Grade};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    /// School-issued identifier, distinct from the row id.
    pub student_id: Option<String>,
    /// Class label (e.g. "10A").
    pub class: Option<String>,
    /// Auth user linked to this student, if any.
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<Vec<Fee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grades: Option<Vec<Grade>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance: Option<Vec<Attendance>>,
}

impl Student {
    pub fn class_label(&self) -> String {
        self.class
            .as_deref()
            .map(|c| format!("Class {}", c))
            .unwrap_or_else(|| "Unassigned".to_string())
    }

    /// Embedded fees, empty when the join was not requested.
    pub fn fees(&self) -> &[Fee] {
        self.fees.as_deref().unwrap_or(&[])
    }

    pub fn grades(&self) -> &[Grade] {
        self.grades.as_deref().unwrap_or(&[])
    }

    pub fn attendance(&self) -> &[Attendance] {
        self.attendance.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_embeds() {
        let student: Student = serde_json::from_value(serde_json::json!({
            "id": "s1",
            "full_name": "Alan Turing",
            "student_id": "STU-001",
            "class": "10A",
            "fees": [{ "id": "f1", "amount": 100, "status": "paid" }]
        }))
        .unwrap();
        assert_eq!(student.fees().len(), 1);
        assert!(student.grades.is_none());
        assert!(student.grades().is_empty());
        assert_eq!(student.class_label(), "Class 10A");
    }
}
