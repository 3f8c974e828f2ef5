//! Teachers, the classes they lead, and assignments they set.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    pub subject: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<Class>>,
}

impl Teacher {
    pub fn contact(&self) -> Option<String> {
        match (&self.email, &self.phone) {
            (Some(email), Some(phone)) => Some(format!("{} / {}", email, phone)),
            (Some(email), None) => Some(email.clone()),
            (None, Some(phone)) => Some(phone.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Class {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub subject: Option<String>,
    pub teacher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teachers: Option<Box<Teacher>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(default)]
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Class label the assignment was set for (e.g. "10A").
    pub class: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub teacher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teachers: Option<Box<Teacher>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teacher_contact() {
        let mut teacher = Teacher {
            full_name: "Grace Hopper".to_string(),
            email: Some("grace@school.test".to_string()),
            ..Default::default()
        };
        assert_eq!(teacher.contact().as_deref(), Some("grace@school.test"));
        teacher.phone = Some("555-0100".to_string());
        assert_eq!(
            teacher.contact().as_deref(),
            Some("grace@school.test / 555-0100")
        );
    }

    #[test]
    fn test_class_with_embedded_teacher() {
        let class: Class = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "Algebra",
            "teachers": { "full_name": "Emmy Noether", "subject": "Mathematics" }
        }))
        .unwrap();
        let teacher = class.teachers.unwrap();
        assert_eq!(teacher.full_name, "Emmy Noether");
        assert_eq!(teacher.subject.as_deref(), Some("Mathematics"));
    }

    #[test]
    fn test_relations_not_serialized_when_absent() {
        let assignment = Assignment {
            id: "as1".to_string(),
            title: Some("Essay".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&assignment).unwrap();
        assert!(value.get("teachers").is_none());
    }
}
