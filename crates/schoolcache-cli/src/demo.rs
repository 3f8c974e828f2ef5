//! Seeded in-memory school for `--demo`.
//!
//! Dates are relative to today so the fee standings stay meaningful.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};

use schoolcache_core::{CacheSettings, EntityKind, MemoryBackend, SchoolClient};

fn day(offset: i64) -> String {
    let date: NaiveDate = (Utc::now() + Duration::days(offset)).date_naive();
    date.format("%Y-%m-%d").to_string()
}

fn timestamp(offset_days: i64) -> String {
    (Utc::now() + Duration::days(offset_days)).to_rfc3339()
}

fn students() -> Vec<Value> {
    vec![
        json!({ "id": "s1", "full_name": "Ada Lovelace", "student_id": "STU-001", "class": "10A", "user_id": "u-ada", "email": "ada@school.test" }),
        json!({ "id": "s2", "full_name": "Charles Babbage", "student_id": "STU-002", "class": "10A", "user_id": "u-charles" }),
        json!({ "id": "s3", "full_name": "Grace Hopper", "student_id": "STU-003", "class": "11B", "user_id": "u-grace" }),
        json!({ "id": "s4", "full_name": "Alan Turing", "student_id": "STU-004", "class": "11B" }),
    ]
}

fn teachers() -> Vec<Value> {
    vec![
        json!({ "id": "t1", "full_name": "Emmy Noether", "subject": "Mathematics", "email": "noether@school.test", "phone": "5551234567" }),
        json!({ "id": "t2", "full_name": "Marie Curie", "subject": "Chemistry", "email": "curie@school.test" }),
    ]
}

fn classes() -> Vec<Value> {
    vec![
        json!({ "id": "c1", "name": "10A Mathematics", "subject": "Mathematics", "teacher_id": "t1" }),
        json!({ "id": "c2", "name": "11B Chemistry", "subject": "Chemistry", "teacher_id": "t2" }),
    ]
}

fn fees() -> Vec<Value> {
    vec![
        json!({ "id": "f1", "student_id": "s1", "amount": "450.00", "status": "pending", "due_date": day(-3), "description": "Term 2 tuition" }),
        json!({ "id": "f2", "student_id": "s1", "amount": 35, "status": "paid", "due_date": day(-40), "paid_date": day(-42), "description": "Lab fee" }),
        json!({ "id": "f3", "student_id": "s2", "amount": 450, "status": "paid", "due_date": day(-3), "paid_date": day(-10), "description": "Term 2 tuition" }),
        json!({ "id": "f4", "student_id": "s3", "amount": 450, "status": "pending", "due_date": day(14), "description": "Term 2 tuition" }),
        json!({ "id": "f5", "student_id": "s4", "amount": 120, "status": "overdue", "due_date": day(-30), "description": "Field trip" }),
        json!({ "id": "f6", "student_id": "s4", "amount": 450, "status": "paid", "due_date": day(-3), "paid_date": day(-1), "description": "Term 2 tuition" }),
    ]
}

fn grades() -> Vec<Value> {
    vec![
        json!({ "id": "g1", "student_id": "s1", "teacher_id": "t1", "subject": "Mathematics", "score": 80, "max_score": 100, "exam_date": day(-20) }),
        json!({ "id": "g2", "student_id": "s1", "teacher_id": "t2", "subject": "Chemistry", "score": 45, "max_score": 50, "exam_date": day(-12) }),
        json!({ "id": "g3", "student_id": "s1", "teacher_id": "t1", "subject": "Mathematics", "score": "88", "exam_date": day(-5) }),
        json!({ "id": "g4", "student_id": "s3", "teacher_id": "t2", "subject": "Chemistry", "score": 92, "max_score": 100, "exam_date": day(-8) }),
    ]
}

fn attendance() -> Vec<Value> {
    let statuses = ["present", "present", "late", "present", "absent", "present", "present", "present"];
    statuses
        .iter()
        .enumerate()
        .map(|(i, status)| {
            json!({
                "id": format!("a{}", i + 1),
                "student_id": "s1",
                "class_id": "c1",
                "date": day(-(i as i64) - 1),
                "status": status,
                "marked_by": "t1"
            })
        })
        .collect()
}

fn announcements() -> Vec<Value> {
    vec![
        json!({ "id": "n1", "title": "Science fair", "content": "Projects due next Friday.", "author_id": "t2", "created_at": timestamp(-1) }),
        json!({ "id": "n2", "title": "Term 2 fees", "content": "Tuition is due this month.", "author_id": "t1", "created_at": timestamp(-6) }),
        json!({ "id": "n3", "title": "Sports day", "content": "Bring a water bottle.", "author_id": "t1", "created_at": timestamp(-9) }),
        json!({ "id": "n4", "title": "Welcome back", "content": "Term 2 starts Monday.", "author_id": "t1", "created_at": timestamp(-30) }),
    ]
}

pub fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.seed(EntityKind::Student, students());
    backend.seed(EntityKind::Teacher, teachers());
    backend.seed(EntityKind::Class, classes());
    backend.seed(EntityKind::Fee, fees());
    backend.seed(EntityKind::Grade, grades());
    backend.seed(EntityKind::Attendance, attendance());
    backend.seed(EntityKind::Announcement, announcements());
    backend
}

pub fn client() -> SchoolClient {
    SchoolClient::new(Arc::new(backend()), CacheSettings::default())
}
