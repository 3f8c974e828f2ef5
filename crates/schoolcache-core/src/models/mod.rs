//! Data models for school entities.
//!
//! This module contains the typed records returned by the store:
//!
//! - `Student`: enrolled students with embedded fees, grades and attendance
//! - `Teacher`, `Class`, `Assignment`: staff and teaching structure
//! - `Attendance`, `Fee`, `Grade`: per-student records
//! - `Announcement`: school-wide notices with an embedded author profile
//! - `Entity`: the closed union over all of the above
//!
//! Relation fields are `None` when the query did not request the join and
//! `Some` (possibly empty) when it did.

pub mod announcement;
pub mod entity;
pub mod records;
pub mod staff;
pub mod student;

mod numeric;

pub use announcement::{Announcement, AuthorProfile};
pub use entity::{Entity, Record, Row};
pub use records::{Attendance, AttendanceStatus, Fee, FeeStatus, Grade};
pub use staff::{Assignment, Class, Teacher};
pub use student::Student;
