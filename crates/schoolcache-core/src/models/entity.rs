//! The closed set of entity records and conversions from raw rows.

use serde::{de::DeserializeOwned, Serialize};

use super::{Announcement, Assignment, Attendance, Class, Fee, Grade, Student, Teacher};
use crate::schema::EntityKind;

/// A raw row as exchanged with the storage backend.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Implemented by every typed entity record.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn into_entity(self) -> Entity;

    fn from_entity(entity: &Entity) -> Option<&Self>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Student(Student),
    Teacher(Teacher),
    Class(Class),
    Assignment(Assignment),
    Attendance(Attendance),
    Fee(Fee),
    Grade(Grade),
    Announcement(Announcement),
}

impl Entity {
    /// Decode a row into the typed record for `kind`.
    pub fn from_row(kind: EntityKind, row: Row) -> Result<Self, serde_json::Error> {
        let value = serde_json::Value::Object(row);
        Ok(match kind {
            EntityKind::Student => Entity::Student(serde_json::from_value(value)?),
            EntityKind::Teacher => Entity::Teacher(serde_json::from_value(value)?),
            EntityKind::Class => Entity::Class(serde_json::from_value(value)?),
            EntityKind::Assignment => Entity::Assignment(serde_json::from_value(value)?),
            EntityKind::Attendance => Entity::Attendance(serde_json::from_value(value)?),
            EntityKind::Fee => Entity::Fee(serde_json::from_value(value)?),
            EntityKind::Grade => Entity::Grade(serde_json::from_value(value)?),
            EntityKind::Announcement => Entity::Announcement(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Student(_) => EntityKind::Student,
            Entity::Teacher(_) => EntityKind::Teacher,
            Entity::Class(_) => EntityKind::Class,
            Entity::Assignment(_) => EntityKind::Assignment,
            Entity::Attendance(_) => EntityKind::Attendance,
            Entity::Fee(_) => EntityKind::Fee,
            Entity::Grade(_) => EntityKind::Grade,
            Entity::Announcement(_) => EntityKind::Announcement,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Student(r) => &r.id,
            Entity::Teacher(r) => &r.id,
            Entity::Class(r) => &r.id,
            Entity::Assignment(r) => &r.id,
            Entity::Attendance(r) => &r.id,
            Entity::Fee(r) => &r.id,
            Entity::Grade(r) => &r.id,
            Entity::Announcement(r) => &r.id,
        }
    }

    pub fn as_record<T: Record>(&self) -> Option<&T> {
        T::from_entity(self)
    }
}

macro_rules! impl_record {
    ($ty:ident, $kind:ident) => {
        impl Record for $ty {
            const KIND: EntityKind = EntityKind::$kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn into_entity(self) -> Entity {
                Entity::$kind(self)
            }

            fn from_entity(entity: &Entity) -> Option<&Self> {
                match entity {
                    Entity::$kind(record) => Some(record),
                    _ => None,
                }
            }
        }
    };
}

impl_record!(Student, Student);
impl_record!(Teacher, Teacher);
impl_record!(Class, Class);
impl_record!(Assignment, Assignment);
impl_record!(Attendance, Attendance);
impl_record!(Fee, Fee);
impl_record!(Grade, Grade);
impl_record!(Announcement, Announcement);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_from_row_dispatches_on_kind() {
        let entity = Entity::from_row(
            EntityKind::Grade,
            row(json!({ "id": "g1", "subject": "History", "score": 64 })),
        )
        .unwrap();
        assert_eq!(entity.kind(), EntityKind::Grade);
        assert_eq!(entity.id(), "g1");
        let grade: &Grade = entity.as_record().unwrap();
        assert_eq!(grade.score, 64.0);
        assert!(entity.as_record::<Fee>().is_none());
    }

    #[test]
    fn test_from_row_reports_decode_errors() {
        let result = Entity::from_row(EntityKind::Fee, row(json!({ "status": "refunded" })));
        assert!(result.is_err());
    }
}
