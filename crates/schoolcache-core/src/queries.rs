//! Named query catalog.
//!
//! Every read the application performs is defined here as a [`QuerySpec`]:
//! the cache key it is stored under and the request that fetches it. Keys
//! start with the entity's table name, so a mutation's invalidation prefix
//! covers every query below it.
//!
//! Queries keyed by an identifier return a validation error for a blank
//! identifier; such queries are never sent.

use chrono::NaiveDate;

use crate::api::{Embed, Filter, OrderBy, SelectRequest};
use crate::query::{QueryError, QueryKey, QueryRequest};
use crate::schema::EntityKind;

/// Default number of payments in the recent payments list.
pub const DEFAULT_RECENT_PAYMENTS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub key: QueryKey,
    pub request: QueryRequest,
}

impl QuerySpec {
    fn list(key: QueryKey, request: SelectRequest) -> Self {
        Self {
            key,
            request: QueryRequest::List(request),
        }
    }

    fn one(key: QueryKey, id: String, embeds: Vec<Embed>) -> Self {
        let entity = key.entity();
        Self {
            key,
            request: QueryRequest::One { entity, id, embeds },
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.key.entity()
    }
}

fn required(entity: EntityKind, what: &str, value: &str) -> Result<String, QueryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(QueryError::validation(format!("{} query requires a {}", entity, what)));
    }
    Ok(value.to_string())
}

fn key(entity: EntityKind, operation: &str) -> QueryKey {
    QueryKey::new(entity, operation)
}

pub mod students {
    use super::*;

    const ENTITY: EntityKind = EntityKind::Student;

    /// Every student with a summary of their fees.
    pub fn all() -> QuerySpec {
        QuerySpec::list(
            key(ENTITY, "all"),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("fees", &["id", "amount", "status", "due_date", "paid_date"]))
                .default_order(),
        )
    }

    pub fn detail(id: &str) -> Result<QuerySpec, QueryError> {
        let id = required(ENTITY, "student id", id)?;
        Ok(QuerySpec::one(
            key(ENTITY, "detail").param(id.as_str()),
            id,
            vec![Embed::all("fees"), Embed::all("grades"), Embed::all("attendance")],
        ))
    }

    /// Students with at least one pending or overdue fee.
    pub fn unpaid_fees() -> QuerySpec {
        QuerySpec::list(
            key(ENTITY, "unpaid-fees"),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("fees", &["id", "amount", "status", "due_date"]).inner())
                .filter(Filter::is_in("status", ["pending", "overdue"]).on("fees"))
                .default_order(),
        )
    }
}

pub mod teachers {
    use super::*;

    const ENTITY: EntityKind = EntityKind::Teacher;

    pub fn all() -> QuerySpec {
        QuerySpec::list(key(ENTITY, "all"), SelectRequest::new(ENTITY).default_order())
    }

    pub fn detail(id: &str) -> Result<QuerySpec, QueryError> {
        let id = required(ENTITY, "teacher id", id)?;
        Ok(QuerySpec::one(
            key(ENTITY, "detail").param(id.as_str()),
            id,
            vec![Embed::all("classes")],
        ))
    }
}

pub mod classes {
    use super::*;

    const ENTITY: EntityKind = EntityKind::Class;

    pub fn all() -> QuerySpec {
        QuerySpec::list(
            key(ENTITY, "all"),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("teachers", &["full_name", "subject"]))
                .default_order(),
        )
    }

    pub fn detail(id: &str) -> Result<QuerySpec, QueryError> {
        let id = required(ENTITY, "class id", id)?;
        Ok(QuerySpec::one(
            key(ENTITY, "detail").param(id.as_str()),
            id,
            vec![Embed::columns("teachers", &["full_name", "subject", "email", "phone"])],
        ))
    }

    pub fn for_teacher(teacher_id: &str) -> Result<QuerySpec, QueryError> {
        let teacher_id = required(ENTITY, "teacher id", teacher_id)?;
        Ok(QuerySpec::list(
            key(ENTITY, "teacher").param(teacher_id.as_str()),
            SelectRequest::new(ENTITY)
                .filter(Filter::eq("teacher_id", teacher_id))
                .default_order(),
        ))
    }
}

pub mod assignments {
    use super::*;

    const ENTITY: EntityKind = EntityKind::Assignment;

    pub fn all() -> QuerySpec {
        QuerySpec::list(
            key(ENTITY, "all"),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("teachers", &["full_name"]))
                .default_order(),
        )
    }

    pub fn detail(id: &str) -> Result<QuerySpec, QueryError> {
        let id = required(ENTITY, "assignment id", id)?;
        Ok(QuerySpec::one(
            key(ENTITY, "detail").param(id.as_str()),
            id,
            vec![Embed::columns("teachers", &["full_name", "email"])],
        ))
    }

    /// Assignments set for a class label such as "10A".
    pub fn for_class(class_label: &str) -> Result<QuerySpec, QueryError> {
        let class_label = required(ENTITY, "class", class_label)?;
        Ok(QuerySpec::list(
            key(ENTITY, "class").param(class_label.as_str()),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("teachers", &["full_name"]))
                .filter(Filter::eq("class", class_label))
                .default_order(),
        ))
    }
}

pub mod attendance {
    use super::*;

    const ENTITY: EntityKind = EntityKind::Attendance;

    pub fn all() -> QuerySpec {
        QuerySpec::list(
            key(ENTITY, "all"),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("students", &["full_name", "student_id", "class"]))
                .embed(Embed::columns("classes", &["name", "subject"]))
                .embed(Embed::columns("teachers", &["full_name"]))
                .default_order(),
        )
    }

    pub fn for_student(student_id: &str) -> Result<QuerySpec, QueryError> {
        let student_id = required(ENTITY, "student id", student_id)?;
        Ok(QuerySpec::list(
            key(ENTITY, "student").param(student_id.as_str()),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("classes", &["name", "subject"]))
                .filter(Filter::eq("student_id", student_id))
                .default_order(),
        ))
    }

    /// One day's register, ordered by student name.
    pub fn on_date(date: NaiveDate) -> QuerySpec {
        let day = date.format("%Y-%m-%d").to_string();
        QuerySpec::list(
            key(ENTITY, "date").param(day.as_str()),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("students", &["full_name", "student_id", "class"]))
                .filter(Filter::eq("date", day))
                .order(OrderBy::asc("full_name").on("students")),
        )
    }
}

pub mod fees {
    use super::*;

    const ENTITY: EntityKind = EntityKind::Fee;

    pub fn all() -> QuerySpec {
        QuerySpec::list(
            key(ENTITY, "all"),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("students", &["full_name", "student_id", "class"]))
                .default_order(),
        )
    }

    pub fn for_student(student_id: &str) -> Result<QuerySpec, QueryError> {
        let student_id = required(ENTITY, "student id", student_id)?;
        Ok(QuerySpec::list(
            key(ENTITY, "student").param(student_id.as_str()),
            SelectRequest::new(ENTITY)
                .filter(Filter::eq("student_id", student_id))
                .default_order(),
        ))
    }

    /// Most recent paid fees, newest payment first.
    pub fn recent_payments(limit: usize) -> QuerySpec {
        QuerySpec::list(
            key(ENTITY, "recent-payments").param(limit),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("students", &["full_name", "student_id"]))
                .filter(Filter::eq("status", "paid"))
                .filter(Filter::not_null("paid_date"))
                .order(OrderBy::desc("paid_date"))
                .limit(limit),
        )
    }
}

pub mod grades {
    use super::*;

    const ENTITY: EntityKind = EntityKind::Grade;

    pub fn all() -> QuerySpec {
        QuerySpec::list(
            key(ENTITY, "all"),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("students", &["full_name", "student_id", "class"]))
                .embed(Embed::columns("teachers", &["full_name"]))
                .default_order(),
        )
    }

    pub fn for_student(student_id: &str) -> Result<QuerySpec, QueryError> {
        let student_id = required(ENTITY, "student id", student_id)?;
        Ok(QuerySpec::list(
            key(ENTITY, "student").param(student_id.as_str()),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("teachers", &["full_name"]))
                .filter(Filter::eq("student_id", student_id))
                .default_order(),
        ))
    }
}

pub mod announcements {
    use super::*;

    const ENTITY: EntityKind = EntityKind::Announcement;

    pub fn all() -> QuerySpec {
        QuerySpec::list(
            key(ENTITY, "all"),
            SelectRequest::new(ENTITY)
                .embed(Embed::columns("profiles", &["full_name"]))
                .default_order(),
        )
    }

    pub fn detail(id: &str) -> Result<QuerySpec, QueryError> {
        let id = required(ENTITY, "announcement id", id)?;
        Ok(QuerySpec::one(
            key(ENTITY, "detail").param(id.as_str()),
            id,
            vec![Embed::columns("profiles", &["full_name"])],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryExecutor;

    fn select(spec: &QuerySpec) -> &SelectRequest {
        match spec.request {
            QueryRequest::List(ref request) => request,
            QueryRequest::One { .. } => panic!("expected a list query"),
        }
    }

    #[test]
    fn test_keys_render_under_table_namespace() {
        assert_eq!(students::all().key.to_string(), "students/all");
        assert_eq!(students::unpaid_fees().key.to_string(), "students/unpaid-fees");
        assert_eq!(
            fees::recent_payments(DEFAULT_RECENT_PAYMENTS).key.to_string(),
            "fees/recent-payments/10"
        );
        assert_eq!(
            grades::for_student("s1").unwrap().key.to_string(),
            "grades/student/s1"
        );
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(attendance::on_date(date).key.to_string(), "attendance/date/2024-03-04");
    }

    #[test]
    fn test_blank_ids_are_validation_errors() {
        assert!(matches!(students::detail(""), Err(QueryError::Validation(_))));
        assert!(matches!(fees::for_student("   "), Err(QueryError::Validation(_))));
        assert!(matches!(classes::for_teacher(""), Err(QueryError::Validation(_))));
        assert!(matches!(assignments::for_class(""), Err(QueryError::Validation(_))));
    }

    #[test]
    fn test_unpaid_fees_shape() {
        let spec = students::unpaid_fees();
        assert_eq!(
            select(&spec).to_query_pairs(),
            vec![
                (
                    "select".to_string(),
                    "*,fees!inner(id,amount,status,due_date)".to_string()
                ),
                ("fees.status".to_string(), "in.(pending,overdue)".to_string()),
                ("order".to_string(), "full_name.asc".to_string()),
            ]
        );
    }

    #[test]
    fn test_recent_payments_shape() {
        let spec = fees::recent_payments(5);
        let pairs = select(&spec).to_query_pairs();
        assert!(pairs.contains(&("status".to_string(), "eq.paid".to_string())));
        assert!(pairs.contains(&("paid_date".to_string(), "not.is.null".to_string())));
        assert!(pairs.contains(&("order".to_string(), "paid_date.desc".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "5".to_string())));
    }

    #[test]
    fn test_catalog_requests_validate_against_schema() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let lists = [
            students::all(),
            students::unpaid_fees(),
            teachers::all(),
            classes::all(),
            assignments::all(),
            attendance::all(),
            attendance::on_date(date),
            fees::all(),
            fees::recent_payments(10),
            grades::all(),
            announcements::all(),
        ];
        for spec in &lists {
            assert!(QueryExecutor::validate(select(spec)).is_ok(), "{}", spec.key);
        }
    }

    #[test]
    fn test_detail_is_single_row_request() {
        let spec = students::detail("s1").unwrap();
        match spec.request {
            QueryRequest::One { entity, ref id, ref embeds } => {
                assert_eq!(entity, EntityKind::Student);
                assert_eq!(id, "s1");
                assert_eq!(embeds.len(), 3);
            }
            QueryRequest::List(_) => panic!("expected a detail query"),
        }
    }
}
