//! Static entity schema registry.
//!
//! Describes every entity table the school store exposes: its identifier
//! column, default ordering, and the relations that can be embedded into
//! query results. The query executor validates join requests against this
//! table, the in-memory backend resolves foreign keys through it, and the
//! invalidation graph is derived from the relations flagged as summaries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Max score assumed for a grade row that does not carry one.
pub const DEFAULT_MAX_SCORE: f64 = 100.0;

/// Identifier column shared by every table.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Student,
    Teacher,
    Class,
    Assignment,
    Attendance,
    Fee,
    Grade,
    Announcement,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Student,
        EntityKind::Teacher,
        EntityKind::Class,
        EntityKind::Assignment,
        EntityKind::Attendance,
        EntityKind::Fee,
        EntityKind::Grade,
        EntityKind::Announcement,
    ];

    /// Remote table name, also used as the cache key namespace.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Student => "students",
            EntityKind::Teacher => "teachers",
            EntityKind::Class => "classes",
            EntityKind::Assignment => "assignments",
            EntityKind::Attendance => "attendance",
            EntityKind::Fee => "fees",
            EntityKind::Grade => "grades",
            EntityKind::Announcement => "announcements",
        }
    }

    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.table() == table)
    }

    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            EntityKind::Student => &STUDENT,
            EntityKind::Teacher => &TEACHER,
            EntityKind::Class => &CLASS,
            EntityKind::Assignment => &ASSIGNMENT,
            EntityKind::Attendance => &ATTENDANCE,
            EntityKind::Fee => &FEE,
            EntityKind::Grade => &GRADE,
            EntityKind::Announcement => &ANNOUNCEMENT,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Embedded as a single object (`null` when no row matches).
    One,
    /// Embedded as an array, possibly empty.
    Many,
}

/// A relation that can be embedded into a parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Key under which the related rows appear in the parent.
    pub name: &'static str,
    pub target: EntityKind,
    pub cardinality: Cardinality,
    /// For `One`, the column on the parent; for `Many`, the column on the target.
    pub foreign_key: &'static str,
    /// Foreign-key hint rendered as `name:hint(...)` when the embed name
    /// does not identify the join column on its own.
    pub hint: Option<&'static str>,
    /// The parent's list queries embed a summary of this relation, so a
    /// mutation of the target must also invalidate the parent.
    pub embeds_summary: bool,
}

impl Relation {
    const fn one(name: &'static str, target: EntityKind, foreign_key: &'static str) -> Self {
        Self {
            name,
            target,
            cardinality: Cardinality::One,
            foreign_key,
            hint: None,
            embeds_summary: false,
        }
    }

    const fn many(name: &'static str, target: EntityKind, foreign_key: &'static str) -> Self {
        Self {
            name,
            target,
            cardinality: Cardinality::Many,
            foreign_key,
            hint: None,
            embeds_summary: false,
        }
    }

    const fn hinted(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    const fn summary(mut self) -> Self {
        self.embeds_summary = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultOrder {
    pub field: &'static str,
    pub ascending: bool,
}

#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub id_field: &'static str,
    pub default_order: DefaultOrder,
    pub relations: &'static [Relation],
}

impl EntitySchema {
    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Entity kinds whose schema embeds a summary of `self.kind`.
    pub fn summary_parents(&self) -> impl Iterator<Item = EntityKind> + '_ {
        EntityKind::ALL.into_iter().filter(move |parent| {
            parent
                .schema()
                .relations
                .iter()
                .any(|r| r.target == self.kind && r.embeds_summary)
        })
    }
}

const fn order(field: &'static str, ascending: bool) -> DefaultOrder {
    DefaultOrder { field, ascending }
}

static STUDENT: EntitySchema = EntitySchema {
    kind: EntityKind::Student,
    id_field: ID_FIELD,
    default_order: order("full_name", true),
    relations: &[
        Relation::many("fees", EntityKind::Fee, "student_id").summary(),
        Relation::many("grades", EntityKind::Grade, "student_id"),
        Relation::many("attendance", EntityKind::Attendance, "student_id"),
    ],
};

static TEACHER: EntitySchema = EntitySchema {
    kind: EntityKind::Teacher,
    id_field: ID_FIELD,
    default_order: order("full_name", true),
    relations: &[Relation::many("classes", EntityKind::Class, "teacher_id")],
};

static CLASS: EntitySchema = EntitySchema {
    kind: EntityKind::Class,
    id_field: ID_FIELD,
    default_order: order("name", true),
    relations: &[Relation::one("teachers", EntityKind::Teacher, "teacher_id")],
};

static ASSIGNMENT: EntitySchema = EntitySchema {
    kind: EntityKind::Assignment,
    id_field: ID_FIELD,
    default_order: order("due_date", true),
    relations: &[Relation::one("teachers", EntityKind::Teacher, "teacher_id")],
};

static ATTENDANCE: EntitySchema = EntitySchema {
    kind: EntityKind::Attendance,
    id_field: ID_FIELD,
    default_order: order("date", false),
    relations: &[
        Relation::one("students", EntityKind::Student, "student_id"),
        Relation::one("classes", EntityKind::Class, "class_id"),
        Relation::one("teachers", EntityKind::Teacher, "marked_by").hinted("marked_by"),
    ],
};

static FEE: EntitySchema = EntitySchema {
    kind: EntityKind::Fee,
    id_field: ID_FIELD,
    default_order: order("due_date", false),
    relations: &[Relation::one("students", EntityKind::Student, "student_id")],
};

static GRADE: EntitySchema = EntitySchema {
    kind: EntityKind::Grade,
    id_field: ID_FIELD,
    default_order: order("exam_date", false),
    relations: &[
        Relation::one("students", EntityKind::Student, "student_id"),
        Relation::one("teachers", EntityKind::Teacher, "teacher_id"),
    ],
};

static ANNOUNCEMENT: EntitySchema = EntitySchema {
    kind: EntityKind::Announcement,
    id_field: ID_FIELD,
    default_order: order("created_at", false),
    relations: &[Relation::one("profiles", EntityKind::Teacher, "author_id").hinted("author_id")],
};
