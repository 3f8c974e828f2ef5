//! Storage request descriptions.
//!
//! A `SelectRequest` names an entity table, a column projection with nested
//! relation embeds, a conjunction of filters, an optional ordering and an
//! optional row limit. Backends translate it into their own dialect; the
//! REST backend renders it as PostgREST query parameters.

use std::cmp::Ordering;

use serde_json::Value;

use crate::models::Row;
use crate::schema::EntityKind;

// ============================================================================
// Filters
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    Neq(Value),
    In(Vec<Value>),
    IsNull,
    NotNull,
}

/// A predicate over a column of the queried entity, or over a column of an
/// embedded relation when `relation` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub relation: Option<String>,
    pub column: String,
    pub op: FilterOp,
}

impl Filter {
    fn new(column: impl Into<String>, op: FilterOp) -> Self {
        Self {
            relation: None,
            column: column.into(),
            op,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq(value.into()))
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Neq(value.into()))
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(column, FilterOp::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, FilterOp::IsNull)
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self::new(column, FilterOp::NotNull)
    }

    /// Scope the filter to an embedded relation.
    pub fn on(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Evaluate against a row with SQL null semantics: comparisons against a
    /// missing or null column never match.
    pub fn matches(&self, row: &Row) -> bool {
        let value = row.get(&self.column).unwrap_or(&Value::Null);
        match &self.op {
            FilterOp::Eq(expected) => !value.is_null() && values_equal(value, expected),
            FilterOp::Neq(expected) => !value.is_null() && !values_equal(value, expected),
            FilterOp::In(options) => {
                !value.is_null() && options.iter().any(|o| values_equal(value, o))
            }
            FilterOp::IsNull => value.is_null(),
            FilterOp::NotNull => !value.is_null(),
        }
    }

    fn path(&self) -> String {
        match &self.relation {
            Some(relation) => format!("{}.{}", relation, self.column),
            None => self.column.clone(),
        }
    }

    fn encode(&self) -> String {
        match &self.op {
            FilterOp::Eq(v) => format!("eq.{}", encode_value(v)),
            FilterOp::Neq(v) => format!("neq.{}", encode_value(v)),
            FilterOp::In(values) => {
                let items: Vec<String> = values.iter().map(encode_list_item).collect();
                format!("in.({})", items.join(","))
            }
            FilterOp::IsNull => "is.null".to_string(),
            FilterOp::NotNull => "not.is.null".to_string(),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn encode_list_item(value: &Value) -> String {
    let raw = encode_value(value);
    if raw.contains([',', '(', ')', '"']) {
        format!("\"{}\"", raw.replace('"', "\\\""))
    } else {
        raw
    }
}

/// Order two column values the way the store does: nulls sort after every
/// other value in ascending order.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

// ============================================================================
// Projection
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Columns {
    #[default]
    All,
    Only(Vec<String>),
}

impl Columns {
    pub fn only(columns: &[&str]) -> Self {
        Columns::Only(columns.iter().map(|c| c.to_string()).collect())
    }

    fn render(&self) -> String {
        match self {
            Columns::All => "*".to_string(),
            Columns::Only(columns) => columns.join(","),
        }
    }

    /// Copy the selected columns out of a stored row.
    pub fn project(&self, row: &Row) -> Row {
        match self {
            Columns::All => row.clone(),
            Columns::Only(columns) => columns
                .iter()
                .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                .collect(),
        }
    }
}

/// A relation to embed into each returned row.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub relation: String,
    pub columns: Columns,
    /// Inner joins drop parents that have no matching related row.
    pub inner: bool,
    pub embeds: Vec<Embed>,
}

impl Embed {
    pub fn all(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            columns: Columns::All,
            inner: false,
            embeds: Vec::new(),
        }
    }

    pub fn columns(relation: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            columns: Columns::only(columns),
            ..Self::all(relation)
        }
    }

    pub fn inner(mut self) -> Self {
        self.inner = true;
        self
    }

    pub fn embed(mut self, nested: Embed) -> Self {
        self.embeds.push(nested);
        self
    }

    fn render(&self, parent: EntityKind) -> String {
        let relation = parent.schema().relation(&self.relation);
        let mut out = self.relation.clone();
        if let Some(hint) = relation.and_then(|r| r.hint) {
            out.push(':');
            out.push_str(hint);
        }
        if self.inner {
            out.push_str("!inner");
        }
        let mut parts = vec![self.columns.render()];
        if let Some(relation) = relation {
            parts.extend(self.embeds.iter().map(|e| e.render(relation.target)));
        }
        out.push('(');
        out.push_str(&parts.join(","));
        out.push(')');
        out
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Order by a column of an embedded to-one relation instead of the row.
    pub relation: Option<String>,
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            relation: None,
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            ascending: false,
            ..Self::asc(column)
        }
    }

    pub fn on(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    fn render(&self) -> String {
        let direction = if self.ascending { "asc" } else { "desc" };
        match &self.relation {
            Some(relation) => format!("{}({}).{}", relation, self.column, direction),
            None => format!("{}.{}", self.column, direction),
        }
    }
}

// ============================================================================
// Select
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    pub entity: EntityKind,
    pub columns: Columns,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl SelectRequest {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            columns: Columns::All,
            embeds: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Columns::only(columns);
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    /// Order by the entity's default sort field.
    pub fn default_order(self) -> Self {
        let default = self.entity.schema().default_order;
        let order = if default.ascending {
            OrderBy::asc(default.field)
        } else {
            OrderBy::desc(default.field)
        };
        self.order(order)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn embed_named(&self, relation: &str) -> Option<&Embed> {
        self.embeds.iter().find(|e| e.relation == relation)
    }

    /// Top-level filters on the entity's own columns.
    pub fn row_filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().filter(|f| f.relation.is_none())
    }

    /// Filters scoped to the given embedded relation.
    pub fn relation_filters<'a>(&'a self, relation: &'a str) -> impl Iterator<Item = &'a Filter> {
        self.filters
            .iter()
            .filter(move |f| f.relation.as_deref() == Some(relation))
    }

    pub fn select_clause(&self) -> String {
        let mut parts = vec![self.columns.render()];
        parts.extend(self.embeds.iter().map(|e| e.render(self.entity)));
        parts.join(",")
    }

    /// Render as PostgREST query parameters.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select_clause())];
        pairs.extend(self.filters.iter().map(|f| (f.path(), f.encode())));
        if let Some(ref order) = self.order {
            pairs.push(("order".to_string(), order.render()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_unpaid_fees_request_renders() {
        let request = SelectRequest::new(EntityKind::Student)
            .embed(Embed::columns("fees", &["id", "amount", "status", "due_date"]).inner())
            .filter(Filter::is_in("status", ["pending", "overdue"]).on("fees"))
            .order(OrderBy::asc("full_name"));

        assert_eq!(
            request.to_query_pairs(),
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
    fn test_hinted_and_nested_embeds_render() {
        let request = SelectRequest::new(EntityKind::Attendance)
            .embed(Embed::columns("teachers", &["full_name"]))
            .embed(Embed::columns("students", &["full_name"]).embed(Embed::all("fees")));
        assert_eq!(
            request.select_clause(),
            "*,teachers:marked_by(full_name),students(full_name,fees(*))"
        );
    }

    #[test]
    fn test_null_and_limit_rendering() {
        let request = SelectRequest::new(EntityKind::Fee)
            .filter(Filter::eq("status", "paid"))
            .filter(Filter::not_null("paid_date"))
            .order(OrderBy::desc("paid_date"))
            .limit(10);
        let pairs = request.to_query_pairs();
        assert!(pairs.contains(&("status".to_string(), "eq.paid".to_string())));
        assert!(pairs.contains(&("paid_date".to_string(), "not.is.null".to_string())));
        assert!(pairs.contains(&("order".to_string(), "paid_date.desc".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "10".to_string())));
    }

    #[test]
    fn test_relation_order_renders() {
        let order = OrderBy::asc("full_name").on("students");
        assert_eq!(order.render(), "students(full_name).asc");
    }

    #[test]
    fn test_filter_matches_with_null_semantics() {
        let fee = row(json!({ "status": "pending", "amount": 50, "paid_date": null }));
        assert!(Filter::eq("status", "pending").matches(&fee));
        assert!(Filter::eq("amount", 50.0).matches(&fee));
        assert!(Filter::is_in("status", ["pending", "overdue"]).matches(&fee));
        assert!(Filter::is_null("paid_date").matches(&fee));
        assert!(!Filter::not_null("paid_date").matches(&fee));
        assert!(!Filter::neq("paid_date", "2024-01-01").matches(&fee));
        assert!(!Filter::eq("missing", "x").matches(&fee));
    }

    #[test]
    fn test_list_items_with_commas_are_quoted() {
        let filter = Filter::is_in("class", ["10A", "Year 9, B"]);
        assert_eq!(filter.encode(), "in.(10A,\"Year 9, B\")");
    }

    #[test]
    fn test_compare_values_puts_nulls_last() {
        assert_eq!(compare_values(&json!(null), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(
            compare_values(&json!("2024-01-02"), &json!("2024-01-10")),
            Ordering::Less
        );
    }
}
