use crate::api::{Embed, SelectRequest};
use crate::models::{Entity, Record};
use crate::schema::EntityKind;

/// What a cache entry fetches.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRequest {
    List(SelectRequest),
    One {
        entity: EntityKind,
        id: String,
        embeds: Vec<Embed>,
    },
}

impl QueryRequest {
    pub fn entity(&self) -> EntityKind {
        match self {
            QueryRequest::List(request) => request.entity,
            QueryRequest::One { entity, .. } => *entity,
        }
    }
}

/// Normalized result of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    List(Vec<Entity>),
    One(Entity),
}

impl QueryData {
    pub fn entities(&self) -> &[Entity] {
        match self {
            QueryData::List(entities) => entities,
            QueryData::One(entity) => std::slice::from_ref(entity),
        }
    }

    pub fn len(&self) -> usize {
        self.entities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities().is_empty()
    }

    /// Typed view over the records of kind `T`.
    pub fn records<T: Record>(&self) -> impl Iterator<Item = &T> {
        self.entities().iter().filter_map(T::from_entity)
    }

    /// Owned copies of the records of kind `T`.
    pub fn to_records<T: Record>(&self) -> Vec<T> {
        self.records::<T>().cloned().collect()
    }

    /// The single record of a detail query.
    pub fn one<T: Record>(&self) -> Option<&T> {
        match self {
            QueryData::One(entity) => T::from_entity(entity),
            QueryData::List(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fee, Student};

    #[test]
    fn test_typed_views() {
        let data = QueryData::List(vec![
            Entity::Fee(Fee {
                id: "f1".to_string(),
                ..Default::default()
            }),
            Entity::Fee(Fee {
                id: "f2".to_string(),
                ..Default::default()
            }),
        ]);
        assert_eq!(data.len(), 2);
        let ids: Vec<&str> = data.records::<Fee>().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2"]);
        assert_eq!(data.records::<Student>().count(), 0);
        assert!(data.one::<Fee>().is_none());

        let detail = QueryData::One(Entity::Student(Student {
            id: "s1".to_string(),
            ..Default::default()
        }));
        assert_eq!(detail.one::<Student>().unwrap().id, "s1");
        assert_eq!(detail.entities().len(), 1);
    }
}
