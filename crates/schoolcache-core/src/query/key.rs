//! Cache keys and key prefixes.
//!
//! A key is (entity, operation, parameters). Keys render as slash-joined
//! paths like `students/detail/s1`, which is also how they show up in logs.

use std::fmt;

use crate::schema::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyParam {
    Text(String),
    Int(i64),
}

impl fmt::Display for KeyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyParam::Text(s) => f.write_str(s),
            KeyParam::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for KeyParam {
    fn from(value: &str) -> Self {
        KeyParam::Text(value.to_string())
    }
}

impl From<String> for KeyParam {
    fn from(value: String) -> Self {
        KeyParam::Text(value)
    }
}

impl From<i64> for KeyParam {
    fn from(value: i64) -> Self {
        KeyParam::Int(value)
    }
}

impl From<usize> for KeyParam {
    fn from(value: usize) -> Self {
        KeyParam::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    entity: EntityKind,
    operation: String,
    params: Vec<KeyParam>,
}

impl QueryKey {
    pub fn new(entity: EntityKind, operation: impl Into<String>) -> Self {
        Self {
            entity,
            operation: operation.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: impl Into<KeyParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn params(&self) -> &[KeyParam] {
        &self.params
    }

    pub fn starts_with(&self, prefix: &KeyPrefix) -> bool {
        if self.entity != prefix.entity {
            return false;
        }
        match prefix.operation {
            None => true,
            Some(ref op) => op == &self.operation && self.params.starts_with(&prefix.params),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity, self.operation)?;
        for param in &self.params {
            write!(f, "/{}", param)?;
        }
        Ok(())
    }
}

/// Matches every key that begins with the given components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    entity: EntityKind,
    operation: Option<String>,
    params: Vec<KeyParam>,
}

impl KeyPrefix {
    /// Every key of an entity namespace.
    pub fn entity(entity: EntityKind) -> Self {
        Self {
            entity,
            operation: None,
            params: Vec::new(),
        }
    }

    pub fn operation(entity: EntityKind, operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Self::entity(entity)
        }
    }

    /// Narrow an operation prefix by a parameter. No-op on an entity prefix.
    pub fn param(mut self, param: impl Into<KeyParam>) -> Self {
        if self.operation.is_some() {
            self.params.push(param.into());
        }
        self
    }

    pub fn target(&self) -> EntityKind {
        self.entity
    }
}

impl From<EntityKind> for KeyPrefix {
    fn from(entity: EntityKind) -> Self {
        KeyPrefix::entity(entity)
    }
}

impl From<&QueryKey> for KeyPrefix {
    fn from(key: &QueryKey) -> Self {
        Self {
            entity: key.entity,
            operation: Some(key.operation.clone()),
            params: key.params.clone(),
        }
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity)?;
        if let Some(ref op) = self.operation {
            write!(f, "/{}", op)?;
        }
        for param in &self.params {
            write!(f, "/{}", param)?;
        }
        Ok(())
    }
}
