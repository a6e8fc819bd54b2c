//! The hierarchical database shared by every template evaluation.
//!
//! Values are plain `serde_json` values. The run holds a single [`Database`]
//! handle; clones of it point at the same data, so writes made while
//! rendering one file (see [`Database::set`]) are visible to every later
//! evaluation. Renders are strictly sequential; nothing may depend on the
//! order in which sibling files observe those writes.

pub mod load;

use crate::error::{DbError, address};
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Clone, Debug)]
pub struct Database(Arc<RwLock<Value>>);

impl Database {
    pub fn new(root: Map<String, Value>) -> Self {
        Self(Arc::new(RwLock::new(Value::Object(root))))
    }

    /// Copy of the current state, for handing to the template engine.
    pub fn snapshot(&self) -> Value {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Overwrite a single top-level key.
    pub fn set(&self, key: &str, value: Value) {
        let mut root = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if let Value::Object(map) = &mut *root {
            map.insert(key.to_owned(), value);
        }
    }

    /// Clone of the value at `xs`.
    pub fn get(&self, xs: &[String]) -> Result<Value, DbError> {
        let root = self.0.read().unwrap_or_else(PoisonError::into_inner);
        lookup(&root, xs).cloned()
    }
}

/// Store `y` at address `xs` under `root`, creating intermediate mappings.
///
/// When both `y` and the value already at `xs` are mappings, `y`'s keys are
/// merged into the existing mapping (one level, `y` wins). In every other case
/// `y` replaces what was there.
pub fn store(root: &mut Map<String, Value>, xs: &[String], y: Value) -> Result<(), DbError> {
    let Some((last, parents)) = xs.split_last() else {
        return Err(DbError::NotFound(String::from("<empty address>")));
    };

    let mut p = root;
    for (n, x) in parents.iter().enumerate() {
        let q = p
            .entry(x.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        p = match q {
            Value::Object(m) => m,
            _ => return Err(DbError::CannotDescend(address(&xs[..=n]))),
        };
    }

    let slot = p.entry(last.clone()).or_insert(Value::Null);
    match (slot, y) {
        (Value::Object(q), Value::Object(z)) => q.extend(z),
        (slot, y) => *slot = y,
    }

    Ok(())
}

/// Borrow the value at address `xs`.
///
/// Absence anywhere along the way is [`DbError::NotFound`]; reaching a
/// non-mapping before the address is exhausted is [`DbError::CannotDescend`].
pub fn lookup<'a>(root: &'a Value, xs: &[String]) -> Result<&'a Value, DbError> {
    let mut p = root;
    for (n, x) in xs.iter().enumerate() {
        let Value::Object(m) = p else {
            return Err(DbError::CannotDescend(address(&xs[..n])));
        };
        p = m.get(x).ok_or_else(|| DbError::NotFound(address(&xs[..=n])))?;
    }
    Ok(p)
}
