//! Export bookkeeping.
//!
//! Export names are global per account and region, so two stacks deployed
//! into the same environment must never publish the same name. The
//! [`ExportLedger`] records which stack, component and output produced each
//! name and rejects the second producer.

use core::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// One rendered export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    /// The rendered export name (e.g. `dev-DynamoDb-TableName`).
    pub name: String,
    /// The composition that was built.
    pub stack: String,
    /// The component producing the value.
    pub component: String,
    /// The output name on that component.
    pub output: String,
}

impl fmt::Display for ExportRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.stack, self.component, self.output)
    }
}

/// Two producers rendered the same export name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("export '{}' is produced by both {existing} and {conflicting}", existing.name)]
pub struct ExportCollision {
    /// The record registered first.
    pub existing: Box<ExportRecord>,
    /// The record that collided with it.
    pub conflicting: Box<ExportRecord>,
}

impl ExportCollision {
    fn new(existing: &ExportRecord, conflicting: &ExportRecord) -> Self {
        Self {
            existing: Box::new(existing.clone()),
            conflicting: Box::new(conflicting.clone()),
        }
    }

    /// Returns the colliding export name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.existing.name
    }
}

/// Export names registered for one target environment.
///
/// # Example
///
/// ```
/// use cfcompose_graph::export::{ExportLedger, ExportRecord};
///
/// let record = |stack: &str| ExportRecord {
///     name: "dev-ApiUrl".to_string(),
///     stack: stack.to_string(),
///     component: "httpapi".to_string(),
///     output: "ApiUrl".to_string(),
/// };
///
/// let mut ledger = ExportLedger::new();
/// ledger.register(record("amis")).unwrap();
/// assert!(ledger.register(record("amis-without-table")).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExportLedger {
    entries: IndexMap<String, ExportRecord>,
}

impl ExportLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a single export.
    ///
    /// # Errors
    ///
    /// Returns [`ExportCollision`] if the name is already taken; the ledger is
    /// left unchanged.
    pub fn register(&mut self, record: ExportRecord) -> Result<(), ExportCollision> {
        if let Some(existing) = self.entries.get(&record.name) {
            return Err(ExportCollision::new(existing, &record));
        }
        tracing::debug!(export = %record.name, producer = %record, "registered export");
        self.entries.insert(record.name.clone(), record);
        Ok(())
    }

    /// Registers every export of one stack, or none of them.
    ///
    /// Collisions inside `records` are reported as well as collisions with
    /// earlier registrations.
    ///
    /// # Errors
    ///
    /// Returns the first [`ExportCollision`] found; the ledger is left
    /// unchanged.
    pub fn register_all(&mut self, records: &[ExportRecord]) -> Result<(), ExportCollision> {
        let mut batch: IndexMap<&str, &ExportRecord> = IndexMap::new();
        for record in records {
            if let Some(existing) = self.entries.get(&record.name) {
                return Err(ExportCollision::new(existing, record));
            }
            if let Some(existing) = batch.insert(record.name.as_str(), record) {
                return Err(ExportCollision::new(existing, record));
            }
        }
        for record in records {
            self.entries.insert(record.name.clone(), record.clone());
        }
        Ok(())
    }

    /// Returns the record for an export name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExportRecord> {
        self.entries.get(name)
    }

    /// Iterates over records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ExportRecord> {
        self.entries.values()
    }

    /// Returns the number of registered exports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
