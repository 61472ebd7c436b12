use std::collections::HashSet;

use serde::Serialize;

use crate::{DocumentKey, DocumentStoreError, Result, Version};

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Creates a document; fails if the key already exists.
    Insert {
        key: DocumentKey,
        body: serde_json::Value,
    },

    /// Replaces a document body if it is still at `expected`.
    Update {
        key: DocumentKey,
        expected: Version,
        body: serde_json::Value,
    },

    /// Removes a document if it is still at `expected`.
    Delete { key: DocumentKey, expected: Version },
}

impl WriteOp {
    /// Returns the key this operation touches.
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOp::Insert { key, .. }
            | WriteOp::Update { key, .. }
            | WriteOp::Delete { key, .. } => key,
        }
    }

    /// Returns the version the document must currently have, if any.
    pub fn expected(&self) -> Option<Version> {
        match self {
            WriteOp::Insert { .. } => None,
            WriteOp::Update { expected, .. } | WriteOp::Delete { expected, .. } => Some(*expected),
        }
    }
}

/// An ordered set of writes applied all-or-nothing.
///
/// Either every operation's version check passes and all writes become
/// visible together, or the store is left untouched and the first failing
/// check is reported as [`DocumentStoreError::ConcurrencyConflict`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an insert of a serializable record.
    pub fn insert<T: Serialize>(
        mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        record: &T,
    ) -> Result<Self> {
        self.ops.push(WriteOp::Insert {
            key: DocumentKey::new(collection, id),
            body: serde_json::to_value(record)?,
        });
        Ok(self)
    }

    /// Adds a version-checked update of a serializable record.
    pub fn update<T: Serialize>(
        mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        expected: Version,
        record: &T,
    ) -> Result<Self> {
        self.ops.push(WriteOp::Update {
            key: DocumentKey::new(collection, id),
            expected,
            body: serde_json::to_value(record)?,
        });
        Ok(self)
    }

    /// Adds a version-checked delete.
    pub fn delete(
        mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        expected: Version,
    ) -> Self {
        self.ops.push(WriteOp::Delete {
            key: DocumentKey::new(collection, id),
            expected,
        });
        self
    }

    /// Returns the operations in application order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the batch, returning its operations.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks the batch is non-empty and touches each key at most once.
    pub fn validate(&self) -> Result<()> {
        if self.ops.is_empty() {
            return Err(DocumentStoreError::InvalidBatch(
                "Cannot commit an empty batch".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.ops.len());
        for op in &self.ops {
            if !seen.insert(op.key()) {
                return Err(DocumentStoreError::InvalidBatch(format!(
                    "Document {} appears more than once in the batch",
                    op.key()
                )));
            }
        }

        Ok(())
    }
}
