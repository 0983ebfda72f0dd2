//! Canonicalizing insert-or-find tables.
//!
//! Every repeated substructure in the interchange model (strings, mnemonics,
//! expressions, operands, basic blocks) is stored once and referenced by a
//! small fixed-width index. The interner owns that dedup invariant: table
//! builders never implement their own equality checks, they route every
//! insertion through [`Interner::intern`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use crate::error::{BinGraphError, Result, Table};

/// Largest entry count a table may reach: index fields are `int32` on the
/// wire, so anything past this is unaddressable.
pub const MAX_TABLE_LEN: usize = i32::MAX as usize;

/// Append-only canonicalizing store mapping content to a stable index.
///
/// `intern` is referentially transparent: equal values always yield the same
/// index, and no entry is ever removed or mutated after assignment.
#[derive(Debug)]
pub struct Interner<T> {
    table: Table,
    values: Vec<T>,
    index_by_value: HashMap<T, u32>,
}

impl<T: Hash + Eq + Clone> Interner<T> {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            values: Vec::new(),
            index_by_value: HashMap::new(),
        }
    }

    /// Insert-or-find: returns the existing index if `value` was seen before,
    /// otherwise appends and returns the new index.
    pub fn intern(&mut self, value: T) -> Result<u32> {
        if let Some(&index) = self.index_by_value.get(&value) {
            return Ok(index);
        }
        if self.values.len() >= MAX_TABLE_LEN {
            return Err(BinGraphError::CapacityExceeded {
                table: self.table,
                limit: MAX_TABLE_LEN,
            });
        }
        let index = self.values.len() as u32;
        self.index_by_value.insert(value.clone(), index);
        self.values.push(value);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.values.get(index as usize)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Consume the interner, keeping only the ordered value table.
    pub fn into_values(self) -> Vec<T> {
        self.values
    }
}

/// Mutex-guarded interner for concurrent producers.
///
/// Concurrent `intern` calls with equal content deterministically collapse to
/// one index; the lock covers exactly the insert-or-find step, never a table
/// scan. Inserts are atomic, so a producer that stops mid-way leaves every
/// completed entry intact.
#[derive(Debug)]
pub struct SyncInterner<T> {
    inner: Mutex<Interner<T>>,
}

impl<T: Hash + Eq + Clone> SyncInterner<T> {
    pub fn new(table: Table) -> Self {
        Self {
            inner: Mutex::new(Interner::new(table)),
        }
    }

    pub fn intern(&self, value: T) -> Result<u32> {
        // A poisoned lock only means another producer panicked between
        // completed inserts; the table itself is still consistent.
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.intern(value)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Unwrap into the plain interner once all producers are done.
    pub fn into_inner(self) -> Interner<T> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
