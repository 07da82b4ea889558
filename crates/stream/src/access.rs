//! State access handed to business logic after admission
//!
//! Reads go through the controller (which may serve a snapshot captured at
//! admission). Writes are buffered and only reach the store when the executor
//! flushes them right before commit, so a handler that fails part-way leaves
//! every value untouched.

use crate::controller::ConcurrencyController;
use crate::error::{Error, Result};
use txstream_common::{Access, Key, TransactionContext, Value};

/// Transactional view of the state store for one admitted event
pub struct TxnAccess<'a> {
    controller: &'a dyn ConcurrencyController,
    ctx: &'a TransactionContext,
    writes: Vec<(Key, Value)>,
}

impl<'a> TxnAccess<'a> {
    pub(crate) fn new(controller: &'a dyn ConcurrencyController, ctx: &'a TransactionContext) -> Self {
        Self {
            controller,
            ctx,
            writes: Vec::new(),
        }
    }

    pub fn context(&self) -> &TransactionContext {
        self.ctx
    }

    /// Read a key, returning `None` if it holds no value
    ///
    /// Sees this transaction's own buffered writes.
    pub fn get(&self, key: Key) -> Result<Option<Value>> {
        self.ensure_admitted(key)?;

        if let Some((_, value)) = self.writes.iter().find(|(k, _)| *k == key) {
            return Ok(Some(value.clone()));
        }

        Ok(self.controller.read(self.ctx, key))
    }

    /// Read a key that must exist
    pub fn read(&self, key: Key) -> Result<Value> {
        self.get(key)?.ok_or(Error::MissingKey(key))
    }

    /// Buffer a write to an exclusively admitted key
    pub fn write(&mut self, key: Key, value: Value) -> Result<()> {
        self.ensure_admitted(key)?;

        if self.ctx.admission() != Some(Access::Write) {
            return Err(Error::WriteOnReadAccess {
                key,
                batch_id: self.ctx.batch_id,
            });
        }

        match self.writes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.writes.push((key, value)),
        }
        Ok(())
    }

    /// Number of buffered writes
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Apply buffered writes through the controller
    pub(crate) fn flush(self) -> usize {
        let count = self.writes.len();
        for (key, value) in self.writes {
            self.controller.write(self.ctx, key, value);
        }
        count
    }

    fn ensure_admitted(&self, key: Key) -> Result<()> {
        if self.ctx.is_admitted(key) {
            Ok(())
        } else {
            Err(Error::KeyNotAdmitted {
                key,
                batch_id: self.ctx.batch_id,
            })
        }
    }
}
