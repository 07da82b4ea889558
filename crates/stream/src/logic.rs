//! Business logic invoked after admission
//!
//! Applications supply a [`BusinessLogic`] with one handler per access mode.
//! The executor calls exactly one of them, exactly once per event, and only
//! after the event has been admitted. Handlers must not retry or call back
//! into the controller; they only use the [`TxnAccess`] they are given.

use crate::access::TxnAccess;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use txstream_common::{Event, EventId, Value};

/// Per-application handlers for read and write events
pub trait BusinessLogic: Send + Sync {
    /// Handle an admitted read event
    fn apply_read(&self, event: &Event, txn: &mut TxnAccess<'_>) -> Result<()>;

    /// Handle an admitted write event
    fn apply_write(&self, event: &Event, txn: &mut TxnAccess<'_>) -> Result<()>;
}

/// How [`PutGetLogic`] applies a write event's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Store each value as-is
    #[default]
    Assign,
    /// Add each integer value to the key's current integer (missing = 0)
    Accumulate,
}

/// Key/value logic: writes store the event's values, reads fetch its keys
///
/// Records how many times each event was handled and what every read
/// observed, so runs can be checked after the fact.
#[derive(Debug, Default)]
pub struct PutGetLogic {
    mode: WriteMode,
    lenient_reads: bool,
    invocations: Mutex<BTreeMap<EventId, u32>>,
    observations: Mutex<BTreeMap<EventId, Vec<Option<Value>>>>,
}

impl PutGetLogic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Treat missing keys on read as `None` instead of a storage fault
    pub fn with_lenient_reads(mut self, lenient: bool) -> Self {
        self.lenient_reads = lenient;
        self
    }

    /// How many times the handler ran for an event
    pub fn invocations(&self, id: EventId) -> u32 {
        self.invocations.lock().get(&id).copied().unwrap_or(0)
    }

    /// Handler run counts for every event handled so far
    pub fn all_invocations(&self) -> BTreeMap<EventId, u32> {
        self.invocations.lock().clone()
    }

    /// Values observed by a read event, in key order of the event
    pub fn observed(&self, id: EventId) -> Option<Vec<Option<Value>>> {
        self.observations.lock().get(&id).cloned()
    }

    fn record_invocation(&self, id: EventId) {
        *self.invocations.lock().entry(id).or_insert(0) += 1;
    }
}

impl BusinessLogic for PutGetLogic {
    fn apply_read(&self, event: &Event, txn: &mut TxnAccess<'_>) -> Result<()> {
        self.record_invocation(event.id);

        let mut seen = Vec::with_capacity(event.keys.len());
        for &key in &event.keys {
            let value = if self.lenient_reads {
                txn.get(key)?
            } else {
                Some(txn.read(key)?)
            };
            seen.push(value);
        }

        self.observations.lock().insert(event.id, seen);
        Ok(())
    }

    fn apply_write(&self, event: &Event, txn: &mut TxnAccess<'_>) -> Result<()> {
        self.record_invocation(event.id);

        if event.values.len() != event.keys.len() {
            return Err(Error::Logic(format!(
                "event {} has {} keys but {} values",
                event.id,
                event.keys.len(),
                event.values.len()
            )));
        }

        for (key, value) in event.assignments() {
            let next = match self.mode {
                WriteMode::Assign => value.clone(),
                WriteMode::Accumulate => {
                    let delta = value.as_i64().ok_or_else(|| {
                        Error::Logic(format!("cannot accumulate {} value", value.kind()))
                    })?;
                    let current = txn.get(key)?.and_then(|v| v.as_i64()).unwrap_or(0);
                    let sum = current.checked_add(delta).ok_or_else(|| {
                        Error::Logic(format!(
                            "accumulating {} onto {} overflows key {}",
                            delta, current, key
                        ))
                    })?;
                    Value::Integer(sum)
                }
            };
            txn.write(key, next)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ConcurrencyController;
    use crate::test_utils::GateController;
    use txstream_common::TransactionContext;

    fn run_write(controller: &GateController, logic: &PutGetLogic, event: &Event) -> Result<()> {
        let mut ctx = TransactionContext::new(0, 0, event.id);
        assert!(controller.try_write(&mut ctx, &event.keys));
        let mut access = TxnAccess::new(controller, &ctx);
        logic.apply_write(event, &mut access)?;
        access.flush();
        Ok(())
    }

    #[test]
    fn test_assign_and_read() {
        let controller = GateController::new();
        let logic = PutGetLogic::new();

        run_write(
            &controller,
            &logic,
            &Event::write(0, vec![1], vec![Value::Integer(10)]),
        )
        .unwrap();

        let read = Event::read(1, vec![1]);
        let mut ctx = TransactionContext::new(0, 0, 1);
        assert!(controller.try_read(&mut ctx, &read.keys));
        let mut access = TxnAccess::new(&controller, &ctx);
        logic.apply_read(&read, &mut access).unwrap();

        assert_eq!(logic.observed(1), Some(vec![Some(Value::Integer(10))]));
        assert_eq!(logic.invocations(0), 1);
        assert_eq!(logic.invocations(1), 1);
        assert_eq!(logic.invocations(2), 0);
    }

    #[test]
    fn test_accumulate() {
        let controller = GateController::with_values(vec![(1, Value::Integer(5))]);
        let logic = PutGetLogic::new().with_mode(WriteMode::Accumulate);

        let event = Event::write(0, vec![1, 2], vec![Value::Integer(3), Value::Integer(4)]);
        run_write(&controller, &logic, &event).unwrap();

        assert_eq!(controller.store().get(1), Some(Value::Integer(8)));
        assert_eq!(controller.store().get(2), Some(Value::Integer(4)));
    }

    #[test]
    fn test_accumulate_overflow_is_a_fault() {
        let controller = GateController::with_values(vec![(1, Value::Integer(i64::MAX))]);
        let logic = PutGetLogic::new().with_mode(WriteMode::Accumulate);

        let event = Event::write(0, vec![1], vec![Value::Integer(1)]);
        assert!(matches!(
            run_write(&controller, &logic, &event),
            Err(Error::Logic(_))
        ));
        assert_eq!(controller.store().get(1), Some(Value::Integer(i64::MAX)));
    }

    #[test]
    fn test_mismatched_payload_is_a_fault() {
        let controller = GateController::new();
        let logic = PutGetLogic::new();

        let event = Event::write(0, vec![1, 2], vec![Value::Integer(3)]);
        assert!(matches!(
            run_write(&controller, &logic, &event),
            Err(Error::Logic(_))
        ));
        assert!(controller.store().snapshot().is_empty());
    }

    #[test]
    fn test_lenient_reads() {
        let controller = GateController::new();
        let logic = PutGetLogic::new().with_lenient_reads(true);

        let read = Event::read(4, vec![42]);
        let mut ctx = TransactionContext::new(0, 0, 4);
        assert!(controller.try_read(&mut ctx, &read.keys));
        let mut access = TxnAccess::new(&controller, &ctx);
        logic.apply_read(&read, &mut access).unwrap();

        assert_eq!(logic.observed(4), Some(vec![None]));
    }
}
