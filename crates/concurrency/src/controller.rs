//! Protocol-selected controller
//!
//! Workers are generic over the controller type; this enum lets the runner
//! pick the protocol from configuration while keeping static dispatch inside
//! each protocol.

use crate::lock::LockBasedController;
use crate::optimistic::OptimisticController;
use crate::protocol::Protocol;
use crate::watermark::WatermarkController;
use std::sync::Arc;
use txstream_common::{Key, TransactionContext, Value};
use txstream_store::StateStore;
use txstream_stream::ConcurrencyController;

pub enum Controller {
    LockBased(LockBasedController),
    OptimisticRetry(OptimisticController),
    WatermarkOrdered(WatermarkController),
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Controller::LockBased($c) => $body,
            Controller::OptimisticRetry($c) => $body,
            Controller::WatermarkOrdered($c) => $body,
        }
    };
}

impl Controller {
    pub fn new(protocol: Protocol, store: Arc<StateStore>) -> Self {
        match protocol {
            Protocol::LockBased => Controller::LockBased(LockBasedController::new(store)),
            Protocol::OptimisticRetry => {
                Controller::OptimisticRetry(OptimisticController::new(store))
            }
            Protocol::WatermarkOrdered => {
                Controller::WatermarkOrdered(WatermarkController::new(store))
            }
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Controller::LockBased(_) => Protocol::LockBased,
            Controller::OptimisticRetry(_) => Protocol::OptimisticRetry,
            Controller::WatermarkOrdered(_) => Protocol::WatermarkOrdered,
        }
    }

    /// Low watermark, when the protocol keeps one
    pub fn lwm(&self) -> Option<u64> {
        match self {
            Controller::WatermarkOrdered(c) => Some(c.lwm()),
            _ => None,
        }
    }
}

impl ConcurrencyController for Controller {
    fn try_read(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        dispatch!(self, c => c.try_read(ctx, keys))
    }

    fn try_write(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        dispatch!(self, c => c.try_write(ctx, keys))
    }

    fn commit(&self, ctx: &mut TransactionContext) {
        dispatch!(self, c => c.commit(ctx))
    }

    fn abort(&self, ctx: &mut TransactionContext) {
        dispatch!(self, c => c.abort(ctx))
    }

    fn store(&self) -> &StateStore {
        dispatch!(self, c => c.store())
    }

    fn protocol_name(&self) -> &'static str {
        dispatch!(self, c => c.protocol_name())
    }

    fn read(&self, ctx: &TransactionContext, key: Key) -> Option<Value> {
        dispatch!(self, c => c.read(ctx, key))
    }

    fn write(&self, ctx: &TransactionContext, key: Key, value: Value) {
        dispatch!(self, c => c.write(ctx, key, value))
    }
}
