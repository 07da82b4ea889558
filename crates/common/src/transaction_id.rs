//! Transaction identity used by concurrency controllers
//!
//! Every micro-event executes as exactly one transaction, so the pair of
//! operator id and the event's batch id is unique for the whole run. Ordering
//! follows the batch id first, which makes "older" mean "earlier in the stream".

use crate::{BatchId, FunctionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction identifier derived from the event's position in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnId {
    /// Batch id of the event (compared first)
    pub batch_id: BatchId,
    /// Operator executing the event
    pub function_id: FunctionId,
}

impl TxnId {
    pub const fn new(function_id: FunctionId, batch_id: BatchId) -> Self {
        Self {
            batch_id,
            function_id,
        }
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}:b{}", self.function_id, self.batch_id)
    }
}
