use serde::{Deserialize, Serialize};
use std::fmt;

/// Concurrency control protocol selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Shared/exclusive per-key locks
    #[default]
    LockBased,
    /// Seqlock versions with validated read snapshots
    OptimisticRetry,
    /// Stream-order admission behind a low watermark
    WatermarkOrdered,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [
        Protocol::LockBased,
        Protocol::OptimisticRetry,
        Protocol::WatermarkOrdered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::LockBased => "lock_based",
            Protocol::OptimisticRetry => "optimistic_retry",
            Protocol::WatermarkOrdered => "watermark_ordered",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names_match_display() {
        for protocol in Protocol::ALL {
            let json = serde_json::to_string(&protocol).unwrap();
            assert_eq!(json, format!("\"{}\"", protocol));
            let back: Protocol = serde_json::from_str(&json).unwrap();
            assert_eq!(back, protocol);
        }
    }
}
