use serde::{Deserialize, Serialize};

/// Inbound event delivery that could not be processed, as published to the
/// failed queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMessage {
    /// Raw delivery body; kept as text since it may not have decoded.
    pub original_payload: String,
    pub failure_reason: String,
    pub failed_at: String,
    pub redelivered: bool,
}
