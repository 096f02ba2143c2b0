use crate::model::{ChainFamily, ConnectionMethod};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OrchestratorEventContent {
    ConnectionEstablished {
        family: ChainFamily,
        address: String,
        method: ConnectionMethod,
    },
    ConnectionRejected {
        family: ChainFamily,
        message: String,
    },
    ConnectionFailed {
        family: ChainFamily,
        message: String,
    },
    ReadinessChanged {
        family: ChainFamily,
        ready: bool,
    },
    ApprovalTargetResolved {
        family: ChainFamily,
        token: String,
    },
    ApprovalSubmitted {
        family: ChainFamily,
        tx_hash: String,
    },
    ApprovalConfirmed {
        family: ChainFamily,
        token: String,
        tx_hash: String,
    },
    ApprovalReported {
        family: ChainFamily,
        tokens: Vec<String>,
        accepted: bool,
    },
    ApprovalFailed {
        family: ChainFamily,
        message: String,
    },
    Disconnected {
        family: ChainFamily,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorEvent {
    pub create_date: DateTime<Utc>,
    pub content: OrchestratorEventContent,
}

impl OrchestratorEvent {
    pub fn now(content: OrchestratorEventContent) -> Self {
        OrchestratorEvent {
            create_date: Utc::now(),
            content,
        }
    }
}
