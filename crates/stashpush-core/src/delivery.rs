//! Per-item delivery outcomes and the shared POST-and-classify step.

use serde::Serialize;

use crate::transport::{HttpResponse, HttpTransport};

/// Outcome of delivering one status or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Delivery {
    /// The service answered with the expected success code.
    Sent { target: String },
    /// The service answered with any other code.
    Rejected {
        target: String,
        code: u16,
        body: String,
    },
    /// The request never got a response.
    Unreachable { target: String, error: String },
    /// No commit hash could be determined for a source stamp.
    Unresolved { codebase: String },
    /// The item was dropped before any request was made.
    Skipped { target: String, reason: String },
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent { .. })
    }
}

/// Everything that happened while handling one event or batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub deliveries: Vec<Delivery>,
}

impl DeliveryReport {
    pub fn push(&mut self, delivery: Delivery) {
        self.deliveries.push(delivery);
    }

    pub fn sent(&self) -> usize {
        self.deliveries.iter().filter(|d| d.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.sent()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}

/// Raw result of one POST, before the caller attaches its own target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PostOutcome {
    Accepted,
    Rejected { code: u16, body: String },
    Unreachable(String),
}

impl PostOutcome {
    pub(crate) fn into_delivery(self, target: String) -> Delivery {
        match self {
            PostOutcome::Accepted => Delivery::Sent { target },
            PostOutcome::Rejected { code, body } => Delivery::Rejected { target, code, body },
            PostOutcome::Unreachable(error) => Delivery::Unreachable { target, error },
        }
    }
}

/// POST `payload` and compare the status code with `expected`.
///
/// The body is only read for unexpected codes. Transport failures are folded
/// into [`PostOutcome::Unreachable`] so nothing propagates to the caller.
pub(crate) async fn submit<T: HttpTransport>(
    transport: &T,
    path: &str,
    payload: &serde_json::Value,
    expected: u16,
) -> PostOutcome {
    let response = match transport.post(path, payload).await {
        Ok(response) => response,
        Err(e) => return PostOutcome::Unreachable(e.to_string()),
    };

    let code = response.code();
    if code == expected {
        return PostOutcome::Accepted;
    }

    let body = match response.content().await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("<unreadable body: {e}>"),
    };
    PostOutcome::Rejected { code, body }
}
