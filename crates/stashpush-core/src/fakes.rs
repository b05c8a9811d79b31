//! In-memory transport fake (testing only)
//!
//! `RecordingTransport` records every POST it receives and answers from a
//! script of canned responses, so reporter behaviour can be asserted without
//! a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{HttpResponse, HttpTransport};

/// A request captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub path: String,
    pub body: serde_json::Value,
}

/// What the fake answers with for one request.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Status { code: u16, body: String },
    Unreachable(String),
}

impl ScriptedResponse {
    pub fn status(code: u16) -> Self {
        ScriptedResponse::Status {
            code,
            body: String::new(),
        }
    }

    pub fn with_body(code: u16, body: &str) -> Self {
        ScriptedResponse::Status {
            code,
            body: body.to_string(),
        }
    }
}

/// Canned response handed out by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct FakeResponse {
    code: u16,
    body: Vec<u8>,
}

#[async_trait]
impl HttpResponse for FakeResponse {
    fn code(&self) -> u16 {
        self.code
    }

    async fn content(self) -> Result<Vec<u8>, TransportError> {
        Ok(self.body)
    }
}

/// Transport that records requests and replays scripted responses.
///
/// Scripted responses are consumed in order; once exhausted every request
/// gets the fallback response.
#[derive(Debug)]
pub struct RecordingTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    script: Mutex<VecDeque<ScriptedResponse>>,
    fallback: ScriptedResponse,
}

impl RecordingTransport {
    /// A transport that answers every request with `code` and an empty body.
    pub fn always(code: u16) -> Self {
        RecordingTransport {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            fallback: ScriptedResponse::status(code),
        }
    }

    /// Queue a response for the next unanswered request.
    pub fn then(self, response: ScriptedResponse) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths of every request received so far.
    pub fn paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.path.clone())
            .collect()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    type Response = FakeResponse;

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Self::Response, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            path: path.to_string(),
            body: body.clone(),
        });

        let scripted = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match scripted {
            ScriptedResponse::Status { code, body } => Ok(FakeResponse {
                code,
                body: body.into_bytes(),
            }),
            ScriptedResponse::Unreachable(reason) => Err(TransportError::Unavailable(reason)),
        }
    }
}
