//! Data requests to the network collaborator
//!
//! Facets never talk to the network. Specializations queue [`Command`]s in
//! the facet's [`Outbox`]; the collaborator drains them, executes them, and
//! hands each result back exactly once through the facet. Outstanding
//! requests are never cancelled on navigation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use thiserror::Error;

/// One server command: `{ entity, method, args[], options }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub entity: Option<String>,
    pub method: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl Request {
    pub fn new(entity: Option<String>, method: impl Into<String>) -> Self {
        Self {
            entity,
            method: method.into(),
            args: Vec::new(),
            options: Map::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.options.insert(name.into(), value);
        self
    }
}

/// A single request or a named batch of requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Single(Request),
    Batch { name: String, commands: Vec<Request> },
}

impl Command {
    pub fn len(&self) -> usize {
        match self {
            Command::Single(_) => 1,
            Command::Batch { commands, .. } => commands.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error reported by the server or transport
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{name}: {message}")]
pub struct FetchError {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}

impl FetchError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

/// Results of a batch, in request order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub successes: Vec<Value>,
    #[serde(default)]
    pub errors: Vec<FetchError>,
}

/// Successful result of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Response {
    Single(Value),
    Batch(BatchResponse),
}

impl Response {
    pub fn as_single(&self) -> Option<&Value> {
        match self {
            Response::Single(value) => Some(value),
            Response::Batch(_) => None,
        }
    }

    /// Payload as plain JSON; batches become `{ successes, errors }`
    pub fn to_value(&self) -> Value {
        match self {
            Response::Single(value) => value.clone(),
            Response::Batch(batch) => serde_json::to_value(batch).unwrap_or_default(),
        }
    }
}

pub type FetchResult = Result<Response, FetchError>;

/// Identifier of an issued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FetchId(pub u64);

impl fmt::Display for FetchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a fetch was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPurpose {
    /// Main content refresh; success is routed to `load`
    Refresh,
    /// Table second-stage record enrichment for one page
    Records { generation: u64, keys: Vec<String> },
    /// Anything a specialization wants to route back to itself
    Custom(String),
}

/// A command waiting to be sent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingRequest {
    pub id: FetchId,
    pub command: Command,
}

/// Queue of commands to send plus bookkeeping of in-flight ones
#[derive(Debug)]
pub struct Outbox {
    next_id: u64,
    queued: VecDeque<OutgoingRequest>,
    in_flight: BTreeMap<FetchId, FetchPurpose>,
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            queued: VecDeque::new(),
            in_flight: BTreeMap::new(),
        }
    }

    pub fn issue(&mut self, purpose: FetchPurpose, command: Command) -> FetchId {
        let id = FetchId(self.next_id);
        self.next_id += 1;
        tracing::debug!(fetch = %id, ?purpose, "fetch issued");
        self.queued.push_back(OutgoingRequest { id, command });
        self.in_flight.insert(id, purpose);
        id
    }

    /// Drain the commands waiting to be sent
    pub fn take_requests(&mut self) -> Vec<OutgoingRequest> {
        self.queued.drain(..).collect()
    }

    /// Mark a fetch completed; `None` if it is unknown or already completed
    pub fn resolve(&mut self, id: FetchId) -> Option<FetchPurpose> {
        self.queued.retain(|req| req.id != id);
        self.in_flight.remove(&id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}
