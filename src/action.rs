use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A dispatched fact. `kind` is unique within a module's namespace;
/// uniqueness comes from deterministic derivation at assembly time.
/// Immutable once constructed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            meta: None,
            error: false,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_error(mut self) -> Self {
        self.error = true;
        self
    }
}

pub type CreatorFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Payload/meta construction for one action kind.
#[derive(Clone)]
pub enum Creator {
    /// Single function producing the payload.
    Payload(CreatorFn),
    /// `[payload_fn, meta_fn]` pair, both receiving the same arguments.
    Pair(CreatorFn, CreatorFn),
}

impl Creator {
    pub fn payload<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self::Payload(Arc::new(f))
    }

    pub fn pair<P, M>(payload: P, meta: M) -> Self
    where
        P: Fn(&[Value]) -> Value + Send + Sync + 'static,
        M: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self::Pair(Arc::new(payload), Arc::new(meta))
    }
}

/// Bound constructor for one derived action kind.
///
/// Without a declared creator the payload defaults to the first
/// constructor argument unchanged and no meta is attached.
#[derive(Clone)]
pub struct ActionCreator {
    kind: String,
    creator: Option<Creator>,
}

impl ActionCreator {
    pub fn new(kind: impl Into<String>, creator: Option<Creator>) -> Self {
        Self {
            kind: kind.into(),
            creator,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn create(&self, args: &[Value]) -> Action {
        let (payload, meta) = match &self.creator {
            None => (args.first().cloned(), None),
            Some(Creator::Payload(payload_fn)) => (Some(payload_fn(args)), None),
            Some(Creator::Pair(payload_fn, meta_fn)) => {
                (Some(payload_fn(args)), Some(meta_fn(args)))
            }
        };
        Action {
            kind: self.kind.clone(),
            payload,
            meta,
            error: false,
        }
    }
}

impl fmt::Debug for ActionCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCreator")
            .field("kind", &self.kind)
            .finish()
    }
}
