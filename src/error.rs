use serde::{Deserialize, Serialize};

use crate::ForkerKind;

/// Runtime failure raised inside a worker or recovery routine.
///
/// Carries only a message: by the time an error crosses the process
/// boundary it is data for the recovery routine, not a typed condition.
#[derive(thiserror::Error, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SagaError {
    pub message: String,
}

impl SagaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for SagaError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for SagaError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// Assembly-time programmer error. Always fatal, never swallowed.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid option defaultForker: `{0}` is not a dispatch primitive available from the host vocabulary")]
    InvalidDefaultForker(ForkerKind),
    #[error(
        "{label}: it must be specified as one of these:\n\
         \x20 - a sequence factory (automatically invoked by the enhanced {default_forker}())\n\
         \x20 - a thunk returning a sequence factory (automatically invoked by the enhanced fork())\n\
         \x20 - a thunk returning a fork effect\n\
         \x20 - a fork effect"
    )]
    InvalidSaga {
        label: String,
        default_forker: ForkerKind,
    },
    #[error("invalid saga: the value must be a fork-family effect")]
    NotForkEffect,
}
