use std::fmt;

use serde_json::Value;

use crate::{Action, SagaValue, SequenceFactory};

/// Instruction for the host execution engine.
///
/// The `Effect`/`Action` distinction is decided once, here, at the
/// boundary where values enter the core; everything downstream matches
/// on the variant instead of re-inspecting shapes.
#[derive(Clone)]
pub enum Effect {
    /// Deliver an action into the state-transition layer.
    Put(Action),
    /// Run a sequence as an independent process.
    Fork(ForkEffect),
    /// Run the worker on every action matching the pattern.
    TakeEvery(TakeEffect),
    /// Like `TakeEvery`, but ignores actions while a run is in flight.
    TakeLeading(TakeEffect),
    /// Like `TakeEvery`, but cancels the previous run first.
    TakeLatest(TakeEffect),
    /// Rate-limited dispatch.
    Throttle(ThrottleEffect),
    /// Debounced dispatch.
    Debounce(ThrottleEffect),
    /// A host effect the core has no structure for (call, take,
    /// select, ...). Passed through verbatim, never inspected.
    Opaque(Value),
}

#[derive(Clone)]
pub struct ForkEffect {
    pub factory: SequenceFactory,
    pub args: Vec<SagaValue>,
    /// Detached forks (spawn) are not linked to the parent's lifetime.
    pub detached: bool,
}

#[derive(Clone)]
pub struct TakeEffect {
    pub pattern: String,
    pub factory: SequenceFactory,
    pub args: Vec<SagaValue>,
}

#[derive(Clone)]
pub struct ThrottleEffect {
    pub ms: u64,
    pub pattern: String,
    pub factory: SequenceFactory,
    pub args: Vec<SagaValue>,
}

impl Effect {
    pub fn is_put(&self) -> bool {
        matches!(self, Self::Put(_))
    }

    pub fn is_fork(&self) -> bool {
        matches!(self, Self::Fork(_))
    }

    /// Fork-family effects all run a worker as an independent process.
    /// The dispatch variants are forks of an internal watcher in the
    /// host engine, so the assembler accepts any of them where a fork
    /// effect is expected.
    pub fn is_fork_family(&self) -> bool {
        !matches!(self, Self::Put(_) | Self::Opaque(_))
    }

    /// The worker factory carried by a fork-family effect.
    pub fn worker(&self) -> Option<&SequenceFactory> {
        match self {
            Self::Fork(fork) => Some(&fork.factory),
            Self::TakeEvery(take) | Self::TakeLeading(take) | Self::TakeLatest(take) => {
                Some(&take.factory)
            }
            Self::Throttle(throttle) | Self::Debounce(throttle) => Some(&throttle.factory),
            Self::Put(_) | Self::Opaque(_) => None,
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Put(action) => f.debug_tuple("Put").field(action).finish(),
            Self::Fork(fork) if fork.detached => f.write_str("Spawn"),
            Self::Fork(_) => f.write_str("Fork"),
            Self::TakeEvery(take) => f.debug_tuple("TakeEvery").field(&take.pattern).finish(),
            Self::TakeLeading(take) => f.debug_tuple("TakeLeading").field(&take.pattern).finish(),
            Self::TakeLatest(take) => f.debug_tuple("TakeLatest").field(&take.pattern).finish(),
            Self::Throttle(throttle) => f
                .debug_tuple("Throttle")
                .field(&throttle.ms)
                .field(&throttle.pattern)
                .finish(),
            Self::Debounce(throttle) => f
                .debug_tuple("Debounce")
                .field(&throttle.ms)
                .field(&throttle.pattern)
                .finish(),
            Self::Opaque(value) => f.debug_tuple("Opaque").field(value).finish(),
        }
    }
}
