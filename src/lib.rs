//! Module-definition helper for redux-style state containers paired
//! with a saga-style effect coordination layer.
//!
//! One declaration map per module yields the full triple: a composed
//! state-transition function, action constructors with deterministic
//! kind strings, and initialized effect-processes. Worker processes are
//! threaded through the enhancement engine, so their return values and
//! intermediate actions become emissions automatically and failures are
//! routed to a declared recovery routine.
//!
//! The crate rides on an externally supplied execution engine: it only
//! classifies and rewrites the values flowing through the
//! [`Sequence`] suspension boundary, it never schedules anything
//! itself.

mod action;
pub use action::{Action, ActionCreator, Creator, CreatorFn};

mod effect;
pub use effect::{Effect, ForkEffect, TakeEffect, ThrottleEffect};

mod saga_value;
pub use saga_value::SagaValue;

mod sequence;
pub use sequence::{
    sequence_factory, BoxSequence, Callable, Resume, Sequence, SequenceFactory, SequenceStep,
    WorkerFn,
};

mod process;
pub use process::NormalizedRun;

mod enhance;
pub use enhance::{enhance, EnhancedRun};

mod vocabulary;
pub use vocabulary::{EffectVocabulary, ForkFn, PutFn, TakeFn, ThrottleFn};

mod forkers;
pub use forkers::{EnhancedForkers, ForkerKind};

mod module;
pub use module::{
    create_app, create_module, Definition, Definitions, Ducks, DucksConfig, IntoDefinition, Module,
    ModuleOptions, ReducerFn, SagaDef, SagaTools, ThunkResult,
};

mod helpers;
pub use helpers::{
    basename, camel_case, flatten_sagas, retrieve_worker, retrieve_workers, SagaTree,
};

mod error;
pub use error::{ConfigError, SagaError};

pub mod testing;
