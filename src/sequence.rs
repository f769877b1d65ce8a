use std::fmt;
use std::sync::Arc;

use crate::{SagaError, SagaValue};

/// One observable step of a resumable sequence.
#[derive(Debug, Clone)]
pub enum SequenceStep {
    /// The sequence suspended on a value and waits for a reply.
    Yield(SagaValue),
    /// The sequence completed with a final value.
    Done(SagaValue),
}

impl SequenceStep {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// A resumable, steppable unit of execution.
///
/// This is the explicit suspend/resume state machine equivalent of a
/// generator: `next` advances with a reply value, `raise` injects an
/// error at the current suspension point so the sequence can react
/// (cleanup, recovery) before the error is considered fatal.
pub trait Sequence {
    fn next(&mut self, input: SagaValue) -> Result<SequenceStep, SagaError>;
    fn raise(&mut self, err: SagaError) -> Result<SequenceStep, SagaError>;
}

pub type BoxSequence = Box<dyn Sequence + Send>;

/// Input to a closure-backed sequence: either a resume value or an
/// injected error.
#[derive(Debug, Clone)]
pub enum Resume {
    Next(SagaValue),
    Raise(SagaError),
}

/// Any `FnMut(Resume)` closure acts as a sequence. This is the usual
/// way to hand-write small sequences without a dedicated state struct.
impl<F> Sequence for F
where
    F: FnMut(Resume) -> Result<SequenceStep, SagaError>,
{
    fn next(&mut self, input: SagaValue) -> Result<SequenceStep, SagaError> {
        self(Resume::Next(input))
    }

    fn raise(&mut self, err: SagaError) -> Result<SequenceStep, SagaError> {
        self(Resume::Raise(err))
    }
}

/// Creates a fresh sequence per invocation. Factories are shared
/// freely; every call is an independent run.
pub type SequenceFactory = Arc<dyn Fn(&[SagaValue]) -> BoxSequence + Send + Sync>;

pub fn sequence_factory<F>(f: F) -> SequenceFactory
where
    F: Fn(&[SagaValue]) -> BoxSequence + Send + Sync + 'static,
{
    Arc::new(f)
}

pub type WorkerFn = Arc<dyn Fn(&[SagaValue]) -> Result<SagaValue, SagaError> + Send + Sync>;

/// A user-supplied effect-process: either a plain function whose return
/// value is the final value of the run, or a factory producing a
/// resumable sequence.
#[derive(Clone)]
pub enum Callable {
    Function(WorkerFn),
    Factory(SequenceFactory),
}

impl Callable {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[SagaValue]) -> Result<SagaValue, SagaError> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&[SagaValue]) -> BoxSequence + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(f))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    pub fn is_factory(&self) -> bool {
        matches!(self, Self::Factory(_))
    }
}

impl From<SequenceFactory> for Callable {
    fn from(factory: SequenceFactory) -> Self {
        Self::Factory(factory)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Callable::Function"),
            Self::Factory(_) => f.write_str("Callable::Factory"),
        }
    }
}
