use crate::{
    Action, BoxSequence, Callable, Effect, SagaError, SagaValue, Sequence, SequenceStep,
};

/// Drives one invocation of a [`Callable`] and normalizes everything it
/// produces before the host engine sees it:
///
///   - recognized effects are surfaced verbatim and the host's reply is
///     fed back into the sequence,
///   - bare actions are wrapped in [`Effect::Put`] first,
///   - any other intermediate value is fed straight back into the
///     sequence without surfacing,
///   - the final value follows the same effect/action rules, and
///     anything else (including no value) produces no emission.
///
/// Errors raised while advancing the inner sequence are forwarded into
/// its `raise` operation so user cleanup runs before the error is
/// treated as fatal to this run. A host-initiated `raise` on the
/// normalized run itself is forwarded the same way (graceful abort).
pub struct NormalizedRun {
    state: RunState,
}

enum RunState {
    Idle {
        callable: Callable,
        args: Vec<SagaValue>,
    },
    Driving(BoxSequence),
    /// The final value has been surfaced; the next step completes.
    Flush,
    Finished,
}

impl NormalizedRun {
    pub fn new(callable: Callable, args: Vec<SagaValue>) -> Self {
        Self {
            state: RunState::Idle { callable, args },
        }
    }

    /// Runs the classification loop until the inner sequence either
    /// suspends on something the host must see or completes.
    fn pump(
        &mut self,
        mut seq: BoxSequence,
        first: Result<SequenceStep, SagaError>,
    ) -> Result<SequenceStep, SagaError> {
        let mut step = first?;
        loop {
            match step {
                SequenceStep::Yield(SagaValue::Effect(effect)) => {
                    self.state = RunState::Driving(seq);
                    return Ok(SequenceStep::Yield(SagaValue::Effect(effect)));
                }
                SequenceStep::Yield(SagaValue::Action(action)) => {
                    self.state = RunState::Driving(seq);
                    return Ok(SequenceStep::Yield(put(action)));
                }
                SequenceStep::Yield(other) => {
                    step = advance(&mut seq, other)?;
                }
                SequenceStep::Done(value) => return self.finish(value),
            }
        }
    }

    fn finish(&mut self, value: SagaValue) -> Result<SequenceStep, SagaError> {
        match value {
            SagaValue::Effect(effect) => {
                self.state = RunState::Flush;
                Ok(SequenceStep::Yield(SagaValue::Effect(effect)))
            }
            SagaValue::Action(action) => {
                self.state = RunState::Flush;
                Ok(SequenceStep::Yield(put(action)))
            }
            _ => {
                self.state = RunState::Finished;
                Ok(SequenceStep::Done(SagaValue::Unit))
            }
        }
    }
}

impl Sequence for NormalizedRun {
    fn next(&mut self, input: SagaValue) -> Result<SequenceStep, SagaError> {
        match std::mem::replace(&mut self.state, RunState::Finished) {
            RunState::Idle { callable, args } => match callable {
                Callable::Function(f) => {
                    let value = f(&args)?;
                    self.finish(value)
                }
                Callable::Factory(factory) => {
                    let mut seq = factory(&args);
                    let first = advance(&mut seq, SagaValue::Unit);
                    self.pump(seq, first)
                }
            },
            RunState::Driving(mut seq) => {
                let step = advance(&mut seq, input);
                self.pump(seq, step)
            }
            RunState::Flush | RunState::Finished => Ok(SequenceStep::Done(SagaValue::Unit)),
        }
    }

    fn raise(&mut self, err: SagaError) -> Result<SequenceStep, SagaError> {
        match std::mem::replace(&mut self.state, RunState::Finished) {
            RunState::Driving(mut seq) => {
                tracing::trace!(error = %err, "forwarding raise into driven sequence");
                let step = seq.raise(err);
                self.pump(seq, step)
            }
            // Nothing is running that could clean up.
            RunState::Idle { .. } | RunState::Flush | RunState::Finished => Err(err),
        }
    }
}

fn put(action: Action) -> SagaValue {
    SagaValue::Effect(Effect::Put(action))
}

/// Advances the sequence; if advancing itself raises, the error is
/// forwarded into the sequence's own `raise` before it can escape.
fn advance(seq: &mut BoxSequence, input: SagaValue) -> Result<SequenceStep, SagaError> {
    match seq.next(input) {
        Ok(step) => Ok(step),
        Err(err) => seq.raise(err),
    }
}
