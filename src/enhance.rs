use std::sync::Arc;

use crate::{
    Callable, NormalizedRun, SagaError, SagaValue, Sequence, SequenceFactory, SequenceStep,
};

/// Wraps a worker and an optional recovery routine into a new sequence
/// factory. Each invocation is an independent run: the worker executes
/// under [`NormalizedRun`] rules, and on failure the recovery routine
/// runs with `(error, ...original args)` under the same rules. Without
/// a recovery routine the error propagates to the host as a process
/// failure. Errors inside the recovery routine itself are never caught.
pub fn enhance(worker: Callable, on_error: Option<Callable>) -> SequenceFactory {
    Arc::new(move |args: &[SagaValue]| {
        Box::new(EnhancedRun::new(
            worker.clone(),
            on_error.clone(),
            args.to_vec(),
        ))
    })
}

pub struct EnhancedRun {
    on_error: Option<Callable>,
    args: Vec<SagaValue>,
    phase: Phase,
}

enum Phase {
    Worker(NormalizedRun),
    Recovery(NormalizedRun),
    Done,
}

impl EnhancedRun {
    fn new(worker: Callable, on_error: Option<Callable>, args: Vec<SagaValue>) -> Self {
        let run = NormalizedRun::new(worker, args.clone());
        Self {
            on_error,
            args,
            phase: Phase::Worker(run),
        }
    }

    /// Routes a worker failure to the recovery routine, or rethrows.
    fn fail_over(&mut self, err: SagaError) -> Result<SequenceStep, SagaError> {
        let Some(on_error) = self.on_error.clone() else {
            self.phase = Phase::Done;
            return Err(err);
        };
        tracing::debug!(error = %err, "worker failed, running recovery routine");
        let mut recovery_args = Vec::with_capacity(self.args.len() + 1);
        recovery_args.push(SagaValue::Error(err));
        recovery_args.extend(self.args.iter().cloned());
        let mut run = NormalizedRun::new(on_error, recovery_args);
        let step = run.next(SagaValue::Unit);
        self.phase = Phase::Recovery(run);
        self.seal(step)
    }

    fn seal(&mut self, step: Result<SequenceStep, SagaError>) -> Result<SequenceStep, SagaError> {
        let step = step?;
        if step.is_done() {
            self.phase = Phase::Done;
        }
        Ok(step)
    }
}

impl Sequence for EnhancedRun {
    fn next(&mut self, input: SagaValue) -> Result<SequenceStep, SagaError> {
        let (in_worker, step) = match &mut self.phase {
            Phase::Worker(run) => (true, run.next(input)),
            Phase::Recovery(run) => (false, run.next(input)),
            Phase::Done => return Ok(SequenceStep::Done(SagaValue::Unit)),
        };
        match step {
            Err(err) if in_worker => self.fail_over(err),
            step => self.seal(step),
        }
    }

    fn raise(&mut self, err: SagaError) -> Result<SequenceStep, SagaError> {
        // The worker gets its abort path first; if that still ends in
        // an error, the recovery routine takes over.
        let (in_worker, step) = match &mut self.phase {
            Phase::Worker(run) => (true, run.raise(err)),
            Phase::Recovery(run) => (false, run.raise(err)),
            Phase::Done => return Err(err),
        };
        match step {
            Err(err) if in_worker => self.fail_over(err),
            step => self.seal(step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sequence_factory, Action, Effect, Resume};
    use serde_json::json;

    fn drive(factory: &SequenceFactory, args: &[SagaValue]) -> Result<Vec<SagaValue>, SagaError> {
        let mut seq = factory(args);
        let mut surfaced = vec![];
        let mut input = SagaValue::Unit;
        loop {
            match seq.next(input)? {
                SequenceStep::Yield(value) => {
                    surfaced.push(value);
                    input = SagaValue::Unit;
                }
                SequenceStep::Done(_) => return Ok(surfaced),
            }
        }
    }

    fn kinds(surfaced: &[SagaValue]) -> Vec<&str> {
        surfaced
            .iter()
            .map(|value| match value {
                SagaValue::Effect(Effect::Put(action)) => action.kind.as_str(),
                other => panic!("expected a put effect, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn worker_error_without_recovery_routine_propagates() {
        let worker = Callable::function(|_args| Err(SagaError::new("boom")));
        let enhanced = enhance(worker, None);
        let err = drive(&enhanced, &[]).unwrap_err();
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn recovery_routine_receives_error_and_original_args() {
        let worker = Callable::function(|_args| Err(SagaError::new("boom")));
        let on_error = Callable::function(|args| {
            let err = args[0].as_error().expect("first arg is the error");
            let original = args[1].as_data().expect("original arg follows");
            Ok(Action::new("m/FAILURE")
                .with_payload(json!({ "error": err.message, "arg": original }))
                .into())
        });
        let enhanced = enhance(worker, Some(on_error));
        let surfaced = drive(&enhanced, &[SagaValue::Data(json!("req-1"))]).unwrap();
        assert_eq!(kinds(&surfaced), vec!["m/FAILURE"]);
        let SagaValue::Effect(Effect::Put(action)) = &surfaced[0] else {
            unreachable!()
        };
        assert_eq!(
            action.payload,
            Some(json!({ "error": "boom", "arg": "req-1" }))
        );
    }

    #[test]
    fn effects_yielded_before_the_failure_still_reach_the_host() {
        let worker = Callable::factory(|_args| {
            let mut stage = 0;
            Box::new(move |resume: Resume| -> Result<SequenceStep, SagaError> {
                if let Resume::Raise(e) = resume {
                    return Err(e);
                }
                stage += 1;
                match stage {
                    1 => Ok(SequenceStep::Yield(Action::new("m/STARTED").into())),
                    _ => Err(SagaError::new("boom")),
                }
            })
        });
        let on_error = Callable::function(|_args| Ok(Action::new("m/FAILURE").into()));
        let enhanced = enhance(worker, Some(on_error));
        let surfaced = drive(&enhanced, &[]).unwrap();
        assert_eq!(kinds(&surfaced), vec!["m/STARTED", "m/FAILURE"]);
    }

    #[test]
    fn recovery_routine_may_itself_be_a_sequence() {
        let worker = Callable::function(|_args| Err(SagaError::new("boom")));
        let on_error = Callable::factory(|args| {
            let message = args[0].as_error().map(|e| e.message.clone()).unwrap();
            let mut stage = 0;
            Box::new(move |resume: Resume| -> Result<SequenceStep, SagaError> {
                if let Resume::Raise(e) = resume {
                    return Err(e);
                }
                stage += 1;
                match stage {
                    1 => Ok(SequenceStep::Yield(Action::new("m/RETRY_SCHEDULED").into())),
                    _ => Ok(SequenceStep::Done(
                        Action::new("m/FAILURE")
                            .with_payload(json!(message.clone()))
                            .into(),
                    )),
                }
            })
        });
        let enhanced = enhance(worker, Some(on_error));
        let surfaced = drive(&enhanced, &[]).unwrap();
        assert_eq!(kinds(&surfaced), vec!["m/RETRY_SCHEDULED", "m/FAILURE"]);
    }

    #[test]
    fn recovery_routine_errors_are_not_caught() {
        let worker = Callable::function(|_args| Err(SagaError::new("boom")));
        let on_error = Callable::function(|_args| Err(SagaError::new("worse")));
        let enhanced = enhance(worker, Some(on_error));
        let err = drive(&enhanced, &[]).unwrap_err();
        assert_eq!(err.message, "worse");
    }

    #[test]
    fn enhanced_factory_is_reentrant() {
        let worker = Callable::function(|args| {
            let n = args[0].as_data().and_then(|v| v.as_i64()).unwrap();
            Ok(Action::new("m/DONE").with_payload(json!(n * 2)).into())
        });
        let enhanced = enhance(worker, None);
        // Two interleaved runs stay independent.
        let mut first = enhanced(&[SagaValue::Data(json!(1))]);
        let mut second = enhanced(&[SagaValue::Data(json!(2))]);
        let step_one = first.next(SagaValue::Unit).unwrap();
        let step_two = second.next(SagaValue::Unit).unwrap();
        let payload = |step: &SequenceStep| match step {
            SequenceStep::Yield(SagaValue::Effect(Effect::Put(action))) => {
                action.payload.clone().unwrap()
            }
            other => panic!("expected a put effect, got {other:?}"),
        };
        assert_eq!(payload(&step_one), json!(2));
        assert_eq!(payload(&step_two), json!(4));
    }

    #[test]
    fn host_abort_of_worker_routes_through_recovery() {
        let worker = Callable::factory(|_args| {
            Box::new(move |resume: Resume| -> Result<SequenceStep, SagaError> {
                match resume {
                    Resume::Raise(e) => Err(e),
                    Resume::Next(_) => {
                        Ok(SequenceStep::Yield(Effect::Opaque(json!("wait")).into()))
                    }
                }
            })
        });
        let on_error = Callable::function(|args| {
            let message = args[0].as_error().map(|e| e.message.clone()).unwrap();
            Ok(Action::new("m/ABORTED").with_payload(json!(message)).into())
        });
        let enhanced = enhance(worker, Some(on_error));
        let mut seq = enhanced(&[]);
        assert!(matches!(
            seq.next(SagaValue::Unit).unwrap(),
            SequenceStep::Yield(_)
        ));
        let step = seq.raise(SagaError::new("cancelled")).unwrap();
        match step {
            SequenceStep::Yield(SagaValue::Effect(Effect::Put(action))) => {
                assert_eq!(action.kind, "m/ABORTED");
                assert_eq!(action.payload, Some(json!("cancelled")));
            }
            other => panic!("expected a put effect, got {other:?}"),
        }
    }
}
