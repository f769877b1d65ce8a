use serde::{Deserialize, Serialize};

use crate::{enhance, Callable, Effect, EffectVocabulary, SagaValue, SequenceFactory};

/// Names of the host forking primitives. String forms follow the host
/// vocabulary's conventional camel-cased names.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
pub enum ForkerKind {
    #[strum(serialize = "fork")]
    Fork,
    #[strum(serialize = "spawn")]
    Spawn,
    #[strum(serialize = "takeEvery")]
    TakeEvery,
    #[strum(serialize = "takeLeading")]
    TakeLeading,
    #[strum(serialize = "takeLatest")]
    TakeLatest,
    #[strum(serialize = "throttle")]
    Throttle,
    #[strum(serialize = "debounce")]
    Debounce,
}

impl ForkerKind {
    /// Dispatch primitives take an action pattern and can stand in as
    /// the assembler's default forker; `throttle`/`debounce` cannot
    /// (they need an interval) and neither can the bare forks.
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::TakeEvery | Self::TakeLeading | Self::TakeLatest)
    }
}

/// The host's forking primitives with every worker argument routed
/// through [`enhance`] bound to one recovery routine. Primitives the
/// host does not supply are reported absent (`None`), never fabricated.
#[derive(Clone)]
pub struct EnhancedForkers {
    vocabulary: EffectVocabulary,
    on_error: Option<Callable>,
}

impl EnhancedForkers {
    pub fn new(vocabulary: EffectVocabulary, on_error: Option<Callable>) -> Self {
        Self {
            vocabulary,
            on_error,
        }
    }

    pub fn has(&self, kind: ForkerKind) -> bool {
        self.vocabulary.has(kind)
    }

    /// Manual wrapping with this table's recovery routine.
    pub fn enhance(&self, worker: Callable) -> SequenceFactory {
        enhance(worker, self.on_error.clone())
    }

    pub fn fork(&self, worker: Callable, args: Vec<SagaValue>) -> Effect {
        (self.vocabulary.fork)(self.enhance(worker), args)
    }

    pub fn spawn(&self, worker: Callable, args: Vec<SagaValue>) -> Option<Effect> {
        let spawn = self.vocabulary.spawn.as_ref()?;
        Some(spawn(self.enhance(worker), args))
    }

    pub fn take_every(&self, pattern: &str, worker: Callable, args: Vec<SagaValue>) -> Option<Effect> {
        let take = self.vocabulary.take_every.as_ref()?;
        Some(take(pattern, self.enhance(worker), args))
    }

    pub fn take_leading(
        &self,
        pattern: &str,
        worker: Callable,
        args: Vec<SagaValue>,
    ) -> Option<Effect> {
        let take = self.vocabulary.take_leading.as_ref()?;
        Some(take(pattern, self.enhance(worker), args))
    }

    pub fn take_latest(
        &self,
        pattern: &str,
        worker: Callable,
        args: Vec<SagaValue>,
    ) -> Option<Effect> {
        let take = self.vocabulary.take_latest.as_ref()?;
        Some(take(pattern, self.enhance(worker), args))
    }

    pub fn throttle(
        &self,
        ms: u64,
        pattern: &str,
        worker: Callable,
        args: Vec<SagaValue>,
    ) -> Option<Effect> {
        let throttle = self.vocabulary.throttle.as_ref()?;
        Some(throttle(ms, pattern, self.enhance(worker), args))
    }

    pub fn debounce(
        &self,
        ms: u64,
        pattern: &str,
        worker: Callable,
        args: Vec<SagaValue>,
    ) -> Option<Effect> {
        let debounce = self.vocabulary.debounce.as_ref()?;
        Some(debounce(ms, pattern, self.enhance(worker), args))
    }

    /// Builds a dispatch effect by primitive name; `None` when the
    /// primitive is absent or takes no action pattern.
    pub fn dispatch(
        &self,
        kind: ForkerKind,
        pattern: &str,
        worker: Callable,
        args: Vec<SagaValue>,
    ) -> Option<Effect> {
        match kind {
            ForkerKind::TakeEvery => self.take_every(pattern, worker, args),
            ForkerKind::TakeLeading => self.take_leading(pattern, worker, args),
            ForkerKind::TakeLatest => self.take_latest(pattern, worker, args),
            ForkerKind::Fork
            | ForkerKind::Spawn
            | ForkerKind::Throttle
            | ForkerKind::Debounce => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, SagaError, SagaValue, Sequence, SequenceStep};
    use std::str::FromStr;

    #[test]
    fn forker_kind_names_match_the_host_vocabulary() {
        assert_eq!(ForkerKind::TakeEvery.to_string(), "takeEvery");
        assert_eq!(
            ForkerKind::from_str("takeLatest").unwrap(),
            ForkerKind::TakeLatest
        );
        assert!(ForkerKind::from_str("takeSome").is_err());
    }

    #[test]
    fn absent_primitives_are_reported_absent() {
        let forkers = EnhancedForkers::new(EffectVocabulary::minimal(), None);
        assert!(forkers.has(ForkerKind::Fork));
        assert!(!forkers.has(ForkerKind::TakeEvery));
        let worker = Callable::function(|_args| Ok(SagaValue::Unit));
        assert!(forkers.take_every("m/A", worker.clone(), vec![]).is_none());
        assert!(forkers.spawn(worker, vec![]).is_none());
    }

    #[test]
    fn fork_wraps_the_worker_through_enhancement() {
        // A failing worker with a recovery routine: the built fork
        // effect must carry the enhanced factory, not the raw worker.
        let worker = Callable::function(|_args| Err(SagaError::new("boom")));
        let on_error = Callable::function(|_args| Ok(Action::new("m/FAILURE").into()));
        let forkers = EnhancedForkers::new(EffectVocabulary::standard(), Some(on_error));
        let effect = forkers.fork(worker, vec![]);
        let factory = effect.worker().expect("fork carries a worker");

        let mut seq = factory(&[]);
        let step = seq.next(SagaValue::Unit).unwrap();
        match step {
            SequenceStep::Yield(SagaValue::Effect(Effect::Put(action))) => {
                assert_eq!(action.kind, "m/FAILURE");
            }
            other => panic!("expected the recovery emission, got {other:?}"),
        }
    }
}
