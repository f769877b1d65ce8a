use serde_json::Value;

use crate::{Action, Effect, SagaError};

/// A value flowing between a saga and the host engine: yielded
/// intermediate values, host replies, invocation arguments and final
/// return values all use this one umbrella type, so classification
/// happens on the tag instead of duck-typed shape checks.
#[derive(Debug, Clone, derive_more::From)]
pub enum SagaValue {
    /// No value (`undefined`).
    #[from(ignore)]
    Unit,
    /// Plain data with no meaning to the core.
    Data(Value),
    Action(Action),
    Effect(Effect),
    /// A captured worker failure; only appears as the first argument
    /// of a recovery routine.
    Error(SagaError),
}

impl SagaValue {
    /// A recognized host effect. Never panics; any other shape is
    /// simply not an effect.
    pub fn is_effect(&self) -> bool {
        matches!(self, Self::Effect(_))
    }

    /// A recognized effect that forks an independent process.
    pub fn is_fork_effect(&self) -> bool {
        matches!(self, Self::Effect(effect) if effect.is_fork())
    }

    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Self::Action(action) => Some(action),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&SagaError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl Default for SagaValue {
    fn default() -> Self {
        Self::Unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence_factory;
    use crate::ForkEffect;
    use serde_json::json;

    fn noop_factory() -> crate::SequenceFactory {
        sequence_factory(|_| {
            Box::new(
                |_resume: crate::Resume| -> Result<crate::SequenceStep, SagaError> {
                    Ok(crate::SequenceStep::Done(SagaValue::Unit))
                },
            )
        })
    }

    #[test]
    fn classification_is_total_and_exclusive() {
        let action = SagaValue::from(Action::new("m/A"));
        assert!(action.is_action());
        assert!(!action.is_effect());
        assert!(!action.is_fork_effect());

        let data = SagaValue::from(json!({ "type": 1 }));
        assert!(!data.is_action());
        assert!(!data.is_effect());

        assert!(!SagaValue::Unit.is_action());
        assert!(!SagaValue::from(SagaError::new("boom")).is_effect());
    }

    #[test]
    fn fork_effects_are_recognized_among_effects() {
        let put = SagaValue::from(Effect::Put(Action::new("m/A")));
        assert!(put.is_effect());
        assert!(!put.is_fork_effect());

        let fork = SagaValue::from(Effect::Fork(ForkEffect {
            factory: noop_factory(),
            args: vec![],
            detached: false,
        }));
        assert!(fork.is_effect());
        assert!(fork.is_fork_effect());
    }
}
