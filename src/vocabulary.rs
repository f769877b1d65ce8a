use std::fmt;
use std::sync::Arc;

use crate::{Action, Effect, ForkEffect, ForkerKind, SagaValue, SequenceFactory, TakeEffect, ThrottleEffect};

pub type PutFn = Arc<dyn Fn(Action) -> Effect + Send + Sync>;
pub type ForkFn = Arc<dyn Fn(SequenceFactory, Vec<SagaValue>) -> Effect + Send + Sync>;
pub type TakeFn = Arc<dyn Fn(&str, SequenceFactory, Vec<SagaValue>) -> Effect + Send + Sync>;
pub type ThrottleFn =
    Arc<dyn Fn(u64, &str, SequenceFactory, Vec<SagaValue>) -> Effect + Send + Sync>;

/// The effect constructors supplied by the host execution engine.
///
/// `put` and `fork` are the required minimum; every dispatch primitive
/// beyond that is optional and the core adapts to whichever subset is
/// present instead of fabricating missing ones.
#[derive(Clone)]
pub struct EffectVocabulary {
    pub put: PutFn,
    pub fork: ForkFn,
    pub spawn: Option<ForkFn>,
    pub take_every: Option<TakeFn>,
    pub take_leading: Option<TakeFn>,
    pub take_latest: Option<TakeFn>,
    pub throttle: Option<ThrottleFn>,
    pub debounce: Option<ThrottleFn>,
}

impl EffectVocabulary {
    /// The crate's own tagged effect variants, all primitives present.
    pub fn standard() -> Self {
        Self {
            put: Arc::new(Effect::Put),
            fork: Arc::new(|factory, args| {
                Effect::Fork(ForkEffect {
                    factory,
                    args,
                    detached: false,
                })
            }),
            spawn: Some(Arc::new(|factory, args| {
                Effect::Fork(ForkEffect {
                    factory,
                    args,
                    detached: true,
                })
            })),
            take_every: Some(take_fn(Effect::TakeEvery)),
            take_leading: Some(take_fn(Effect::TakeLeading)),
            take_latest: Some(take_fn(Effect::TakeLatest)),
            throttle: Some(throttle_fn(Effect::Throttle)),
            debounce: Some(throttle_fn(Effect::Debounce)),
        }
    }

    /// Only the required primitives; everything optional is absent.
    pub fn minimal() -> Self {
        Self {
            spawn: None,
            take_every: None,
            take_leading: None,
            take_latest: None,
            throttle: None,
            debounce: None,
            ..Self::standard()
        }
    }

    pub fn has(&self, kind: ForkerKind) -> bool {
        match kind {
            ForkerKind::Fork => true,
            ForkerKind::Spawn => self.spawn.is_some(),
            ForkerKind::TakeEvery => self.take_every.is_some(),
            ForkerKind::TakeLeading => self.take_leading.is_some(),
            ForkerKind::TakeLatest => self.take_latest.is_some(),
            ForkerKind::Throttle => self.throttle.is_some(),
            ForkerKind::Debounce => self.debounce.is_some(),
        }
    }
}

fn take_fn(variant: fn(TakeEffect) -> Effect) -> TakeFn {
    Arc::new(move |pattern, factory, args| {
        variant(TakeEffect {
            pattern: pattern.to_owned(),
            factory,
            args,
        })
    })
}

fn throttle_fn(variant: fn(ThrottleEffect) -> Effect) -> ThrottleFn {
    Arc::new(move |ms, pattern, factory, args| {
        variant(ThrottleEffect {
            ms,
            pattern: pattern.to_owned(),
            factory,
            args,
        })
    })
}

impl fmt::Debug for EffectVocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use strum::IntoEnumIterator;
        let available: Vec<_> = ForkerKind::iter().filter(|k| self.has(*k)).collect();
        f.debug_struct("EffectVocabulary")
            .field("available", &available)
            .finish()
    }
}
