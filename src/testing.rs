//! Minimal host execution engine for tests.
//!
//! Drives sequences synchronously, records every emission in order,
//! applies delivered actions to attached module reducers and triggers
//! registered dispatch watchers. It approximates only as much of a real
//! saga runtime as the crate's observable guarantees need: runs always
//! complete before the next action is taken, so `takeLatest` never has
//! anything in flight to cancel.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{Action, Effect, Module, SagaError, SagaValue, SequenceFactory, SequenceStep};

type OpaqueHandler = Box<dyn FnMut(&Value) -> Result<SagaValue, SagaError> + Send>;

struct Watcher {
    pattern: String,
    factory: SequenceFactory,
}

#[derive(Default)]
pub struct TestEngine {
    watchers: Vec<Watcher>,
    modules: Vec<(Module, Value)>,
    opaque_handler: Option<OpaqueHandler>,
    /// Actions emitted by processes via put effects, in order.
    puts: Vec<Action>,
    /// Every delivered action: external dispatches and puts alike.
    log: Vec<Action>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a module: its reducer sees every delivered action and
    /// its sagas are mounted.
    pub fn add_module(&mut self, module: Module) -> Result<(), SagaError> {
        let effects: Vec<Effect> = module
            .sagas()
            .iter()
            .map(|(_, effect)| effect.clone())
            .collect();
        let initial = module.initial_state().clone();
        self.modules.push((module, initial));
        self.mount(effects)
    }

    /// Replies to opaque effects (call, select, ...) a process yields.
    /// Returning `Err` injects the error at the process's suspension
    /// point, as a failed call would.
    pub fn on_opaque<F>(&mut self, handler: F)
    where
        F: FnMut(&Value) -> Result<SagaValue, SagaError> + Send + 'static,
    {
        self.opaque_handler = Some(Box::new(handler));
    }

    /// Mounts root effects: forks run immediately, dispatch effects
    /// register watchers, puts are delivered.
    pub fn mount<I>(&mut self, effects: I) -> Result<(), SagaError>
    where
        I: IntoIterator<Item = Effect>,
    {
        for effect in effects {
            self.handle_effect(SagaValue::Effect(effect))?;
        }
        Ok(())
    }

    /// Delivers an external action, as a store dispatch would.
    pub fn dispatch(&mut self, action: Action) -> Result<(), SagaError> {
        self.deliver(action)
    }

    pub fn puts(&self) -> &[Action] {
        &self.puts
    }

    pub fn log(&self) -> &[Action] {
        &self.log
    }

    pub fn state(&self, module_name: &str) -> Option<&Value> {
        self.modules
            .iter()
            .find(|(module, _)| module.name() == module_name)
            .map(|(_, state)| state)
    }

    fn deliver(&mut self, action: Action) -> Result<(), SagaError> {
        self.log.push(action.clone());
        for (module, state) in &mut self.modules {
            *state = module.reduce(Some(state), &action).into_owned();
        }
        // Collect first: a triggered run may register more watchers.
        let triggered: Vec<SequenceFactory> = self
            .watchers
            .iter()
            .filter(|watcher| watcher.pattern == action.kind)
            .map(|watcher| watcher.factory.clone())
            .collect();
        for factory in triggered {
            let seq = factory(&[SagaValue::Action(action.clone())]);
            self.run_sequence(seq)?;
        }
        Ok(())
    }

    fn run_sequence(&mut self, mut seq: crate::BoxSequence) -> Result<(), SagaError> {
        enum Op {
            Next(SagaValue),
            Raise(SagaError),
        }
        let mut op = Op::Next(SagaValue::Unit);
        loop {
            let step = match op {
                Op::Next(value) => seq.next(value)?,
                Op::Raise(err) => seq.raise(err)?,
            };
            match step {
                SequenceStep::Done(_) => return Ok(()),
                SequenceStep::Yield(value) => {
                    op = match self.handle_effect(value) {
                        Ok(reply) => Op::Next(reply),
                        Err(err) => Op::Raise(err),
                    };
                }
            }
        }
    }

    fn handle_effect(&mut self, value: SagaValue) -> Result<SagaValue, SagaError> {
        let effect = match value {
            SagaValue::Effect(effect) => effect,
            // Normalized processes never leak bare values to the host.
            other => {
                return Err(SagaError::new(format!(
                    "test engine received a non-effect value: {other:?}"
                )))
            }
        };
        match effect {
            Effect::Put(action) => {
                self.puts.push(action.clone());
                self.deliver(action.clone())?;
                Ok(SagaValue::Action(action))
            }
            Effect::Fork(fork) => {
                let seq = (fork.factory)(&fork.args);
                self.run_sequence(seq)?;
                Ok(SagaValue::Unit)
            }
            // Runs complete before the next action is taken, so every
            // dispatch variant degenerates to take-every here.
            Effect::TakeEvery(take) | Effect::TakeLeading(take) | Effect::TakeLatest(take) => {
                self.watchers.push(Watcher {
                    pattern: take.pattern,
                    factory: take.factory,
                });
                Ok(SagaValue::Unit)
            }
            Effect::Throttle(throttle) | Effect::Debounce(throttle) => {
                self.watchers.push(Watcher {
                    pattern: throttle.pattern,
                    factory: throttle.factory,
                });
                Ok(SagaValue::Unit)
            }
            Effect::Opaque(value) => match &mut self.opaque_handler {
                Some(handler) => handler(&value),
                None => Ok(SagaValue::Unit),
            },
        }
    }
}

/// Retrieved workers keyed by saga name, for direct driving in tests.
pub fn workers_of(module: &Module) -> Result<BTreeMap<String, SequenceFactory>, crate::ConfigError> {
    module
        .sagas()
        .iter()
        .map(|(name, effect)| Ok((name.clone(), crate::retrieve_worker(effect)?)))
        .collect()
}
