use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::{
    basename, camel_case, enhance, Action, ActionCreator, Callable, ConfigError, Creator, Effect,
    EffectVocabulary, EnhancedForkers, ForkerKind, SagaTree, SagaValue, SequenceFactory,
};

pub type ReducerFn = Arc<dyn Fn(&Value, &Action) -> Value + Send + Sync>;

/// Per-key declaration: any subset of payload construction, state
/// transition, effect-process and recovery routine.
#[derive(Clone, Default)]
pub struct Definition {
    pub(crate) creator: Option<Creator>,
    pub(crate) reducer: Option<ReducerFn>,
    pub(crate) saga: Option<SagaDef>,
    pub(crate) on_error: Option<Callable>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn creator<F>(mut self, payload: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.creator = Some(Creator::payload(payload));
        self
    }

    pub fn creator_pair<P, M>(mut self, payload: P, meta: M) -> Self
    where
        P: Fn(&[Value]) -> Value + Send + Sync + 'static,
        M: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.creator = Some(Creator::pair(payload, meta));
        self
    }

    pub fn reducer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Action) -> Value + Send + Sync + 'static,
    {
        self.reducer = Some(Arc::new(f));
        self
    }

    pub fn saga(mut self, saga: impl Into<SagaDef>) -> Self {
        self.saga = Some(saga.into());
        self
    }

    pub fn on_error(mut self, callable: Callable) -> Self {
        self.on_error = Some(callable);
        self
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("creator", &self.creator.is_some())
            .field("reducer", &self.reducer.is_some())
            .field("saga", &self.saga.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// A bare state-transition function is a complete declaration.
pub trait IntoDefinition {
    fn into_definition(self) -> Definition;
}

impl IntoDefinition for Definition {
    fn into_definition(self) -> Definition {
        self
    }
}

impl<F> IntoDefinition for F
where
    F: Fn(&Value, &Action) -> Value + Send + Sync + 'static,
{
    fn into_definition(self) -> Definition {
        Definition::new().reducer(self)
    }
}

/// How an effect-process is declared: a sequence factory (wrapped by
/// the default dispatch primitive), a thunk invoked once at assembly
/// with the [`SagaTools`] bag, or an already-built fork effect.
#[derive(Clone)]
pub enum SagaDef {
    Factory(SequenceFactory),
    Thunk(Arc<dyn Fn(&SagaTools) -> ThunkResult + Send + Sync>),
    Effect(Effect),
}

impl SagaDef {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&[SagaValue]) -> crate::BoxSequence + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(f))
    }

    pub fn thunk<F, R>(f: F) -> Self
    where
        F: Fn(&SagaTools) -> R + Send + Sync + 'static,
        R: Into<ThunkResult>,
    {
        Self::Thunk(Arc::new(move |tools| f(tools).into()))
    }
}

impl From<SequenceFactory> for SagaDef {
    fn from(factory: SequenceFactory) -> Self {
        Self::Factory(factory)
    }
}

impl From<Effect> for SagaDef {
    fn from(effect: Effect) -> Self {
        Self::Effect(effect)
    }
}

/// What a saga thunk may produce.
#[derive(Clone, derive_more::From)]
pub enum ThunkResult {
    Factory(SequenceFactory),
    Effect(Effect),
}

/// Argument bag handed to saga thunks at assembly time.
pub struct SagaTools {
    /// The derived kind, for per-key sagas.
    pub kind: Option<String>,
    /// The module's derived kind table, for module-level sagas.
    pub kinds: BTreeMap<String, String>,
    /// Forking primitives bound to this declaration's recovery routine.
    pub forkers: EnhancedForkers,
}

impl SagaTools {
    /// Manual wrapping with the declaration's recovery routine.
    pub fn enhance(&self, worker: Callable) -> SequenceFactory {
        self.forkers.enhance(worker)
    }

    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }
}

/// Declaration map preserving insertion order.
#[derive(Default)]
pub struct Definitions {
    entries: Vec<(String, Definition)>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, key: impl Into<String>, definition: impl IntoDefinition) -> Self {
        self.entries.push((key.into(), definition.into_definition()));
        self
    }
}

/// Module-level options: additional standalone effect-processes.
#[derive(Default)]
pub struct ModuleOptions {
    pub sagas: Vec<(String, SagaDef)>,
}

impl ModuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saga(mut self, name: impl Into<String>, saga: impl Into<SagaDef>) -> Self {
        self.sagas.push((name.into(), saga.into()));
        self
    }
}

/// The assembled bundle for one namespace: composed reducer, action
/// constructors, derived kind strings and initialized effect-processes.
/// Immutable after assembly; the lookup tables are the only state
/// shared across process invocations, and they are read-only.
#[derive(Clone)]
pub struct Module {
    name: String,
    initial_state: Value,
    reducers: BTreeMap<String, ReducerFn>,
    kinds: BTreeMap<String, String>,
    creators: BTreeMap<String, ActionCreator>,
    sagas: Vec<(String, Effect)>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> &Value {
        &self.initial_state
    }

    /// The composed state-transition function, shaped as a standard
    /// reducer. `None` state returns the declared initial state and an
    /// unrecognized kind returns the input state, both borrowed rather
    /// than rebuilt.
    pub fn reduce<'a>(&'a self, state: Option<&'a Value>, action: &Action) -> Cow<'a, Value> {
        match state {
            None => Cow::Borrowed(&self.initial_state),
            Some(state) => match self.reducers.get(&action.kind) {
                Some(reducer) => Cow::Owned(reducer(state, action)),
                None => Cow::Borrowed(state),
            },
        }
    }

    /// Full kind string for a declared base kind.
    pub fn kind(&self, base: &str) -> Option<&str> {
        self.kinds.get(base).map(String::as_str)
    }

    pub fn kinds(&self) -> &BTreeMap<String, String> {
        &self.kinds
    }

    /// Action constructor by camel-cased accessor name.
    pub fn creator(&self, accessor: &str) -> Option<&ActionCreator> {
        self.creators.get(accessor)
    }

    /// Constructs an action through a declared creator.
    pub fn create(&self, accessor: &str, args: &[Value]) -> Option<Action> {
        self.creators.get(accessor).map(|c| c.create(args))
    }

    /// Initialized effect-processes in declaration order.
    pub fn sagas(&self) -> &[(String, Effect)] {
        &self.sagas
    }

    pub fn saga(&self, key: &str) -> Option<&Effect> {
        self.sagas
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, effect)| effect)
    }

    pub fn saga_tree(&self) -> SagaTree {
        SagaTree::Named(
            self.sagas
                .iter()
                .map(|(name, effect)| (name.clone(), SagaTree::Effect(effect.clone())))
                .collect(),
        )
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("kinds", &self.kinds)
            .finish()
    }
}

/// Assembler configuration: the host vocabulary plus naming options.
pub struct DucksConfig {
    pub vocabulary: EffectVocabulary,
    /// Global namespace prefix added to derived kinds as `@@app/`.
    pub app_name: Option<String>,
    /// Dispatch primitive used for sagas declared as bare sequence
    /// factories. Defaults to `takeEvery`.
    pub default_forker: Option<ForkerKind>,
}

impl DucksConfig {
    pub fn new(vocabulary: EffectVocabulary) -> Self {
        Self {
            vocabulary,
            app_name: None,
            default_forker: None,
        }
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn default_forker(mut self, kind: ForkerKind) -> Self {
        self.default_forker = Some(kind);
        self
    }
}

/// The module assembler.
pub struct Ducks {
    vocabulary: EffectVocabulary,
    app_name: Option<String>,
    default_forker: ForkerKind,
}

impl Ducks {
    pub fn new(config: DucksConfig) -> Result<Self, ConfigError> {
        let default_forker = config.default_forker.unwrap_or(ForkerKind::TakeEvery);
        if !default_forker.is_dispatch() || !config.vocabulary.has(default_forker) {
            return Err(ConfigError::InvalidDefaultForker(default_forker));
        }
        Ok(Self {
            vocabulary: config.vocabulary,
            app_name: config.app_name,
            default_forker,
        })
    }

    /// Assembler over the crate's own effect vocabulary.
    pub fn standard() -> Self {
        Self::new(DucksConfig::new(EffectVocabulary::standard()))
            .expect("standard vocabulary supplies every primitive")
    }

    pub fn has(&self, kind: ForkerKind) -> bool {
        self.vocabulary.has(kind)
    }

    pub fn enhance(&self, worker: Callable, on_error: Option<Callable>) -> SequenceFactory {
        enhance(worker, on_error)
    }

    pub fn enhanced_forkers(&self, on_error: Option<Callable>) -> EnhancedForkers {
        EnhancedForkers::new(self.vocabulary.clone(), on_error)
    }

    pub fn create_module(
        &self,
        name: &str,
        definitions: Definitions,
        initial_state: Value,
        options: ModuleOptions,
    ) -> Result<Module, ConfigError> {
        let mut reducers = BTreeMap::new();
        let mut kinds = BTreeMap::new();
        let mut creators = BTreeMap::new();
        let mut sagas = vec![];

        for (raw_key, definition) in definitions.entries {
            let key = KeySpec::parse(&raw_key, self.app_name.is_some());
            let full_kind = key.full_kind(self.app_name.as_deref(), name);
            let base = basename(key.kind);
            let accessor = camel_case(base);
            tracing::debug!(module = name, kind = %full_kind, "assembling declaration");

            if let Some(reducer) = definition.reducer {
                reducers.insert(full_kind.clone(), reducer);
            }
            if key.with_module {
                kinds.insert(base.to_owned(), full_kind.clone());
                creators.insert(
                    accessor.clone(),
                    ActionCreator::new(full_kind.clone(), definition.creator),
                );
            }
            if let Some(saga) = definition.saga {
                let saga_key = if key.use_full_kind_as_key {
                    full_kind.clone()
                } else {
                    accessor
                };
                let effect = self.init_main_saga(saga, &full_kind, definition.on_error)?;
                sagas.push((saga_key, effect));
            }
        }

        for (saga_name, saga) in options.sagas {
            let effect = self.init_additional_saga(saga, &kinds, &saga_name)?;
            sagas.push((saga_name, effect));
        }

        Ok(Module {
            name: name.to_owned(),
            initial_state,
            reducers,
            kinds,
            creators,
            sagas,
        })
    }

    /// Per-key saga: bare factories dispatch on the derived kind via
    /// the default forker; thunks get the kind and the forker table.
    fn init_main_saga(
        &self,
        saga: SagaDef,
        full_kind: &str,
        on_error: Option<Callable>,
    ) -> Result<Effect, ConfigError> {
        let forkers = self.enhanced_forkers(on_error);
        let label = format!("invalid saga for {full_kind}");
        let resolved = match saga {
            SagaDef::Factory(factory) => {
                let effect = forkers
                    .dispatch(
                        self.default_forker,
                        full_kind,
                        Callable::Factory(factory),
                        vec![],
                    )
                    .ok_or(ConfigError::InvalidDefaultForker(self.default_forker))?;
                ThunkResult::Effect(effect)
            }
            SagaDef::Thunk(thunk) => {
                let tools = SagaTools {
                    kind: Some(full_kind.to_owned()),
                    kinds: BTreeMap::new(),
                    forkers,
                };
                thunk(&tools)
            }
            SagaDef::Effect(effect) => ThunkResult::Effect(effect),
        };
        self.seal_saga(resolved, label)
    }

    /// Module-level saga: bare factories are forked immediately; thunks
    /// get the whole kind table.
    fn init_additional_saga(
        &self,
        saga: SagaDef,
        kinds: &BTreeMap<String, String>,
        saga_name: &str,
    ) -> Result<Effect, ConfigError> {
        let forkers = self.enhanced_forkers(None);
        let label = format!("invalid additional saga {saga_name}");
        let resolved = match saga {
            SagaDef::Factory(factory) => {
                ThunkResult::Effect(forkers.fork(Callable::Factory(factory), vec![]))
            }
            SagaDef::Thunk(thunk) => {
                let tools = SagaTools {
                    kind: None,
                    kinds: kinds.clone(),
                    forkers,
                };
                thunk(&tools)
            }
            SagaDef::Effect(effect) => ThunkResult::Effect(effect),
        };
        self.seal_saga(resolved, label)
    }

    /// A thunk-returned factory is fork-wrapped; an effect must already
    /// be fork-family. Anything else is a declaration error.
    fn seal_saga(&self, resolved: ThunkResult, label: String) -> Result<Effect, ConfigError> {
        match resolved {
            ThunkResult::Factory(factory) => Ok(self
                .enhanced_forkers(None)
                .fork(Callable::Factory(factory), vec![])),
            ThunkResult::Effect(effect) if effect.is_fork_family() => Ok(effect),
            ThunkResult::Effect(_) => Err(ConfigError::InvalidSaga {
                label,
                default_forker: self.default_forker,
            }),
        }
    }
}

/// Leading-sigil grammar on declaration keys:
/// `*` drops the module prefix, `**` (or a literal `@@` target) drops
/// the app prefix as well, and a leading `!` keys the saga map by the
/// full kind string instead of the camel-cased accessor.
struct KeySpec<'a> {
    with_module: bool,
    with_app: bool,
    use_full_kind_as_key: bool,
    kind: &'a str,
}

impl<'a> KeySpec<'a> {
    fn parse(raw: &'a str, has_app: bool) -> Self {
        let (bang, rest) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let double = rest.starts_with("**") || rest.starts_with("@@");
        let with_module = !(rest.starts_with('*') || rest.starts_with("@@"));
        let with_app = has_app && !double;
        let use_full_kind_as_key = bang && !with_module;

        // Strip the bang and up to two stars; a `@@` target is kept
        // literally as part of the kind.
        let mut kind = rest;
        for _ in 0..2 {
            match kind.strip_prefix('*') {
                Some(stripped) => kind = stripped,
                None => break,
            }
        }

        Self {
            with_module,
            with_app,
            use_full_kind_as_key,
            kind,
        }
    }

    fn full_kind(&self, app_name: Option<&str>, module_name: &str) -> String {
        let mut full = String::new();
        if self.with_app {
            if let Some(app) = app_name {
                full.push_str("@@");
                full.push_str(app);
                full.push('/');
            }
        }
        if self.with_module {
            full.push_str(module_name);
            full.push('/');
        }
        full.push_str(self.kind);
        full
    }
}

/// One-off assembly over the standard vocabulary.
pub fn create_module(
    name: &str,
    definitions: Definitions,
    initial_state: Value,
    options: ModuleOptions,
) -> Result<Module, ConfigError> {
    Ducks::standard().create_module(name, definitions, initial_state, options)
}

/// Assembler with an app-level namespace prefix on all derived kinds.
pub fn create_app(app_name: &str) -> Ducks {
    Ducks::new(DucksConfig::new(EffectVocabulary::standard()).app_name(app_name))
        .expect("standard vocabulary supplies every primitive")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str, has_app: bool) -> (bool, bool, bool, String) {
        let key = KeySpec::parse(raw, has_app);
        (
            key.with_module,
            key.with_app,
            key.use_full_kind_as_key,
            key.kind.to_owned(),
        )
    }

    #[test]
    fn plain_keys_get_module_and_app_prefixes() {
        assert_eq!(parse("FOO", true), (true, true, false, "FOO".into()));
        assert_eq!(
            KeySpec::parse("FOO", true).full_kind(Some("app"), "m"),
            "@@app/m/FOO"
        );
        assert_eq!(KeySpec::parse("FOO", false).full_kind(None, "m"), "m/FOO");
    }

    #[test]
    fn single_star_drops_only_the_module_prefix() {
        assert_eq!(parse("*FOO", true), (false, true, false, "FOO".into()));
        assert_eq!(
            KeySpec::parse("*FOO", true).full_kind(Some("app"), "m"),
            "@@app/FOO"
        );
    }

    #[test]
    fn double_star_drops_both_prefixes() {
        assert_eq!(parse("**FOO", true), (false, false, false, "FOO".into()));
        assert_eq!(
            KeySpec::parse("**FOO", true).full_kind(Some("app"), "m"),
            "FOO"
        );
    }

    #[test]
    fn literal_at_at_target_keeps_its_prefix() {
        assert_eq!(
            parse("@@other/m/FOO", true),
            (false, false, false, "@@other/m/FOO".into())
        );
        assert_eq!(
            KeySpec::parse("@@other/m/FOO", true).full_kind(Some("app"), "m"),
            "@@other/m/FOO"
        );
    }

    #[test]
    fn bang_requests_full_kind_keys_only_without_module_prefix() {
        assert_eq!(parse("!**FOO", true), (false, false, true, "FOO".into()));
        // A bang on a module-prefixed key is inert.
        assert_eq!(parse("!FOO", true), (true, true, false, "FOO".into()));
    }
}
