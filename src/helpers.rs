use serde_json::Value;
use std::collections::BTreeMap;

use crate::{ConfigError, Effect, SequenceFactory};

/// Text after the last `/`, for namespaced module and key names.
pub fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Accessor-name derivation: `REQUEST_SUCCESS` -> `requestSuccess`.
/// Words split on `_`, `-`, `.` and whitespace; all-caps words are
/// lowercased, mixed-case words keep their interior casing.
pub fn camel_case(key: &str) -> String {
    let words: Vec<&str> = key
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .collect();

    let mut out = String::with_capacity(key.len());
    for (i, word) in words.iter().enumerate() {
        let flattened = if word.chars().all(|c| !c.is_lowercase()) {
            word.to_lowercase()
        } else {
            (*word).to_owned()
        };
        if i == 0 {
            let mut chars = flattened.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_lowercase());
                out.push_str(chars.as_str());
            }
        } else {
            let mut chars = flattened.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

/// Pulls the original worker factory back out of a built fork-family
/// effect. Mostly a testing aid: lets tests drive the worker a module
/// assembled without going through the host engine.
pub fn retrieve_worker(effect: &Effect) -> Result<SequenceFactory, ConfigError> {
    effect.worker().cloned().ok_or(ConfigError::NotForkEffect)
}

pub fn retrieve_workers<'a, I>(sagas: I) -> Result<BTreeMap<String, SequenceFactory>, ConfigError>
where
    I: IntoIterator<Item = (&'a String, &'a Effect)>,
{
    sagas
        .into_iter()
        .map(|(name, effect)| Ok((name.clone(), retrieve_worker(effect)?)))
        .collect()
}

/// Arbitrarily nested containers of effects, as handed around when
/// mounting several modules' sagas at once.
#[derive(Debug, Clone, derive_more::From)]
pub enum SagaTree {
    Effect(Effect),
    Many(Vec<SagaTree>),
    #[from(ignore)]
    Named(Vec<(String, SagaTree)>),
    /// Non-effect leaf; skipped when flattening.
    Leaf(Value),
}

/// Depth-first flatten into the flat effect list the host engine
/// mounts. Non-effect leaves are dropped silently.
pub fn flatten_sagas<I>(trees: I) -> Vec<Effect>
where
    I: IntoIterator<Item = SagaTree>,
{
    let mut flat = vec![];
    for tree in trees {
        collect(tree, &mut flat);
    }
    flat
}

fn collect(tree: SagaTree, flat: &mut Vec<Effect>) {
    match tree {
        SagaTree::Effect(effect) => flat.push(effect),
        SagaTree::Many(children) => {
            for child in children {
                collect(child, flat);
            }
        }
        SagaTree::Named(children) => {
            for (_, child) in children {
                collect(child, flat);
            }
        }
        SagaTree::Leaf(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_takes_the_last_segment() {
        assert_eq!(basename("my/awesomeModule"), "awesomeModule");
        assert_eq!(basename("plain"), "plain");
        assert_eq!(basename("a/b/c"), "c");
    }

    #[test]
    fn camel_case_handles_duck_style_keys() {
        assert_eq!(camel_case("ACTION_ONE"), "actionOne");
        assert_eq!(camel_case("REQUEST_SUCCESS"), "requestSuccess");
        assert_eq!(camel_case("FOO"), "foo");
        assert_eq!(camel_case("fooAction"), "fooAction");
        assert_eq!(camel_case("FooAction"), "fooAction");
        assert_eq!(camel_case("foo-bar_baz"), "fooBarBaz");
    }
}
