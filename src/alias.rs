//! Command aliases
//!
//! An alias replaces the first token of a stage with its own whitespace-split
//! tokens. Expansion is single-pass: the replacement is never re-expanded.

use crate::parser::StageSpec;
use std::collections::BTreeMap;

/// Aliases every new shell starts with
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[("ll", "ls -la"), ("la", "ls -a"), ("l", "ls -CF")];

/// Name -> replacement text, iterated in name order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut table = AliasTable::empty();
        for (name, value) in DEFAULT_ALIASES {
            table.define(*name, *value);
        }
        table
    }
}

impl AliasTable {
    pub fn empty() -> Self {
        AliasTable {
            entries: BTreeMap::new(),
        }
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand the first token of `stage`, keeping the remaining tokens
    pub fn expand(&self, stage: StageSpec) -> StageSpec {
        expand(stage, self)
    }
}

/// Rewrite `stage` through `aliases`
pub fn expand(stage: StageSpec, aliases: &AliasTable) -> StageSpec {
    let replacement = match stage.program().and_then(|name| aliases.get(name)) {
        Some(value) => value,
        None => return stage,
    };

    let mut argv: Vec<String> = replacement.split_whitespace().map(String::from).collect();
    argv.extend(stage.argv.into_iter().skip(1));
    StageSpec { argv }
}
