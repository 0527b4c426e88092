//! Case-insensitive header lookup with deterministic duplicate handling.

use std::collections::HashMap;

use log::{debug, warn};

use crate::error::SheetError;

/// Header row of a sheet: the raw names for display plus a lookup table.
///
/// Repeated names keep their raw text for [`name_at`](Self::name_at) but are
/// registered under `name_2`, `name_3`, ... so that each column stays
/// addressable by name.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    names: Vec<String>,
    keys: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn build<I, S>(names: I, max_columns: usize) -> Result<Self, SheetError>
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .map(|name| {
                name.map(Into::into)
                    .filter(|name: &String| !name.trim().is_empty())
                    .unwrap_or_default()
            })
            .collect::<Vec<String>>();
        if names.len() > max_columns {
            return Err(SheetError::TooManyColumns {
                count: names.len(),
                max: max_columns,
            });
        }

        let mut keys = Vec::with_capacity(names.len());
        let mut lookup = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let base = name.as_str();
            let mut key = base.to_string();
            let mut suffix = 2usize;
            while lookup.contains_key(&normalize(&key)) {
                key = format!("{base}_{suffix}");
                suffix += 1;
            }
            if key != base {
                warn!("Duplicate header '{name}' at position {idx} registered as '{key}'");
            }
            lookup.insert(normalize(&key), idx);
            keys.push(key);
        }
        debug!("Indexed header with {} column(s)", names.len());
        Ok(Self {
            names,
            keys,
            lookup,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(&normalize(name)).copied()
    }

    pub fn first_index_matching<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&str) -> bool,
    {
        self.names.iter().position(|name| predicate(name.as_str()))
    }

    pub fn indices_matching<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&str) -> bool,
    {
        self.names
            .iter()
            .enumerate()
            .filter(|(_, name)| predicate(name.as_str()))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Raw header text at `index`, never the disambiguated key.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Key under which the column at `index` is registered for lookups.
    pub fn lookup_key(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}
