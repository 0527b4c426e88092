//! Path expressions addressing nodes of a map tree, e.g. `orders[0].lines["sku"]`.
//!
//! Paths are either built step by step with [`MapPath::field`],
//! [`MapPath::at`] and [`MapPath::key`], or parsed from text. Navigation
//! reuses intermediate nodes that already fit the next step, creates missing
//! ones on demand, and always rebuilds the leaf so the latest configuration
//! for a path wins.

use std::{fmt, iter::Peekable, str::CharIndices, str::FromStr};

use crate::{
    auto::AutoMapper,
    column::ColumnSpec,
    error::ConfigError,
    map::{ArrayIndexerMap, DictionaryIndexerMap, Map},
    shape::{FieldShape, ObjectShape, Shape},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Field(String),
    Index(usize),
    Key(String),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Field(name) => f.write_str(name),
            PathStep::Index(index) => write!(f, "[{index}]"),
            PathStep::Key(key) => write!(f, "[\"{}\"]", key.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapPath {
    steps: Vec<PathStep>,
}

impl MapPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.steps.push(PathStep::Field(name.into()));
        self
    }

    pub fn at(mut self, index: usize) -> Self {
        self.steps.push(PathStep::Index(index));
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.steps.push(PathStep::Key(key.into()));
        self
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        PathParser::new(text).parse()
    }
}

impl FromStr for MapPath {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        MapPath::parse(text)
    }
}

impl fmt::Display for MapPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, step) in self.steps.iter().enumerate() {
            if idx > 0 && matches!(step, PathStep::Field(_)) {
                f.write_str(".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

struct PathParser<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> PathParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    fn error(&self, position: usize, reason: impl Into<String>) -> ConfigError {
        ConfigError::MalformedPath {
            path: self.text.to_string(),
            position,
            reason: reason.into(),
        }
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map_or(self.text.len(), |(pos, _)| *pos)
    }

    fn parse(mut self) -> Result<MapPath, ConfigError> {
        if self.text.trim().is_empty() {
            return Err(self.error(0, "path is empty"));
        }
        let mut steps = Vec::new();
        match self.chars.peek() {
            Some((_, '[')) => {}
            _ => steps.push(self.identifier()?),
        }
        while let Some((pos, ch)) = self.chars.peek().copied() {
            match ch {
                '.' => {
                    self.chars.next();
                    steps.push(self.identifier()?);
                }
                '[' => {
                    self.chars.next();
                    steps.push(self.indexer(pos)?);
                }
                '(' => return Err(self.error(pos, "method calls are not supported")),
                other => return Err(self.error(pos, format!("unexpected character '{other}'"))),
            }
        }
        Ok(MapPath { steps })
    }

    fn identifier(&mut self) -> Result<PathStep, ConfigError> {
        let start = self.position();
        let mut name = String::new();
        while let Some((_, ch)) = self.chars.peek().copied() {
            let valid = if name.is_empty() {
                ch.is_alphabetic() || ch == '_'
            } else {
                ch.is_alphanumeric() || ch == '_'
            };
            if !valid {
                break;
            }
            name.push(ch);
            self.chars.next();
        }
        if name.is_empty() {
            return Err(self.error(start, "expected a field name"));
        }
        Ok(PathStep::Field(name))
    }

    fn indexer(&mut self, open: usize) -> Result<PathStep, ConfigError> {
        let step = match self.chars.peek().copied() {
            Some((_, quote @ ('"' | '\''))) => {
                self.chars.next();
                PathStep::Key(self.quoted(open, quote)?)
            }
            Some((pos, '-')) => return Err(self.error(pos, "indices must not be negative")),
            Some((pos, ch)) if ch.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some((_, ch)) = self.chars.peek().copied() {
                    if !ch.is_ascii_digit() {
                        break;
                    }
                    digits.push(ch);
                    self.chars.next();
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|err| self.error(pos, format!("invalid index: {err}")))?;
                PathStep::Index(index)
            }
            Some((pos, _)) => {
                return Err(self.error(pos, "expected an integer index or a quoted key"));
            }
            None => return Err(self.error(open, "unterminated indexer")),
        };
        match self.chars.next() {
            Some((_, ']')) => Ok(step),
            Some((pos, _)) => Err(self.error(pos, "expected ']'")),
            None => Err(self.error(open, "unterminated indexer")),
        }
    }

    fn quoted(&mut self, open: usize, quote: char) -> Result<String, ConfigError> {
        let mut key = String::new();
        while let Some((_, ch)) = self.chars.next() {
            match ch {
                '\\' => match self.chars.next() {
                    Some((_, escaped)) => key.push(escaped),
                    None => break,
                },
                ch if ch == quote => return Ok(key),
                ch => key.push(ch),
            }
        }
        Err(self.error(open, "unterminated quoted key"))
    }
}

/// Finds the node `path` addresses under `root`, creating missing nodes with
/// `auto`, and returns it for customisation. The leaf is always rebuilt, so
/// earlier customisations of the same path are discarded.
pub fn locate_or_create<'m>(
    root: &'m mut Map,
    path: &MapPath,
    auto: &AutoMapper,
) -> Result<&'m mut Map, ConfigError> {
    if path.is_empty() {
        return Err(ConfigError::MalformedPath {
            path: String::new(),
            position: 0,
            reason: "path is empty".to_string(),
        });
    }
    let label = root.type_name();
    descend(root, path.steps(), &label, auto)
}

fn descend<'m>(
    node: &'m mut Map,
    steps: &[PathStep],
    label: &str,
    auto: &AutoMapper,
) -> Result<&'m mut Map, ConfigError> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(node);
    };
    let next = rest.first();
    match step {
        PathStep::Field(name) => {
            let Map::Object(object) = node else {
                return Err(unsupported_step(step, node));
            };
            let field = object
                .shape()
                .field(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownField {
                    type_name: object.shape().type_name.clone(),
                    field: name.clone(),
                })?;
            let Some(next) = next else {
                let leaf = auto.map_field(object.shape(), &field)?;
                return Ok(object.upsert(name, leaf));
            };
            if !object.member(name).is_some_and(|existing| fits(existing, next)) {
                let container = container_for_field(auto, object.shape(), &field, next)?;
                object.upsert(name, container);
            }
            let child = object
                .member_mut(name)
                .ok_or_else(|| missing_node(step, &field.shape()))?;
            descend(child, rest, name, auto)
        }
        PathStep::Index(index) => {
            if let Map::ArrayIndexer(indexer) = &*node
                && indexer.fixed_length().is_some_and(|length| *index >= length)
            {
                return Err(unsupported_step(step, node));
            }
            let Map::ArrayIndexer(indexer) = node else {
                return Err(unsupported_step(step, node));
            };
            let element_label = format!("{label}[{index}]");
            let element_shape = indexer.element_shape().clone();
            let fresh = match next {
                None => Some(auto.map_element(
                    &element_label,
                    &element_shape,
                    ColumnSpec::Name(element_label.clone()),
                )?),
                Some(next) if !indexer.element(*index).is_some_and(|existing| fits(existing, next)) => {
                    Some(container_for(auto, &element_label, &element_shape, next)?)
                }
                Some(_) => None,
            };
            let child = match fresh {
                Some(map) => indexer.set_element(*index, map),
                None => indexer
                    .element_mut(*index)
                    .ok_or_else(|| missing_node(step, &element_shape))?,
            };
            descend(child, rest, &element_label, auto)
        }
        PathStep::Key(key) => {
            let Map::DictionaryIndexer(indexer) = node else {
                return Err(unsupported_step(step, node));
            };
            let value_shape = indexer.value_shape().clone();
            let fresh = match next {
                None => Some(auto.map_element(key, &value_shape, ColumnSpec::Name(key.clone()))?),
                Some(next) if !indexer.entry(key).is_some_and(|existing| fits(existing, next)) => {
                    Some(container_for(auto, key, &value_shape, next)?)
                }
                Some(_) => None,
            };
            let child = match fresh {
                Some(map) => indexer.set_entry(key, map),
                None => indexer
                    .entry_mut(key)
                    .ok_or_else(|| missing_node(step, &value_shape))?,
            };
            descend(child, rest, key, auto)
        }
    }
}

fn fits(map: &Map, next: &PathStep) -> bool {
    matches!(
        (map, next),
        (Map::Object(_), PathStep::Field(_))
            | (Map::ArrayIndexer(_), PathStep::Index(_))
            | (Map::DictionaryIndexer(_), PathStep::Key(_))
    )
}

fn unsupported_step(step: &PathStep, node: &Map) -> ConfigError {
    ConfigError::UnsupportedStep {
        step: step.to_string(),
        type_name: node.type_name(),
    }
}

fn missing_node(step: &PathStep, shape: &Shape) -> ConfigError {
    ConfigError::UnsupportedStep {
        step: step.to_string(),
        type_name: shape.type_name(),
    }
}

fn container_for_field(
    auto: &AutoMapper,
    owner: &ObjectShape,
    field: &FieldShape,
    next: &PathStep,
) -> Result<Map, ConfigError> {
    match next {
        PathStep::Field(_) => auto.map_field(owner, field),
        _ => container_for(auto, &field.name, &field.shape(), next),
    }
}

/// Empty node of the kind `next` navigates into.
fn container_for(
    auto: &AutoMapper,
    label: &str,
    shape: &Shape,
    next: &PathStep,
) -> Result<Map, ConfigError> {
    match (shape.required(), next) {
        (Shape::Object(_), PathStep::Field(_)) => {
            auto.map_element(label, shape, ColumnSpec::Name(label.to_string()))
        }
        (Shape::Sequence(sequence), PathStep::Index(_)) => {
            Ok(Map::ArrayIndexer(ArrayIndexerMap::new(
                sequence.type_name.clone(),
                sequence.element.as_ref().clone(),
                auto.materializers().select(sequence)?,
            )))
        }
        (Shape::Dictionary(dictionary), PathStep::Key(_)) => {
            Ok(Map::DictionaryIndexer(DictionaryIndexerMap::new(
                dictionary.type_name.clone(),
                dictionary.value.as_ref().clone(),
            )))
        }
        (other, step) => Err(ConfigError::UnsupportedStep {
            step: step.to_string(),
            type_name: other.type_name(),
        }),
    }
}
