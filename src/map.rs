//! Map nodes: the composable tree describing how a row becomes a value.
//!
//! Trees are built once, by the auto-mapper or through path navigation, and
//! then resolved against every row. Each node owns its children exclusively.
//! Column bindings are cached per sheet under the node's [`NodeId`], which is
//! renewed whenever the node's column specification changes.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    column::ColumnSpec,
    error::{CellError, ConfigError},
    fallback::FallbackItem,
    mappers::CellMapper,
    materialize::Materializer,
    pipeline::ValuePipeline,
    shape::{ObjectShape, Shape},
    sheet::RowContext,
    source::Cell,
    transform::CellTransformer,
    value::Value,
};

pub const DEFAULT_SEPARATORS: &[char] = &[',', ';'];

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where in the sheet a failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Index(usize),
    Spec(String),
}

/// A cell-level failure on its way up to the row reader, collecting the
/// member path as it unwinds.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFailure {
    pub member: Vec<String>,
    pub column: Option<ColumnRef>,
    pub error: CellError,
}

impl CellFailure {
    pub fn new(error: CellError) -> Self {
        Self {
            member: Vec::new(),
            column: None,
            error,
        }
    }

    fn at(mut self, column: ColumnRef) -> Self {
        self.column = Some(column);
        self
    }

    fn within(mut self, segment: impl Into<String>) -> Self {
        self.member.insert(0, segment.into());
        self
    }
}

type Resolved = Result<Option<Value>, CellFailure>;

#[derive(Debug, Clone)]
pub enum Map {
    Scalar(ScalarMap),
    Object(ObjectMap),
    Enumerable(EnumerableMap),
    Dictionary(DictionaryMap),
    ArrayIndexer(ArrayIndexerMap),
    DictionaryIndexer(DictionaryIndexerMap),
}

#[derive(Debug, Clone)]
pub struct ScalarMap {
    id: NodeId,
    column: ColumnSpec,
    pipeline: ValuePipeline,
    optional: bool,
    preserve_formatting: bool,
}

impl ScalarMap {
    pub fn new(column: ColumnSpec, pipeline: ValuePipeline) -> Self {
        Self {
            id: NodeId::next(),
            column,
            pipeline,
            optional: false,
            preserve_formatting: false,
        }
    }

    pub fn column(&self) -> &ColumnSpec {
        &self.column
    }

    pub fn pipeline(&self) -> &ValuePipeline {
        &self.pipeline
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    fn resolve(&self, ctx: &mut RowContext<'_>) -> Resolved {
        let bound = ctx
            .bind(self.id, &self.column, false)
            .map_err(|err| CellFailure::new(err).at(ColumnRef::Spec(self.column.to_string())))?;
        let Some(column) = bound.and_then(|bound| bound.first()) else {
            if self.optional {
                return Ok(None);
            }
            return Err(CellFailure::new(CellError::ColumnNotFound {
                column: self.column.to_string(),
            })
            .at(ColumnRef::Spec(self.column.to_string())));
        };
        let raw = ctx.cell(column);
        let text = ctx.text(column, &raw, self.preserve_formatting);
        self.pipeline
            .execute(Some(column), &raw, text)
            .map(Some)
            .map_err(|err| CellFailure::new(err).at(ColumnRef::Index(column)))
    }
}

#[derive(Debug, Clone)]
pub struct MemberMap {
    pub name: String,
    pub map: Map,
}

#[derive(Debug, Clone)]
pub struct ObjectMap {
    shape: ObjectShape,
    members: Vec<MemberMap>,
}

impl ObjectMap {
    pub fn new(shape: ObjectShape) -> Self {
        Self {
            shape,
            members: Vec::new(),
        }
    }

    pub fn shape(&self) -> &ObjectShape {
        &self.shape
    }

    pub fn members(&self) -> &[MemberMap] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Map> {
        self.members
            .iter()
            .find(|member| member.name == name)
            .map(|member| &member.map)
    }

    pub fn member_mut(&mut self, name: &str) -> Option<&mut Map> {
        self.members
            .iter_mut()
            .find(|member| member.name == name)
            .map(|member| &mut member.map)
    }

    /// Adds or replaces the map for `name`, keeping declaration order.
    pub fn upsert(&mut self, name: &str, map: Map) -> &mut Map {
        let position = match self.members.iter().position(|member| member.name == name) {
            Some(existing) => {
                self.members[existing].map = map;
                existing
            }
            None => {
                let order = |field: &str| {
                    self.shape
                        .fields
                        .iter()
                        .position(|candidate| candidate.name == field)
                        .unwrap_or(usize::MAX)
                };
                let own = order(name);
                let insert_at = self
                    .members
                    .iter()
                    .position(|member| order(&member.name) > own)
                    .unwrap_or(self.members.len());
                self.members.insert(
                    insert_at,
                    MemberMap {
                        name: name.to_string(),
                        map,
                    },
                );
                insert_at
            }
        };
        &mut self.members[position].map
    }

    pub fn remove(&mut self, name: &str) -> Option<Map> {
        let position = self.members.iter().position(|member| member.name == name)?;
        Some(self.members.remove(position).map)
    }

    fn resolve(&self, ctx: &mut RowContext<'_>) -> Resolved {
        let mut record = IndexMap::with_capacity(self.members.len());
        for member in &self.members {
            match member.map.resolve(ctx) {
                Ok(Some(value)) => {
                    record.insert(member.name.clone(), value);
                }
                Ok(None) => {}
                Err(failure) => return Err(failure.within(member.name.clone())),
            }
        }
        Ok(Some(Value::Record(record)))
    }
}

#[derive(Debug, Clone)]
pub enum ElementSource {
    /// One cell whose text is split on any of the separators.
    Split {
        column: ColumnSpec,
        separators: Vec<char>,
    },
    /// One element per bound column.
    Columns(ColumnSpec),
}

#[derive(Debug, Clone)]
pub struct EnumerableMap {
    id: NodeId,
    type_name: String,
    source: ElementSource,
    element: ValuePipeline,
    materializer: Materializer,
    optional: bool,
    preserve_formatting: bool,
}

impl EnumerableMap {
    pub fn new(
        type_name: impl Into<String>,
        source: ElementSource,
        element: ValuePipeline,
        materializer: Materializer,
    ) -> Self {
        Self {
            id: NodeId::next(),
            type_name: type_name.into(),
            source,
            element,
            materializer,
            optional: false,
            preserve_formatting: false,
        }
    }

    pub fn source(&self) -> &ElementSource {
        &self.source
    }

    pub fn element(&self) -> &ValuePipeline {
        &self.element
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    fn spec(&self) -> &ColumnSpec {
        match &self.source {
            ElementSource::Split { column, .. } => column,
            ElementSource::Columns(spec) => spec,
        }
    }

    fn resolve(&self, ctx: &mut RowContext<'_>) -> Resolved {
        let spec = self.spec();
        let multiple = matches!(self.source, ElementSource::Columns(_));
        let bound = ctx
            .bind(self.id, spec, multiple)
            .map_err(|err| CellFailure::new(err).at(ColumnRef::Spec(spec.to_string())))?;
        let Some(bound) = bound else {
            if self.optional {
                return Ok(None);
            }
            return Err(CellFailure::new(CellError::ColumnNotFound {
                column: spec.to_string(),
            })
            .at(ColumnRef::Spec(spec.to_string())));
        };

        let mut elements = Vec::new();
        match &self.source {
            ElementSource::Split { separators, .. } => {
                let Some(column) = bound.first() else {
                    return Ok(Some(self.materialize(elements, None)?));
                };
                let raw = ctx.cell(column);
                let text = ctx.text(column, &raw, self.preserve_formatting);
                let text = text.unwrap_or_default();
                if !text.is_empty() {
                    for (idx, piece) in text.split(separators.as_slice()).enumerate() {
                        let piece_cell = Cell::from(piece);
                        let value = self
                            .element
                            .execute(Some(column), &piece_cell, Some(piece.to_string()))
                            .map_err(|err| {
                                CellFailure::new(err)
                                    .at(ColumnRef::Index(column))
                                    .within(format!("[{idx}]"))
                            })?;
                        elements.push(value);
                    }
                }
                Ok(Some(self.materialize(elements, Some(column))?))
            }
            ElementSource::Columns(_) => {
                for (idx, column) in bound.indices().iter().copied().enumerate() {
                    let raw = ctx.cell(column);
                    let text = ctx.text(column, &raw, self.preserve_formatting);
                    let value = self
                        .element
                        .execute(Some(column), &raw, text)
                        .map_err(|err| {
                            CellFailure::new(err)
                                .at(ColumnRef::Index(column))
                                .within(format!("[{idx}]"))
                        })?;
                    elements.push(value);
                }
                Ok(Some(self.materialize(elements, None)?))
            }
        }
    }

    fn materialize(&self, elements: Vec<Value>, column: Option<usize>) -> Result<Value, CellFailure> {
        materialize(&self.materializer, &self.type_name, elements).map_err(|failure| match column {
            Some(column) => failure.at(ColumnRef::Index(column)),
            None => failure.at(ColumnRef::Spec(self.spec().to_string())),
        })
    }
}

fn materialize(
    materializer: &Materializer,
    type_name: &str,
    elements: Vec<Value>,
) -> Result<Value, CellFailure> {
    let count = elements.len();
    materializer.materialize(elements).map_err(|reason| {
        CellFailure::new(CellError::Conversion {
            value: format!("{count} element(s)"),
            target: type_name.to_string(),
            reason,
        })
    })
}

/// Builds a string-keyed dictionary from several columns, keyed by header name.
#[derive(Debug, Clone)]
pub struct DictionaryMap {
    id: NodeId,
    type_name: String,
    column: ColumnSpec,
    element: ValuePipeline,
    optional: bool,
    preserve_formatting: bool,
}

impl DictionaryMap {
    pub fn new(type_name: impl Into<String>, column: ColumnSpec, element: ValuePipeline) -> Self {
        Self {
            id: NodeId::next(),
            type_name: type_name.into(),
            column,
            element,
            optional: false,
            preserve_formatting: false,
        }
    }

    pub fn column(&self) -> &ColumnSpec {
        &self.column
    }

    fn resolve(&self, ctx: &mut RowContext<'_>) -> Resolved {
        let bound = ctx
            .bind(self.id, &self.column, true)
            .map_err(|err| CellFailure::new(err).at(ColumnRef::Spec(self.column.to_string())))?;
        let Some(bound) = bound else {
            if self.optional {
                return Ok(None);
            }
            return Err(CellFailure::new(CellError::ColumnNotFound {
                column: self.column.to_string(),
            })
            .at(ColumnRef::Spec(self.column.to_string())));
        };
        let mut entries = IndexMap::with_capacity(bound.indices().len());
        for column in bound.indices().iter().copied() {
            let key = dictionary_key(ctx, column, &entries);
            let raw = ctx.cell(column);
            let text = ctx.text(column, &raw, self.preserve_formatting);
            let value = self
                .element
                .execute(Some(column), &raw, text)
                .map_err(|err| {
                    CellFailure::new(err)
                        .at(ColumnRef::Index(column))
                        .within(format!("[\"{key}\"]"))
                })?;
            entries.insert(key, value);
        }
        Ok(Some(Value::Map(entries)))
    }
}

/// Display name of the column, or its lookup key when the display name was
/// already used. Headerless sheets key by position.
fn dictionary_key(
    ctx: &RowContext<'_>,
    column: usize,
    existing: &IndexMap<String, Value>,
) -> String {
    let Some(header) = ctx.header() else {
        return column.to_string();
    };
    match header.name_at(column) {
        Some(name) if !existing.contains_key(name) => name.to_string(),
        Some(_) => header
            .lookup_key(column)
            .map(str::to_string)
            .unwrap_or_else(|| column.to_string()),
        None => column.to_string(),
    }
}

/// Collection whose elements are each mapped explicitly by position.
#[derive(Debug, Clone)]
pub struct ArrayIndexerMap {
    type_name: String,
    element_shape: Shape,
    materializer: Materializer,
    elements: BTreeMap<usize, Map>,
}

impl ArrayIndexerMap {
    pub fn new(type_name: impl Into<String>, element_shape: Shape, materializer: Materializer) -> Self {
        Self {
            type_name: type_name.into(),
            element_shape,
            materializer,
            elements: BTreeMap::new(),
        }
    }

    pub fn element_shape(&self) -> &Shape {
        &self.element_shape
    }

    /// Length of a fixed-size array target; `None` for growable containers.
    pub fn fixed_length(&self) -> Option<usize> {
        match self.materializer {
            Materializer::Array { length } => length,
            _ => None,
        }
    }

    pub fn element(&self, index: usize) -> Option<&Map> {
        self.elements.get(&index)
    }

    pub fn element_mut(&mut self, index: usize) -> Option<&mut Map> {
        self.elements.get_mut(&index)
    }

    pub fn set_element(&mut self, index: usize, map: Map) -> &mut Map {
        match self.elements.entry(index) {
            Entry::Occupied(mut slot) => {
                slot.insert(map);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(map),
        }
    }

    fn resolve(&self, ctx: &mut RowContext<'_>) -> Resolved {
        let configured = self.elements.keys().next_back().map_or(0, |last| last + 1);
        let length = match self.materializer {
            Materializer::Array {
                length: Some(fixed),
            } => configured.max(fixed),
            _ => configured,
        };
        let filler = self.element_shape.default_value().unwrap_or_default();
        let mut values = vec![filler; length];
        for (index, map) in &self.elements {
            match map.resolve(ctx) {
                Ok(Some(value)) => values[*index] = value,
                Ok(None) => {}
                Err(failure) => return Err(failure.within(format!("[{index}]"))),
            }
        }
        materialize(&self.materializer, &self.type_name, values).map(Some)
    }
}

/// Dictionary whose entries are each mapped explicitly by key.
#[derive(Debug, Clone)]
pub struct DictionaryIndexerMap {
    type_name: String,
    value_shape: Shape,
    entries: IndexMap<String, Map>,
}

impl DictionaryIndexerMap {
    pub fn new(type_name: impl Into<String>, value_shape: Shape) -> Self {
        Self {
            type_name: type_name.into(),
            value_shape,
            entries: IndexMap::new(),
        }
    }

    pub fn value_shape(&self) -> &Shape {
        &self.value_shape
    }

    pub fn entry(&self, key: &str) -> Option<&Map> {
        self.entries.get(key)
    }

    pub fn entry_mut(&mut self, key: &str) -> Option<&mut Map> {
        self.entries.get_mut(key)
    }

    pub fn set_entry(&mut self, key: &str, map: Map) -> &mut Map {
        let index = self.entries.insert_full(key.to_string(), map).0;
        &mut self.entries[index]
    }

    fn resolve(&self, ctx: &mut RowContext<'_>) -> Resolved {
        let mut entries = IndexMap::with_capacity(self.entries.len());
        for (key, map) in &self.entries {
            match map.resolve(ctx) {
                Ok(Some(value)) => {
                    entries.insert(key.clone(), value);
                }
                Ok(None) => {}
                Err(failure) => return Err(failure.within(format!("[\"{key}\"]"))),
            }
        }
        Ok(Some(Value::Map(entries)))
    }
}

impl Map {
    /// Reads and converts this node's value for the current row. `Ok(None)`
    /// means an optional source was absent.
    pub fn resolve(&self, ctx: &mut RowContext<'_>) -> Resolved {
        match self {
            Map::Scalar(map) => map.resolve(ctx),
            Map::Object(map) => map.resolve(ctx),
            Map::Enumerable(map) => map.resolve(ctx),
            Map::Dictionary(map) => map.resolve(ctx),
            Map::ArrayIndexer(map) => map.resolve(ctx),
            Map::DictionaryIndexer(map) => map.resolve(ctx),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Map::Scalar(map) => map.pipeline.target().to_string(),
            Map::Object(map) => map.shape.type_name.clone(),
            Map::Enumerable(map) => map.type_name.clone(),
            Map::Dictionary(map) => map.type_name.clone(),
            Map::ArrayIndexer(map) => map.type_name.clone(),
            Map::DictionaryIndexer(map) => map.type_name.clone(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Map::Scalar(_) => "scalar",
            Map::Object(_) => "object",
            Map::Enumerable(_) => "enumerable",
            Map::Dictionary(_) => "dictionary",
            Map::ArrayIndexer(_) => "array indexer",
            Map::DictionaryIndexer(_) => "dictionary indexer",
        }
    }

    fn unsupported(&self, operation: &str) -> ConfigError {
        ConfigError::Unsupported {
            operation: operation.to_string(),
            target: format!("{} map for '{}'", self.kind_name(), self.type_name()),
        }
    }

    /// Points the node at different column(s). Enumerable nodes split a
    /// single column and read one element per column for multi-column specs.
    pub fn set_column(&mut self, spec: ColumnSpec) -> Result<&mut Self, ConfigError> {
        match self {
            Map::Scalar(map) => {
                map.column = spec;
                map.id = NodeId::next();
            }
            Map::Enumerable(map) => {
                map.source = if spec.is_multiple() {
                    ElementSource::Columns(spec)
                } else {
                    let separators = match &map.source {
                        ElementSource::Split { separators, .. } => separators.clone(),
                        ElementSource::Columns(_) => DEFAULT_SEPARATORS.to_vec(),
                    };
                    ElementSource::Split {
                        column: spec,
                        separators,
                    }
                };
                map.id = NodeId::next();
            }
            Map::Dictionary(map) => {
                map.column = spec;
                map.id = NodeId::next();
            }
            _ => return Err(self.unsupported("set a column")),
        }
        Ok(self)
    }

    pub fn with_column_name(&mut self, name: impl Into<String>) -> Result<&mut Self, ConfigError> {
        self.set_column(ColumnSpec::Name(name.into()))
    }

    pub fn with_column_index(&mut self, index: usize) -> Result<&mut Self, ConfigError> {
        self.set_column(ColumnSpec::Index(index))
    }

    pub fn set_separators(&mut self, separators: &[char]) -> Result<&mut Self, ConfigError> {
        if separators.is_empty() {
            return Err(ConfigError::EmptySeparators);
        }
        let Map::Enumerable(map) = self else {
            return Err(self.unsupported("split by separators"));
        };
        let column = match &map.source {
            ElementSource::Split { column, .. } => column.clone(),
            ElementSource::Columns(spec) if !spec.is_multiple() => spec.clone(),
            ElementSource::Columns(spec) => {
                return Err(ConfigError::Unsupported {
                    operation: "split by separators".to_string(),
                    target: format!("multi-column source {spec}"),
                });
            }
        };
        map.source = ElementSource::Split {
            column,
            separators: separators.to_vec(),
        };
        map.id = NodeId::next();
        Ok(self)
    }

    pub fn set_optional(&mut self, optional: bool) -> Result<&mut Self, ConfigError> {
        match self {
            Map::Scalar(map) => map.optional = optional,
            Map::Enumerable(map) => map.optional = optional,
            Map::Dictionary(map) => map.optional = optional,
            _ => return Err(self.unsupported("mark optional")),
        }
        Ok(self)
    }

    pub fn set_preserve_formatting(&mut self, preserve: bool) -> Result<&mut Self, ConfigError> {
        match self {
            Map::Scalar(map) => map.preserve_formatting = preserve,
            Map::Enumerable(map) => map.preserve_formatting = preserve,
            Map::Dictionary(map) => map.preserve_formatting = preserve,
            _ => return Err(self.unsupported("preserve formatting")),
        }
        Ok(self)
    }

    /// The scalar pipeline, or the element pipeline of a collection node.
    pub fn pipeline_mut(&mut self) -> Result<&mut ValuePipeline, ConfigError> {
        match self {
            Map::Scalar(map) => Ok(&mut map.pipeline),
            Map::Enumerable(map) => Ok(&mut map.element),
            Map::Dictionary(map) => Ok(&mut map.element),
            _ => Err(self.unsupported("configure a value pipeline")),
        }
    }

    pub fn pipeline(&self) -> Option<&ValuePipeline> {
        match self {
            Map::Scalar(map) => Some(&map.pipeline),
            Map::Enumerable(map) => Some(&map.element),
            Map::Dictionary(map) => Some(&map.element),
            _ => None,
        }
    }

    pub fn set_empty_fallback(
        &mut self,
        item: impl FallbackItem + 'static,
    ) -> Result<&mut Self, ConfigError> {
        self.pipeline_mut()?.set_empty_fallback(Some(Arc::new(item)));
        Ok(self)
    }

    pub fn set_invalid_fallback(
        &mut self,
        item: impl FallbackItem + 'static,
    ) -> Result<&mut Self, ConfigError> {
        self.pipeline_mut()?.set_invalid_fallback(Some(Arc::new(item)));
        Ok(self)
    }

    pub fn add_transformer(
        &mut self,
        transformer: impl CellTransformer + 'static,
    ) -> Result<&mut Self, ConfigError> {
        self.pipeline_mut()?.add_transformer(Arc::new(transformer));
        Ok(self)
    }

    pub fn add_mapper(&mut self, mapper: impl CellMapper + 'static) -> Result<&mut Self, ConfigError> {
        self.pipeline_mut()?.add_mapper(Arc::new(mapper));
        Ok(self)
    }

    pub fn set_formats(&mut self, formats: &[&str]) -> Result<&mut Self, ConfigError> {
        let formats = formats.iter().map(|f| f.to_string()).collect();
        self.pipeline_mut()?.set_formats(formats)?;
        Ok(self)
    }

    pub fn set_materializer(&mut self, materializer: Materializer) -> Result<&mut Self, ConfigError> {
        match self {
            Map::Enumerable(map) => map.materializer = materializer,
            Map::ArrayIndexer(map) => map.materializer = materializer,
            _ => return Err(self.unsupported("set a materialization strategy")),
        }
        Ok(self)
    }

    /// Checks that every pipeline in the tree can produce a value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Map::Scalar(map) => map.pipeline.ensure_final(),
            Map::Enumerable(map) => map.element.ensure_final(),
            Map::Dictionary(map) => map.element.ensure_final(),
            Map::Object(map) => map.members.iter().try_for_each(|m| m.map.validate()),
            Map::ArrayIndexer(map) => map.elements.values().try_for_each(Map::validate),
            Map::DictionaryIndexer(map) => map.entries.values().try_for_each(Map::validate),
        }
    }

    /// Renders the tree, one line per node.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.describe_into(None, 0, &mut lines);
        lines
    }

    fn describe_into(&self, label: Option<&str>, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        let prefix = label.map(|l| format!("{l}: ")).unwrap_or_default();
        let head = format!("{indent}{prefix}{}", self.type_name());
        match self {
            Map::Scalar(map) => lines.push(format!(
                "{head} <- {}{} | {}",
                map.column,
                flags(map.optional, map.preserve_formatting),
                map.pipeline.describe()
            )),
            Map::Enumerable(map) => {
                let source = match &map.source {
                    ElementSource::Split { column, separators } => format!(
                        "split {column} by [{}]",
                        separators.iter().map(|s| format!("'{s}'")).join(", ")
                    ),
                    ElementSource::Columns(spec) => format!("each of {spec}"),
                };
                lines.push(format!(
                    "{head} <- {source}{} | {} | {}",
                    flags(map.optional, map.preserve_formatting),
                    map.element.describe(),
                    map.materializer.name()
                ));
            }
            Map::Dictionary(map) => lines.push(format!(
                "{head} <- keyed {}{} | {}",
                map.column,
                flags(map.optional, map.preserve_formatting),
                map.element.describe()
            )),
            Map::Object(map) => {
                lines.push(format!("{head} (object)"));
                for member in &map.members {
                    member
                        .map
                        .describe_into(Some(member.name.as_str()), depth + 1, lines);
                }
            }
            Map::ArrayIndexer(map) => {
                lines.push(format!("{head} (indexed, {})", map.materializer.name()));
                for (index, element) in &map.elements {
                    element.describe_into(Some(format!("[{index}]").as_str()), depth + 1, lines);
                }
            }
            Map::DictionaryIndexer(map) => {
                lines.push(format!("{head} (keyed entries)"));
                for (key, entry) in &map.entries {
                    entry.describe_into(Some(format!("[\"{key}\"]").as_str()), depth + 1, lines);
                }
            }
        }
    }
}

fn flags(optional: bool, preserve_formatting: bool) -> String {
    let mut rendered = String::new();
    if optional {
        rendered.push_str(" (optional)");
    }
    if preserve_formatting {
        rendered.push_str(" (formatted)");
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fallback::FixedValue,
        header::HeaderIndex,
        shape::ScalarKind,
        sheet::BindingCache,
        source::{MemorySource, RowSource},
    };

    fn header(names: &[&str]) -> HeaderIndex {
        HeaderIndex::build(names.iter().map(|n| Some(*n)), usize::MAX).expect("header")
    }

    fn resolve_row(map: &Map, header: &HeaderIndex, row: Vec<&str>) -> Resolved {
        let mut source = MemorySource::from_rows("test", vec![row]);
        source.read_next_row().expect("row");
        let mut cache = BindingCache::default();
        let mut ctx = RowContext::new(&source, Some(header), &mut cache);
        map.resolve(&mut ctx)
    }

    fn int_list(source: ElementSource) -> Map {
        Map::Enumerable(EnumerableMap::new(
            "Vec<i32>",
            source,
            ValuePipeline::for_kind(ScalarKind::I32),
            Materializer::List,
        ))
    }

    #[test]
    fn scalar_absent_column_depends_on_optional_flag() {
        let index = header(&["Name"]);
        let mut map = Map::Scalar(ScalarMap::new(
            ColumnSpec::Name("Id".to_string()),
            ValuePipeline::for_kind(ScalarKind::I32),
        ));
        let failure = resolve_row(&map, &index, vec!["x"]).unwrap_err();
        assert!(matches!(failure.error, CellError::ColumnNotFound { .. }));
        map.set_optional(true).expect("optional");
        assert_eq!(resolve_row(&map, &index, vec!["x"]), Ok(None));
    }

    #[test]
    fn split_source_converts_each_piece() {
        let index = header(&["Tags"]);
        let map = int_list(ElementSource::Split {
            column: ColumnSpec::Name("tags".to_string()),
            separators: DEFAULT_SEPARATORS.to_vec(),
        });
        assert_eq!(
            resolve_row(&map, &index, vec!["1,2;3"]),
            Ok(Some(Value::List(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3)
            ])))
        );
        assert_eq!(
            resolve_row(&map, &index, vec![""]),
            Ok(Some(Value::List(Vec::new())))
        );
        let failure = resolve_row(&map, &index, vec!["1,x"]).unwrap_err();
        assert_eq!(failure.member, vec!["[1]".to_string()]);
        assert_eq!(failure.column, Some(ColumnRef::Index(0)));
    }

    #[test]
    fn multi_column_source_with_invalid_fallback() {
        let index = header(&["A1", "A2", "A3"]);
        let mut map = int_list(ElementSource::Columns(ColumnSpec::names(["A1", "A2", "A3"])));
        map.set_invalid_fallback(FixedValue::new(0)).expect("fallback");
        assert_eq!(
            resolve_row(&map, &index, vec!["1", "x", "3"]),
            Ok(Some(Value::List(vec![
                Value::Integer(1),
                Value::Integer(0),
                Value::Integer(3)
            ])))
        );
    }

    #[test]
    fn dictionary_keys_use_lookup_key_for_repeated_names() {
        let index = header(&["Q", "Q", "R"]);
        let map = Map::Dictionary(DictionaryMap::new(
            "HashMap<String, i32>",
            ColumnSpec::AllColumns,
            ValuePipeline::for_kind(ScalarKind::I32),
        ));
        let Ok(Some(Value::Map(entries))) = resolve_row(&map, &index, vec!["1", "2", "3"]) else {
            panic!("expected a map");
        };
        assert_eq!(
            entries.keys().cloned().collect::<Vec<_>>(),
            vec!["Q".to_string(), "Q_2".to_string(), "R".to_string()]
        );
    }

    #[test]
    fn array_indexer_fills_gaps_with_element_default() {
        let index = header(&["First", "Third"]);
        let mut indexer = ArrayIndexerMap::new(
            "Vec<i32>",
            Shape::Scalar(ScalarKind::I32),
            Materializer::List,
        );
        indexer.set_element(
            0,
            Map::Scalar(ScalarMap::new(
                ColumnSpec::Name("First".to_string()),
                ValuePipeline::for_kind(ScalarKind::I32),
            )),
        );
        indexer.set_element(
            2,
            Map::Scalar(ScalarMap::new(
                ColumnSpec::Name("Third".to_string()),
                ValuePipeline::for_kind(ScalarKind::I32),
            )),
        );
        assert_eq!(
            resolve_row(&Map::ArrayIndexer(indexer), &index, vec!["5", "7"]),
            Ok(Some(Value::List(vec![
                Value::Integer(5),
                Value::Integer(0),
                Value::Integer(7)
            ])))
        );
    }

    #[test]
    fn separators_must_not_be_empty_and_setters_check_the_node_kind() {
        let mut list = int_list(ElementSource::Split {
            column: ColumnSpec::Name("t".to_string()),
            separators: vec![','],
        });
        assert_eq!(list.set_separators(&[]).unwrap_err(), ConfigError::EmptySeparators);
        let mut object = Map::Object(ObjectMap::new(ObjectShape::new("Empty", Vec::new())));
        assert!(matches!(
            object.set_column(ColumnSpec::Index(0)),
            Err(ConfigError::Unsupported { .. })
        ));
        let mut indexer = Map::ArrayIndexer(ArrayIndexerMap::new(
            "[i32; 2]",
            Shape::Scalar(ScalarKind::I32),
            Materializer::Array { length: Some(2) },
        ));
        assert!(indexer.set_optional(true).is_err());
        assert!(
            indexer
                .set_materializer(Materializer::Array { length: None })
                .is_ok()
        );
    }
}
