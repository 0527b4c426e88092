//! Strategies that turn converted element values into a container value.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    convert::FromValue,
    error::ConfigError,
    shape::{ContainerKind, SequenceShape},
    value::Value,
};

type BuildFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
pub enum Materializer {
    /// Fixed or unbounded array; a fixed length must match exactly.
    Array { length: Option<usize> },
    List,
    /// Keeps the first occurrence of each element.
    Set,
    Custom { name: String, build: BuildFn },
}

impl Materializer {
    pub fn custom<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        Materializer::Custom {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    pub fn materialize(&self, elements: Vec<Value>) -> Result<Value, String> {
        match self {
            Materializer::Array {
                length: Some(length),
            } if elements.len() != *length => Err(format!(
                "expected exactly {length} element(s), found {}",
                elements.len()
            )),
            Materializer::Array { .. } | Materializer::List => Ok(Value::List(elements)),
            Materializer::Set => {
                let mut unique: Vec<Value> = Vec::with_capacity(elements.len());
                for element in elements {
                    if !unique.contains(&element) {
                        unique.push(element);
                    }
                }
                Ok(Value::List(unique))
            }
            Materializer::Custom { build, .. } => build(elements),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Materializer::Array {
                length: Some(length),
            } => format!("array[{length}]"),
            Materializer::Array { length: None } => "array".to_string(),
            Materializer::List => "list".to_string(),
            Materializer::Set => "set".to_string(),
            Materializer::Custom { name, .. } => name.clone(),
        }
    }
}

impl fmt::Debug for Materializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Caller-registered strategies for container types the built-in shapes do
/// not cover, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct MaterializerRegistry {
    strategies: HashMap<String, Materializer>,
}

impl MaterializerRegistry {
    pub fn register(&mut self, type_name: impl Into<String>, materializer: Materializer) {
        self.strategies.insert(type_name.into(), materializer);
    }

    /// Registers `build` for the container type `C`.
    pub fn register_for<C, F>(&mut self, build: F)
    where
        C: FromValue,
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        let type_name = C::shape().type_name();
        self.register(type_name.clone(), Materializer::custom(type_name, build));
    }

    /// Registered strategies win; otherwise the container kind decides.
    pub fn select(&self, shape: &SequenceShape) -> Result<Materializer, ConfigError> {
        if let Some(found) = self.strategies.get(&shape.type_name) {
            return Ok(found.clone());
        }
        match &shape.container {
            ContainerKind::Array(length) => Ok(Materializer::Array { length: *length }),
            ContainerKind::Immutable | ContainerKind::List => Ok(Materializer::List),
            ContainerKind::Set => Ok(Materializer::Set),
            ContainerKind::Custom(name) => Err(ConfigError::UnsupportedType {
                type_name: shape.type_name.clone(),
                reason: format!("no materialization strategy registered for container '{name}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{ScalarKind, Shape};

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Integer).collect()
    }

    fn sequence(container: ContainerKind) -> SequenceShape {
        SequenceShape {
            type_name: "Bag<i32>".to_string(),
            element: Box::new(Shape::Scalar(ScalarKind::I32)),
            container,
        }
    }

    #[test]
    fn fixed_arrays_require_exact_length() {
        let strategy = Materializer::Array { length: Some(3) };
        assert_eq!(
            strategy.materialize(ints(&[1, 2, 3])),
            Ok(Value::List(ints(&[1, 2, 3])))
        );
        assert!(strategy.materialize(ints(&[1, 2])).is_err());
    }

    #[test]
    fn sets_drop_later_duplicates() {
        assert_eq!(
            Materializer::Set.materialize(ints(&[2, 1, 2, 3, 1])),
            Ok(Value::List(ints(&[2, 1, 3])))
        );
    }

    #[test]
    fn unregistered_custom_container_is_unsupported() {
        let registry = MaterializerRegistry::default();
        let err = registry
            .select(&sequence(ContainerKind::Custom("Bag".to_string())))
            .unwrap_err();
        assert!(err.to_string().contains("Bag<i32>"));
    }

    #[test]
    fn registered_strategy_takes_precedence() {
        let mut registry = MaterializerRegistry::default();
        registry.register(
            "Bag<i32>",
            Materializer::custom("bag", |values| Ok(Value::List(values))),
        );
        let strategy = registry
            .select(&sequence(ContainerKind::Custom("Bag".to_string())))
            .expect("strategy");
        assert_eq!(strategy.name(), "bag");
        assert_eq!(
            strategy.materialize(ints(&[1, 2, 3])),
            Ok(Value::List(ints(&[1, 2, 3])))
        );
    }
}
