//! String transformers applied to cell text before any conversion.

use std::{borrow::Cow, fmt, sync::Arc};

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maps `string? -> string?`. Transformers run left to right and must not keep
/// state between calls.
pub trait CellTransformer: fmt::Debug + Send + Sync {
    fn transform(&self, value: Option<String>) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Trim;

impl CellTransformer for Trim {
    fn transform(&self, value: Option<String>) -> Option<String> {
        value.map(|text| text.trim().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Lower,
    Upper,
    Snake,
    Camel,
    Pascal,
}

impl Case {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "lower" | "lowercase" => Some(Case::Lower),
            "upper" | "uppercase" => Some(Case::Upper),
            "snake" | "snake_case" => Some(Case::Snake),
            "camel" | "camel_case" => Some(Case::Camel),
            "pascal" | "pascal_case" => Some(Case::Pascal),
            _ => None,
        }
    }

    fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self {
            Case::Lower if input.chars().all(|ch| !ch.is_uppercase()) => Cow::Borrowed(input),
            Case::Lower => Cow::Owned(input.to_lowercase()),
            Case::Upper if input.chars().all(|ch| !ch.is_lowercase()) => Cow::Borrowed(input),
            Case::Upper => Cow::Owned(input.to_uppercase()),
            Case::Snake => unless_equal(input, input.to_snake_case()),
            Case::Camel => unless_equal(input, input.to_lower_camel_case()),
            Case::Pascal => unless_equal(input, input.to_upper_camel_case()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConvertCase(pub Case);

impl CellTransformer for ConvertCase {
    fn transform(&self, value: Option<String>) -> Option<String> {
        value.as_deref().map(|text| self.0.apply(text).into_owned())
    }
}

/// Replaces every match of `pattern` with `replacement` (`$1` style groups allowed).
#[derive(Debug, Clone)]
pub struct RegexReplace {
    pattern: Regex,
    replacement: String,
}

impl RegexReplace {
    pub fn new(pattern: Regex, replacement: impl Into<String>) -> Self {
        Self {
            pattern,
            replacement: replacement.into(),
        }
    }
}

impl CellTransformer for RegexReplace {
    fn transform(&self, value: Option<String>) -> Option<String> {
        value.as_deref().map(|text| {
            self.pattern
                .replace_all(text, self.replacement.as_str())
                .into_owned()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueReplacement {
    pub from: String,
    pub to: String,
}

/// Swaps whole cell values for canonical ones, e.g. `N/A` to an empty cell.
#[derive(Debug, Clone, Default)]
pub struct ReplaceValues {
    replacements: Vec<ValueReplacement>,
}

impl ReplaceValues {
    pub fn new(replacements: Vec<ValueReplacement>) -> Self {
        Self { replacements }
    }

    pub fn with(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.replacements.push(ValueReplacement {
            from: from.into(),
            to: to.into(),
        });
        self
    }
}

impl CellTransformer for ReplaceValues {
    fn transform(&self, value: Option<String>) -> Option<String> {
        let current = value.as_deref().unwrap_or_default();
        match self
            .replacements
            .iter()
            .find(|replacement| replacement.from == current)
        {
            Some(replacement) => Some(replacement.to.clone()),
            None => value,
        }
    }
}

/// Adapts a closure into a transformer.
#[derive(Clone)]
pub struct FnTransformer {
    name: String,
    func: Arc<dyn Fn(Option<String>) -> Option<String> + Send + Sync>,
}

impl FnTransformer {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Option<String>) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for FnTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnTransformer").field(&self.name).finish()
    }
}

impl CellTransformer for FnTransformer {
    fn transform(&self, value: Option<String>) -> Option<String> {
        (self.func)(value)
    }
}

fn unless_equal(input: &str, converted: String) -> Cow<'_, str> {
    if converted == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(transformer: &dyn CellTransformer, input: &str) -> Option<String> {
        transformer.transform(Some(input.to_string()))
    }

    #[test]
    fn trim_strips_whitespace_and_passes_none_through() {
        assert_eq!(run(&Trim, "  padded \t"), Some("padded".to_string()));
        assert_eq!(Trim.transform(None), None);
    }

    #[test]
    fn case_conversion_uses_identifier_rules() {
        assert_eq!(
            run(&ConvertCase(Case::Snake), "OrderId"),
            Some("order_id".to_string())
        );
        assert_eq!(
            run(&ConvertCase(Case::Pascal), "order id"),
            Some("OrderId".to_string())
        );
        assert_eq!(run(&ConvertCase(Case::Upper), "abc"), Some("ABC".to_string()));
        assert_eq!(Case::from_token("Camel_Case"), Some(Case::Camel));
    }

    #[test]
    fn regex_replace_rewrites_all_matches() {
        let transformer = RegexReplace::new(Regex::new(r"[^0-9]").expect("regex"), "");
        assert_eq!(run(&transformer, "(555) 123-4567"), Some("5551234567".to_string()));
    }

    #[test]
    fn replace_values_matches_whole_cells_only() {
        let transformer = ReplaceValues::default().with("N/A", "").with("", "0");
        assert_eq!(run(&transformer, "N/A"), Some(String::new()));
        assert_eq!(run(&transformer, "N/A x"), Some("N/A x".to_string()));
        assert_eq!(transformer.transform(None), Some("0".to_string()));
    }
}
