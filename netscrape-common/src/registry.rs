//! Process-local metrics registry and exposition text rendering.
//!
//! A [`Registry`] holds a fixed set of [`MetricDefinition`]s, each mapping
//! concrete label tuples to their latest value. Counters accumulate, gauges
//! are overwritten. The registry never forgets a series once recorded.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

/// Value recorded when a symbolic word has no entry in its table.
pub const UNKNOWN_SYMBOL: f64 = -1.0;

/// Metric type as written on the `# TYPE` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }

    /// How a new sample combines with the stored value.
    pub fn aggregation(&self) -> Aggregation {
        match self {
            MetricKind::Counter => Aggregation::Increment,
            MetricKind::Gauge => Aggregation::Overwrite,
        }
    }
}

/// Aggregation operator applied on record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Increment,
    Overwrite,
}

/// Maps a symbolic word (already known to be text) to its numeric code.
pub type SymbolMap = fn(&str) -> Option<i64>;

/// Converts a raw payload value to the number that gets recorded.
#[derive(Debug, Clone, Copy)]
pub enum ValueFormat {
    /// JSON numbers and numeric strings.
    Numeric,
    /// Words looked up in a closed table; misses record [`UNKNOWN_SYMBOL`].
    Symbol(SymbolMap),
}

/// A raw value the formatter could not coerce.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("value {0} is not numeric")]
    NotNumeric(String),

    #[error("value {0} is not a symbolic word")]
    NotText(String),

    #[error("value is not a scalar")]
    NotScalar,
}

impl ValueFormat {
    /// Format a raw payload value.
    pub fn apply(&self, raw: &Value) -> Result<f64, ValueError> {
        match (self, raw) {
            (_, Value::Array(_) | Value::Object(_)) => Err(ValueError::NotScalar),
            (ValueFormat::Numeric, Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| ValueError::NotNumeric(n.to_string())),
            (ValueFormat::Numeric, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| ValueError::NotNumeric(s.clone())),
            (ValueFormat::Numeric, other) => Err(ValueError::NotNumeric(other.to_string())),
            (ValueFormat::Symbol(map), Value::String(word)) => match map(word) {
                Some(code) => Ok(code as f64),
                None => {
                    debug!(value = %word, "Cannot map symbolic value");
                    Ok(UNKNOWN_SYMBOL)
                }
            },
            (ValueFormat::Symbol(_), other) => Err(ValueError::NotText(other.to_string())),
        }
    }
}

/// Static description of one metric family.
#[derive(Debug, Clone)]
pub struct MetricDefinition {
    pub name: String,
    pub kind: MetricKind,
    pub help: String,
    /// Ordered label names; every sample supplies values in this order.
    pub labels: Vec<String>,
    pub format: ValueFormat,
}

impl MetricDefinition {
    pub fn new(
        name: impl Into<String>,
        kind: MetricKind,
        help: impl Into<String>,
        labels: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            help: help.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            format: ValueFormat::Numeric,
        }
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Self {
        Self::new(name, MetricKind::Counter, help, labels)
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Self {
        Self::new(name, MetricKind::Gauge, help, labels)
    }

    /// Replace the value formatter.
    pub fn with_format(mut self, format: ValueFormat) -> Self {
        self.format = format;
        self
    }

    pub fn aggregation(&self) -> Aggregation {
        self.kind.aggregation()
    }
}

/// Misuse of the registry. These are programming defects, not data problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("metric {0} is not defined")]
    UnknownMetric(String),

    #[error("metric {0} is already defined")]
    Duplicate(String),

    #[error("metric {name} expects {expected} label values, got {actual}")]
    LabelArity {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Failure to record a raw value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// The value could not be formatted; nothing was recorded.
    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug)]
struct Family {
    definition: MetricDefinition,
    series: BTreeMap<Vec<String>, f64>,
}

/// Metric store keyed by name, then by label tuple.
#[derive(Debug, Default)]
pub struct Registry {
    families: Vec<Family>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the given definitions, in order.
    pub fn with_definitions(
        definitions: impl IntoIterator<Item = MetricDefinition>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.define(definition)?;
        }
        Ok(registry)
    }

    /// Add a metric family. Families render in definition order.
    pub fn define(&mut self, definition: MetricDefinition) -> Result<(), RegistryError> {
        if self.index.contains_key(&definition.name) {
            return Err(RegistryError::Duplicate(definition.name));
        }

        self.index
            .insert(definition.name.clone(), self.families.len());
        self.families.push(Family {
            definition,
            series: BTreeMap::new(),
        });
        Ok(())
    }

    pub fn definition(&self, name: &str) -> Option<&MetricDefinition> {
        self.index
            .get(name)
            .map(|&i| &self.families[i].definition)
    }

    /// Format `raw` with the metric's formatter and apply it to the series.
    ///
    /// Returns the formatted sample value (not the accumulated one).
    pub fn record<S: AsRef<str>>(
        &mut self,
        name: &str,
        labels: &[S],
        raw: &Value,
    ) -> Result<f64, RecordError> {
        let family = self.family_mut(name, labels.len())?;
        let value = family.definition.format.apply(raw)?;
        Self::apply(family, labels, value);
        Ok(value)
    }

    /// Apply an already numeric sample to the series.
    pub fn observe<S: AsRef<str>>(
        &mut self,
        name: &str,
        labels: &[S],
        value: f64,
    ) -> Result<f64, RegistryError> {
        let family = self.family_mut(name, labels.len())?;
        Self::apply(family, labels, value);
        Ok(value)
    }

    /// Current value of one series.
    pub fn value<S: AsRef<str>>(&self, name: &str, labels: &[S]) -> Option<f64> {
        let family = &self.families[*self.index.get(name)?];
        let key: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        family.series.get(&key).copied()
    }

    /// Number of recorded series across all families.
    pub fn series_count(&self) -> usize {
        self.families.iter().map(|f| f.series.len()).sum()
    }

    /// Number of recorded series for one family.
    pub fn family_len(&self, name: &str) -> usize {
        self.index
            .get(name)
            .map(|&i| self.families[i].series.len())
            .unwrap_or(0)
    }

    /// Render every family in exposition text format.
    pub fn render(&self) -> String {
        let mut output = String::with_capacity(self.series_count() * 80);

        for family in &self.families {
            let def = &family.definition;
            writeln!(output, "# HELP {} {}", def.name, def.help).ok();
            writeln!(output, "# TYPE {} {}", def.name, def.kind.as_str()).ok();

            if def.labels.is_empty() {
                let value = family.series.get(&Vec::new()).copied().unwrap_or(0.0);
                writeln!(output, "{} {}", def.name, format_value(value)).ok();
                continue;
            }

            for (values, value) in &family.series {
                writeln!(
                    output,
                    "{}{} {}",
                    def.name,
                    format_labels(&def.labels, values),
                    format_value(*value)
                )
                .ok();
            }
        }

        output
    }

    fn family_mut(&mut self, name: &str, arity: usize) -> Result<&mut Family, RegistryError> {
        let index = *self
            .index
            .get(name)
            .ok_or_else(|| RegistryError::UnknownMetric(name.to_string()))?;
        let family = &mut self.families[index];

        if family.definition.labels.len() != arity {
            return Err(RegistryError::LabelArity {
                name: name.to_string(),
                expected: family.definition.labels.len(),
                actual: arity,
            });
        }

        Ok(family)
    }

    fn apply<S: AsRef<str>>(family: &mut Family, labels: &[S], value: f64) {
        let key = labels.iter().map(|l| l.as_ref().to_string()).collect();
        let slot = family.series.entry(key).or_insert(0.0);

        match family.definition.aggregation() {
            Aggregation::Increment => *slot += value,
            Aggregation::Overwrite => *slot = value,
        }

        trace!(metric = %family.definition.name, value = *slot, "Recorded sample");
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for exposition.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn format_labels(names: &[String], values: &[String]) -> String {
    let parts: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
