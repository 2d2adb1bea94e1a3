//! Structured query model.
//!
//! A [`StructuredQuery`] is an ordered list of [`Stage`]s, each a map from an
//! operator name (`$match`, `$project`, `$addFields`, ...) to its operands.
//! It serialises as a plain JSON array so it can be handed to a document
//! store verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage(Map<String, Value>);

impl Stage {
    /// Create a single-operator stage.
    pub fn new(operator: impl Into<String>, operand: Value) -> Self {
        let mut map = Map::new();
        map.insert(operator.into(), operand);
        Self(map)
    }

    /// The stage operator, when the stage holds exactly one.
    pub fn operator(&self) -> Option<&str> {
        if self.0.len() == 1 {
            self.0.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Operand of the single operator.
    pub fn operand(&self) -> Option<&Value> {
        if self.0.len() == 1 {
            self.0.values().next()
        } else {
            None
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// An ordered aggregation pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredQuery {
    stages: Vec<Stage>,
}

impl StructuredQuery {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Build a query from a parsed JSON value.
    ///
    /// Accepts an array of objects, or a single object which becomes a
    /// one-stage pipeline. Anything else is rejected with a reason.
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Array(items) => {
                let mut stages = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Object(map) => stages.push(Stage(map)),
                        other => {
                            return Err(format!(
                                "stage {} is a {}, expected an object",
                                index,
                                json_type_name(&other)
                            ))
                        }
                    }
                }
                Ok(Self { stages })
            }
            Value::Object(map) => Ok(Self {
                stages: vec![Stage(map)],
            }),
            other => Err(format!(
                "expected an array of stages, got a {}",
                json_type_name(&other)
            )),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Position of the first stage using `operator`.
    pub fn position_of(&self, operator: &str) -> Option<usize> {
        self.stages
            .iter()
            .position(|stage| stage.operator() == Some(operator))
    }

    /// Compact JSON text of the pipeline.
    pub fn to_json(&self) -> String {
        Value::Array(self.stages.iter().map(|s| Value::Object(s.0.clone())).collect()).to_string()
    }

    /// Indented JSON text of the pipeline.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.stages).unwrap_or_else(|_| self.to_json())
    }
}

/// Type conversion operators understood by the structured store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastOp {
    #[serde(rename = "$toInt")]
    ToInt,
    #[serde(rename = "$toDouble")]
    ToDouble,
    #[serde(rename = "$toString")]
    ToString,
}

impl CastOp {
    pub fn parse(operator: &str) -> Option<Self> {
        match operator {
            "$toInt" => Some(Self::ToInt),
            "$toDouble" => Some(Self::ToDouble),
            "$toString" => Some(Self::ToString),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToInt => "$toInt",
            Self::ToDouble => "$toDouble",
            Self::ToString => "$toString",
        }
    }

    /// Convert a value. Null stays null; text that is not a number fails.
    pub fn apply(&self, value: &Value) -> Result<Value, String> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::ToInt, Value::Number(n)) => match n.as_i64() {
                Some(i) => Ok(Value::from(i)),
                None => n
                    .as_f64()
                    .map(|f| Value::from(f.trunc() as i64))
                    .ok_or_else(|| format!("cannot convert {} to int", n)),
            },
            (Self::ToInt, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("cannot convert \"{}\" to int", s)),
            (Self::ToInt, Value::Bool(b)) => Ok(Value::from(i64::from(*b))),
            (Self::ToDouble, Value::Number(n)) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("cannot convert {} to double", n)),
            (Self::ToDouble, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("cannot convert \"{}\" to double", s)),
            (Self::ToDouble, Value::Bool(b)) => Ok(Value::from(if *b { 1.0 } else { 0.0 })),
            (Self::ToString, Value::String(s)) => Ok(Value::String(s.clone())),
            (Self::ToString, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (Self::ToString, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (op, other) => Err(format!(
                "{} cannot convert a {}",
                op.as_str(),
                json_type_name(other)
            )),
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
