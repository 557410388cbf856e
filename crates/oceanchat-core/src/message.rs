//! UI-agnostic conversation data types
//!
//! Everything a renderer needs to draw a transcript lives here: who sent a
//! message, its text, and the structured payload classified from the reply.
//! Nothing in this module depends on a UI framework or on the network layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A message in the conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub payload: NormalizedPayload,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            payload: NormalizedPayload::None,
        }
    }

    pub fn assistant(text: impl Into<String>, payload: NormalizedPayload) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            payload,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::System,
            text: text.into(),
            payload: NormalizedPayload::None,
        }
    }
}

/// Who a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Assistant,
    /// Client-side notices: upload progress, validation and failure reports
    System,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Assistant => "OceanGPT",
            Sender::System => "System",
        }
    }
}

/// Structured data accompanying a reply, classified once when the reply arrives
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum NormalizedPayload {
    #[default]
    None,
    Table(Table),
    Chart(Chart),
}

impl NormalizedPayload {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            NormalizedPayload::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_chart(&self) -> Option<&Chart> {
        match self {
            NormalizedPayload::Chart(chart) => Some(chart),
            _ => None,
        }
    }
}

/// Tabular rows. Each row holds exactly one cell per column, in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

/// A time-series chart sharing one x axis across all series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub x_values: Vec<Scalar>,
    pub series: Vec<Series>,
}

impl Chart {
    /// Pairs every x value with the series value at the same position.
    /// Positions past the end of a short series yield `None` (unknown).
    pub fn points(&self, series: usize) -> Vec<(&Scalar, Option<&Scalar>)> {
        let Some(s) = self.series.get(series) else {
            return Vec::new();
        };
        self.x_values
            .iter()
            .enumerate()
            .map(|(i, x)| (x, s.value_at(i)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub y_values: Vec<Scalar>,
}

impl Series {
    pub fn value_at(&self, idx: usize) -> Option<&Scalar> {
        self.y_values.get(idx)
    }
}

/// A single cell or axis value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&Value> for Scalar {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => n.as_f64().map(Scalar::Number).unwrap_or(Scalar::Null),
            Value::String(s) => Scalar::Text(s.clone()),
            // Nested structures are shown as their compact JSON
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}
