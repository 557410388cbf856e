//! Reply shape classification
//!
//! The backend attaches optional structured data to a reply: an array of
//! row objects (a table), an object with `xAxis` and `series` (a chart), or
//! nothing. [`classify`] maps that data onto [`NormalizedPayload`] once, when
//! the reply arrives. It never fails: anything it cannot make sense of
//! degrades to [`NormalizedPayload::None`] and the reply is shown as text.

use crate::message::{Chart, NormalizedPayload, Scalar, Series, Table};
use serde_json::{Map, Value};
use tracing::debug;

pub fn classify(data: Option<&Value>) -> NormalizedPayload {
    let Some(data) = data.filter(|d| !is_empty(d)) else {
        return NormalizedPayload::None;
    };

    if let Some(chart) = as_chart(data) {
        return chart;
    }

    if let Some(table) = as_table(data) {
        return NormalizedPayload::Table(table);
    }

    debug!("structured data has no recognised shape, showing text only");
    NormalizedPayload::None
}

fn is_empty(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_chart(data: &Value) -> Option<NormalizedPayload> {
    let object = data.as_object()?;
    let x_axis = object.get("xAxis")?.as_array()?;
    let series = object.get("series")?.as_array()?;

    let x_values: Vec<Scalar> = x_axis
        .first()
        .and_then(|axis| axis.get("data"))
        .and_then(Value::as_array)
        .map(|values| values.iter().map(Scalar::from).collect())
        .unwrap_or_default();

    let series: Vec<Series> = series
        .iter()
        .enumerate()
        .map(|(idx, entry)| Series {
            name: entry
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("series {}", idx + 1)),
            y_values: entry
                .get("data")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(Scalar::from).collect())
                .unwrap_or_default(),
        })
        .collect();

    // The backend pairs error texts with `{xAxis: [], series: []}`
    if x_values.is_empty() && series.is_empty() {
        debug!("chart payload carries no data, showing text only");
        return Some(NormalizedPayload::None);
    }

    debug!(points = x_values.len(), series = series.len(), "classified reply as chart");
    Some(NormalizedPayload::Chart(Chart { x_values, series }))
}

fn as_table(data: &Value) -> Option<Table> {
    let rows: Vec<&Map<String, Value>> = data
        .as_array()?
        .iter()
        .map(Value::as_object)
        .collect::<Option<_>>()?;

    let columns: Vec<String> = rows.first()?.keys().cloned().collect();

    let rows: Vec<Vec<Scalar>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column).map(Scalar::from).unwrap_or(Scalar::Null))
                .collect()
        })
        .collect();

    debug!(columns = columns.len(), rows = rows.len(), "classified reply as table");
    Some(Table { columns, rows })
}
