//! The observation table.
//!
//! Rows are kept in file order; that order is the temporal sequence the
//! Markov chain is built from, so nothing here ever sorts rows.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

pub const LOCATION: &str = "Location";
pub const TIME_INTERVAL: &str = "Time Interval";
pub const SPEED_RANGE: &str = "Speed Range (Km/hr)";
pub const LOS_VALUE: &str = "Level of Service Calculation";
pub const LOS_STATE: &str = "LOS";

/// One record of the traffic table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "Location", deserialize_with = "label")]
    pub location: String,

    #[serde(rename = "Time Interval", deserialize_with = "label")]
    pub time_interval: String,

    #[serde(rename = "Speed Range (Km/hr)", deserialize_with = "label")]
    pub speed_range: String,

    #[serde(rename = "Level of Service Calculation", default)]
    pub los_value: Option<f64>,

    #[serde(rename = "LOS", deserialize_with = "label")]
    pub los: String,

    /// Any further columns, by name.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Accept labels written either as strings or as bare numbers.
fn label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number label, got {other}"
        ))),
    }
}

/// A single column pulled out of the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Text labels; `None` marks a missing cell.
    Categorical(Vec<Option<String>>),
    /// Numbers; `None` marks a missing cell.
    Numeric(Vec<Option<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Categorical(v) => v.len(),
            Column::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered observation records for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationTable {
    rows: Vec<Observation>,
}

impl ObservationTable {
    pub fn new(rows: Vec<Observation>) -> Self {
        ObservationTable { rows }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose time interval is in `intervals`, in their original order.
    pub fn filter_intervals(&self, intervals: &[String]) -> ObservationTable {
        let keep: BTreeSet<&str> = intervals.iter().map(String::as_str).collect();
        ObservationTable {
            rows: self
                .rows
                .iter()
                .filter(|r| keep.contains(r.time_interval.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// The `LOS` state labels in row order.
    pub fn states(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.los.clone()).collect()
    }

    /// Sorted distinct locations.
    pub fn locations(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.location.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Observed `Level of Service Calculation` values for one location.
    pub fn los_values_at(&self, location: &str) -> Vec<f64> {
        self.rows
            .iter()
            .filter(|r| r.location == location)
            .filter_map(|r| r.los_value)
            .collect()
    }

    /// Look up a column by its table name.
    ///
    /// Extra columns are numeric when every present cell is a number (or
    /// null), categorical otherwise. Rows that lack an extra column count as
    /// missing. Returns `None` when no row carries the column.
    pub fn column(&self, name: &str) -> Option<Column> {
        let labels = |f: fn(&Observation) -> &String| {
            Column::Categorical(self.rows.iter().map(|r| Some(f(r).clone())).collect())
        };
        match name {
            LOCATION => Some(labels(|r| &r.location)),
            TIME_INTERVAL => Some(labels(|r| &r.time_interval)),
            SPEED_RANGE => Some(labels(|r| &r.speed_range)),
            LOS_STATE => Some(labels(|r| &r.los)),
            LOS_VALUE => Some(Column::Numeric(
                self.rows.iter().map(|r| r.los_value).collect(),
            )),
            _ => self.extra_column(name),
        }
    }

    fn extra_column(&self, name: &str) -> Option<Column> {
        let cells: Vec<Option<&serde_json::Value>> = self
            .rows
            .iter()
            .map(|r| r.extra.get(name).filter(|v| !v.is_null()))
            .collect();
        if !self.rows.iter().any(|r| r.extra.contains_key(name)) {
            return None;
        }

        let numeric = cells.iter().flatten().all(|v| v.is_number());
        if numeric {
            Some(Column::Numeric(
                cells.iter().map(|c| c.and_then(|v| v.as_f64())).collect(),
            ))
        } else {
            Some(Column::Categorical(
                cells
                    .iter()
                    .map(|c| {
                        c.map(|v| match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                    })
                    .collect(),
            ))
        }
    }
}

impl FromIterator<Observation> for ObservationTable {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        ObservationTable::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(loc: &str, interval: &str, los: &str, value: Option<f64>) -> Observation {
        Observation {
            location: loc.to_string(),
            time_interval: interval.to_string(),
            speed_range: "20-30".to_string(),
            los_value: value,
            los: los.to_string(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn deserializes_named_columns_and_extras() {
        let v = json!({
            "Location": "L1",
            "Time Interval": "7:00-7:15",
            "Speed Range (Km/hr)": 25,
            "Level of Service Calculation": null,
            "LOS": "B",
            "Volume": 120.5,
            "Note": "wet"
        });
        let obs: Observation = serde_json::from_value(v).unwrap();
        assert_eq!(obs.speed_range, "25");
        assert_eq!(obs.los_value, None);
        assert_eq!(obs.extra.get("Volume"), Some(&json!(120.5)));
        assert_eq!(obs.extra.len(), 2);
    }

    #[test]
    fn missing_los_value_defaults_to_none() {
        let v = json!({
            "Location": "L1",
            "Time Interval": "t",
            "Speed Range (Km/hr)": "s",
            "LOS": "A"
        });
        let obs: Observation = serde_json::from_value(v).unwrap();
        assert!(obs.los_value.is_none());
    }

    #[test]
    fn rejects_structured_label() {
        let v = json!({
            "Location": ["L1"],
            "Time Interval": "t",
            "Speed Range (Km/hr)": "s",
            "LOS": "A"
        });
        assert!(serde_json::from_value::<Observation>(v).is_err());
    }

    #[test]
    fn filter_preserves_order() {
        let table: ObservationTable = vec![
            row("L1", "a", "A", None),
            row("L2", "b", "B", None),
            row("L3", "a", "C", None),
            row("L1", "c", "D", None),
            row("L2", "a", "E", None),
        ]
        .into_iter()
        .collect();
        let filtered = table.filter_intervals(&["a".to_string(), "c".to_string()]);
        assert_eq!(filtered.states(), vec!["A", "C", "D", "E"]);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn locations_are_sorted_and_distinct() {
        let table = ObservationTable::new(vec![
            row("L3", "a", "A", Some(1.0)),
            row("L1", "a", "A", Some(2.0)),
            row("L3", "a", "A", None),
        ]);
        assert_eq!(table.locations(), vec!["L1", "L3"]);
        assert_eq!(table.los_values_at("L3"), vec![1.0]);
    }

    #[test]
    fn column_lookup_kinds() {
        let mut a = row("L1", "a", "A", Some(1.0));
        a.extra.insert("Volume".into(), json!(10));
        a.extra.insert("Weather".into(), json!("dry"));
        let mut b = row("L2", "b", "B", None);
        b.extra.insert("Volume".into(), serde_json::Value::Null);
        let table = ObservationTable::new(vec![a, b]);

        assert_eq!(
            table.column(LOS_VALUE),
            Some(Column::Numeric(vec![Some(1.0), None]))
        );
        assert_eq!(
            table.column("Volume"),
            Some(Column::Numeric(vec![Some(10.0), None]))
        );
        assert_eq!(
            table.column("Weather"),
            Some(Column::Categorical(vec![Some("dry".into()), None]))
        );
        assert_eq!(
            table.column(LOCATION),
            Some(Column::Categorical(vec![Some("L1".into()), Some("L2".into())]))
        );
        assert!(table.column("Nope").is_none());
    }
}
