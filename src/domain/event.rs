//! Result set data model: symbols, their records, and trade events.
//!
//! A results file is an ordered JSON object mapping each symbol to a
//! [`SymbolRecord`]. Each record holds a list of [`Event`]s, which are free-form
//! JSON objects guaranteed to carry a numeric `profit`. Everything else on an
//! event (indicator readings, dates, nested condition maps) is carried through
//! untouched and read by name when an aggregation asks for it.

use crate::domain::error::SigstatsError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field every event must carry.
pub const PROFIT_FIELD: &str = "profit";

/// Key an exported event carries its symbol under.
pub const SYMBOL_FIELD: &str = "symbol";

/// Ordered mapping from symbol to its record, in file order.
pub type ResultSet = IndexMap<String, SymbolRecord>;

/// Read access to named numeric fields.
pub trait NumericFields {
    fn field(&self, name: &str) -> Option<f64>;

    fn require(&self, name: &str) -> Result<f64, SigstatsError> {
        self.field(name).ok_or_else(|| SigstatsError::MissingField {
            field: name.to_string(),
        })
    }
}

/// One recorded trade outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Event {
    fields: Map<String, Value>,
}

impl Event {
    /// Build an event from a JSON value, checking the `profit` invariant.
    pub fn from_json(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(fields) => Self::try_from(fields),
            other => Err(format!("expected event object, found {}", other)),
        }
    }

    pub fn profit(&self) -> f64 {
        self.field(PROFIT_FIELD).unwrap_or_default()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl TryFrom<Map<String, Value>> for Event {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get(PROFIT_FIELD) {
            Some(v) if v.is_number() => Ok(Self { fields }),
            Some(v) => Err(format!("event field 'profit' is not numeric: {}", v)),
            None => Err("event is missing required field 'profit'".to_string()),
        }
    }
}

impl From<Event> for Map<String, Value> {
    fn from(event: Event) -> Self {
        event.fields
    }
}

impl NumericFields for Event {
    fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }
}

/// Per-symbol backtest outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub profit: f64,
    #[serde(
        rename = "percentProfit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub percent_profit: Option<f64>,
    pub events: Vec<Event>,
    /// Keys the analysis does not interpret (e.g. `recent`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NumericFields for SymbolRecord {
    fn field(&self, name: &str) -> Option<f64> {
        match name {
            PROFIT_FIELD => Some(self.profit),
            "percentProfit" => self.percent_profit,
            other => self.extra.get(other).and_then(Value::as_f64),
        }
    }
}

/// An event paired with the symbol it came from.
///
/// Serializes as the event's own object with a trailing `symbol` key. A
/// `symbol` the event already carried is replaced, never duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct AnnotatedEvent {
    pub event: Event,
    pub symbol: String,
}

impl TryFrom<Map<String, Value>> for AnnotatedEvent {
    type Error = String;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let symbol = match fields.shift_remove(SYMBOL_FIELD) {
            Some(Value::String(s)) => s,
            Some(v) => return Err(format!("event field 'symbol' is not a string: {}", v)),
            None => return Err("event is missing required field 'symbol'".to_string()),
        };
        Ok(Self {
            event: Event::try_from(fields)?,
            symbol,
        })
    }
}

impl From<AnnotatedEvent> for Map<String, Value> {
    fn from(annotated: AnnotatedEvent) -> Self {
        let mut fields: Map<String, Value> = annotated.event.into();
        fields.shift_remove(SYMBOL_FIELD);
        fields.insert(SYMBOL_FIELD.to_string(), Value::String(annotated.symbol));
        fields
    }
}

impl NumericFields for AnnotatedEvent {
    fn field(&self, name: &str) -> Option<f64> {
        self.event.field(name)
    }
}

/// All events across all symbols, each tagged with its symbol.
///
/// Symbols are visited in file order and events in stored order. The input
/// is left as loaded; every returned event is a fresh copy.
pub fn flatten(results: &ResultSet) -> Vec<AnnotatedEvent> {
    results
        .iter()
        .flat_map(|(symbol, record)| {
            record.events.iter().map(move |event| AnnotatedEvent {
                event: event.clone(),
                symbol: symbol.clone(),
            })
        })
        .collect()
}

pub fn total_events(results: &ResultSet) -> usize {
    results.values().map(|r| r.events.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(input: Value) -> ResultSet {
        serde_json::from_value(input).unwrap()
    }

    #[test]
    fn event_requires_profit() {
        assert!(Event::from_json(json!({"span": 4})).is_err());
        assert!(Event::from_json(json!({"profit": "high"})).is_err());
        assert!(Event::from_json(json!([1, 2])).is_err());
        let event = Event::from_json(json!({"profit": -2.5, "span": 4})).unwrap();
        assert_eq!(event.profit(), -2.5);
        assert_eq!(event.field("span"), Some(4.0));
    }

    #[test]
    fn event_non_numeric_fields_are_not_numeric() {
        let event = Event::from_json(json!({
            "profit": 1,
            "buyDate": "2020-01-02",
            "buyConditions": {"rsi": 30}
        }))
        .unwrap();
        assert_eq!(event.field("buyDate"), None);
        assert_eq!(event.field("buyConditions"), None);
        assert!(event.fields().contains_key("buyConditions"));
    }

    #[test]
    fn require_reports_missing_field() {
        let event = Event::from_json(json!({"profit": 1})).unwrap();
        let err = event.require("goldenMACD").unwrap_err();
        assert!(matches!(err, SigstatsError::MissingField { field } if field == "goldenMACD"));
    }

    #[test]
    fn result_set_rejects_event_without_profit() {
        let res: Result<ResultSet, _> =
            serde_json::from_value(json!({"A": {"profit": 1, "events": [{"span": 2}]}}));
        assert!(res.is_err());
    }

    #[test]
    fn symbol_record_keeps_unknown_keys() {
        let results = parse(json!({
            "A": {"profit": 1, "percentProfit": null, "events": [], "recent": {"2020-01-01": {}}}
        }));
        let record = &results["A"];
        assert_eq!(record.percent_profit, None);
        assert!(record.extra.contains_key("recent"));
    }

    #[test]
    fn flatten_preserves_file_order_and_tags_symbols() {
        let results = parse(json!({
            "ZZZ": {"profit": 3, "events": [{"profit": 1}, {"profit": 2}]},
            "AAA": {"profit": -1, "events": [{"profit": -1}]}
        }));
        let events = flatten(&results);
        let tagged: Vec<(&str, f64)> = events
            .iter()
            .map(|e| (e.symbol.as_str(), e.event.profit()))
            .collect();
        assert_eq!(tagged, vec![("ZZZ", 1.0), ("ZZZ", 2.0), ("AAA", -1.0)]);
        assert_eq!(total_events(&results), 3);
    }

    #[test]
    fn flatten_leaves_input_untouched() {
        let results = parse(json!({"A": {"profit": 1, "events": [{"profit": 1}]}}));
        let before = results.clone();
        let _ = flatten(&results);
        assert_eq!(results, before);
        assert!(!results["A"].events[0].fields().contains_key("symbol"));
    }

    #[test]
    fn annotated_event_serializes_symbol_alongside_fields() {
        let event = AnnotatedEvent {
            event: Event::from_json(json!({"profit": 2, "span": 3})).unwrap(),
            symbol: "MSFT".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"profit": 2, "span": 3, "symbol": "MSFT"}));

        let back: AnnotatedEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn annotated_event_replaces_an_existing_symbol_key() {
        let event = AnnotatedEvent {
            event: Event::from_json(json!({"profit": 1, "symbol": "OLD", "span": 2})).unwrap(),
            symbol: "A".into(),
        };
        let text = serde_json::to_string(&event).unwrap();
        assert_eq!(text, r#"{"profit":1,"span":2,"symbol":"A"}"#);

        let back: AnnotatedEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back.symbol, "A");
        assert!(!back.event.fields().contains_key("symbol"));
        assert_eq!(back.event.field("span"), Some(2.0));
    }

    #[test]
    fn annotated_event_requires_string_symbol() {
        let missing: Result<AnnotatedEvent, _> = serde_json::from_value(json!({"profit": 1}));
        assert!(missing.is_err());
        let numeric: Result<AnnotatedEvent, _> =
            serde_json::from_value(json!({"profit": 1, "symbol": 7}));
        assert!(numeric.is_err());
    }
}
