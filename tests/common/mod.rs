#![allow(dead_code)]

use serde_json::{json, Value};
use sigstats::domain::error::SigstatsError;
use sigstats::domain::event::{AnnotatedEvent, Event, ResultSet, SymbolRecord};
use sigstats::domain::seed::PriceDocument;
use sigstats::ports::document_store_port::DocumentStorePort;
use sigstats::ports::results_port::ResultsPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct MockDocumentStore {
    pub docs: RefCell<HashMap<String, PriceDocument>>,
    pub inserts: RefCell<Vec<String>>,
    pub fail_on: Option<String>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: RefCell::new(HashMap::new()),
            inserts: RefCell::new(Vec::new()),
            fail_on: None,
        }
    }

    pub fn with_document(self, document: PriceDocument) -> Self {
        self.docs
            .borrow_mut()
            .insert(document.id.clone(), document);
        self
    }

    pub fn with_failure(mut self, id: &str) -> Self {
        self.fail_on = Some(id.to_string());
        self
    }
}

impl DocumentStorePort for MockDocumentStore {
    fn exists(&self, id: &str) -> Result<bool, SigstatsError> {
        Ok(self.docs.borrow().contains_key(id))
    }

    fn insert(&self, document: &PriceDocument) -> Result<(), SigstatsError> {
        if self.fail_on.as_deref() == Some(document.id.as_str()) {
            return Err(SigstatsError::StoreQuery {
                reason: format!("insert rejected for {}", document.id),
            });
        }
        self.inserts.borrow_mut().push(document.id.clone());
        self.docs
            .borrow_mut()
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PriceDocument>, SigstatsError> {
        Ok(self.docs.borrow().get(id).cloned())
    }
}

/// Serves a fixed result set and records what gets written.
pub struct MockResultsPort {
    pub results: Option<ResultSet>,
    pub written: RefCell<Vec<(PathBuf, Vec<AnnotatedEvent>)>>,
}

impl MockResultsPort {
    pub fn new(results: ResultSet) -> Self {
        Self {
            results: Some(results),
            written: RefCell::new(Vec::new()),
        }
    }

    pub fn unreadable() -> Self {
        Self {
            results: None,
            written: RefCell::new(Vec::new()),
        }
    }
}

impl ResultsPort for MockResultsPort {
    fn load_results(&self, path: &Path) -> Result<ResultSet, SigstatsError> {
        self.results
            .clone()
            .ok_or_else(|| SigstatsError::DataFormat {
                path: path.display().to_string(),
                reason: "unreadable".into(),
            })
    }

    fn write_events(&self, events: &[AnnotatedEvent], path: &Path) -> Result<(), SigstatsError> {
        self.written
            .borrow_mut()
            .push((path.to_path_buf(), events.to_vec()));
        Ok(())
    }

    fn load_events(&self, _path: &Path) -> Result<Vec<AnnotatedEvent>, SigstatsError> {
        Ok(self
            .written
            .borrow()
            .last()
            .map(|(_, events)| events.clone())
            .unwrap_or_default())
    }
}

pub fn make_event(value: Value) -> Event {
    Event::from_json(value).unwrap()
}

/// Record whose profit is the sum of its events' profits.
pub fn make_record(events: Vec<Value>) -> SymbolRecord {
    let events: Vec<Event> = events.into_iter().map(make_event).collect();
    SymbolRecord {
        profit: events.iter().map(Event::profit).sum(),
        percent_profit: None,
        events,
        extra: Default::default(),
    }
}

pub fn make_results(entries: Vec<(&str, Vec<Value>)>) -> ResultSet {
    entries
        .into_iter()
        .map(|(symbol, events)| (symbol.to_string(), make_record(events)))
        .collect()
}

/// Symbol A with one +10 event, symbol B with one -5 event.
pub fn scenario_ab() -> ResultSet {
    make_results(vec![
        ("A", vec![json!({"profit": 10.0, "goldenMACD": 1.5, "deathMACD": 0.2})]),
        ("B", vec![json!({"profit": -5.0, "goldenMACD": 4.0, "deathMACD": -2.0})]),
    ])
}

pub const SAMPLE_RESULTS_JSON: &str = r#"{
    "GOOG": {
        "profit": 17.5,
        "percentProfit": 0.12,
        "events": [
            {"buyDate": "2019-01-04", "sellDate": "2019-02-01", "profit": 20.0, "percentProfit": 0.15,
             "span": 19, "goldenMACD": 1.2, "deathMACD": -0.4, "goldenRSI": 31.0, "deathRSI": 68.0,
             "deathProfit": 3.0, "rsiProfit": -1.0},
            {"buyDate": "2019-05-06", "sellDate": "2019-05-20", "profit": -2.5, "percentProfit": -0.02,
             "span": 10, "goldenMACD": 2.5, "deathMACD": 0.7, "goldenRSI": 45.0, "deathRSI": 55.0,
             "deathProfit": -4.0, "rsiProfit": 2.0}
        ]
    },
    "AMD": {
        "profit": -3.0,
        "percentProfit": -0.3,
        "events": [
            {"buyDate": "2019-03-01", "sellDate": "2019-03-08", "profit": -3.0, "percentProfit": -0.3,
             "span": 5, "goldenMACD": 0.3, "deathMACD": -1.1, "goldenRSI": 28.0, "deathRSI": 71.0,
             "deathProfit": 0.0, "rsiProfit": 1.5}
        ]
    },
    "TSLA": {
        "profit": 0.0,
        "events": []
    }
}"#;

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    write_temp_file(content)
}
