//! JSON file adapter for result sets, exported events, symbol lists, price
//! caches, and classifier datasets.

use crate::domain::classifier::Dataset;
use crate::domain::error::SigstatsError;
use crate::domain::event::{AnnotatedEvent, ResultSet};
use crate::domain::seed::PriceCache;
use crate::ports::results_port::ResultsPort;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct JsonResultsAdapter {
    /// Indent the exported event array.
    pub pretty: bool,
}

impl JsonResultsAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SigstatsError> {
    let data_format = |reason: String| SigstatsError::DataFormat {
        path: path.display().to_string(),
        reason,
    };
    let file = File::open(path).map_err(|e| data_format(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| data_format(e.to_string()))
}

impl ResultsPort for JsonResultsAdapter {
    fn load_results(&self, path: &Path) -> Result<ResultSet, SigstatsError> {
        read_json(path)
    }

    fn write_events(&self, events: &[AnnotatedEvent], path: &Path) -> Result<(), SigstatsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        let written = if self.pretty {
            serde_json::to_writer_pretty(&mut writer, events)
        } else {
            serde_json::to_writer(&mut writer, events)
        };
        written.map_err(std::io::Error::from)?;
        writer.flush()?;
        Ok(())
    }

    fn load_events(&self, path: &Path) -> Result<Vec<AnnotatedEvent>, SigstatsError> {
        read_json(path)
    }
}

pub fn load_symbols(path: &Path) -> Result<Vec<String>, SigstatsError> {
    read_json(path)
}

pub fn load_price_cache(path: &Path) -> Result<PriceCache, SigstatsError> {
    read_json(path)
}

pub fn load_dataset(path: &Path) -> Result<Dataset, SigstatsError> {
    read_json(path)
}
