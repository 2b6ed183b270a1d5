//! Result file access port trait.

use crate::domain::error::SigstatsError;
use crate::domain::event::{AnnotatedEvent, ResultSet};
use std::path::Path;

pub trait ResultsPort {
    /// Read a results file. Any read, syntax, or shape problem is a `DataFormat` error.
    fn load_results(&self, path: &Path) -> Result<ResultSet, SigstatsError>;

    /// Write events to `path`, replacing whatever is there.
    fn write_events(&self, events: &[AnnotatedEvent], path: &Path) -> Result<(), SigstatsError>;

    fn load_events(&self, path: &Path) -> Result<Vec<AnnotatedEvent>, SigstatsError>;
}
