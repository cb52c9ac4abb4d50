//! Observation tables and the sources they are read from.

pub mod loader;
pub mod table;

pub use loader::{parse_table, DataLoadError, FileTableSource, TableFormat, TableSource};
pub use table::{Column, Observation, ObservationTable};
