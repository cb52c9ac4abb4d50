//! In-memory plot recorder.

use std::path::PathBuf;

use super::{Plot, PlotSink, SinkError};

/// Keeps every emitted plot together with its session.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    plots: Vec<(Option<String>, Plot)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plots(&self) -> &[(Option<String>, Plot)] {
        &self.plots
    }

    /// Plots of one session, in emission order.
    pub fn for_session<'a>(&'a self, session: &'a str) -> impl Iterator<Item = &'a Plot> + 'a {
        self.plots
            .iter()
            .filter(move |(s, _)| s.as_deref() == Some(session))
            .map(|(_, p)| p)
    }

    /// First plot of `kind` for `session` (`None` for cross-session plots).
    pub fn find(&self, session: Option<&str>, kind: &str) -> Option<&Plot> {
        self.plots
            .iter()
            .find(|(s, p)| s.as_deref() == session && p.kind() == kind)
            .map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }
}

impl PlotSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn emit(&mut self, session: Option<&str>, plot: &Plot) -> Result<Option<PathBuf>, SinkError> {
        self.plots.push((session.map(str::to_string), plot.clone()));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::StationaryPlot;

    #[test]
    fn records_in_order_by_session() {
        let plot = Plot::StationaryDistribution(StationaryPlot {
            title: "t".into(),
            states: vec!["A".into()],
            values: vec![1.0],
            approximate: false,
        });
        let mut sink = MemorySink::new();
        sink.emit(Some("Morning"), &plot).unwrap();
        sink.emit(None, &plot).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.for_session("Morning").count(), 1);
        assert!(sink.find(None, "stationary_distribution").is_some());
        assert!(sink.find(Some("Afternoon"), "stationary_distribution").is_none());
    }
}
