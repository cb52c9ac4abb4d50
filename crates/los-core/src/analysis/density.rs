//! Per-location Weibull fits of the LOS value.

use los_config::DensityConfig;
use los_math::{fit_weibull, linspace, WeibullFit};
use serde::{Deserialize, Serialize};

use crate::data::ObservationTable;
use crate::error::{AnalysisError, Result};

/// Fitted density curve for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityCurve {
    pub location: String,
    pub fit: WeibullFit,
    /// Mean of the fitted distribution.
    pub mean: f64,
    pub x: Vec<f64>,
    pub pdf: Vec<f64>,
}

/// Outcome of fitting every requested location.
#[derive(Debug, Default)]
pub struct DensityReport {
    pub curves: Vec<DensityCurve>,
    /// Locations with no observed LOS value at all.
    pub empty: Vec<String>,
    /// Locations whose fit failed.
    pub failures: Vec<AnalysisError>,
}

/// Fit one location and sample its pdf at `points` positions on `[0, max]`.
pub fn fit_location(location: &str, values: &[f64], points: usize) -> Result<DensityCurve> {
    let fit = fit_weibull(values).map_err(|source| AnalysisError::Fit {
        location: location.to_string(),
        source,
    })?;
    let max = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    let x = linspace(0.0, max, points);
    let pdf = x.iter().map(|&v| fit.pdf(v)).collect();
    Ok(DensityCurve {
        location: location.to_string(),
        mean: fit.mean(),
        fit,
        x,
        pdf,
    })
}

/// Fit every configured location of `table` (all of them when none are
/// configured).
pub fn analyze_density(table: &ObservationTable, config: &DensityConfig) -> DensityReport {
    let locations = if config.locations.is_empty() {
        table.locations()
    } else {
        config.locations.clone()
    };

    let mut report = DensityReport::default();
    for location in locations {
        let values = table.los_values_at(&location);
        if values.is_empty() {
            report.empty.push(location);
            continue;
        }
        match fit_location(&location, &values, config.points) {
            Ok(curve) => report.curves.push(curve),
            Err(e) => report.failures.push(e),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Observation;
    use std::collections::BTreeMap;

    fn obs(loc: &str, value: Option<f64>) -> Observation {
        Observation {
            location: loc.to_string(),
            time_interval: "t".to_string(),
            speed_range: "s".to_string(),
            los_value: value,
            los: "A".to_string(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn curve_spans_zero_to_max() {
        let curve = fit_location("L1", &[0.4, 0.9, 1.3, 0.7, 1.1], 50).unwrap();
        assert_eq!(curve.x.len(), 50);
        assert_eq!(curve.x[0], 0.0);
        assert_eq!(curve.x[49], 1.3);
        assert!(curve.pdf.iter().all(|p| *p >= 0.0));
        assert_eq!(curve.fit.n, 5);
    }

    #[test]
    fn curve_carries_the_fitted_mean() {
        let values = [0.4, 0.9, 1.3, 0.7, 1.1];
        let curve = fit_location("L1", &values, 10).unwrap();
        assert!(curve.mean.is_finite());
        assert_eq!(curve.mean, curve.fit.mean());
        let sample_mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((curve.mean - sample_mean).abs() < 0.2, "mean {}", curve.mean);
    }

    #[test]
    fn constant_values_are_a_fit_error() {
        let err = fit_location("L2", &[0.5, 0.5, 0.5], 10).unwrap_err();
        assert!(matches!(err, AnalysisError::Fit { ref location, .. } if location == "L2"));
    }

    #[test]
    fn report_splits_curves_empty_and_failed() {
        let table = ObservationTable::new(vec![
            obs("L1", Some(0.3)),
            obs("L1", Some(0.8)),
            obs("L1", Some(1.2)),
            obs("L2", Some(0.5)),
            obs("L3", None),
        ]);
        let config = DensityConfig {
            points: 20,
            ..DensityConfig::default()
        };
        let report = analyze_density(&table, &config);
        assert_eq!(report.curves.len(), 1);
        assert_eq!(report.curves[0].location, "L1");
        assert_eq!(report.empty, vec!["L3"]);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn configured_locations_take_precedence() {
        let table = ObservationTable::new(vec![obs("L1", Some(0.3)), obs("L1", Some(0.9))]);
        let config = DensityConfig {
            locations: vec!["L9".to_string()],
            ..DensityConfig::default()
        };
        let report = analyze_density(&table, &config);
        assert!(report.curves.is_empty());
        assert_eq!(report.empty, vec!["L9"]);
    }
}
