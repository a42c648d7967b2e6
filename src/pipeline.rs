use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ArtifactPaths;
use crate::dataset::{self, FeatureStats, ReferenceDataset};
use crate::error::{PipelineError, Result};
use crate::model::{Regressor, RegressorArtifact, Scaler, ScalerArtifact};

/// Projected wins always assume a full regular season.
pub const SEASON_GAMES: f64 = 82.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldoutMetrics {
    pub r2: f64,
    pub rmse: f64,
    pub baseline_rmse: f64,
}

impl HoldoutMetrics {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read metrics {}", path.display()))?;
        serde_json::from_str(&raw).context("parse metrics json")
    }

    pub fn caption(&self) -> String {
        format!(
            "Holdout R² {:.3}, RMSE {:.3}, baseline RMSE {:.3}",
            self.r2, self.rmse, self.baseline_rmse
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Fail instead of dropping features the dataset does not carry.
    pub strict_features: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    TeamSeason { team: String, season: String },
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputVector {
    pub source: InputSource,
    pub features: Vec<String>,
    pub values: Vec<f64>,
}

impl InputVector {
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.features
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub win_pct: f64,
    pub wins: f64,
    pub input: InputVector,
}

impl Prediction {
    pub fn win_pct_label(&self) -> String {
        format!("{:.3}", self.win_pct)
    }

    pub fn wins_label(&self) -> String {
        format!("{:.1}", self.wins)
    }
}

/// Manual-entry bounds and default for one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualField {
    pub name: String,
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

impl ManualField {
    fn from_stats(stats: &FeatureStats) -> Self {
        let (min, max) = stats.bounds();
        Self {
            name: stats.name.clone(),
            default: stats.default_value(),
            min,
            max,
        }
    }

    pub fn accepts(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug)]
pub struct Pipeline {
    scaler: Box<dyn Scaler>,
    model: Box<dyn Regressor>,
    metrics: HoldoutMetrics,
    dataset: ReferenceDataset,
    fields: Vec<ManualField>,
    dropped: Vec<String>,
    duplicates: Vec<(String, String)>,
}

impl Pipeline {
    pub fn load(paths: &ArtifactPaths, opts: LoadOptions) -> Result<Self> {
        let missing = paths.missing();
        if !missing.is_empty() {
            return Err(PipelineError::MissingArtifact(missing));
        }

        let model =
            RegressorArtifact::load(&paths.model).map_err(|e| PipelineError::load("model", e))?;
        let scaler =
            ScalerArtifact::load(&paths.scaler).map_err(|e| PipelineError::load("scaler", e))?;
        let requested = dataset::load_feature_list(&paths.features)
            .map_err(|e| PipelineError::load("features", e))?;
        let metrics =
            HoldoutMetrics::load(&paths.metrics).map_err(|e| PipelineError::load("metrics", e))?;

        if let Some(dim) = scaler.dim()
            && dim != requested.len()
        {
            return Err(PipelineError::load(
                "scaler",
                anyhow::anyhow!("fitted on {dim} features, feature list has {}", requested.len()),
            ));
        }
        if model.dim() != requested.len() {
            return Err(PipelineError::load(
                "model",
                anyhow::anyhow!(
                    "fitted on {} features, feature list has {}",
                    model.dim(),
                    requested.len()
                ),
            ));
        }

        let loaded = ReferenceDataset::load(&paths.data, &requested)
            .map_err(|e| PipelineError::load("clean", e))?;

        let (model, scaler) = if loaded.dropped.is_empty() {
            (model, scaler)
        } else {
            if opts.strict_features {
                return Err(PipelineError::load(
                    "features",
                    anyhow::anyhow!(
                        "dataset is missing feature columns: {}",
                        loaded.dropped.join(", ")
                    ),
                ));
            }
            warn!(dropped = ?loaded.dropped, "features absent from dataset were dropped");
            (model.project(&loaded.kept), scaler.project(&loaded.kept))
        };

        if !loaded.duplicates.is_empty() {
            warn!(
                count = loaded.duplicates.len(),
                "duplicate team/season rows skipped; first occurrence kept"
            );
        }

        info!(
            features = loaded.dataset.features().len(),
            rows = loaded.dataset.rows().len(),
            r2 = metrics.r2,
            "artifacts loaded"
        );

        let mut pipeline = Self::new(Box::new(model), Box::new(scaler), metrics, loaded.dataset);
        pipeline.dropped = loaded.dropped;
        pipeline.duplicates = loaded.duplicates;
        Ok(pipeline)
    }

    pub fn new(
        model: Box<dyn Regressor>,
        scaler: Box<dyn Scaler>,
        metrics: HoldoutMetrics,
        dataset: ReferenceDataset,
    ) -> Self {
        let fields = dataset.stats().iter().map(ManualField::from_stats).collect();
        Self {
            scaler,
            model,
            metrics,
            dataset,
            fields,
            dropped: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    pub fn features(&self) -> &[String] {
        self.dataset.features()
    }

    pub fn metrics(&self) -> &HoldoutMetrics {
        &self.metrics
    }

    pub fn dataset(&self) -> &ReferenceDataset {
        &self.dataset
    }

    pub fn dropped_features(&self) -> &[String] {
        &self.dropped
    }

    /// Team/season keys that appeared more than once in the dataset.
    pub fn duplicate_rows(&self) -> &[(String, String)] {
        &self.duplicates
    }

    pub fn manual_fields(&self) -> &[ManualField] {
        &self.fields
    }

    pub fn resolve_team_season(&self, team: &str, season: &str) -> Result<InputVector> {
        let team = dataset::normalize_team_name(team);
        let season = season.trim();
        let Some(row) = self.dataset.find_row(&team, season) else {
            return Err(PipelineError::NoMatchingRow {
                team,
                season: season.to_string(),
            });
        };
        Ok(InputVector {
            source: InputSource::TeamSeason {
                team,
                season: season.to_string(),
            },
            features: self.features().to_vec(),
            values: row.values.clone(),
        })
    }

    pub fn resolve_manual(&self, values: &[f64]) -> Result<InputVector> {
        if values.len() != self.fields.len() {
            return Err(PipelineError::PredictionError(format!(
                "expected {} manual values, got {}",
                self.fields.len(),
                values.len()
            )));
        }
        Ok(InputVector {
            source: InputSource::Manual,
            features: self.features().to_vec(),
            values: values.to_vec(),
        })
    }

    pub fn predict(&self, input: &InputVector) -> Result<Prediction> {
        if let Some((name, _)) = input.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PipelineError::PredictionError(format!(
                "feature `{name}` has no value"
            )));
        }
        let scaled = self
            .scaler
            .transform(&input.values)
            .map_err(|e| PipelineError::PredictionError(format!("{e:#}")))?;
        if scaled.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::PredictionError(
                "scaled features are not finite".to_string(),
            ));
        }
        let win_pct = self
            .model
            .predict(&scaled)
            .map_err(|e| PipelineError::PredictionError(format!("{e:#}")))?;
        if !win_pct.is_finite() {
            return Err(PipelineError::PredictionError(
                "model produced a non-finite prediction".to_string(),
            ));
        }

        let wins = win_pct * SEASON_GAMES;
        debug!(win_pct, wins, source = ?input.source, "prediction");
        Ok(Prediction {
            win_pct,
            wins,
            input: input.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{HoldoutMetrics, InputSource, Pipeline, SEASON_GAMES};
    use crate::dataset::ReferenceDataset;
    use crate::error::PipelineError;
    use crate::model::{RegressorArtifact, ScalerArtifact};

    const CSV: &str = "\
team,season,net_rtg,pace
Boston Celtics*,2024,11.7,97.2
Detroit Pistons,2024,-8.9,99.0
Boston Celtics*,2023,6.5,98.1
";

    fn pipeline() -> Pipeline {
        let features = vec!["net_rtg".to_string(), "pace".to_string()];
        let loaded = ReferenceDataset::from_reader(CSV.as_bytes(), &features).unwrap();
        Pipeline::new(
            Box::new(RegressorArtifact::Linear {
                coefficients: vec![0.15, 0.0],
                intercept: 0.5,
            }),
            Box::new(ScalerArtifact::Standard {
                mean: vec![0.0, 98.0],
                scale: vec![10.0, 1.0],
            }),
            HoldoutMetrics {
                r2: 0.93,
                rmse: 0.04,
                baseline_rmse: 0.15,
            },
            loaded.dataset,
        )
    }

    #[test]
    fn team_season_resolves_row_features() {
        let p = pipeline();
        let input = p.resolve_team_season("Boston Celtics", "2023").unwrap();
        assert_eq!(input.values, vec![6.5, 98.1]);
        assert_eq!(
            input.source,
            InputSource::TeamSeason {
                team: "Boston Celtics".to_string(),
                season: "2023".to_string()
            }
        );
    }

    #[test]
    fn duplicate_rows_resolve_to_the_first_occurrence() {
        let features = vec!["net_rtg".to_string(), "pace".to_string()];
        let csv = format!("{CSV}Boston Celtics,2024,0.0,90.0\n");
        let loaded = ReferenceDataset::from_reader(csv.as_bytes(), &features).unwrap();
        assert_eq!(
            loaded.duplicates,
            vec![("Boston Celtics".to_string(), "2024".to_string())]
        );
        let p = Pipeline::new(
            Box::new(RegressorArtifact::Linear {
                coefficients: vec![0.15, 0.0],
                intercept: 0.5,
            }),
            Box::new(ScalerArtifact::Identity),
            HoldoutMetrics {
                r2: 0.93,
                rmse: 0.04,
                baseline_rmse: 0.15,
            },
            loaded.dataset,
        );
        let input = p.resolve_team_season("Boston Celtics*", "2024").unwrap();
        assert_eq!(input.values, vec![11.7, 97.2]);
    }

    #[test]
    fn marked_team_name_resolves_to_plain_name() {
        let p = pipeline();
        let input = p.resolve_team_season("  Boston Celtics* ", "2023").unwrap();
        assert_eq!(input.values, vec![6.5, 98.1]);
        assert_eq!(
            input.source,
            InputSource::TeamSeason {
                team: "Boston Celtics".to_string(),
                season: "2023".to_string()
            }
        );
    }

    #[test]
    fn absent_pair_is_no_matching_row() {
        let p = pipeline();
        let err = p.resolve_team_season("Detroit Pistons", "2023").unwrap_err();
        assert!(matches!(err, PipelineError::NoMatchingRow { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn wins_scale_prediction_by_season_length() {
        let p = pipeline();
        let input = p.resolve_team_season("Boston Celtics", "2024").unwrap();
        let pred = p.predict(&input).unwrap();
        assert_eq!(pred.wins, pred.win_pct * SEASON_GAMES);
        assert!((pred.win_pct - (0.5 + 0.15 * 1.17)).abs() < 1e-12);
        assert_eq!(p.predict(&input).unwrap(), pred);
    }

    #[test]
    fn manual_fields_default_to_mean() {
        let p = pipeline();
        let pace = &p.manual_fields()[1];
        assert_eq!(pace.default, (97.2 + 99.0 + 98.1) / 3.0);
        assert!(pace.accepts(99.0 + 0.1 * (99.0 - 97.2)));
        assert!(!pace.accepts(101.0));
        assert_eq!(pace.clamp(50.0), pace.min);
    }

    #[test]
    fn non_finite_input_is_a_prediction_error() {
        let p = pipeline();
        let input = p.resolve_manual(&[f64::NAN, 98.0]).unwrap();
        assert!(matches!(
            p.predict(&input),
            Err(PipelineError::PredictionError(_))
        ));
        assert!(p.resolve_manual(&[1.0]).is_err());
    }
}
