use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

/// Maps a raw feature vector into the space the regressor was trained on.
pub trait Scaler: fmt::Debug {
    fn dim(&self) -> Option<usize>;
    fn transform(&self, x: &[f64]) -> Result<Vec<f64>>;
}

/// Maps a scaled feature vector to a single prediction.
pub trait Regressor: fmt::Debug {
    fn dim(&self) -> usize;
    fn predict(&self, x: &[f64]) -> Result<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerArtifact {
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    MinMax { min: Vec<f64>, max: Vec<f64> },
    Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressorArtifact {
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

impl ScalerArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read scaler {}", path.display()))?;
        let scaler: Self = serde_json::from_str(&raw).context("parse scaler json")?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Standard { mean, scale } if mean.len() != scale.len() => bail!(
                "standard scaler has {} means but {} scales",
                mean.len(),
                scale.len()
            ),
            Self::MinMax { min, max } if min.len() != max.len() => bail!(
                "min-max scaler has {} minimums but {} maximums",
                min.len(),
                max.len()
            ),
            _ => Ok(()),
        }
    }

    /// Keeps only the given column indices, in order.
    pub fn project(&self, keep: &[usize]) -> Self {
        match self {
            Self::Standard { mean, scale } => Self::Standard {
                mean: pick(mean, keep),
                scale: pick(scale, keep),
            },
            Self::MinMax { min, max } => Self::MinMax {
                min: pick(min, keep),
                max: pick(max, keep),
            },
            Self::Identity => Self::Identity,
        }
    }
}

impl Scaler for ScalerArtifact {
    fn dim(&self) -> Option<usize> {
        match self {
            Self::Standard { mean, .. } => Some(mean.len()),
            Self::MinMax { min, .. } => Some(min.len()),
            Self::Identity => None,
        }
    }

    fn transform(&self, x: &[f64]) -> Result<Vec<f64>> {
        if let Some(dim) = self.dim()
            && dim != x.len()
        {
            bail!("scaler expects {dim} features, got {}", x.len());
        }
        let out = match self {
            Self::Standard { mean, scale } => x
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(v, (m, s))| (v - m) / nonzero(*s))
                .collect(),
            Self::MinMax { min, max } => x
                .iter()
                .zip(min.iter().zip(max))
                .map(|(v, (lo, hi))| (v - lo) / nonzero(hi - lo))
                .collect(),
            Self::Identity => x.to_vec(),
        };
        Ok(out)
    }
}

impl RegressorArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("read model {}", path.display()))?;
        serde_json::from_str(&raw).context("parse model json")
    }

    pub fn project(&self, keep: &[usize]) -> Self {
        match self {
            Self::Linear {
                coefficients,
                intercept,
            } => Self::Linear {
                coefficients: pick(coefficients, keep),
                intercept: *intercept,
            },
        }
    }
}

impl Regressor for RegressorArtifact {
    fn dim(&self) -> usize {
        match self {
            Self::Linear { coefficients, .. } => coefficients.len(),
        }
    }

    fn predict(&self, x: &[f64]) -> Result<f64> {
        match self {
            Self::Linear {
                coefficients,
                intercept,
            } => {
                if coefficients.len() != x.len() {
                    return Err(anyhow!(
                        "model expects {} features, got {}",
                        coefficients.len(),
                        x.len()
                    ));
                }
                Ok(intercept + coefficients.iter().zip(x).map(|(c, v)| c * v).sum::<f64>())
            }
        }
    }
}

// Constant columns are fitted with a zero scale; treat them as pass-through.
fn nonzero(v: f64) -> f64 {
    if v == 0.0 { 1.0 } else { v }
}

fn pick(values: &[f64], keep: &[usize]) -> Vec<f64> {
    keep.iter().filter_map(|&i| values.get(i).copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::{Regressor, RegressorArtifact, Scaler, ScalerArtifact};

    #[test]
    fn standard_scaler_centers_and_scales() {
        let scaler = ScalerArtifact::Standard {
            mean: vec![10.0, 0.5],
            scale: vec![2.0, 0.0],
        };
        let out = scaler.transform(&[14.0, 0.75]).unwrap();
        assert_eq!(out, vec![2.0, 0.25]);
    }

    #[test]
    fn min_max_scaler_maps_range_to_unit_interval() {
        let scaler = ScalerArtifact::MinMax {
            min: vec![100.0],
            max: vec![120.0],
        };
        assert_eq!(scaler.transform(&[115.0]).unwrap(), vec![0.75]);
    }

    #[test]
    fn scaler_rejects_wrong_width() {
        let scaler = ScalerArtifact::Standard {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 1.0],
        };
        assert!(scaler.transform(&[1.0]).is_err());
        assert!(ScalerArtifact::Identity.transform(&[1.0, 2.0, 3.0]).is_ok());
    }

    #[test]
    fn linear_model_is_intercept_plus_dot_product() {
        let model = RegressorArtifact::Linear {
            coefficients: vec![0.1, -0.2],
            intercept: 0.5,
        };
        let pred = model.predict(&[1.0, 0.5]).unwrap();
        assert!((pred - 0.5).abs() < 1e-12);
        assert!(model.predict(&[1.0]).is_err());
    }

    #[test]
    fn artifacts_parse_from_tagged_json() {
        let scaler: ScalerArtifact =
            serde_json::from_str(r#"{"kind":"standard","mean":[1.0],"scale":[2.0]}"#).unwrap();
        assert_eq!(scaler.dim(), Some(1));
        let model: RegressorArtifact =
            serde_json::from_str(r#"{"kind":"linear","coefficients":[0.3],"intercept":0.1}"#)
                .unwrap();
        assert_eq!(model.dim(), 1);
    }

    #[test]
    fn projection_keeps_selected_columns() {
        let model = RegressorArtifact::Linear {
            coefficients: vec![1.0, 2.0, 3.0],
            intercept: 0.0,
        };
        assert_eq!(
            model.project(&[0, 2]),
            RegressorArtifact::Linear {
                coefficients: vec![1.0, 3.0],
                intercept: 0.0
            }
        );
    }
}
