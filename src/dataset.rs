use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::warn;

const TEAM_COLUMN: &str = "team";
const SEASON_COLUMN: &str = "season";
const PLAYOFF_MARKER: char = '*';

/// Strips the playoff marker some exports append to team names.
pub fn normalize_team_name(raw: &str) -> String {
    raw.trim().trim_end_matches(PLAYOFF_MARKER).trim().to_string()
}

/// Integer seasons first in numeric order, then everything else lexically.
pub fn compare_seasons(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamSeasonRow {
    pub team: String,
    pub team_norm: String,
    pub season: String,
    /// One value per dataset feature, in feature order. Empty cells are NaN.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStats {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl FeatureStats {
    fn from_column(name: &str, column: impl Iterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in column.filter(|v| v.is_finite()) {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        let mean = if count > 0 { sum / count as f64 } else { f64::NAN };
        Self {
            name: name.to_string(),
            count,
            mean,
            min,
            max,
        }
    }

    pub fn has_values(&self) -> bool {
        self.count > 0
    }

    pub fn default_value(&self) -> f64 {
        if self.has_values() { self.mean } else { 0.0 }
    }

    /// Observed range widened by 10% on each side.
    pub fn bounds(&self) -> (f64, f64) {
        if !self.has_values() {
            return (f64::NEG_INFINITY, f64::INFINITY);
        }
        let range = self.max - self.min;
        (self.min - 0.1 * range, self.max + 0.1 * range)
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    features: Vec<String>,
    rows: Vec<TeamSeasonRow>,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: ReferenceDataset,
    /// Indices into the requested feature list that the dataset carries.
    pub kept: Vec<usize>,
    pub dropped: Vec<String>,
    /// Repeated (normalized team, season) keys; only the first row is kept.
    pub duplicates: Vec<(String, String)>,
}

impl ReferenceDataset {
    pub fn load(path: &Path, requested: &[String]) -> Result<LoadedDataset> {
        let file =
            File::open(path).with_context(|| format!("open dataset {}", path.display()))?;
        Self::from_reader(file, requested)
            .with_context(|| format!("parse dataset {}", path.display()))
    }

    pub fn from_reader<R: Read>(rdr: R, requested: &[String]) -> Result<LoadedDataset> {
        // Short rows read as missing trailing cells.
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
        let headers = reader.headers().context("read header row")?.clone();
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);

        let team_idx = column(TEAM_COLUMN).ok_or_else(|| anyhow!("missing `team` column"))?;
        let season_idx =
            column(SEASON_COLUMN).ok_or_else(|| anyhow!("missing `season` column"))?;

        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        let mut columns = Vec::new();
        for (i, name) in requested.iter().enumerate() {
            match column(name) {
                Some(idx) => {
                    kept.push(i);
                    columns.push(idx);
                }
                None => dropped.push(name.clone()),
            }
        }
        let features: Vec<String> = kept.iter().map(|&i| requested[i].clone()).collect();

        let mut rows = Vec::new();
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("read row {}", line + 1))?;
            let team = record.get(team_idx).unwrap_or_default().to_string();
            let season = record.get(season_idx).unwrap_or_default().trim().to_string();
            let mut values = Vec::with_capacity(columns.len());
            for (&idx, name) in columns.iter().zip(&features) {
                let cell = record.get(idx).unwrap_or_default().trim();
                values.push(parse_cell(cell).with_context(|| {
                    format!("row {} column `{name}`: not a number: {cell:?}", line + 1)
                })?);
            }
            let team_norm = normalize_team_name(&team);
            if !seen.insert((team_norm.clone(), season.clone())) {
                warn!(team = %team_norm, season = %season, "duplicate team/season row skipped");
                duplicates.push((team_norm, season));
                continue;
            }
            rows.push(TeamSeasonRow {
                team_norm,
                team,
                season,
                values,
            });
        }

        Ok(LoadedDataset {
            dataset: ReferenceDataset { features, rows },
            kept,
            dropped,
            duplicates,
        })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn rows(&self) -> &[TeamSeasonRow] {
        &self.rows
    }

    pub fn team_options(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.team_norm.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn season_options(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut seasons: Vec<String> = self
            .rows
            .iter()
            .filter(|r| seen.insert(r.season.as_str()))
            .map(|r| r.season.clone())
            .collect();
        seasons.sort_by(|a, b| compare_seasons(a, b));
        seasons
    }

    pub fn default_season(&self) -> Option<String> {
        self.season_options().pop()
    }

    /// Keys are unique after loading, so at most one row matches.
    pub fn find_row(&self, team: &str, season: &str) -> Option<&TeamSeasonRow> {
        let team_norm = normalize_team_name(team);
        self.rows
            .iter()
            .find(|r| r.team_norm == team_norm && r.season == season.trim())
    }

    pub fn stats(&self) -> Vec<FeatureStats> {
        self.features
            .iter()
            .enumerate()
            .map(|(i, name)| FeatureStats::from_column(name, self.rows.iter().map(|r| r.values[i])))
            .collect()
    }
}

fn parse_cell(cell: &str) -> Result<f64> {
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    Ok(cell.parse::<f64>()?)
}

/// Reads a headerless single-column list of feature names.
pub fn load_feature_list(path: &Path) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("open feature list {}", path.display()))?;
    feature_list_from_reader(file)
}

pub fn feature_list_from_reader<R: Read>(rdr: R) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(rdr);
    let mut names = Vec::new();
    for record in reader.records() {
        let record = record.context("read feature list")?;
        let Some(name) = record.get(0).map(str::trim) else {
            continue;
        };
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    if names.is_empty() {
        return Err(anyhow!("feature list is empty"));
    }
    Ok(names)
}
