use std::env;
use std::path::{Path, PathBuf};

use crate::error::MissingPath;

pub const ROOT_ENV: &str = "NBA_WINPCT_ROOT";
pub const STRICT_FEATURES_ENV: &str = "NBA_WINPCT_STRICT_FEATURES";
pub const LOG_FILE_ENV: &str = "NBA_WINPCT_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub root: PathBuf,
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub features: PathBuf,
    pub metrics: PathBuf,
    pub data: PathBuf,
}

impl ArtifactPaths {
    /// Layout produced by the training notebooks: `model/` and `data/` under one root.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let model_dir = root.join("model");
        Self {
            model: model_dir.join("win_predictor.json"),
            scaler: model_dir.join("scaler.json"),
            features: model_dir.join("features.csv"),
            metrics: model_dir.join("metrics.json"),
            data: root.join("data").join("clean_team_stats.csv"),
            root,
        }
    }

    pub fn entries(&self) -> [(&'static str, &Path); 5] {
        [
            ("model", self.model.as_path()),
            ("scaler", self.scaler.as_path()),
            ("features", self.features.as_path()),
            ("metrics", self.metrics.as_path()),
            ("clean", self.data.as_path()),
        ]
    }

    pub fn missing(&self) -> Vec<MissingPath> {
        self.entries()
            .into_iter()
            .filter(|(_, path)| !path.exists())
            .map(|(label, path)| MissingPath {
                label,
                path: path.to_path_buf(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub paths: ArtifactPaths,
    pub strict_features: bool,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Loads `.env.local` / `.env`, then resolves from process args and environment.
    pub fn from_process() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        let args = env::args().skip(1).collect::<Vec<_>>();
        Self::resolve(&args, |key| env::var(key).ok())
    }

    pub fn resolve(args: &[String], lookup: impl Fn(&str) -> Option<String>) -> Self {
        let root = parse_root_arg(args)
            .or_else(|| non_empty(lookup(ROOT_ENV)).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let mut paths = ArtifactPaths::from_root(root);
        let overrides: [(&str, &mut PathBuf); 5] = [
            ("NBA_WINPCT_MODEL", &mut paths.model),
            ("NBA_WINPCT_SCALER", &mut paths.scaler),
            ("NBA_WINPCT_FEATURES", &mut paths.features),
            ("NBA_WINPCT_METRICS", &mut paths.metrics),
            ("NBA_WINPCT_DATA", &mut paths.data),
        ];
        for (key, slot) in overrides {
            if let Some(val) = non_empty(lookup(key)) {
                *slot = PathBuf::from(val);
            }
        }

        Self {
            paths,
            strict_features: lookup(STRICT_FEATURES_ENV)
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            log_file: non_empty(lookup(LOG_FILE_ENV)).map(PathBuf::from),
        }
    }
}

fn parse_root_arg(args: &[String]) -> Option<PathBuf> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--root=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--root" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn non_empty(val: Option<String>) -> Option<String> {
    val.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::{ArtifactPaths, Settings};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_layout_under_root() {
        let paths = ArtifactPaths::from_root("/srv/nba");
        assert_eq!(paths.model, PathBuf::from("/srv/nba/model/win_predictor.json"));
        assert_eq!(paths.data, PathBuf::from("/srv/nba/data/clean_team_stats.csv"));
    }

    #[test]
    fn root_flag_beats_env() {
        let env = HashMap::from([("NBA_WINPCT_ROOT", "/from/env")]);
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let s = Settings::resolve(&args(&["--root", "/from/flag"]), lookup);
        assert_eq!(s.paths.root, PathBuf::from("/from/flag"));

        let s = Settings::resolve(&args(&["--root=/eq"]), lookup);
        assert_eq!(s.paths.root, PathBuf::from("/eq"));

        let s = Settings::resolve(&[], lookup);
        assert_eq!(s.paths.root, PathBuf::from("/from/env"));
    }

    #[test]
    fn per_artifact_overrides_and_flags() {
        let env = HashMap::from([
            ("NBA_WINPCT_SCALER", "/tmp/scaler.json"),
            ("NBA_WINPCT_STRICT_FEATURES", "Yes"),
            ("NBA_WINPCT_LOG", "  "),
        ]);
        let s = Settings::resolve(&[], |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.paths.scaler, PathBuf::from("/tmp/scaler.json"));
        assert_eq!(s.paths.model, PathBuf::from("./model/win_predictor.json"));
        assert!(s.strict_features);
        assert_eq!(s.log_file, None);
    }
}
