use anyhow::{Context, Result};

use nba_winpct_terminal::config::Settings;
use nba_winpct_terminal::dataset::normalize_team_name;
use nba_winpct_terminal::logging;
use nba_winpct_terminal::pipeline::{LoadOptions, Pipeline};

/// Loads the artifacts and prints one prediction without starting the TUI.
fn main() -> Result<()> {
    // .env may set RUST_LOG, so load it before building the filter.
    let settings = Settings::from_process();
    logging::init_stderr();
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    println!("Repo root: {}", settings.paths.root.display());
    let pipeline = Pipeline::load(
        &settings.paths,
        LoadOptions {
            strict_features: settings.strict_features,
        },
    )?;

    println!("{}", pipeline.metrics().caption());
    for name in pipeline.dropped_features() {
        println!("Dropped feature (not in dataset): {name}");
    }

    let input = if args.iter().any(|a| a == "--manual") {
        let defaults = pipeline
            .manual_fields()
            .iter()
            .map(|f| f.default)
            .collect::<Vec<_>>();
        pipeline.resolve_manual(&defaults)?
    } else {
        let dataset = pipeline.dataset();
        let team = match arg_value(&args, "--team") {
            Some(team) => normalize_team_name(&team),
            None => dataset
                .team_options()
                .into_iter()
                .next()
                .context("dataset has no teams")?,
        };
        let season = match arg_value(&args, "--season") {
            Some(season) => season,
            None => dataset.default_season().context("dataset has no seasons")?,
        };
        pipeline.resolve_team_season(&team, &season)?
    };

    let pred = pipeline.predict(&input)?;
    println!("Predicted Win%: {}", pred.win_pct_label());
    println!("Predicted Wins (82 gms): {}", pred.wins_label());
    if args.iter().any(|a| a == "--show-inputs") {
        for (name, value) in pred.input.iter() {
            println!(" - {name}: {value:.4}");
        }
    }

    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(val) = arg.strip_prefix(&prefix) {
            let trimmed = val.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}
