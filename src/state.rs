use std::collections::VecDeque;

use crate::error::PipelineError;
use crate::pipeline::{InputVector, ManualField, Pipeline, Prediction};

const FINE_STEP: f64 = 0.001;
const COARSE_STEP_FRACTION: f64 = 0.01;
const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    TeamSeason,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingInput,
    ResultDisplayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fine,
    Coarse,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub mode: InputMode,
    pub stage: Stage,
    pub team_options: Vec<String>,
    pub season_options: Vec<String>,
    pub team_idx: usize,
    pub season_idx: usize,
    pub fields: Vec<ManualField>,
    pub values: Vec<f64>,
    /// Focused form row: team/season in team mode, feature index in manual mode.
    pub selected: usize,
    pub editing: Option<String>,
    pub result: Option<Prediction>,
    pub show_inputs: bool,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,
}

impl AppState {
    pub fn new(pipeline: &Pipeline) -> Self {
        let dataset = pipeline.dataset();
        let team_options = dataset.team_options();
        let season_options = dataset.season_options();
        let fields = pipeline.manual_fields().to_vec();
        let values = fields.iter().map(|f| f.default).collect();
        let mut state = Self {
            mode: InputMode::TeamSeason,
            stage: Stage::AwaitingInput,
            team_idx: 0,
            season_idx: season_options.len().saturating_sub(1),
            team_options,
            season_options,
            fields,
            values,
            selected: 0,
            editing: None,
            result: None,
            show_inputs: false,
            help_overlay: false,
            logs: VecDeque::new(),
        };
        for name in pipeline.dropped_features() {
            state.push_log(format!("[WARN] Feature `{name}` not in dataset; dropped"));
        }
        for (team, season) in pipeline.duplicate_rows() {
            state.push_log(format!("[WARN] Duplicate row {team} / {season} skipped"));
        }
        state
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn selected_team(&self) -> Option<&str> {
        self.team_options.get(self.team_idx).map(String::as_str)
    }

    pub fn selected_season(&self) -> Option<&str> {
        self.season_options.get(self.season_idx).map(String::as_str)
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    fn form_rows(&self) -> usize {
        match self.mode {
            InputMode::TeamSeason => 2,
            InputMode::Manual => self.fields.len(),
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            InputMode::TeamSeason => InputMode::Manual,
            InputMode::Manual => InputMode::TeamSeason,
        };
        self.selected = 0;
        self.editing = None;
        self.input_changed();
    }

    pub fn select_next(&mut self) {
        let total = self.form_rows();
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1) % total;
    }

    pub fn select_prev(&mut self) {
        let total = self.form_rows();
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + total - 1) % total;
    }

    /// Cycles the focused selector (team mode) or steps the focused value (manual mode).
    pub fn adjust(&mut self, forward: bool, step: Step) {
        match self.mode {
            InputMode::TeamSeason => {
                let (idx, len) = if self.selected == 0 {
                    (&mut self.team_idx, self.team_options.len())
                } else {
                    (&mut self.season_idx, self.season_options.len())
                };
                if len == 0 {
                    return;
                }
                *idx = if forward {
                    (*idx + 1) % len
                } else {
                    (*idx + len - 1) % len
                };
            }
            InputMode::Manual => {
                let Some(field) = self.fields.get(self.selected) else {
                    return;
                };
                let amount = match step {
                    Step::Fine => FINE_STEP,
                    Step::Coarse if field.max.is_finite() && field.min.is_finite() => {
                        ((field.max - field.min) * COARSE_STEP_FRACTION).max(FINE_STEP)
                    }
                    Step::Coarse => FINE_STEP * 100.0,
                };
                let signed = if forward { amount } else { -amount };
                let next = field.clamp(self.values[self.selected] + signed);
                self.values[self.selected] = next;
            }
        }
        self.input_changed();
    }

    pub fn reset_field(&mut self) {
        if self.mode != InputMode::Manual {
            return;
        }
        if let Some(field) = self.fields.get(self.selected) {
            self.values[self.selected] = field.default;
            self.input_changed();
        }
    }

    pub fn begin_edit(&mut self) {
        if self.mode != InputMode::Manual || self.fields.is_empty() {
            return;
        }
        self.editing = Some(String::new());
    }

    pub fn edit_push(&mut self, c: char) {
        if let Some(buf) = self.editing.as_mut()
            && (c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        {
            buf.push(c);
        }
    }

    pub fn edit_backspace(&mut self) {
        if let Some(buf) = self.editing.as_mut() {
            buf.pop();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Applies the edit buffer to the focused field. Returns false when rejected.
    pub fn commit_edit(&mut self) -> bool {
        let Some(buf) = self.editing.take() else {
            return false;
        };
        let Some(field) = self.fields.get(self.selected) else {
            return false;
        };
        let name = field.name.clone();
        match buf.trim().parse::<f64>() {
            Ok(v) if field.accepts(v) => {
                self.values[self.selected] = v;
                self.input_changed();
                true
            }
            Ok(v) => {
                let msg = format!(
                    "[WARN] {name}: {v} outside [{:.4}, {:.4}]",
                    field.min, field.max
                );
                self.push_log(msg);
                false
            }
            Err(_) => {
                self.push_log(format!("[WARN] {name}: `{}` is not a number", buf.trim()));
                false
            }
        }
    }

    pub fn toggle_show_inputs(&mut self) {
        self.show_inputs = !self.show_inputs;
    }

    pub fn current_input(&self, pipeline: &Pipeline) -> Result<InputVector, PipelineError> {
        match self.mode {
            InputMode::TeamSeason => {
                let (Some(team), Some(season)) = (self.selected_team(), self.selected_season())
                else {
                    return Err(PipelineError::NoMatchingRow {
                        team: self.selected_team().unwrap_or("-").to_string(),
                        season: self.selected_season().unwrap_or("-").to_string(),
                    });
                };
                pipeline.resolve_team_season(team, season)
            }
            InputMode::Manual => pipeline.resolve_manual(&self.values),
        }
    }

    /// The only transition into `ResultDisplayed`. Failures leave stage and result untouched.
    pub fn predict(&mut self, pipeline: &Pipeline) {
        let outcome = self
            .current_input(pipeline)
            .and_then(|input| pipeline.predict(&input));
        match outcome {
            Ok(pred) => {
                self.push_log(format!(
                    "[INFO] Predicted win% {:.3} ({:.1} wins)",
                    pred.win_pct, pred.wins
                ));
                self.result = Some(pred);
                self.stage = Stage::ResultDisplayed;
            }
            Err(err @ PipelineError::NoMatchingRow { .. }) => {
                self.push_log(format!("[WARN] {err}"));
            }
            Err(err) => {
                self.push_log(format!("[ERROR] {err}"));
            }
        }
    }

    fn input_changed(&mut self) {
        if self.stage == Stage::ResultDisplayed {
            self.stage = Stage::AwaitingInput;
            self.result = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppState, InputMode, Stage, Step};
    use crate::dataset::ReferenceDataset;
    use crate::pipeline::{HoldoutMetrics, Pipeline};
    use crate::model::{RegressorArtifact, ScalerArtifact};

    fn pipeline(csv: &str) -> Pipeline {
        let features = vec!["net_rtg".to_string()];
        let loaded = ReferenceDataset::from_reader(csv.as_bytes(), &features).unwrap();
        Pipeline::new(
            Box::new(RegressorArtifact::Linear {
                coefficients: vec![0.03],
                intercept: 0.5,
            }),
            Box::new(ScalerArtifact::Identity),
            HoldoutMetrics {
                r2: 0.9,
                rmse: 0.05,
                baseline_rmse: 0.15,
            },
            loaded.dataset,
        )
    }

    const CSV: &str = "team,season,net_rtg\nBoston Celtics*,2024,10.0\nBoston Celtics*,2023,6.0\nUtah Jazz,2023,-5.0\n";

    #[test]
    fn starts_on_latest_season_awaiting_input() {
        let p = pipeline(CSV);
        let state = AppState::new(&p);
        assert_eq!(state.stage, Stage::AwaitingInput);
        assert_eq!(state.selected_team(), Some("Boston Celtics"));
        assert_eq!(state.selected_season(), Some("2024"));
        assert_eq!(state.values, vec![(10.0 + 6.0 - 5.0) / 3.0]);
    }

    #[test]
    fn input_change_clears_result() {
        let p = pipeline(CSV);
        let mut state = AppState::new(&p);
        state.predict(&p);
        assert_eq!(state.stage, Stage::ResultDisplayed);
        assert!(state.result.is_some());

        state.select_next();
        state.adjust(false, Step::Fine);
        assert_eq!(state.selected_season(), Some("2023"));
        assert_eq!(state.stage, Stage::AwaitingInput);
        assert!(state.result.is_none());
    }

    #[test]
    fn missing_pair_keeps_prior_state() {
        let p = pipeline(CSV);
        let mut state = AppState::new(&p);
        state.team_idx = 1; // Utah Jazz, 2024 absent
        state.predict(&p);
        assert_eq!(state.stage, Stage::AwaitingInput);
        assert!(state.result.is_none());
        assert!(state.logs.back().unwrap().starts_with("[WARN] No row found"));
    }

    #[test]
    fn manual_edit_rejects_out_of_bounds() {
        let p = pipeline(CSV);
        let mut state = AppState::new(&p);
        state.toggle_mode();
        assert_eq!(state.mode, InputMode::Manual);
        let before = state.values[0];

        state.begin_edit();
        for c in "99".chars() {
            state.edit_push(c);
        }
        assert!(!state.commit_edit());
        assert_eq!(state.values[0], before);

        state.begin_edit();
        for c in "abc11".chars() {
            state.edit_push(c);
        }
        assert!(state.commit_edit());
        assert_eq!(state.values[0], 11.0);
    }

    #[test]
    fn coarse_steps_clamp_to_bounds() {
        let p = pipeline(CSV);
        let mut state = AppState::new(&p);
        state.toggle_mode();
        for _ in 0..500 {
            state.adjust(true, Step::Coarse);
        }
        assert_eq!(state.values[0], state.fields[0].max);
    }
}
