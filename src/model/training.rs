//! Offline training: dataset loading, stratified split, base fit, calibrator selection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use super::artifact::{CalibratedModel, ARTIFACT_VERSION};
use super::calibration::{self, Calibrator, CalibratorKind};
use super::pipeline::{SolverOptions, WinProbPipeline};
use super::scoring::CandidateMetrics;
use crate::error::{ModelError, Result};
use crate::state::features::feature_columns;

/// Outcome column in the state dataset.
pub const TARGET_COLUMN: &str = "home_win";

/// Rows missing any of these are dropped before training.
const REQUIRED_STATE_COLUMNS: [&str; 6] = [
    "quarter",
    "seconds_remaining",
    "score_diff_home",
    "yardline_100",
    "down",
    "ydstogo",
];

/// Historical state → outcome pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    /// Column order of every row.
    pub feature_cols: Vec<String>,
    /// Feature rows; `None` is a missing value.
    pub rows: Vec<Vec<Option<f64>>>,
    /// 1 if the home team won.
    pub labels: Vec<u8>,
}

impl TrainingSet {
    /// Empty set over the given columns.
    pub fn new(feature_cols: Vec<String>) -> Self {
        Self {
            feature_cols,
            rows: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Append one labelled row.
    pub fn push(&mut self, row: Vec<Option<f64>>, label: u8) {
        self.rows.push(row);
        self.labels.push(label);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read a CSV state dataset from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Read a CSV state dataset with a header row.
    ///
    /// Empty cells (or `NA`/`nan`) are missing. Rows with no outcome or with a
    /// missing core game-state field are dropped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        let position = |name: &str| -> std::result::Result<usize, ModelError> {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                ModelError::Training(format!("missing column '{}' in state dataset", name))
            })
        };

        let feature_cols = feature_columns();
        let feature_idx = feature_cols
            .iter()
            .map(|c| position(c.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let target_idx = position(TARGET_COLUMN)?;
        let required: Vec<usize> = REQUIRED_STATE_COLUMNS
            .iter()
            .filter_map(|c| feature_cols.iter().position(|f| f == c))
            .collect();

        let mut set = Self::new(feature_cols);
        let mut dropped = 0usize;
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let mut row = Vec::with_capacity(feature_idx.len());
            for (&idx, name) in feature_idx.iter().zip(&set.feature_cols) {
                row.push(parse_cell(record.get(idx).unwrap_or(""), name, line)?);
            }
            let label = parse_cell(record.get(target_idx).unwrap_or(""), TARGET_COLUMN, line)?;
            let label = match label {
                None => {
                    dropped += 1;
                    continue;
                }
                Some(v) if v == 0.0 => 0,
                Some(v) if v == 1.0 => 1,
                Some(v) => {
                    return Err(ModelError::Training(format!(
                        "row {}: {} must be 0 or 1, got {}",
                        line + 1,
                        TARGET_COLUMN,
                        v
                    ))
                    .into())
                }
            };
            if required.iter().any(|&i| row[i].is_none()) {
                dropped += 1;
                continue;
            }
            set.push(row, label);
        }

        info!(rows = set.len(), dropped, "Loaded state dataset");
        Ok(set)
    }

    /// Rows at `indices`, in the given order.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            feature_cols: self.feature_cols.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Values of one named column.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.feature_cols.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }
}

fn parse_cell(
    raw: &str,
    column: &str,
    line: usize,
) -> std::result::Result<Option<f64>, ModelError> {
    let cell = raw.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => return Ok(Some(1.0)),
        "false" => return Ok(Some(0.0)),
        _ => {}
    }
    cell.parse::<f64>().map(Some).map_err(|_| {
        ModelError::Training(format!(
            "row {}: column '{}' has non-numeric value '{}'",
            line + 1,
            column,
            cell
        ))
    })
}

/// Training settings.
#[derive(Debug, Clone, Copy)]
pub struct TrainingOptions {
    /// Seed for the stratified split.
    pub seed: u64,
    /// Share of rows held out for calibration and scoring.
    pub validation_fraction: f64,
    /// Base classifier solver settings.
    pub solver: SolverOptions,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            validation_fraction: 0.2,
            solver: SolverOptions::default(),
        }
    }
}

/// Split indices into (train, validation), preserving the class ratio.
pub fn stratified_split(labels: &[u8], fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut validation = Vec::new();
    for class in [0u8, 1u8] {
        let mut idx: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &y)| y == class)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(&mut rng);
        let mut n_val = (idx.len() as f64 * fraction).round() as usize;
        if idx.len() >= 2 {
            n_val = n_val.clamp(1, idx.len() - 1);
        }
        validation.extend_from_slice(&idx[..n_val]);
        train.extend_from_slice(&idx[n_val..]);
    }
    train.sort_unstable();
    validation.sort_unstable();
    (train, validation)
}

/// Winner of calibration selection plus every candidate's metrics.
#[derive(Debug, Clone)]
pub struct CalibrationSelection {
    /// Selected candidate.
    pub kind: CalibratorKind,
    /// Fitted transform for the selected candidate.
    pub calibrator: Option<Calibrator>,
    /// Metrics for all candidates in [`CalibratorKind::ALL`] order.
    pub metrics: Vec<CandidateMetrics>,
}

/// Fit every candidate on the validation split and keep the lowest Brier score.
///
/// Candidates are fit and scored on the same data. Ties go to the earlier
/// candidate in `none, isotonic, platt` order.
pub fn select_calibrator(
    raw: &[f64],
    labels: &[u8],
) -> std::result::Result<CalibrationSelection, ModelError> {
    let mut fitted = Vec::with_capacity(CalibratorKind::ALL.len());
    let mut metrics = Vec::with_capacity(CalibratorKind::ALL.len());

    for kind in CalibratorKind::ALL {
        let calibrator = Calibrator::fit(kind, raw, labels)?;
        let probs: Vec<f64> = raw
            .iter()
            .map(|&p| calibration::apply(calibrator.as_ref(), p))
            .collect();
        let m = CandidateMetrics::evaluate(kind, &probs, labels);
        debug!(
            calibrator = %kind,
            brier = m.brier,
            log_loss = m.log_loss,
            auc = ?m.auc,
            "Scored calibration candidate"
        );
        fitted.push(calibrator);
        metrics.push(m);
    }

    let best = lowest_brier(&metrics).ok_or_else(|| {
        ModelError::Training("no calibration candidates evaluated".to_string())
    })?;
    let kind = metrics[best].calibrator;
    info!(calibrator = %kind, brier = metrics[best].brier, "Selected calibrator");
    Ok(CalibrationSelection {
        kind,
        calibrator: fitted.swap_remove(best),
        metrics,
    })
}

/// Index of the first candidate with the strictly lowest Brier score.
fn lowest_brier(metrics: &[CandidateMetrics]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, m) in metrics.iter().enumerate() {
        match best {
            Some(b) if metrics[b].brier <= m.brier => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Train the base pipeline, select a calibrator, and package the artifact.
#[instrument(skip(set, options), fields(rows = set.len()))]
pub fn train(
    set: &TrainingSet,
    options: TrainingOptions,
) -> std::result::Result<CalibratedModel, ModelError> {
    let positives = set.labels.iter().filter(|&&y| y == 1).count();
    let negatives = set.len() - positives;
    if positives < 2 || negatives < 2 {
        return Err(ModelError::Training(format!(
            "need at least two home wins and two home losses, got {} and {}",
            positives, negatives
        )));
    }

    let (train_idx, val_idx) =
        stratified_split(&set.labels, options.validation_fraction, options.seed);
    let train_set = set.subset(&train_idx);
    let val_set = set.subset(&val_idx);
    info!(
        train = train_set.len(),
        validation = val_set.len(),
        seed = options.seed,
        "Split state dataset"
    );

    let base_model = WinProbPipeline::fit(&train_set.rows, &train_set.labels, options.solver)?;
    let raw = val_set
        .rows
        .iter()
        .map(|r| base_model.predict_row(r))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let selection = select_calibrator(&raw, &val_set.labels)?;

    let model = CalibratedModel {
        version: ARTIFACT_VERSION.to_string(),
        feature_cols: set.feature_cols.clone(),
        base_model,
        calibrator_type: selection.kind,
        calibrator: selection.calibrator,
        metrics: selection.metrics,
        trained_at: OffsetDateTime::now_utc(),
        n_train: train_set.len(),
        n_validation: val_set.len(),
        seed: options.seed,
    };
    model.check_consistency()?;
    Ok(model)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::pipeline::sigmoid;
    use rand::Rng;

    /// Synthetic games where the lead and clock drive the outcome.
    pub(crate) fn synthetic_set(n: usize, seed: u64) -> TrainingSet {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut set = TrainingSet::new(feature_columns());
        for i in 0..n {
            let season = 2019 + (i % 5) as i32;
            let week = 1 + (i % 18) as u32;
            let quarter = rng.gen_range(1..=4u8);
            let seconds = rng.gen_range(0..=3600u32);
            let diff = rng.gen_range(-21..=21i32);
            let has_ball = rng.gen_bool(0.5);
            let yardline = rng.gen_range(1..=99u8);
            let down = rng.gen_range(1..=4u8);
            let togo = rng.gen_range(1..=15u8);
            let urgency = 1.0 + (3600.0 - f64::from(seconds)) / 1200.0;
            let logit = 0.12 * f64::from(diff) * urgency + if has_ball { 0.2 } else { -0.2 };
            let label = rng.gen_bool(sigmoid(logit)) as u8;
            let row = vec![
                Some(f64::from(season)),
                // Every tenth week is unknown to exercise imputation.
                if i % 10 == 0 { None } else { Some(f64::from(week)) },
                Some(f64::from(quarter)),
                Some(f64::from(seconds)),
                Some(f64::from(diff)),
                Some(if has_ball { 1.0 } else { 0.0 }),
                Some(f64::from(yardline)),
                Some(f64::from(down)),
                Some(f64::from(togo)),
            ];
            set.push(row, label);
        }
        set
    }

    const CSV_HEADER: &str =
        "game_id,season,week,quarter,seconds_remaining,score_diff_home,home_has_ball,yardline_100,down,ydstogo,home_win";

    #[test]
    fn csv_loader_reads_and_filters_rows() {
        let csv = format!(
            "{}\n\
             g1,2024,3,1,3500,0,1,75,1,10,1\n\
             g1,2024,,2,1700,7,false,40,2,6,1\n\
             g2,2024,4,3,,3,1,40,2,6,0\n\
             g3,2024,4,3,900,3,true,40,2,6,\n\
             g4,NA,5,4,30,-3,0,20,3,2,0\n",
            CSV_HEADER
        );
        let set = TrainingSet::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.labels, vec![1, 1, 0]);
        assert_eq!(set.rows[1][1], None);
        assert_eq!(set.rows[1][5], Some(0.0));
        assert_eq!(set.rows[2][0], None);
    }

    #[test]
    fn csv_loader_requires_all_columns() {
        let csv = "season,week,quarter,home_win\n2024,1,1,1\n";
        assert!(TrainingSet::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn csv_loader_rejects_non_binary_target() {
        let csv = format!("{}\ng1,2024,3,1,3500,0,1,75,1,10,2\n", CSV_HEADER);
        assert!(TrainingSet::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn stratified_split_is_reproducible_and_balanced() {
        let labels: Vec<u8> = (0..100).map(|i| (i % 4 == 0) as u8).collect();
        let (train_a, val_a) = stratified_split(&labels, 0.2, 42);
        let (train_b, val_b) = stratified_split(&labels, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(val_a, val_b);
        assert_eq!(val_a.len(), 20);
        assert_eq!(train_a.len(), 80);
        let val_pos = val_a.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(val_pos, 5);
        assert!(train_a.iter().all(|i| !val_a.contains(i)));
    }

    #[test]
    fn different_seeds_give_different_splits() {
        let labels: Vec<u8> = (0..200).map(|i| (i % 2) as u8).collect();
        let (_, val_a) = stratified_split(&labels, 0.2, 1);
        let (_, val_b) = stratified_split(&labels, 0.2, 2);
        assert_ne!(val_a, val_b);
    }

    fn metric(kind: CalibratorKind, brier: f64) -> CandidateMetrics {
        CandidateMetrics {
            calibrator: kind,
            brier,
            log_loss: 0.0,
            auc: None,
        }
    }

    #[test]
    fn lowest_brier_prefers_earliest_on_tie() {
        let metrics = vec![
            metric(CalibratorKind::None, 0.20),
            metric(CalibratorKind::Isotonic, 0.18),
            metric(CalibratorKind::Platt, 0.18),
        ];
        assert_eq!(lowest_brier(&metrics), Some(1));

        let all_tied = vec![
            metric(CalibratorKind::None, 0.2),
            metric(CalibratorKind::Isotonic, 0.2),
            metric(CalibratorKind::Platt, 0.2),
        ];
        assert_eq!(lowest_brier(&all_tied), Some(0));
        assert_eq!(lowest_brier(&[]), None);
    }

    #[test]
    fn selection_scores_every_candidate_in_order() {
        let raw: Vec<f64> = (0..40).map(|i| i as f64 / 40.0).collect();
        let labels: Vec<u8> = (0..40).map(|i| ((i * 7) % 40 < i) as u8).collect();
        let selection = select_calibrator(&raw, &labels).unwrap();
        let kinds: Vec<CalibratorKind> = selection.metrics.iter().map(|m| m.calibrator).collect();
        assert_eq!(kinds, CalibratorKind::ALL.to_vec());
        let chosen = selection
            .metrics
            .iter()
            .find(|m| m.calibrator == selection.kind)
            .unwrap();
        assert!(selection.metrics.iter().all(|m| chosen.brier <= m.brier));
        assert_eq!(
            selection.calibrator.as_ref().map(Calibrator::kind),
            (selection.kind != CalibratorKind::None).then_some(selection.kind)
        );
    }

    #[test]
    fn selection_picks_calibrator_for_miscalibrated_scores() {
        // Raw scores squeezed toward 0.5 while outcomes are extreme.
        let raw: Vec<f64> = (0..100).map(|i| 0.45 + 0.1 * (i as f64 / 100.0)).collect();
        let labels: Vec<u8> = (0..100).map(|i| (i >= 50) as u8).collect();
        let selection = select_calibrator(&raw, &labels).unwrap();
        assert_ne!(selection.kind, CalibratorKind::None);
        let none = &selection.metrics[0];
        let chosen = selection
            .metrics
            .iter()
            .find(|m| m.calibrator == selection.kind)
            .unwrap();
        assert!(chosen.brier < none.brier);
    }

    #[test]
    fn train_produces_consistent_artifact() {
        let set = synthetic_set(2000, 7);
        let model = train(&set, TrainingOptions::default()).unwrap();
        assert_eq!(model.feature_cols, feature_columns());
        assert_eq!(model.metrics.len(), 3);
        assert_eq!(model.n_train + model.n_validation, 2000);
        assert!(model.selected_metrics().is_some());
        // Score differential carries positive weight.
        assert!(model.base_model.classifier.coefficients[4] > 0.0);
    }

    #[test]
    fn train_rejects_single_class_data() {
        let mut set = TrainingSet::new(feature_columns());
        for _ in 0..10 {
            set.push(vec![Some(1.0); 9], 1);
        }
        assert!(matches!(
            train(&set, TrainingOptions::default()),
            Err(ModelError::Training(_))
        ));
    }
}
