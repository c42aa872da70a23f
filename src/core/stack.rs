use crate::core::baseline::{AcquisitionGeometry, BaselineCalculator, BaselinePair, GeometryParams};
use crate::core::coherence::CoherenceModel;
use crate::core::order_stats::median;
use crate::types::{mjd_to_datetime, Acquisition, StackError, StackResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Aggregate scores closer than this are considered tied
const SCORE_TIE_TOLERANCE: f64 = 1.0e-12;

/// How the pair coherences of a candidate reference are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregateStatistic {
    /// Total coherence of the stack
    #[default]
    Sum,
    Mean,
    /// Weakest pair of the stack
    Minimum,
    Median,
}

impl AggregateStatistic {
    /// Combine coherences in the given order; empty input scores 0
    pub fn aggregate(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            AggregateStatistic::Sum => values.iter().sum(),
            AggregateStatistic::Mean => values.iter().sum::<f64>() / values.len() as f64,
            AggregateStatistic::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregateStatistic::Median => median(&mut values.to_vec()).unwrap_or(0.0),
        }
    }
}

/// Stack optimisation parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackParams {
    pub geometry: GeometryParams,
    pub coherence: CoherenceModel,
    pub aggregate: AggregateStatistic,
}

/// All pairs of one candidate reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfgStack {
    pub reference_id: String,
    /// Position of the reference in the input
    pub reference_index: usize,
    /// Pairs with every other acquisition, by coherence (descending)
    pub pairs: Vec<BaselinePair>,
    /// Aggregate coherence score
    pub score: f64,
}

impl IfgStack {
    /// Secondary with the highest modelled coherence
    pub fn best_pair(&self) -> Option<&BaselinePair> {
        self.pairs.first()
    }

    pub fn pair_with(&self, secondary_id: &str) -> Option<&BaselinePair> {
        self.pairs.iter().find(|p| p.secondary_id == secondary_id)
    }
}

/// Identity and orbit information of an input acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    pub id: String,
    pub mission: String,
    pub acquisition_time: f64,
    pub absolute_orbit: u32,
    pub relative_orbit: u32,
}

impl From<&Acquisition> for AcquisitionSummary {
    fn from(acquisition: &Acquisition) -> Self {
        Self {
            id: acquisition.id.clone(),
            mission: acquisition.mission.clone(),
            acquisition_time: acquisition.acquisition_time,
            absolute_orbit: acquisition.absolute_orbit,
            relative_orbit: acquisition.relative_orbit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Reference,
    Secondary,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reference => f.pad("Reference"),
            Role::Secondary => f.pad("Secondary"),
        }
    }
}

/// One display row of the stack overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackTableRow {
    pub file_name: String,
    pub role: Role,
    /// Acquisition date, e.g. `03Jan2020`
    pub acquisition_date: String,
    pub absolute_orbit: u32,
    pub relative_orbit: u32,
    pub perpendicular_baseline: f64,
    pub temporal_baseline: f64,
    pub coherence: f64,
    pub height_of_ambiguity: f64,
    pub doppler_difference: f64,
}

/// Result of the reference selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOverview {
    /// Identifier of the selected reference
    pub reference_id: String,
    /// Position of the selected reference in the input
    pub reference_index: usize,
    /// One stack per candidate reference, in input order
    pub stacks: Vec<IfgStack>,
    /// Input acquisitions, in input order
    pub acquisitions: Vec<AcquisitionSummary>,
}

impl StackOverview {
    pub fn reference_stack(&self) -> Option<&IfgStack> {
        self.stacks.get(self.reference_index)
    }

    pub fn stack_for(&self, reference_id: &str) -> Option<&IfgStack> {
        self.stacks.iter().find(|s| s.reference_id == reference_id)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.acquisitions.iter().position(|a| a.id == id)
    }

    /// Modelled coherence of every ordered pair; row is the reference, the
    /// diagonal is 1
    pub fn coherence_matrix(&self) -> Array2<f64> {
        let n = self.acquisitions.len();
        let mut matrix = Array2::<f64>::eye(n);
        for (i, stack) in self.stacks.iter().enumerate() {
            for pair in &stack.pairs {
                if let Some(j) = self.index_of(&pair.secondary_id) {
                    matrix[[i, j]] = pair.coherence;
                }
            }
        }
        matrix
    }

    /// Rows of the selected reference stack: reference first, then
    /// secondaries by descending coherence
    pub fn table_rows(&self) -> Vec<StackTableRow> {
        let mut rows = Vec::with_capacity(self.acquisitions.len());
        let Some(stack) = self.reference_stack() else {
            return rows;
        };

        if let Some(reference) = self.acquisitions.get(self.reference_index) {
            rows.push(StackTableRow {
                file_name: reference.id.clone(),
                role: Role::Reference,
                acquisition_date: format_date(reference.acquisition_time),
                absolute_orbit: reference.absolute_orbit,
                relative_orbit: reference.relative_orbit,
                perpendicular_baseline: 0.0,
                temporal_baseline: 0.0,
                coherence: 1.0,
                height_of_ambiguity: f64::INFINITY,
                doppler_difference: 0.0,
            });
        }

        for pair in &stack.pairs {
            let Some(secondary) = self.index_of(&pair.secondary_id).map(|j| &self.acquisitions[j]) else {
                continue;
            };
            rows.push(StackTableRow {
                file_name: secondary.id.clone(),
                role: Role::Secondary,
                acquisition_date: format_date(secondary.acquisition_time),
                absolute_orbit: secondary.absolute_orbit,
                relative_orbit: secondary.relative_orbit,
                perpendicular_baseline: pair.perpendicular_baseline,
                temporal_baseline: pair.temporal_baseline,
                coherence: pair.coherence,
                height_of_ambiguity: pair.height_of_ambiguity,
                doppler_difference: pair.doppler_difference,
            });
        }

        rows
    }
}

fn format_date(mjd: f64) -> String {
    mjd_to_datetime(mjd)
        .map(|time| time.format("%d%b%Y").to_string())
        .unwrap_or_default()
}

/// Selects the reference acquisition that maximises the aggregate coherence
/// of its interferogram stack
pub struct StackOptimizer {
    params: StackParams,
    calculator: BaselineCalculator,
}

impl StackOptimizer {
    /// Create an optimizer with default parameters
    pub fn new() -> Self {
        Self {
            params: StackParams::default(),
            calculator: BaselineCalculator::default(),
        }
    }

    /// Create an optimizer with custom parameters
    pub fn with_params(params: StackParams) -> StackResult<Self> {
        let calculator = BaselineCalculator::new(params.geometry.clone(), params.coherence)?;
        Ok(Self { params, calculator })
    }

    pub fn params(&self) -> &StackParams {
        &self.params
    }

    /// Evaluate every ordered pair and pick the best reference.
    ///
    /// Ties within `SCORE_TIE_TOLERANCE` go to the lowest input index.
    pub fn find_optimal_reference(&self, acquisitions: &[Acquisition]) -> StackResult<StackOverview> {
        let n = acquisitions.len();
        if n < 2 {
            return Err(StackError::InsufficientAcquisitions(n));
        }

        let mut seen = HashSet::with_capacity(n);
        for acquisition in acquisitions {
            if !seen.insert(acquisition.id.as_str()) {
                return Err(StackError::DuplicateAcquisition(acquisition.id.clone()));
            }
        }

        log::info!(
            "Optimising stack of {} acquisitions ({} pairs, {:?} aggregate)",
            n,
            n * (n - 1),
            self.params.aggregate
        );

        let geometries = self.compute_geometries(acquisitions)?;
        let pairs = self.compute_pairs(&geometries);

        let mut stacks = Vec::with_capacity(n);
        for (i, chunk) in pairs.chunks(n - 1).enumerate() {
            let coherences: Vec<f64> = chunk.iter().map(|p| p.coherence).collect();
            let score = self.params.aggregate.aggregate(&coherences);

            let mut ranked = chunk.to_vec();
            ranked.sort_by(|a, b| b.coherence.total_cmp(&a.coherence));

            log::debug!("Candidate {} ({}): score {:.6}", i, acquisitions[i].id, score);
            stacks.push(IfgStack {
                reference_id: acquisitions[i].id.clone(),
                reference_index: i,
                pairs: ranked,
                score,
            });
        }

        let scores: Vec<f64> = stacks.iter().map(|stack| stack.score).collect();
        let reference_index = select_reference(&scores);
        let reference_id = acquisitions[reference_index].id.clone();

        log::info!(
            "Selected reference {} (index {}, score {:.4})",
            reference_id,
            reference_index,
            stacks[reference_index].score
        );

        Ok(StackOverview {
            reference_id,
            reference_index,
            stacks,
            acquisitions: acquisitions.iter().map(AcquisitionSummary::from).collect(),
        })
    }

    #[cfg(feature = "parallel")]
    fn compute_geometries<'a>(&self, acquisitions: &'a [Acquisition]) -> StackResult<Vec<AcquisitionGeometry<'a>>> {
        use rayon::prelude::*;

        let results: Vec<StackResult<AcquisitionGeometry<'a>>> = acquisitions
            .par_iter()
            .map(|acquisition| self.calculator.geometry(acquisition))
            .collect();

        // first error in input order
        results.into_iter().collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_geometries<'a>(&self, acquisitions: &'a [Acquisition]) -> StackResult<Vec<AcquisitionGeometry<'a>>> {
        acquisitions
            .iter()
            .map(|acquisition| self.calculator.geometry(acquisition))
            .collect()
    }

    /// All ordered pairs, grouped by reference: (0,1), (0,2), ..., (1,0), (1,2), ...
    #[cfg(feature = "parallel")]
    fn compute_pairs(&self, geometries: &[AcquisitionGeometry]) -> Vec<BaselinePair> {
        use rayon::prelude::*;

        let indices = ordered_pairs(geometries.len());
        indices
            .into_par_iter()
            .map(|(i, j)| self.calculator.compare(&geometries[i], &geometries[j]))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_pairs(&self, geometries: &[AcquisitionGeometry]) -> Vec<BaselinePair> {
        ordered_pairs(geometries.len())
            .into_iter()
            .map(|(i, j)| self.calculator.compare(&geometries[i], &geometries[j]))
            .collect()
    }
}

impl Default for StackOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

fn ordered_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
        .collect()
}

/// Index of the highest score; a later score must exceed the current best
/// by more than `SCORE_TIE_TOLERANCE` to replace it.
fn select_reference(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] + SCORE_TIE_TOLERANCE {
            best = i;
        }
    }
    best
}
