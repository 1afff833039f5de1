//! # MAT Engine Core
//!
//! Core types, configuration and I/O for the MAT Engine temporal stress
//! detector.
//!
//! This crate provides:
//! - `TemporalObservation`: one field, one date, one tile of index values
//! - `TemporalMatrix`: dense date-by-feature matrix handed to the decomposition
//! - `EngineConfig`: explicit configuration for every engine stage
//! - `FieldAnalysis` / `StressAssessment`: engine outputs
//! - Algorithm trait for a consistent stage API
//! - JSON I/O for observation files and analysis sidecars

pub mod assessment;
pub mod config;
pub mod error;
pub mod io;
pub mod matrix;
pub mod observation;

pub use assessment::{
    AnalysisSummary, BaselineSource, FieldAnalysis, NumericalWarning, StressAssessment,
    StressLabel, SvdStats, TrendDescriptor, TrendLabel,
};
pub use config::{
    ClassifierConfig, DecompositionConfig, EngineConfig, IndexSelection, MatrixConfig,
    MatrixLayout, RankConfig, RankMode, TrendConfig,
};
pub use error::{Error, Result};
pub use matrix::{BuildDiagnostics, CadenceGap, ColumnLabel, TemporalMatrix};
pub use observation::{BandScene, Reflectance, TemporalObservation, VegetationIndex};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::assessment::{FieldAnalysis, StressAssessment, StressLabel};
    pub use crate::config::{EngineConfig, MatrixLayout, RankMode};
    pub use crate::error::{Error, Result};
    pub use crate::matrix::TemporalMatrix;
    pub use crate::observation::{TemporalObservation, VegetationIndex};
    pub use crate::Algorithm;
}

/// Core trait for every engine stage.
///
/// Stages are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the stage
    type Input;
    /// Output type for the stage
    type Output;
    /// Parameters controlling stage behavior
    type Params: Default;
    /// Error type for stage execution
    type Error: std::error::Error;

    /// Returns the stage name
    fn name(&self) -> &'static str;

    /// Returns a description of what the stage does
    fn description(&self) -> &'static str;

    /// Execute the stage
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
