/// Pipeline-level error taxonomy. Degenerate genes (zero variance, or a
/// hotspot column that trivially covers every spot) are not errors:
/// they degrade to zeroed columns inside the hotspot stage.
#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    /// Out-of-range parameter, raised before any stage runs.
    #[error("invalid parameter {name} = {value}: expected {constraint}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        constraint: String,
    },

    /// Inputs handed to a stage disagree in shape; aborts the stage.
    #[error("shape mismatch in {stage}: {details}")]
    ShapeMismatch {
        stage: &'static str,
        details: String,
    },

    /// Unrecoverable computation error inside a per-gene task; aborts
    /// the whole stage with the failing gene attached.
    #[error("{stage} failed for gene column {gene}: {details}")]
    StageFailure {
        stage: &'static str,
        gene: usize,
        details: String,
    },
}

impl SvgError {
    pub fn invalid(name: &'static str, value: impl ToString, constraint: impl ToString) -> Self {
        SvgError::InvalidParameter {
            name,
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }
}
