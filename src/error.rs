use thiserror::Error;

/// Top-level error type for the arborvox pipeline.
#[derive(Debug, Error)]
pub enum ArborError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Numerical(#[from] NumericalError),

    #[error(transparent)]
    Swc(#[from] SwcError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised before any work is done because an argument is unusable.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{parameter} must be positive, got {value}")]
    NonPositive { parameter: &'static str, value: f64 },

    #[error("mask has {mask} entries but there are {points} points")]
    MaskLength { mask: usize, points: usize },

    #[error("{centers} centers but {values} values")]
    ValueLength { centers: usize, values: usize },

    #[error("point {id} has negative radius {radius}")]
    NegativeRadius { id: i64, radius: f64 },

    #[error("invalid shell bin edges: {0}")]
    BinEdges(String),

    #[error("voxel tables are binned on different grids")]
    GridMismatch,
}

/// Errors in the parent/child structure of a skeleton.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("point {id} references parent {parent}, which does not exist")]
    MissingParent { id: i64, parent: i64 },

    #[error("point {id} is kept but its parent {parent} is masked out")]
    MaskedParent { id: i64, parent: i64 },

    #[error("point id {0} appears more than once")]
    DuplicateId(i64),

    #[error("point {0} is not reachable from any root")]
    Unreachable(i64),
}

/// Errors from degenerate numeric input.
#[derive(Debug, Error)]
pub enum NumericalError {
    #[error("edge from point {parent} to point {id} has zero length")]
    ZeroLengthEdge { id: i64, parent: i64 },

    #[error("point {0} has a non-finite coordinate or radius")]
    NonFinite(i64),

    #[error("cannot derive a direction for edge ending at point {0}")]
    DegenerateDirection(i64),

    #[error("sample {0} has a non-finite coordinate or value")]
    NonFiniteSample(usize),

    #[error("sample {0} lies outside the addressable voxel range")]
    OutOfGrid(usize),
}

/// Errors while reading SWC text.
#[derive(Debug, Error)]
pub enum SwcError {
    #[error("line {line}: expected 7 columns, found {found}")]
    ColumnCount { line: usize, found: usize },

    #[error("line {line}: cannot parse {column} from {text:?}")]
    BadNumber {
        line: usize,
        column: &'static str,
        text: String,
    },
}

/// Errors while loading a [`crate::config::PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Convenience type alias for results using [`ArborError`].
pub type Result<T> = std::result::Result<T, ArborError>;
