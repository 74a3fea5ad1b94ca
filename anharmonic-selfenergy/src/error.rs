use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
/// Failures while assembling the inputs of a self-energy calculation
pub enum BuildError {
    #[error(transparent)]
    Grid(#[from] anharmonic_mesher::GridError),
    #[error("{0}")]
    GridMismatch(String),
    #[error("the {0} lattice is singular, |det| = {1:e}")]
    SingularLattice(&'static str, f64),
    #[error("{0}")]
    ForceConstant(String),
    #[error("{0}")]
    Configuration(String),
}

#[derive(thiserror::Error, Debug, Diagnostic)]
/// Error for IO events
pub enum IOError {
    #[error("IO Failure: {0}")]
    IO(#[from] std::io::Error),
}
