use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
/// Failures in constructing or querying a k-point grid
pub enum GridError {
    #[error("grid dimensions must all be positive, got {0:?}")]
    #[diagnostic(code(anharmonic_mesher::dimensions))]
    Dimensions([usize; 3]),
    #[error("fractional coordinate ({0}, {1}, {2}) does not lie on the grid")]
    #[diagnostic(code(anharmonic_mesher::off_grid))]
    OffGrid(f64, f64, f64),
}
