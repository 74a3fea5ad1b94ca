//! Reciprocal-space meshing for anharmonic phonon calculations
//!
//! Provides the uniform Monkhorst–Pack grid of wavevectors on which the self-energy sums are carried
//! out, the momentum-conservation utilities which locate scattering partners on that grid, and the
//! tetrahedral decomposition of the grid used by Brillouin-zone tetrahedron quadrature.

mod connectivity;
mod error;
mod generate;
mod grid;
mod primitives;

pub use connectivity::*;
pub use error::GridError;
pub use generate::*;
pub use grid::*;
pub use primitives::*;

/// Tolerance used when deciding whether a fractional coordinate lies on a grid point
pub const GRID_TOLERANCE: f64 = 1e-8;
