//! Approximations to the energy-conserving delta function: broadened kernels evaluated point by
//! point, and linear tetrahedron quadrature of isosurface integrals over the Brillouin zone
mod smearing;
mod tetrahedron;

pub use smearing::DeltaFunction;
pub use tetrahedron::{IsosurfaceIntegrator, LinearTetrahedron};
