use nalgebra::Vector3;

/// Volume of the reference tetrahedron
pub const REFERENCE_VOLUME: f64 = 1. / 6.;

/// Vertices of the reference tetrahedron, onto which every grid tetrahedron is mapped affinely.
///
/// Vertex `i` of a `TetrahedronConnectivity` maps onto entry `i`.
pub fn reference_vertices() -> [Vector3<f64>; 4] {
    [
        Vector3::new(0., 0., 0.),
        Vector3::new(1., 0., 0.),
        Vector3::new(0., 1., 0.),
        Vector3::new(0., 0., 1.),
    ]
}
