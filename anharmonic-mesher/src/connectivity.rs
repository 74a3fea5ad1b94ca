/// Tetrahedron corner indices, expressed as flat k-point indices on the grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TetrahedronConnectivity(pub(crate) [usize; 4]);

impl TetrahedronConnectivity {
    pub fn corners(&self) -> [usize; 4] {
        self.0
    }
}

/// Corners of the unit grid cell, bit 0 steps along the first axis, bit 1 the second and bit 2 the third
pub(crate) const CELL_CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// The six tetrahedra which tile a grid cell, all sharing the main diagonal from corner 0 to corner 7
pub(crate) const CELL_TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];
