use crate::{GridError, KPoint, KPointGrid};
use nalgebra::Vector3;

/// Creates a Gamma-centred uniform grid with `dimensions[axis]` points along each reciprocal axis
pub fn create_monkhorst_pack_grid(dimensions: [usize; 3]) -> Result<KPointGrid, GridError> {
    if dimensions.iter().any(|&n| n == 0) {
        return Err(GridError::Dimensions(dimensions));
    }
    let [nx, ny, nz] = dimensions;

    let mut points = Vec::with_capacity(nx * ny * nz);
    for i in 0..nx {
        for j in 0..ny {
            for l in 0..nz {
                points.push(KPoint {
                    fractional: Vector3::new(
                        i as f64 / nx as f64,
                        j as f64 / ny as f64,
                        l as f64 / nz as f64,
                    ),
                    index: points.len(),
                    negation: 0,
                });
            }
        }
    }

    let mut grid = KPointGrid { dimensions, points };
    let negations = grid
        .points
        .iter()
        .map(|point| grid.fold(&(-point.fractional)))
        .collect::<Vec<_>>();
    grid.points
        .iter_mut()
        .zip(negations)
        .for_each(|(point, negation)| point.negation = negation);

    Ok(grid)
}

#[cfg(test)]
mod test {
    use super::create_monkhorst_pack_grid;

    #[test]
    fn empty_dimensions_are_rejected() {
        assert!(create_monkhorst_pack_grid([4, 0, 4]).is_err());
    }

    #[test]
    fn points_are_stored_with_last_axis_fastest() {
        let grid = create_monkhorst_pack_grid([2, 3, 4]).unwrap();
        assert_eq!(grid.len(), 24);
        for point in grid.points() {
            let integer = [
                (point.fractional()[0] * 2.).round() as usize,
                (point.fractional()[1] * 3.).round() as usize,
                (point.fractional()[2] * 4.).round() as usize,
            ];
            assert_eq!(grid.flat_index(integer), point.index());
        }
    }
}
