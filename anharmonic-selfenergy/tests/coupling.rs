use anharmonic_selfenergy::{
    coupling::AnharmonicCoupling,
    phonons::{Mode, PhononStates},
};
use itertools::Itertools;
use num_complex::Complex;
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use utilities::{random_system, BondModel};

fn assert_close(a: Complex<f64>, b: Complex<f64>, tolerance: f64) {
    let scale = a.norm().max(b.norm());
    assert!(
        (a - b).norm() <= tolerance * scale + 1e-14,
        "{} and {} differ by more than {:e} relative",
        a,
        b,
        tolerance
    );
}

#[test]
fn bond_model_couplings_match_the_closed_form() {
    let model = BondModel::default();
    let system = model.system([4, 4, 4]);
    let coupling = AnharmonicCoupling::new(&system.crystal, &system.force_constants).unwrap();
    let grid = &system.grid;

    for (k1, k2) in [(1, 5), (17, 42), (63, 63), (21, 0)] {
        let k3 = grid.fold_difference3(grid.gamma(), k1, k2);
        let kpoints = [k1, k2, k3].map(|k| grid.kpoint(k).fractional());
        for s in 0..3 {
            let modes = [k1, k2, k3].map(|k| Mode::new(k, s));
            let expected = model.v3(kpoints, [s; 3]);
            assert_close(coupling.v3(&system.phonons, modes), expected, 1e-10);
        }
        // Couplings between different branches vanish in the bond model
        let mixed = coupling.v3(
            &system.phonons,
            [Mode::new(k1, 0), Mode::new(k2, 1), Mode::new(k3, 0)],
        );
        assert_eq!(mixed, Complex::new(0., 0.));

        let k4 = grid.fold_difference(grid.gamma(), 7);
        let k3 = grid.fold_difference3(k4, k1, k2);
        let kpoints = [k1, k2, k3, 7].map(|k| grid.kpoint(k).fractional());
        let modes = [k1, k2, k3, 7].map(|k| Mode::new(k, 2));
        assert_close(
            coupling.v4(&system.phonons, modes),
            model.v4(kpoints, [2; 4]),
            1e-10,
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn cubic_coupling_is_invariant_under_permutation(
        seed in any::<u64>(),
        k1 in 0usize..64,
        k2 in 0usize..64,
        branches in prop::array::uniform3(0usize..3),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let system = random_system(&mut rng, 1, [4, 4, 4], 3);
        let coupling = AnharmonicCoupling::new(&system.crystal, &system.force_constants).unwrap();
        let grid = system.phonons.grid();
        let k3 = grid.fold_difference3(grid.gamma(), k1, k2);
        let modes = [
            Mode::new(k1, branches[0]),
            Mode::new(k2, branches[1]),
            Mode::new(k3, branches[2]),
        ];

        let reference = coupling.v3(&system.phonons, modes);
        for permutation in modes.iter().permutations(3) {
            let permuted = [*permutation[0], *permutation[1], *permutation[2]];
            assert_close(coupling.v3(&system.phonons, permuted), reference, 1e-8);
        }
    }

    #[test]
    fn quartic_coupling_is_invariant_under_permutation(
        seed in any::<u64>(),
        k1 in 0usize..27,
        k2 in 0usize..27,
        k3 in 0usize..27,
        branches in prop::array::uniform4(0usize..3),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let system = random_system(&mut rng, 1, [3, 3, 3], 2);
        let coupling = AnharmonicCoupling::new(&system.crystal, &system.force_constants).unwrap();
        let grid = system.phonons.grid();
        let k4 = grid.fold_difference3(grid.fold_difference(grid.gamma(), k1), k2, k3);
        let modes = [
            Mode::new(k1, branches[0]),
            Mode::new(k2, branches[1]),
            Mode::new(k3, branches[2]),
            Mode::new(k4, branches[3]),
        ];

        let reference = coupling.v4(&system.phonons, modes);
        for permutation in modes.iter().permutations(4) {
            let permuted = [*permutation[0], *permutation[1], *permutation[2], *permutation[3]];
            assert_close(coupling.v4(&system.phonons, permuted), reference, 1e-8);
        }
    }

    #[test]
    fn cubic_coupling_with_a_basis_is_symmetric_in_the_scattered_modes(
        seed in any::<u64>(),
        k1 in 0usize..8,
        k2 in 0usize..8,
        branches in prop::array::uniform3(0usize..6),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let system = random_system(&mut rng, 2, [2, 2, 2], 3);
        let coupling = AnharmonicCoupling::new(&system.crystal, &system.force_constants).unwrap();
        let grid = system.phonons.grid();
        let k3 = grid.fold_difference3(grid.gamma(), k1, k2);
        let first = Mode::new(k1, branches[0]);
        let second = Mode::new(k2, branches[1]);
        let third = Mode::new(k3, branches[2]);

        assert_close(
            coupling.v3(&system.phonons, [first, third, second]),
            coupling.v3(&system.phonons, [first, second, third]),
            1e-8,
        );
    }
}
