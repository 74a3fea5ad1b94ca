use anharmonic_mesher::create_monkhorst_pack_grid;
use anharmonic_selfenergy::{
    constants::AMU_TO_RYDBERG_MASS,
    coupling::AnharmonicCoupling,
    crystal::Crystal,
    force_constants::{AnharmonicForceConstants, AtomIndex, ForceConstantEntry},
    parallel::{SimulatedWorld, SingleProcess},
    phonons::{Mode, PhononModesBuilder, PhononStates},
    self_energy::{Method, SelfEnergyEngineBuilder},
    spectral::{DeltaFunction, IsosurfaceIntegrator, LinearTetrahedron},
    thermodynamics::Occupation,
};
use approx::assert_relative_eq;
use nalgebra::Vector3;
use ndarray::{Array2, Array3};
use num_complex::Complex;
use rand::{rngs::StdRng, SeedableRng};
use std::f64::consts::PI;
use utilities::{random_system, BondModel, LATTICE_CONSTANT};

const TEMPERATURES: [f64; 3] = [0., 100., 300.];

#[test]
fn smeared_damping_matches_a_direct_sum_over_the_bond_model() {
    let model = BondModel::default();
    let system = model.system([4, 4, 4]);
    let coupling = AnharmonicCoupling::new(&system.crystal, &system.force_constants).unwrap();
    let width = 2e-4;
    let kernel = DeltaFunction::Lorentzian(width);
    let engine = SelfEnergyEngineBuilder::new()
        .with_phonons(&system.phonons)
        .with_coupling(&coupling)
        .with_method(Method::Smearing(kernel))
        .build()
        .unwrap();

    let grid = &system.grid;
    let occupation = Occupation::Quantum;
    // Each target has a nonzero wavevector component along its own branch
    for mode in [Mode::new(21, 0), Mode::new(38, 1), Mode::new(37, 2)] {
        let damping = engine
            .three_phonon_damping(mode, &TEMPERATURES, &SingleProcess)
            .unwrap();

        // The partners are found by explicit search, and the couplings from the closed form
        let omega = system.phonons.mode_frequency(mode);
        let minus_q = grid.negate(mode.kpoint);
        let mut expected = vec![0.; TEMPERATURES.len()];
        for k1 in 0..grid.len() {
            let k2 = (0..grid.len())
                .find(|&k2| grid.conservation_residual(&[minus_q, k1, k2]) < 1e-12)
                .unwrap();
            let kpoints = [minus_q, k1, k2].map(|k| grid.kpoint(k).fractional());
            for (s1, s2) in (0..3).flat_map(|s1| (0..3).map(move |s2| (s1, s2))) {
                let weight = model.v3(kpoints, [mode.branch, s1, s2]).norm_sqr();
                let omega_1 = system.phonons.frequency(k1, s1);
                let omega_2 = system.phonons.frequency(k2, s2);
                for (value, &temperature) in expected.iter_mut().zip(TEMPERATURES.iter()) {
                    let n_1 = occupation.occupation(omega_1, temperature);
                    let n_2 = occupation.occupation(omega_2, temperature);
                    let (n_plus, n_minus) = (1. + n_1 + n_2, n_1 - n_2);
                    *value += weight
                        * (n_plus * kernel.evaluate(omega - omega_1 - omega_2)
                            - n_plus * kernel.evaluate(omega + omega_1 + omega_2)
                            + n_minus * kernel.evaluate(omega + omega_1 - omega_2)
                            - n_minus * kernel.evaluate(omega - omega_1 + omega_2));
                }
            }
        }
        for (value, reference) in damping.iter().zip(expected.iter()) {
            assert_relative_eq!(
                *value,
                reference * PI / (16. * grid.len() as f64),
                max_relative = 1e-8
            );
        }
    }
}

#[test]
fn smearing_and_tetrahedron_agree_on_a_dense_chain() {
    // Branch 0 of the chain decays into pairs of branch-0 phonons away from the band edges
    let model = BondModel::default();
    let system = model.system([2000, 1, 1]);
    let coupling = AnharmonicCoupling::new(&system.crystal, &system.force_constants).unwrap();
    let mode = Mode::new(200, 0);
    let temperatures = [0., 300.];

    let smeared = SelfEnergyEngineBuilder::new()
        .with_phonons(&system.phonons)
        .with_coupling(&coupling)
        .with_method(Method::Smearing(DeltaFunction::Gaussian(3e-5)))
        .build()
        .unwrap()
        .three_phonon_damping(mode, &temperatures, &SingleProcess)
        .unwrap();
    let tetrahedron = SelfEnergyEngineBuilder::new()
        .with_phonons(&system.phonons)
        .with_coupling(&coupling)
        .with_method(Method::Tetrahedron)
        .build()
        .unwrap()
        .three_phonon_damping(mode, &temperatures, &SingleProcess)
        .unwrap();

    for (a, b) in smeared.iter().zip(tetrahedron.iter()) {
        assert!(*b > 0.);
        assert_relative_eq!(*a, *b, max_relative = 1e-2);
    }
    // Heating only adds to the spontaneous decay
    assert!(tetrahedron[1] > tetrahedron[0]);
}

#[test]
fn tetrahedron_damping_matches_explicit_sheet_integrals() {
    let mut rng = StdRng::seed_from_u64(7);
    let system = random_system(&mut rng, 2, [2, 2, 2], 4);
    let coupling = AnharmonicCoupling::new(&system.crystal, &system.force_constants).unwrap();
    let engine = SelfEnergyEngineBuilder::new()
        .with_phonons(&system.phonons)
        .with_coupling(&coupling)
        .with_method(Method::Tetrahedron)
        .build()
        .unwrap();
    let mode = Mode::new(3, 4);

    let results = SimulatedWorld::run(2, |rank| {
        engine
            .three_phonon_damping(mode, &TEMPERATURES, rank)
            .unwrap()
    });

    let grid = &system.grid;
    let phonons = &system.phonons;
    let integrator = LinearTetrahedron::new(grid);
    let omega = phonons.mode_frequency(mode);
    let conjugate = Mode::new(grid.negate(mode.kpoint), mode.branch);
    let occupation = Occupation::Quantum;
    let expected = TEMPERATURES
        .iter()
        .map(|&temperature| {
            let mut total = 0.;
            for s1 in 0..6 {
                for s2 in 0..6 {
                    let mut sheets = [(); 4].map(|_| (Vec::new(), Vec::new()));
                    for k1 in 0..grid.len() {
                        let k2 = grid.fold_difference(mode.kpoint, k1);
                        let omega_1 = phonons.frequency(k1, s1);
                        let omega_2 = phonons.frequency(k2, s2);
                        let weight = coupling
                            .v3(phonons, [conjugate, Mode::new(k1, s1), Mode::new(k2, s2)])
                            .norm_sqr();
                        let n_1 = occupation.occupation(omega_1, temperature);
                        let n_2 = occupation.occupation(omega_2, temperature);
                        let (n_plus, n_minus) = (1. + n_1 + n_2, n_1 - n_2);
                        for (sheet, (energy, value)) in sheets.iter_mut().zip([
                            (-omega_1 - omega_2, -n_plus),
                            (omega_1 + omega_2, n_plus),
                            (omega_1 - omega_2, -n_minus),
                            (omega_2 - omega_1, n_minus),
                        ]) {
                            sheet.0.push(energy);
                            sheet.1.push(value * weight);
                        }
                    }
                    total += sheets
                        .iter()
                        .map(|(energies, integrand)| integrator.integrate(energies, integrand, omega))
                        .sum::<f64>();
                }
            }
            total * PI / 16.
        })
        .collect::<Vec<_>>();

    for result in results {
        for (value, reference) in result.iter().zip(expected.iter()) {
            assert_relative_eq!(*value, *reference, max_relative = 1e-10, epsilon = 1e-300);
        }
    }
}

#[test]
fn imaginary_part_of_the_bubble_is_the_lorentzian_damping() {
    let mut rng = StdRng::seed_from_u64(11);
    let system = random_system(&mut rng, 1, [3, 3, 3], 5);
    let coupling = AnharmonicCoupling::new(&system.crystal, &system.force_constants).unwrap();
    let engine = SelfEnergyEngineBuilder::new()
        .with_phonons(&system.phonons)
        .with_coupling(&coupling)
        .with_method(Method::Smearing(DeltaFunction::Lorentzian(5e-4)))
        .build()
        .unwrap();

    for mode in [Mode::new(1, 0), Mode::new(13, 2)] {
        let damping = engine
            .three_phonon_damping(mode, &TEMPERATURES, &SingleProcess)
            .unwrap();
        let bubble = engine
            .bubble_self_energy(mode, &TEMPERATURES, &SingleProcess)
            .unwrap();
        for (gamma, sigma) in damping.iter().zip(bubble.iter()) {
            assert_relative_eq!(sigma.im, *gamma, max_relative = 1e-9);
        }
    }
}

#[test]
fn classical_and_quantum_damping_converge_at_high_temperature() {
    let model = BondModel::default();
    let system = model.system([4, 4, 4]);
    let coupling = AnharmonicCoupling::new(&system.crystal, &system.force_constants).unwrap();
    let damping = |occupation| {
        SelfEnergyEngineBuilder::new()
            .with_phonons(&system.phonons)
            .with_coupling(&coupling)
            .with_method(Method::Smearing(DeltaFunction::Gaussian(5e-4)))
            .with_occupation(occupation)
            .build()
            .unwrap()
            .three_phonon_damping(Mode::new(21, 0), &[1e6], &SingleProcess)
            .unwrap()[0]
    };
    assert_relative_eq!(
        damping(Occupation::Quantum),
        damping(Occupation::Classical),
        max_relative = 1e-3
    );
}

#[test]
fn single_on_site_constant_reproduces_reference_damping() {
    let crystal = Crystal::new(
        [
            [LATTICE_CONSTANT, 0., 0.],
            [0., LATTICE_CONSTANT, 0.],
            [0., 0., LATTICE_CONSTANT],
        ],
        [4, 4, 4],
        vec![Vector3::zeros()],
        vec![28.0855 * AMU_TO_RYDBERG_MASS],
    )
    .unwrap();
    let grid = create_monkhorst_pack_grid([4, 4, 4]).unwrap();
    // Only branch 0 disperses, and only it has a displacement along x
    let frequencies = Array2::from_shape_fn((grid.len(), 3), |(k, s)| match s {
        0 => 0.002 * (1.2 + (2. * PI * grid.kpoint(k).fractional()[0]).cos()),
        1 => 0.003,
        _ => 0.0035,
    });
    let eigenvectors = Array3::from_shape_fn((grid.len(), 3, 3), |(_, s, i)| match s == i {
        true => Complex::new(1., 0.),
        false => Complex::new(0., 0.),
    });
    let phonons = PhononModesBuilder::new()
        .with_grid(&grid)
        .with_frequencies(frequencies)
        .with_eigenvectors(eigenvectors)
        .build()
        .unwrap();
    let force_constants = AnharmonicForceConstants {
        cubic: vec![ForceConstantEntry {
            value: 0.1,
            indices: [AtomIndex::new(0, 0, 0); 3],
        }],
        quartic: Vec::new(),
    };
    let coupling = AnharmonicCoupling::new(&crystal, &force_constants).unwrap();
    let engine = SelfEnergyEngineBuilder::new()
        .with_phonons(&phonons)
        .with_coupling(&coupling)
        .with_method(Method::Smearing(DeltaFunction::Lorentzian(1e-4)))
        .build()
        .unwrap();

    // The target sits at (1/4, 0, 0)
    let damping = engine
        .three_phonon_damping(Mode::new(16, 0), &[0., 300.], &SingleProcess)
        .unwrap();
    assert_relative_eq!(damping[0], 4.729471861778024e-06, max_relative = 1e-8);
    assert_relative_eq!(damping[1], 4.515049159104119e-05, max_relative = 1e-8);
}
