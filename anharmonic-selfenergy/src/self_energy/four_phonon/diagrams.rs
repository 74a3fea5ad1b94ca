//! Contributions of one outer wavevector `k_1` to each diagram
//!
//! Sums are accumulated without their prefactors, which are applied once after the reduction. Branch
//! loops run over the active branches only, and tables are indexed by position in those lists.

use super::{kernels, label, DiagramContext, FourPhononDiagrams};
use crate::{
    phonons::{Mode, PhononStates},
    self_energy::SelfEnergyError,
};
use ndarray::{Array2, Array3, Array4};
use num_complex::Complex;

const ZERO: Complex<f64> = Complex { re: 0., im: 0. };

pub(super) fn accumulate<P: PhononStates>(
    context: &DiagramContext<'_, P>,
    k1: usize,
) -> Result<Vec<FourPhononDiagrams>, SelfEnergyError> {
    let mut diagrams = vec![FourPhononDiagrams::default(); context.number_of_temperatures()];
    quartic_loop(context, k1, &mut diagrams);
    cubic_tadpole(context, k1, &mut diagrams);
    sunset(context, k1, &mut diagrams)?;
    bubbles(context, k1, &mut diagrams)?;
    static_chains(context, k1, &mut diagrams)?;
    Ok(diagrams)
}

/// Diagram a: `V4(-q, q, k1 s1, -k1 s1) (2 n1 + 1)`
fn quartic_loop<P: PhononStates>(
    context: &DiagramContext<'_, P>,
    k1: usize,
    diagrams: &mut [FourPhononDiagrams],
) {
    let minus_k1 = context.negate(k1);
    for &(s1, omega_1) in &context.active[k1] {
        let vertex = context.v4([
            context.conjugate,
            context.target,
            Mode::new(k1, s1),
            Mode::new(minus_k1, s1),
        ]);
        for (diagram, statistics) in diagrams.iter_mut().zip(context.statistics.iter()) {
            diagram[label::A] += vertex * statistics.loop_factor(omega_1);
        }
    }
}

/// Diagram b: `V3(-q, q, G t) V3(G t, k1 s1, -k1 s1) (2 n1 + 1) / w_t`
fn cubic_tadpole<P: PhononStates>(
    context: &DiagramContext<'_, P>,
    k1: usize,
    diagrams: &mut [FourPhononDiagrams],
) {
    let minus_k1 = context.negate(k1);
    for (&(t, omega_t), &outer) in context.gamma.iter().zip(context.target_to_gamma.iter()) {
        for &(s1, omega_1) in &context.active[k1] {
            let inner = context.v3([
                Mode::new(context.gamma_index, t),
                Mode::new(k1, s1),
                Mode::new(minus_k1, s1),
            ]);
            let vertex = outer * inner / omega_t;
            for (diagram, statistics) in diagrams.iter_mut().zip(context.statistics.iter()) {
                diagram[label::B] += vertex * statistics.loop_factor(omega_1);
            }
        }
    }
}

/// Diagram c: `|V4(-q, k1 s1, k2 s2, k3 s3)|^2 K3(z)` with `k3 = q - k1 - k2`
fn sunset<P: PhononStates>(
    context: &DiagramContext<'_, P>,
    k1: usize,
    diagrams: &mut [FourPhononDiagrams],
) -> Result<(), SelfEnergyError> {
    let grid = context.phonons.grid();
    for k2 in 0..grid.len() {
        let k3 = grid.fold_difference3(context.target.kpoint, k1, k2);
        context.conserving(&[context.conjugate.kpoint, k1, k2, k3])?;
        for &(s1, omega_1) in &context.active[k1] {
            for &(s2, omega_2) in &context.active[k2] {
                for &(s3, omega_3) in &context.active[k3] {
                    let weight = context
                        .v4([
                            context.conjugate,
                            Mode::new(k1, s1),
                            Mode::new(k2, s2),
                            Mode::new(k3, s3),
                        ])
                        .norm_sqr();
                    for (diagram, statistics) in
                        diagrams.iter_mut().zip(context.statistics.iter())
                    {
                        diagram[label::C] +=
                            kernels::sunset(statistics, context.z, [omega_1, omega_2, omega_3])
                                * weight;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Diagrams d, e, f and g, which all open with the bubble `(k1, k2 = q - k1)` between the target
/// vertices
fn bubbles<P: PhononStates>(
    context: &DiagramContext<'_, P>,
    k1: usize,
    diagrams: &mut [FourPhononDiagrams],
) -> Result<(), SelfEnergyError> {
    let grid = context.phonons.grid();
    let q = context.target.kpoint;
    let k2 = grid.fold_difference(q, k1);
    context.conserving(&[context.conjugate.kpoint, k1, k2])?;
    let (minus_k1, minus_k2) = (context.negate(k1), context.negate(k2));
    let (branches_1, branches_2) = (&context.active[k1], &context.active[k2]);
    let (n1, n2) = (branches_1.len(), branches_2.len());
    let number_of_temperatures = context.number_of_temperatures();

    // V3(-q, k1 s1, k2 s2) and V3(-k1 s1', -k2 s2, q)
    let opening = Array2::from_shape_fn((n1, n2), |(i1, i2)| {
        context.v3([
            context.conjugate,
            Mode::new(k1, branches_1[i1].0),
            Mode::new(k2, branches_2[i2].0),
        ])
    });
    let closing = Array2::from_shape_fn((n1, n2), |(i1, i2)| {
        context.v3([
            Mode::new(minus_k1, branches_1[i1].0),
            Mode::new(minus_k2, branches_2[i2].0),
            context.target,
        ])
    });

    // Diagram d: V3 V4 V3 K2(z; w1, w2) K2(z; w3, w4) with k4 = q - k3
    let outer_bubbles = Array3::from_shape_fn((number_of_temperatures, n1, n2), |(t, i1, i2)| {
        kernels::bubble(
            &context.statistics[t],
            context.z,
            branches_1[i1].1,
            branches_2[i2].1,
        )
    });
    for k3 in 0..grid.len() {
        let k4 = grid.fold_difference(q, k3);
        context.conserving(&[context.conjugate.kpoint, k3, k4])?;
        let (minus_k3, minus_k4) = (context.negate(k3), context.negate(k4));
        let (branches_3, branches_4) = (&context.active[k3], &context.active[k4]);
        for &(s3, omega_3) in branches_3 {
            for &(s4, omega_4) in branches_4 {
                let tail = context.v3([
                    Mode::new(minus_k3, s3),
                    Mode::new(minus_k4, s4),
                    context.target,
                ]);
                let inner_bubbles = context
                    .statistics
                    .iter()
                    .map(|statistics| kernels::bubble(statistics, context.z, omega_3, omega_4))
                    .collect::<Vec<_>>();
                for (i1, &(s1, _)) in branches_1.iter().enumerate() {
                    for (i2, &(s2, _)) in branches_2.iter().enumerate() {
                        let vertex = opening[[i1, i2]]
                            * context.v4([
                                Mode::new(minus_k1, s1),
                                Mode::new(minus_k2, s2),
                                Mode::new(k3, s3),
                                Mode::new(k4, s4),
                            ])
                            * tail;
                        for (t, diagram) in diagrams.iter_mut().enumerate() {
                            diagram[label::D] +=
                                vertex * outer_bubbles[[t, i1, i2]] * inner_bubbles[t];
                        }
                    }
                }
            }
        }
    }

    // Static insertions on line 1 for diagrams e and f, indexed as [temperature, s1, s1']
    let mut quartic_insertion = Array3::from_elem((number_of_temperatures, n1, n1), ZERO);
    let mut tadpole_insertion = Array3::from_elem((number_of_temperatures, n1, n1), ZERO);
    for (i1, &(s1, _)) in branches_1.iter().enumerate() {
        for (i1p, &(s1p, _)) in branches_1.iter().enumerate() {
            for k3 in 0..grid.len() {
                let minus_k3 = context.negate(k3);
                for &(s3, omega_3) in &context.active[k3] {
                    let vertex = context.v4([
                        Mode::new(minus_k1, s1),
                        Mode::new(k1, s1p),
                        Mode::new(k3, s3),
                        Mode::new(minus_k3, s3),
                    ]);
                    for (t, statistics) in context.statistics.iter().enumerate() {
                        quartic_insertion[[t, i1, i1p]] += vertex * statistics.loop_factor(omega_3);
                    }
                }
            }
            for (&(u, omega_u), tadpole) in context.gamma.iter().zip(context.tadpoles.iter()) {
                let vertex = context.v3([
                    Mode::new(minus_k1, s1),
                    Mode::new(k1, s1p),
                    Mode::new(context.gamma_index, u),
                ]) / omega_u;
                for (t, value) in tadpole.iter().enumerate() {
                    tadpole_insertion[[t, i1, i1p]] += vertex * value;
                }
            }
        }
    }

    // Diagram g: the insertion on line 1 is the bubble (k3, k4 = k1 - k3)
    // The kernel depends on s2, so these are indexed as [temperature, s1, s1', s2]
    let mut bubble_insertion = Array4::from_elem((number_of_temperatures, n1, n1, n2), ZERO);
    for k3 in 0..grid.len() {
        let k4 = grid.fold_difference(k1, k3);
        context.conserving(&[minus_k1, k3, k4])?;
        let (minus_k3, minus_k4) = (context.negate(k3), context.negate(k4));
        for &(s3, omega_3) in &context.active[k3] {
            for &(s4, omega_4) in &context.active[k4] {
                let incoming = branches_1
                    .iter()
                    .map(|&(s1, _)| {
                        context.v3([Mode::new(minus_k1, s1), Mode::new(k3, s3), Mode::new(k4, s4)])
                    })
                    .collect::<Vec<_>>();
                let outgoing = branches_1
                    .iter()
                    .map(|&(s1p, _)| {
                        context.v3([
                            Mode::new(minus_k3, s3),
                            Mode::new(minus_k4, s4),
                            Mode::new(k1, s1p),
                        ])
                    })
                    .collect::<Vec<_>>();
                for (t, statistics) in context.statistics.iter().enumerate() {
                    let poles = kernels::bubble_poles(statistics, omega_3, omega_4);
                    for (i1, &(_, omega_1)) in branches_1.iter().enumerate() {
                        for (i1p, &(_, omega_1p)) in branches_1.iter().enumerate() {
                            let vertex = incoming[i1] * outgoing[i1p];
                            for (i2, &(_, omega_2)) in branches_2.iter().enumerate() {
                                let kernel = -kernels::insertion_with_bubble(
                                    statistics, context.z, omega_1, omega_1p, omega_2, &poles,
                                );
                                bubble_insertion[[t, i1, i1p, i2]] += vertex * kernel;
                            }
                        }
                    }
                }
            }
        }
    }
    for (t, diagram) in diagrams.iter_mut().enumerate() {
        let statistics = &context.statistics[t];
        for (i1, &(_, omega_1)) in branches_1.iter().enumerate() {
            for (i1p, &(_, omega_1p)) in branches_1.iter().enumerate() {
                for (i2, &(_, omega_2)) in branches_2.iter().enumerate() {
                    let ends = opening[[i1, i2]] * closing[[i1p, i2]];
                    let j2 = kernels::insertion(statistics, context.z, omega_1, omega_1p, omega_2);
                    diagram[label::E] += ends * quartic_insertion[[t, i1, i1p]] * j2;
                    diagram[label::F] += ends * tadpole_insertion[[t, i1, i1p]] * j2;
                    diagram[label::G] += ends * bubble_insertion[[t, i1, i1p, i2]];
                }
            }
        }
    }
    Ok(())
}

/// Diagrams h, i and j, in which line 1 closes on itself at zero external frequency
fn static_chains<P: PhononStates>(
    context: &DiagramContext<'_, P>,
    k1: usize,
    diagrams: &mut [FourPhononDiagrams],
) -> Result<(), SelfEnergyError> {
    let grid = context.phonons.grid();
    let minus_k1 = context.negate(k1);
    let branches_1 = &context.active[k1];
    let n1 = branches_1.len();
    let number_of_temperatures = context.number_of_temperatures();

    // sum_{k2 s2 s3} V3(-k1 s1, k2 s2, k3 s3) V3(-k2 s2, -k3 s3, k1 s1') M(w1, w1', w2, w3)
    // with k3 = k1 - k2, indexed as [temperature, s1, s1']
    let mut chain = Array3::from_elem((number_of_temperatures, n1, n1), ZERO);
    for k2 in 0..grid.len() {
        let k3 = grid.fold_difference(k1, k2);
        context.conserving(&[minus_k1, k2, k3])?;
        let (minus_k2, minus_k3) = (context.negate(k2), context.negate(k3));
        for &(s2, omega_2) in &context.active[k2] {
            for &(s3, omega_3) in &context.active[k3] {
                let incoming = branches_1
                    .iter()
                    .map(|&(s1, _)| {
                        context.v3([Mode::new(minus_k1, s1), Mode::new(k2, s2), Mode::new(k3, s3)])
                    })
                    .collect::<Vec<_>>();
                let outgoing = branches_1
                    .iter()
                    .map(|&(s1p, _)| {
                        context.v3([
                            Mode::new(minus_k2, s2),
                            Mode::new(minus_k3, s3),
                            Mode::new(k1, s1p),
                        ])
                    })
                    .collect::<Vec<_>>();
                for (t, statistics) in context.statistics.iter().enumerate() {
                    let poles = kernels::bubble_poles(statistics, omega_2, omega_3);
                    for (i1, &(_, omega_1)) in branches_1.iter().enumerate() {
                        for (i1p, &(_, omega_1p)) in branches_1.iter().enumerate() {
                            chain[[t, i1, i1p]] += incoming[i1]
                                * outgoing[i1p]
                                * kernels::static_chain_with_bubble(
                                    statistics, omega_1, omega_1p, &poles,
                                );
                        }
                    }
                }
            }
        }
    }

    for (i1, &(s1, omega_1)) in branches_1.iter().enumerate() {
        for (i1p, &(s1p, omega_1p)) in branches_1.iter().enumerate() {
            // Diagram h: V4(-q, q, k1 s1, -k1 s1') M_h
            let quartic = context.v4([
                context.conjugate,
                context.target,
                Mode::new(k1, s1),
                Mode::new(minus_k1, s1p),
            ]);
            for (t, diagram) in diagrams.iter_mut().enumerate() {
                diagram[label::H] += quartic * chain[[t, i1, i1p]];
            }

            for (&(t_gamma, omega_t), &outer) in
                context.gamma.iter().zip(context.target_to_gamma.iter())
            {
                let descending = outer
                    * context.v3([
                        Mode::new(context.gamma_index, t_gamma),
                        Mode::new(k1, s1),
                        Mode::new(minus_k1, s1p),
                    ]);
                // Diagram j: the loop on line 1 is closed through a bubble
                for (t, diagram) in diagrams.iter_mut().enumerate() {
                    diagram[label::J] += descending * chain[[t, i1, i1p]] * (-2. / omega_t);
                }
                // Diagram i: the loop on line 1 is closed through a second tadpole
                for (&(u, omega_u), tadpole) in context.gamma.iter().zip(context.tadpoles.iter()) {
                    let vertex = descending
                        * context.v3([
                            Mode::new(minus_k1, s1),
                            Mode::new(k1, s1p),
                            Mode::new(context.gamma_index, u),
                        ])
                        * (4. / (omega_t * omega_u));
                    for ((diagram, statistics), value) in diagrams
                        .iter_mut()
                        .zip(context.statistics.iter())
                        .zip(tadpole.iter())
                    {
                        diagram[label::I] += vertex
                            * value
                            * kernels::static_chain(statistics, omega_1, omega_1p);
                    }
                }
            }
        }
    }
    Ok(())
}
