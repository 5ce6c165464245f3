//! Zero-Doppler range/time solver
//!
//! For a ground point `G`, finds the acquisition time `t*` at which the
//! satellite velocity `V(t*)` is perpendicular to `G - S(t*)`, by
//! bracketed Newton-Raphson iteration over the interpolated orbit.

use crate::core::geodesy::{dot, norm, sub};
use crate::core::orbit_interp::OrbitTimeline;
use crate::types::{Ecef, LosError, LosResult};
use serde::{Deserialize, Serialize};

/// Convergence controls for the zero-Doppler iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Maximum Newton iterations per ground point
    pub max_iterations: usize,
    /// Stop when the time update falls below this (seconds)
    pub time_tolerance: f64,
    /// Stop when |f| / (|G - S| |V|) falls below this
    pub residual_tolerance: f64,
    /// Include the acceleration term in the residual derivative
    pub use_acceleration: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 51,
            time_tolerance: 1e-8,
            residual_tolerance: 1e-12,
            use_acceleration: true,
        }
    }
}

/// Acquisition geometry for one ground point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeolocationSolution {
    /// Zero-Doppler time (seconds, same reference as the orbit timeline)
    pub acquisition_time: f64,
    /// Slant range |G - S(t*)| in meters
    pub range: f64,
    pub satellite_position: Ecef,
    pub satellite_velocity: Ecef,
    pub iterations: usize,
}

/// Consecutive sample times enclosing a zero-Doppler root
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootBracket {
    pub lower: f64,
    pub upper: f64,
    /// Secant estimate of the root between the two samples
    pub estimate: f64,
}

/// Newton-Raphson solver bound to one orbit timeline
pub struct RangeDopplerSolver<'a> {
    timeline: &'a OrbitTimeline,
    config: SolverConfig,
}

impl<'a> RangeDopplerSolver<'a> {
    pub fn new(timeline: &'a OrbitTimeline, config: SolverConfig) -> Self {
        Self { timeline, config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Global starting time: the first state vector of the timeline.
    ///
    /// Outside the root's bracket this is replaced by the bracket estimate.
    pub fn initial_guess(&self) -> f64 {
        self.timeline.start_time()
    }

    /// Residual of the zero-Doppler condition, dot(G - S(t), V(t))
    pub fn doppler_residual(&self, ground: &Ecef, time: f64) -> LosResult<f64> {
        let state = self.timeline.interpolate(time)?;
        Ok(dot(&sub(ground, &state.position), &state.velocity))
    }

    /// Locate the pair of consecutive state vectors enclosing the zero-Doppler
    /// root of `ground`.
    ///
    /// The residual falls through zero as the satellite passes abeam of the
    /// target. When several samples pairs do so (timelines spanning more than
    /// one revolution), the pass closest to the target wins.
    pub fn bracket_root(&self, ground: &Ecef) -> LosResult<RootBracket> {
        let svs = self.timeline.state_vectors();
        let residuals: Vec<f64> = svs
            .iter()
            .map(|sv| dot(&sub(ground, &sv.position), &sv.velocity))
            .collect();
        let range_at = |i: usize| norm(&sub(ground, &svs[i].position));

        let mut best: Option<(usize, f64)> = None;
        for i in 0..svs.len() - 1 {
            if residuals[i] >= 0.0 && residuals[i + 1] <= 0.0 {
                let range = range_at(i).min(range_at(i + 1));
                if best.map_or(true, |(_, closest)| range < closest) {
                    best = Some((i, range));
                }
            }
        }

        if let Some((i, _)) = best {
            let (t0, t1) = (svs[i].time, svs[i + 1].time);
            let (f0, f1) = (residuals[i], residuals[i + 1]);
            let estimate = if f0 == f1 {
                t0
            } else {
                t0 + f0 / (f0 - f1) * (t1 - t0)
            };
            return Ok(RootBracket {
                lower: t0,
                upper: t1,
                estimate,
            });
        }

        // No pass over the target: extrapolate from the closest sample so the
        // error says how far outside the timeline the root lies
        let closest = (0..svs.len())
            .min_by(|&a, &b| range_at(a).total_cmp(&range_at(b)))
            .unwrap_or(0);
        let sv = &svs[closest];
        let speed_sq = dot(&sv.velocity, &sv.velocity);
        let time = if speed_sq > 0.0 {
            sv.time + residuals[closest] / speed_sq
        } else {
            sv.time
        };

        Err(LosError::OrbitOutOfRange {
            time,
            start: self.timeline.start_time(),
            end: self.timeline.end_time(),
        })
    }

    /// Solve for the zero-Doppler time and range of `ground`.
    ///
    /// `initial_time` is used as the first iterate when it lies inside the
    /// bracket found by [`Self::bracket_root`]; otherwise the bracket's
    /// secant estimate is used. Newton steps leaving the bracket fall back to
    /// bisection, so the seed changes the iteration count only.
    pub fn solve(&self, ground: &Ecef, initial_time: f64) -> LosResult<GeolocationSolution> {
        let bracket = self.bracket_root(ground)?;
        let (mut lower, mut upper) = (bracket.lower, bracket.upper);
        let mut time = if (lower..=upper).contains(&initial_time) {
            initial_time
        } else {
            bracket.estimate
        };

        for iteration in 1..=self.config.max_iterations {
            let state = self.timeline.interpolate(time)?;
            let look = sub(ground, &state.position);
            let range = norm(&look);
            let speed = norm(&state.velocity);
            if range == 0.0 || speed == 0.0 {
                return Err(LosError::Processing(format!(
                    "Degenerate geometry at t={:.6}: range={:.3} m, speed={:.3} m/s",
                    time, range, speed
                )));
            }

            let residual = dot(&look, &state.velocity);
            if (residual / (range * speed)).abs() < self.config.residual_tolerance {
                return Ok(GeolocationSolution {
                    acquisition_time: time,
                    range,
                    satellite_position: state.position,
                    satellite_velocity: state.velocity,
                    iterations: iteration,
                });
            }

            // Residual decreases through the root
            if residual > 0.0 {
                lower = time;
            } else {
                upper = time;
            }

            let mut derivative = -speed * speed;
            if self.config.use_acceleration {
                let acceleration = self.timeline.acceleration(time)?;
                derivative += dot(&look, &acceleration);
            }

            let newton = time - residual / derivative;
            let next = if newton > lower && newton < upper {
                newton
            } else {
                0.5 * (lower + upper)
            };

            let step = (next - time).abs();
            time = next;

            if step < self.config.time_tolerance {
                let state = self.timeline.interpolate(time)?;
                return Ok(GeolocationSolution {
                    acquisition_time: time,
                    range: norm(&sub(ground, &state.position)),
                    satellite_position: state.position,
                    satellite_velocity: state.velocity,
                    iterations: iteration,
                });
            }
        }

        Err(LosError::NotConverged {
            iterations: self.config.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geodesy::llh_to_ecef;
    use crate::types::StateVector;
    use approx::assert_abs_diff_eq;

    const RADIUS: f64 = 7_000_000.0;
    const SPEED: f64 = 7500.0;

    /// Polar circular orbit in the x-z plane, over (0, 0) at t = t_mid
    fn polar_orbit(count: usize, spacing: f64, t_mid: f64) -> OrbitTimeline {
        let omega = SPEED / RADIUS;
        let svs = (0..count)
            .map(|i| {
                let time = i as f64 * spacing;
                let angle = omega * (time - t_mid);
                StateVector {
                    time,
                    position: [RADIUS * angle.cos(), 0.0, RADIUS * angle.sin()],
                    velocity: [-SPEED * angle.sin(), 0.0, SPEED * angle.cos()],
                }
            })
            .collect();
        OrbitTimeline::new(svs).unwrap()
    }

    #[test]
    fn test_converges_to_zero_doppler() {
        let timeline = polar_orbit(61, 10.0, 300.0);
        let solver = RangeDopplerSolver::new(&timeline, SolverConfig::default());

        for &(lat, lon, h) in &[(0.0, 0.0, 0.0), (1.2, 3.0, 500.0), (-0.8, -2.5, 2000.0)] {
            let ground = llh_to_ecef(lat, lon, h);
            let solution = solver.solve(&ground, solver.initial_guess()).unwrap();

            let look = sub(&ground, &solution.satellite_position);
            assert_abs_diff_eq!(norm(&look), solution.range, epsilon = 1e-6);

            let residual = dot(&look, &solution.satellite_velocity)
                / (solution.range * norm(&solution.satellite_velocity));
            assert!(residual.abs() < 1e-9, "residual {}", residual);
            assert!(solution.iterations <= 20);
        }
    }

    #[test]
    fn test_sub_satellite_point_time() {
        let timeline = polar_orbit(61, 10.0, 300.0);
        let solver = RangeDopplerSolver::new(&timeline, SolverConfig::default());
        let solution = solver.solve(&llh_to_ecef(0.0, 0.0, 0.0), 0.0).unwrap();

        assert_abs_diff_eq!(solution.acquisition_time, 300.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.range, RADIUS - crate::constants::WGS84_A, epsilon = 1e-2);
    }

    #[test]
    fn test_without_acceleration_still_converges() {
        let timeline = polar_orbit(61, 10.0, 300.0);
        let config = SolverConfig {
            use_acceleration: false,
            ..SolverConfig::default()
        };
        let solver = RangeDopplerSolver::new(&timeline, config);
        let solution = solver.solve(&llh_to_ecef(0.5, 1.0, 0.0), 0.0).unwrap();
        assert!(solution.iterations < 51);

        let reference = RangeDopplerSolver::new(&timeline, SolverConfig::default())
            .solve(&llh_to_ecef(0.5, 1.0, 0.0), 0.0)
            .unwrap();
        assert_abs_diff_eq!(solution.acquisition_time, reference.acquisition_time, epsilon = 1e-6);
    }

    #[test]
    fn test_target_outside_orbit_coverage() {
        // Orbit covers latitudes around 0; a ground point at 40N is never abeam
        let timeline = polar_orbit(11, 10.0, 50.0);
        let solver = RangeDopplerSolver::new(&timeline, SolverConfig::default());
        let result = solver.solve(&llh_to_ecef(40.0, 0.0, 0.0), 0.0);
        assert!(matches!(result, Err(LosError::OrbitOutOfRange { .. })));
    }

    #[test]
    fn test_iteration_budget_exhausted() {
        let timeline = polar_orbit(61, 10.0, 300.0);
        let config = SolverConfig {
            max_iterations: 1,
            ..SolverConfig::default()
        };
        let solver = RangeDopplerSolver::new(&timeline, config);
        // Root near t = 308, one Newton step from 300 cannot reach it
        let result = solver.solve(&llh_to_ecef(0.5, 1.0, 0.0), 300.0);
        assert!(matches!(result, Err(LosError::NotConverged { iterations: 1 })));
    }

    #[test]
    fn test_long_timeline_overflown_in_the_middle() {
        // +-30 min around the pass: the first sample is ~110 degrees of arc away
        let timeline = polar_orbit(361, 10.0, 1800.0);
        let solver = RangeDopplerSolver::new(&timeline, SolverConfig::default());

        for &(lat, lon) in &[(0.0, 0.0), (0.3, -0.4), (-1.0, 2.0)] {
            let ground = llh_to_ecef(lat, lon, 0.0);
            let from_start = solver.solve(&ground, solver.initial_guess()).unwrap();
            let from_end = solver.solve(&ground, timeline.end_time()).unwrap();

            assert_abs_diff_eq!(from_start.acquisition_time, from_end.acquisition_time, epsilon = 1e-6);
            assert!((from_start.acquisition_time - 1800.0).abs() < 30.0);
        }

        let overhead = solver
            .solve(&llh_to_ecef(0.0, 0.0, 0.0), solver.initial_guess())
            .unwrap();
        assert_abs_diff_eq!(overhead.acquisition_time, 1800.0, epsilon = 1e-6);
    }

    #[test]
    fn test_twenty_minute_half_window() {
        let timeline = polar_orbit(241, 10.0, 1200.0);
        let solver = RangeDopplerSolver::new(&timeline, SolverConfig::default());
        let solution = solver
            .solve(&llh_to_ecef(0.2, 0.1, 100.0), solver.initial_guess())
            .unwrap();
        assert!(solution.iterations < 51);
        assert!((solution.acquisition_time - 1200.0).abs() < 30.0);
    }

    #[test]
    fn test_bracket_encloses_root() {
        let timeline = polar_orbit(361, 10.0, 1800.0);
        let solver = RangeDopplerSolver::new(&timeline, SolverConfig::default());
        let ground = llh_to_ecef(0.5, 1.0, 0.0);
        let bracket = solver.bracket_root(&ground).unwrap();

        assert_eq!(bracket.upper - bracket.lower, 10.0);
        assert!(bracket.lower <= bracket.estimate && bracket.estimate <= bracket.upper);
        assert!(solver.doppler_residual(&ground, bracket.lower).unwrap() >= 0.0);
        assert!(solver.doppler_residual(&ground, bracket.upper).unwrap() <= 0.0);
    }

    #[test]
    fn test_full_revolution_picks_near_pass() {
        // One revolution is ~5864 s: the far side of the orbit also crosses
        // zero Doppler, but much further from the target
        let timeline = polar_orbit(700, 10.0, 1800.0);
        let solver = RangeDopplerSolver::new(&timeline, SolverConfig::default());
        let solution = solver
            .solve(&llh_to_ecef(0.0, 0.0, 0.0), solver.initial_guess())
            .unwrap();
        assert_abs_diff_eq!(solution.acquisition_time, 1800.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.range, RADIUS - crate::constants::WGS84_A, epsilon = 1e-2);
    }

    #[test]
    fn test_doppler_residual_sign_changes_across_solution() {
        let timeline = polar_orbit(61, 10.0, 300.0);
        let solver = RangeDopplerSolver::new(&timeline, SolverConfig::default());
        let ground = llh_to_ecef(0.0, 0.0, 0.0);
        let before = solver.doppler_residual(&ground, 250.0).unwrap();
        let after = solver.doppler_residual(&ground, 350.0).unwrap();
        assert!(before * after < 0.0);
    }
}
