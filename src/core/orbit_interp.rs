//! Orbit timeline storage and Hermite interpolation of satellite state

use crate::constants::{HERMITE_STENCIL, MIN_TIMELINE_SAMPLES, TIMELINE_EPSILON};
use crate::core::geodesy::norm;
use crate::types::{LosError, LosResult, OrbitState, StateVector};

/// Step used for finite-difference acceleration estimates (seconds)
const ACCELERATION_STEP: f64 = 0.01;

/// Ordered, validated sequence of orbit state vectors.
///
/// Read-only after construction, so one timeline can be shared by reference
/// across all worker threads of a run.
#[derive(Debug, Clone)]
pub struct OrbitTimeline {
    state_vectors: Vec<StateVector>,
}

impl OrbitTimeline {
    /// Build a timeline, rejecting empty, too short, non-finite or
    /// non-increasing input
    pub fn new(state_vectors: Vec<StateVector>) -> LosResult<Self> {
        if state_vectors.len() < MIN_TIMELINE_SAMPLES {
            return Err(LosError::InvalidInput(format!(
                "Orbit timeline needs at least {} state vectors, got {}",
                MIN_TIMELINE_SAMPLES,
                state_vectors.len()
            )));
        }

        for (i, sv) in state_vectors.iter().enumerate() {
            let finite = sv.time.is_finite()
                && sv.position.iter().all(|v| v.is_finite())
                && sv.velocity.iter().all(|v| v.is_finite());
            if !finite {
                return Err(LosError::InvalidInput(format!(
                    "State vector {} contains non-finite values",
                    i
                )));
            }
        }

        if let Some(i) = state_vectors
            .windows(2)
            .position(|pair| pair[1].time <= pair[0].time)
        {
            return Err(LosError::InvalidInput(format!(
                "State vector times must be strictly increasing: t[{}]={} is followed by t[{}]={}",
                i,
                state_vectors[i].time,
                i + 1,
                state_vectors[i + 1].time
            )));
        }

        log::debug!(
            "Orbit timeline: {} state vectors spanning [{:.3}, {:.3}] s",
            state_vectors.len(),
            state_vectors[0].time,
            state_vectors[state_vectors.len() - 1].time
        );

        Ok(Self { state_vectors })
    }

    /// Build a timeline from parallel time/position/velocity arrays
    pub fn from_arrays(
        times: &[f64],
        positions: &[[f64; 3]],
        velocities: &[[f64; 3]],
    ) -> LosResult<Self> {
        if times.len() != positions.len() || times.len() != velocities.len() {
            return Err(LosError::InvalidInput(format!(
                "Orbit arrays differ in length: {} times, {} positions, {} velocities",
                times.len(),
                positions.len(),
                velocities.len()
            )));
        }

        let state_vectors = times
            .iter()
            .zip(positions)
            .zip(velocities)
            .map(|((&time, &position), &velocity)| StateVector {
                time,
                position,
                velocity,
            })
            .collect();

        Self::new(state_vectors)
    }

    pub fn len(&self) -> usize {
        self.state_vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_vectors.is_empty()
    }

    pub fn state_vectors(&self) -> &[StateVector] {
        &self.state_vectors
    }

    pub fn first(&self) -> &StateVector {
        &self.state_vectors[0]
    }

    pub fn last(&self) -> &StateVector {
        &self.state_vectors[self.state_vectors.len() - 1]
    }

    pub fn start_time(&self) -> f64 {
        self.first().time
    }

    pub fn end_time(&self) -> f64 {
        self.last().time
    }

    /// Whether `time` may be queried
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time() - TIMELINE_EPSILON && time <= self.end_time() + TIMELINE_EPSILON
    }

    fn check_domain(&self, time: f64) -> LosResult<()> {
        if self.contains(time) {
            Ok(())
        } else {
            Err(LosError::OrbitOutOfRange {
                time,
                start: self.start_time(),
                end: self.end_time(),
            })
        }
    }

    /// Index of the first sample of the interpolation stencil for `time`
    fn stencil_start(&self, time: f64, stencil: usize) -> usize {
        let n = self.state_vectors.len();
        let above = self.state_vectors.partition_point(|sv| sv.time <= time);
        // Lower sample of the bracketing pair
        let lower = above.saturating_sub(1).min(n - 2);
        (lower + 1).saturating_sub(stencil / 2).min(n - stencil)
    }

    /// Satellite position and velocity at `time`.
    ///
    /// Hermite interpolation over up to four neighbouring state vectors,
    /// matching both position and velocity at each node. The velocity is the
    /// derivative of the position polynomial, so stored samples are
    /// reproduced exactly.
    pub fn interpolate(&self, time: f64) -> LosResult<OrbitState> {
        self.check_domain(time)?;

        let stencil = HERMITE_STENCIL.min(self.state_vectors.len());
        let start = self.stencil_start(time, stencil);
        let nodes = &self.state_vectors[start..start + stencil];

        Ok(hermite_interpolate(nodes, time))
    }

    /// Satellite acceleration at `time` by finite differences of the
    /// interpolated velocity (one-sided at the timeline ends)
    pub fn acceleration(&self, time: f64) -> LosResult<[f64; 3]> {
        self.check_domain(time)?;

        let lo = (time - ACCELERATION_STEP).max(self.start_time());
        let hi = (time + ACCELERATION_STEP).min(self.end_time());
        let v_lo = self.interpolate(lo)?.velocity;
        let v_hi = self.interpolate(hi)?.velocity;
        let dt = hi - lo;

        Ok([
            (v_hi[0] - v_lo[0]) / dt,
            (v_hi[1] - v_lo[1]) / dt,
            (v_hi[2] - v_lo[2]) / dt,
        ])
    }

    /// Log warnings for state vectors that do not look like a LEO SAR orbit
    pub fn validate_physical(&self) -> usize {
        let mut suspicious = 0;

        for sv in &self.state_vectors {
            let speed = norm(&sv.velocity);
            if !(6000.0..=9000.0).contains(&speed) {
                log::warn!("Unusual orbital velocity: {:.1} m/s at t={:.3}", speed, sv.time);
                suspicious += 1;
            }

            let radius = norm(&sv.position);
            if !(6_500_000.0..=7_500_000.0).contains(&radius) {
                log::warn!("Unusual orbital radius: {:.1} km at t={:.3}", radius / 1000.0, sv.time);
                suspicious += 1;
            }
        }

        log::debug!("Orbit data validation completed: {} warnings", suspicious);
        suspicious
    }
}

/// Two-point Hermite interpolation generalised to `nodes.len()` nodes
fn hermite_interpolate(nodes: &[StateVector], time: f64) -> OrbitState {
    let n = nodes.len();
    let mut position = [0.0; 3];
    let mut velocity = [0.0; 3];

    for i in 0..n {
        let ti = nodes[i].time;

        // Lagrange basis L_i(t), its derivative, and L_i'(t_i)
        let mut li = 1.0;
        let mut dli = 0.0;
        let mut ci = 0.0;
        for k in 0..n {
            if k == i {
                continue;
            }
            let inv = 1.0 / (ti - nodes[k].time);
            li *= (time - nodes[k].time) * inv;
            ci += inv;

            let mut term = inv;
            for j in 0..n {
                if j != i && j != k {
                    term *= (time - nodes[j].time) / (ti - nodes[j].time);
                }
            }
            dli += term;
        }

        let dt = time - ti;
        let li2 = li * li;
        let h = (1.0 - 2.0 * ci * dt) * li2;
        let dh = -2.0 * ci * li2 + 2.0 * (1.0 - 2.0 * ci * dt) * li * dli;
        let k = dt * li2;
        let dk = li2 + 2.0 * dt * li * dli;

        for c in 0..3 {
            position[c] += h * nodes[i].position[c] + k * nodes[i].velocity[c];
            velocity[c] += dh * nodes[i].position[c] + dk * nodes[i].velocity[c];
        }
    }

    OrbitState { position, velocity }
}
