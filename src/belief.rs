//! Belief estimator: gradient descent on variational free energy.
//!
//! The estimator carries a belief about the joint state, `mu` for
//! positions and `mu_p` for velocities, and refines it every control
//! cycle. Each cycle descends the free-energy gradient, which balances
//! two pulls per belief:
//!
//! ```text
//! mu_dot   = -k_mu * (-S_q    * (q - mu)       + S_mu  * (mu - (mu_prev + h * mu_p_prev)))
//! mu_dot_p = -k_mu * (-S_qdot * (qdot - mu_p)  + S_mu' * (mu_p - mu_p_prev))
//! ```
//!
//! The first term drags the belief toward the measurement, the second
//! toward the forecast the previous belief made for itself one Euler
//! step ahead. The `S_*` diagonals are inverse variances, so a noisy
//! signal pulls weakly. Beliefs then advance by a forward Euler step of
//! size `h`.
//!
//! Unlike the classical formulation, the generative model here is bias
//! free: the target enters only through the integral error that the
//! control law consumes, never through the belief dynamics. The belief
//! therefore converges to the measured state, not to a compromise
//! between measurement and goal.

use nalgebra::DVector;

use crate::config::ControllerConfig;
use crate::types::{DesiredState, JointState};

/// Inverse-variance weights for the four prediction-error terms.
#[derive(Debug, Clone)]
pub struct Precisions {
    /// Weight on the position measurement error (1 / var_q).
    pub position: DVector<f64>,
    /// Weight on the velocity measurement error (1 / var_qdot).
    pub velocity: DVector<f64>,
    /// Weight on the position prior error (1 / var_mu).
    pub prior_position: DVector<f64>,
    /// Weight on the velocity prior error (1 / var_muprime).
    pub prior_velocity: DVector<f64>,
}

impl Precisions {
    /// Build uniform diagonals from the configured scalar variances.
    pub fn from_config(config: &ControllerConfig) -> Self {
        let n = config.joints;
        Self {
            position: DVector::from_element(n, 1.0 / config.var_q),
            velocity: DVector::from_element(n, 1.0 / config.var_qdot),
            prior_position: DVector::from_element(n, 1.0 / config.var_mu),
            prior_velocity: DVector::from_element(n, 1.0 / config.var_muprime),
        }
    }
}

/// Recursive belief over joint positions and velocities.
///
/// The estimator is pure state plus arithmetic. Dimension checks and
/// readiness gating happen in [`crate::controller::Controller`]; by the
/// time `update` runs, inputs are known to match the joint count and
/// `bootstrap` has seeded the belief from a real sample.
#[derive(Debug, Clone)]
pub struct BeliefEstimator {
    /// Belief over joint positions.
    mu: DVector<f64>,
    /// Belief over joint velocities.
    mu_p: DVector<f64>,
    /// Position belief of the previous cycle.
    mu_prev: DVector<f64>,
    /// Velocity belief of the previous cycle.
    mu_p_prev: DVector<f64>,
    /// Accumulated position error against the target, fed to the
    /// integral term of the control law.
    integral: DVector<f64>,

    precisions: Precisions,
    k_mu: f64,
    h: f64,
    integral_limit: Option<f64>,

    /// Last sensory prediction errors, kept for diagnostics.
    position_error: DVector<f64>,
    velocity_error: DVector<f64>,
}

impl BeliefEstimator {
    pub fn new(config: &ControllerConfig) -> Self {
        let n = config.joints;
        Self {
            mu: DVector::zeros(n),
            mu_p: DVector::zeros(n),
            mu_prev: DVector::zeros(n),
            mu_p_prev: DVector::zeros(n),
            integral: DVector::zeros(n),
            precisions: Precisions::from_config(config),
            k_mu: config.k_mu,
            h: config.h,
            integral_limit: config.integral_limit,
            position_error: DVector::zeros(n),
            velocity_error: DVector::zeros(n),
        }
    }

    /// Seed the belief from the first real sample. Both the belief and
    /// its history are set to the sample, so the first update starts
    /// from a self-consistent state instead of an arbitrary zero pose.
    pub fn bootstrap(&mut self, sample: &JointState) {
        self.mu.copy_from(&sample.position);
        self.mu_p.copy_from(&sample.velocity);
        self.mu_prev.copy_from(&sample.position);
        self.mu_p_prev.copy_from(&sample.velocity);
    }

    /// One free-energy descent step followed by one Euler step.
    pub fn update(&mut self, sensed: &JointState, desired: &DesiredState) {
        self.position_error = &sensed.position - &self.mu;
        self.velocity_error = &sensed.velocity - &self.mu_p;

        // Where the previous belief expected this cycle's belief to be.
        let forecast = &self.mu_prev + &self.mu_p_prev * self.h;
        let prior_position_error = &self.mu - forecast;
        let prior_velocity_error = &self.mu_p - &self.mu_p_prev;

        let mu_dot = (self.precisions.position.component_mul(&self.position_error)
            - self
                .precisions
                .prior_position
                .component_mul(&prior_position_error))
            * self.k_mu;
        let mu_p_dot = (self.precisions.velocity.component_mul(&self.velocity_error)
            - self
                .precisions
                .prior_velocity
                .component_mul(&prior_velocity_error))
            * self.k_mu;

        // History is saved before the Euler step: the next cycle's prior
        // error is measured against the belief as it stood this cycle.
        self.mu_prev.copy_from(&self.mu);
        self.mu_p_prev.copy_from(&self.mu_p);

        self.mu += mu_dot * self.h;
        self.mu_p += mu_p_dot * self.h;

        // The integral sees the freshly advanced belief.
        self.integral += &desired.position - &self.mu;
        if let Some(limit) = self.integral_limit {
            self.integral.apply(|x| *x = x.clamp(-limit, limit));
        }
    }

    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    pub fn mu_p(&self) -> &DVector<f64> {
        &self.mu_p
    }

    pub fn integral(&self) -> &DVector<f64> {
        &self.integral
    }

    /// Sensory prediction error on positions from the last update.
    pub fn position_error(&self) -> &DVector<f64> {
        &self.position_error
    }

    /// Sensory prediction error on velocities from the last update.
    pub fn velocity_error(&self) -> &DVector<f64> {
        &self.velocity_error
    }
}
