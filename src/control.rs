//! Control law: maps the current belief and target to joint torques.
//!
//! The law is PID shaped but runs on the filtered belief rather than on
//! raw measurements:
//!
//! ```text
//! u = K_p * (mu_d - mu) + K_d * (mu_p_d - mu_p) + K_i * integral
//! ```
//!
//! All three gain matrices are diagonal, built from one scalar per term
//! and a per-joint scale vector.

use nalgebra::DVector;

use crate::config::ControllerConfig;
use crate::types::DesiredState;

/// Diagonal gain matrices, stored as their diagonals.
#[derive(Debug, Clone)]
pub struct Gains {
    pub k_p: DVector<f64>,
    pub k_d: DVector<f64>,
    pub k_i: DVector<f64>,
}

impl Gains {
    /// Expand the scalar gains into per-joint diagonals, applying the
    /// configured per-joint scale to all three terms alike.
    pub fn from_config(config: &ControllerConfig) -> Self {
        let scaled = |k: f64| {
            DVector::from_iterator(config.joints, config.gain_scale.iter().map(|s| k * s))
        };
        Self {
            k_p: scaled(config.k_p),
            k_d: scaled(config.k_d),
            k_i: scaled(config.k_i),
        }
    }
}

/// Stateless torque computation. All memory lives in the estimator.
#[derive(Debug, Clone)]
pub struct ControlLaw {
    gains: Gains,
    torque_limit: Option<f64>,
}

impl ControlLaw {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            gains: Gains::from_config(config),
            torque_limit: config.torque_limit,
        }
    }

    /// Evaluate the law against the current belief. `integral` is the
    /// accumulated target error owned by the estimator.
    pub fn evaluate(
        &self,
        mu: &DVector<f64>,
        mu_p: &DVector<f64>,
        desired: &DesiredState,
        integral: &DVector<f64>,
    ) -> DVector<f64> {
        let mut torque = self.gains.k_p.component_mul(&(&desired.position - mu))
            + self.gains.k_d.component_mul(&(&desired.velocity - mu_p))
            + self.gains.k_i.component_mul(integral);
        if let Some(limit) = self.torque_limit {
            torque.apply(|x| *x = x.clamp(-limit, limit));
        }
        torque
    }

    pub fn gains(&self) -> &Gains {
        &self.gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JointState;
    use approx::assert_relative_eq;

    #[test]
    fn wrist_gain_is_scaled_down() {
        let mut config = ControllerConfig::default();
        config.k_p = 2.0;
        let gains = Gains::from_config(&config);

        assert_eq!(gains.k_p[0], 2.0);
        assert_eq!(gains.k_p[5], 2.0);
        assert_eq!(gains.k_p[6], 0.6);
    }

    #[test]
    fn custom_gain_scale_applies_to_all_terms() {
        let mut config = ControllerConfig::with_joints(3);
        config.k_p = 10.0;
        config.k_d = 4.0;
        config.k_i = 2.0;
        config.gain_scale = vec![1.0, 0.5, 0.25];
        let gains = Gains::from_config(&config);

        assert_eq!(gains.k_p[1], 5.0);
        assert_eq!(gains.k_d[2], 1.0);
        assert_eq!(gains.k_i[1], 1.0);
    }

    #[test]
    fn zero_error_leaves_only_the_integral_term() {
        let mut config = ControllerConfig::with_joints(4);
        config.gain_scale = vec![1.0; 4];
        config.k_i = 2.0;
        let law = ControlLaw::new(&config);

        let state = JointState::new(
            0.0,
            DVector::from_vec(vec![0.1, 0.2, 0.3, 0.4]),
            DVector::from_vec(vec![0.01, 0.0, -0.01, 0.0]),
        );
        let desired = DesiredState::new(state.position.clone(), state.velocity.clone());
        let integral = DVector::from_vec(vec![0.5, -0.5, 0.0, 1.0]);

        let torque = law.evaluate(&state.position, &state.velocity, &desired, &integral);

        assert_eq!(torque.len(), 4);
        assert_eq!(torque, integral * 2.0);
    }

    #[test]
    fn proportional_term_tracks_position_error() {
        let mut config = ControllerConfig::with_joints(2);
        config.k_p = 3.0;
        config.k_d = 0.0;
        config.k_i = 0.0;
        config.gain_scale = vec![1.0, 1.0];
        let law = ControlLaw::new(&config);

        let mu = DVector::zeros(2);
        let mu_p = DVector::zeros(2);
        let desired = DesiredState::hold_at(DVector::from_vec(vec![0.5, -1.0]));

        let torque = law.evaluate(&mu, &mu_p, &desired, &DVector::zeros(2));

        assert_relative_eq!(torque[0], 1.5, max_relative = 1e-12);
        assert_relative_eq!(torque[1], -3.0, max_relative = 1e-12);
    }

    #[test]
    fn torque_limit_clamps_componentwise() {
        let mut config = ControllerConfig::with_joints(2);
        config.k_p = 100.0;
        config.k_d = 0.0;
        config.k_i = 0.0;
        config.gain_scale = vec![1.0, 1.0];
        config.torque_limit = Some(10.0);
        let law = ControlLaw::new(&config);

        let desired = DesiredState::hold_at(DVector::from_vec(vec![1.0, -0.05]));
        let torque = law.evaluate(
            &DVector::zeros(2),
            &DVector::zeros(2),
            &desired,
            &DVector::zeros(2),
        );

        assert_eq!(torque[0], 10.0);
        // Components inside the limit pass through untouched.
        assert_relative_eq!(torque[1], -5.0, max_relative = 1e-12);
    }
}
