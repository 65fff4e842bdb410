//! Controller aggregate: owns the estimator, the control law and the
//! latest inputs, and enforces the readiness gate and dimension checks
//! so the numeric core never sees malformed data.

use nalgebra::DVector;

use crate::belief::BeliefEstimator;
use crate::config::ControllerConfig;
use crate::control::ControlLaw;
use crate::error::{ControllerError, Result};
use crate::status::{current_timestamp, ControllerStatus};
use crate::types::{DesiredState, InputEvent, JointState, TorqueCommand};

/// Lifecycle of the belief: it is meaningless until the first sample
/// has seeded it, and a controller must never act on a meaningless
/// belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No joint sample observed yet; ticks produce no torque.
    Uninitialized,
    /// Belief seeded from a real sample; ticks produce torque.
    Ready,
}

/// One controller instance for a fixed-DOF arm.
///
/// The aggregate is transport free: feeds push [`InputEvent`]s in and
/// the caller decides what to do with the returned torque. All methods
/// run on the caller's thread, which in the binary is the single event
/// loop, so no locking is needed here.
pub struct Controller {
    joints: usize,
    estimator: BeliefEstimator,
    law: ControlLaw,
    /// Latest accepted sample. Only meaningful once `readiness` is
    /// `Ready`; until then it holds placeholder zeros.
    sensed: JointState,
    desired: DesiredState,
    readiness: Readiness,

    ticks: u64,
    samples_accepted: u64,
    samples_rejected: u64,
    references_accepted: u64,
    references_rejected: u64,
}

impl Controller {
    /// Build a controller from a validated configuration. The target
    /// starts at the zero pose and is normally replaced right after the
    /// first sample, either by a configured goal or by
    /// [`Controller::hold_current_pose`].
    pub fn new(config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        let joints = config.joints;
        Ok(Self {
            joints,
            estimator: BeliefEstimator::new(&config),
            law: ControlLaw::new(&config),
            sensed: JointState::zeros(joints),
            desired: DesiredState::zeros(joints),
            readiness: Readiness::Uninitialized,
            ticks: 0,
            samples_accepted: 0,
            samples_rejected: 0,
            references_accepted: 0,
            references_rejected: 0,
        })
    }

    pub fn joints(&self) -> usize {
        self.joints
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }

    pub fn estimator(&self) -> &BeliefEstimator {
        &self.estimator
    }

    pub fn desired(&self) -> &DesiredState {
        &self.desired
    }

    fn check_dims(&self, position: &DVector<f64>, velocity: &DVector<f64>) -> Result<()> {
        for actual in [position.len(), velocity.len()] {
            if actual != self.joints {
                return Err(ControllerError::DimensionMismatch {
                    expected: self.joints,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Route one event from the shared input channel.
    pub fn apply(&mut self, event: InputEvent) -> Result<()> {
        match event {
            InputEvent::Sample(sample) => self.ingest_sample(sample),
            InputEvent::Reference(reference) => self.set_reference(reference),
        }
    }

    /// Accept a joint-state sample. The very first accepted sample also
    /// seeds the belief and flips the controller to `Ready`; every
    /// later sample only replaces the stored measurement. A sample with
    /// the wrong width is rejected whole and the previous state is kept.
    pub fn ingest_sample(&mut self, sample: JointState) -> Result<()> {
        if let Err(e) = self.check_dims(&sample.position, &sample.velocity) {
            self.samples_rejected += 1;
            return Err(e);
        }
        if self.readiness == Readiness::Uninitialized {
            self.estimator.bootstrap(&sample);
            self.readiness = Readiness::Ready;
            log::info!("first joint sample accepted, beliefs initialized");
        }
        self.sensed = sample;
        self.samples_accepted += 1;
        Ok(())
    }

    /// Replace the target with an explicit position and velocity.
    pub fn set_reference(&mut self, reference: DesiredState) -> Result<()> {
        if let Err(e) = self.check_dims(&reference.position, &reference.velocity) {
            self.references_rejected += 1;
            return Err(e);
        }
        self.desired = reference;
        self.references_accepted += 1;
        Ok(())
    }

    /// Point the arm at `position` and come to rest there.
    pub fn set_goal(&mut self, position: DVector<f64>) -> Result<()> {
        self.set_reference(DesiredState::hold_at(position))
    }

    /// Freeze the target at the most recent sensed position with zero
    /// desired velocity. Needs at least one sample to freeze at.
    pub fn hold_current_pose(&mut self) -> Result<()> {
        if !self.is_ready() {
            return Err(ControllerError::NotReady);
        }
        let position = self.sensed.position.clone();
        self.set_reference(DesiredState::hold_at(position))
    }

    /// Run one control cycle: advance the belief against the latest
    /// sample and target, then evaluate the torque. Before the first
    /// sample this refuses with [`ControllerError::NotReady`] and the
    /// caller emits nothing.
    pub fn tick(&mut self, timestamp: f64) -> Result<TorqueCommand> {
        if !self.is_ready() {
            return Err(ControllerError::NotReady);
        }
        self.estimator.update(&self.sensed, &self.desired);
        let torque = self.law.evaluate(
            self.estimator.mu(),
            self.estimator.mu_p(),
            &self.desired,
            self.estimator.integral(),
        );
        self.ticks += 1;
        Ok(TorqueCommand { timestamp, torque })
    }

    /// Snapshot for the status file. Runtime-side fields (torque
    /// counters, uptime) are filled in by the caller.
    pub fn status(&self) -> ControllerStatus {
        let mut status = ControllerStatus::new(self.joints);
        status.timestamp = current_timestamp();
        status.ready = self.is_ready();
        status.ticks = self.ticks;
        status.samples_accepted = self.samples_accepted;
        status.samples_rejected = self.samples_rejected;
        status.references_accepted = self.references_accepted;
        status.references_rejected = self.references_rejected;
        status.belief_position = self.estimator.mu().iter().copied().collect();
        status.belief_velocity = self.estimator.mu_p().iter().copied().collect();
        status.desired_position = self.desired.position.iter().copied().collect();
        status.integral_error = self.estimator.integral().iter().copied().collect();
        status.position_prediction_error =
            self.estimator.position_error().iter().copied().collect();
        status.velocity_prediction_error =
            self.estimator.velocity_error().iter().copied().collect();
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(position: Vec<f64>, velocity: Vec<f64>) -> JointState {
        JointState::new(
            0.0,
            DVector::from_vec(position),
            DVector::from_vec(velocity),
        )
    }

    #[test]
    fn starts_uninitialized_and_refuses_to_tick() {
        let mut controller = Controller::new(ControllerConfig::default()).unwrap();
        assert_eq!(controller.readiness(), Readiness::Uninitialized);
        assert!(matches!(
            controller.tick(0.0),
            Err(ControllerError::NotReady)
        ));
    }

    #[test]
    fn first_sample_seeds_belief_exactly() {
        let mut controller = Controller::new(ControllerConfig::default()).unwrap();
        let first = sample(
            vec![0.2, -0.8, 0.1, -2.0, 0.05, 1.6, 0.7],
            vec![0.0, 0.1, 0.0, -0.1, 0.0, 0.0, 0.02],
        );

        controller.ingest_sample(first.clone()).unwrap();

        assert!(controller.is_ready());
        assert_eq!(controller.estimator().mu(), &first.position);
        assert_eq!(controller.estimator().mu_p(), &first.velocity);
    }

    #[test]
    fn later_samples_do_not_reseed_belief() {
        let mut controller = Controller::new(ControllerConfig::default()).unwrap();
        let first = sample(vec![0.5; 7], vec![0.0; 7]);
        let second = sample(vec![-0.5; 7], vec![0.0; 7]);

        controller.ingest_sample(first.clone()).unwrap();
        controller.ingest_sample(second).unwrap();

        // Belief still reflects the bootstrap, not the newer sample;
        // only update() moves it from here on.
        assert_eq!(controller.estimator().mu(), &first.position);
    }

    #[test]
    fn rejects_sample_of_wrong_width() {
        let mut controller = Controller::new(ControllerConfig::default()).unwrap();
        controller
            .ingest_sample(sample(vec![0.1; 7], vec![0.0; 7]))
            .unwrap();

        let err = controller
            .ingest_sample(sample(vec![0.0; 6], vec![0.0; 6]))
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::DimensionMismatch {
                expected: 7,
                actual: 6
            }
        ));
        // The bad sample was dropped whole; the controller still runs
        // on the previous one.
        assert!(controller.is_ready());
        assert!(controller.tick(0.0).is_ok());
    }

    #[test]
    fn rejects_reference_of_wrong_width() {
        let mut controller = Controller::new(ControllerConfig::default()).unwrap();
        let err = controller
            .set_goal(DVector::from_vec(vec![0.0; 3]))
            .unwrap_err();
        assert!(matches!(
            err,
            ControllerError::DimensionMismatch {
                expected: 7,
                actual: 3
            }
        ));
        assert_eq!(controller.desired().position.len(), 7);
    }

    #[test]
    fn wrong_width_sample_does_not_make_controller_ready() {
        let mut controller = Controller::new(ControllerConfig::default()).unwrap();
        let _ = controller.ingest_sample(sample(vec![0.0; 2], vec![0.0; 2]));
        assert!(!controller.is_ready());
    }

    #[test]
    fn hold_current_pose_requires_a_sample() {
        let mut controller = Controller::new(ControllerConfig::default()).unwrap();
        assert!(matches!(
            controller.hold_current_pose(),
            Err(ControllerError::NotReady)
        ));

        let pose = vec![0.3, -0.3, 0.9, -1.5, 0.0, 1.2, 0.4];
        controller
            .ingest_sample(sample(pose.clone(), vec![0.1; 7]))
            .unwrap();
        controller.hold_current_pose().unwrap();

        assert_eq!(
            controller.desired().position,
            DVector::from_vec(pose)
        );
        assert_eq!(controller.desired().velocity, DVector::zeros(7));
    }

    #[test]
    fn pure_proportional_step_response() {
        // All variances 1, k_mu 1, h 0.001, uniform k_p 1 and no damping
        // or integral action. From a zero pose with a unit target on the
        // first joint, the belief stays at its fixed point and the
        // torque equals the raw position error.
        let mut config = ControllerConfig::with_joints(7);
        config.var_q = 1.0;
        config.var_qdot = 1.0;
        config.var_mu = 1.0;
        config.var_muprime = 1.0;
        config.k_mu = 1.0;
        config.h = 0.001;
        config.k_p = 1.0;
        config.k_d = 0.0;
        config.k_i = 0.0;
        config.gain_scale = vec![1.0; 7];
        let mut controller = Controller::new(config).unwrap();

        controller
            .ingest_sample(sample(vec![0.0; 7], vec![0.0; 7]))
            .unwrap();
        let mut target = DVector::zeros(7);
        target[0] = 1.0;
        controller.set_goal(target.clone()).unwrap();

        let command = controller.tick(0.0).unwrap();
        assert_eq!(command.torque, target);
        // Measurement matches the belief, so the belief has not moved.
        assert_eq!(controller.estimator().mu(), &DVector::zeros(7));

        // Repeating the cycle with the same sample changes nothing in
        // the proportional term.
        let command = controller.tick(0.001).unwrap();
        assert_eq!(command.torque, target);
    }

    #[test]
    fn integral_accumulates_once_per_tick() {
        let mut config = ControllerConfig::with_joints(7);
        config.var_q = 1.0;
        config.var_qdot = 1.0;
        config.var_mu = 1.0;
        config.var_muprime = 1.0;
        config.k_mu = 1.0;
        config.k_p = 0.0;
        config.k_d = 0.0;
        config.k_i = 1.0;
        config.gain_scale = vec![1.0; 7];
        let mut controller = Controller::new(config).unwrap();

        controller
            .ingest_sample(sample(vec![0.0; 7], vec![0.0; 7]))
            .unwrap();
        let mut target = DVector::zeros(7);
        target[0] = 0.5;
        controller.set_goal(target.clone()).unwrap();

        let k = 8;
        let mut last = None;
        for i in 0..k {
            last = Some(controller.tick(i as f64 * 0.001).unwrap());
        }

        // Belief pinned at zero, so after k ticks the integral is k
        // times the target error and the torque reports it directly.
        assert_eq!(
            controller.estimator().integral(),
            &(&target * k as f64)
        );
        assert_eq!(last.unwrap().torque, target * k as f64);
    }

    #[test]
    fn apply_routes_both_event_kinds() {
        let mut controller = Controller::new(ControllerConfig::default()).unwrap();
        controller
            .apply(InputEvent::Sample(sample(vec![0.0; 7], vec![0.0; 7])))
            .unwrap();
        assert!(controller.is_ready());

        let reference = DesiredState::hold_at(DVector::from_element(7, 0.2));
        controller
            .apply(InputEvent::Reference(reference.clone()))
            .unwrap();
        assert_eq!(controller.desired().position, reference.position);
    }

    #[test]
    fn status_reports_counters_and_errors() {
        let mut controller = Controller::new(ControllerConfig::default()).unwrap();
        controller
            .ingest_sample(sample(vec![0.1; 7], vec![0.0; 7]))
            .unwrap();
        let _ = controller.ingest_sample(sample(vec![0.0; 4], vec![0.0; 4]));
        controller.hold_current_pose().unwrap();
        controller.tick(0.0).unwrap();

        let status = controller.status();
        assert!(status.ready);
        assert_eq!(status.ticks, 1);
        assert_eq!(status.samples_accepted, 1);
        assert_eq!(status.samples_rejected, 1);
        assert_eq!(status.references_accepted, 1);
        assert_eq!(status.belief_position.len(), 7);
        assert_eq!(status.integral_error.len(), 7);
    }
}
