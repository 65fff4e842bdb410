//! Shared message types passed between the feeds, the controller and
//! the torque sink.

use nalgebra::DVector;

/// One joint-state sample from the robot: positions and velocities for
/// every joint, stamped by the feed that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct JointState {
    /// Seconds since the UNIX epoch.
    pub timestamp: f64,
    /// Joint positions [rad].
    pub position: DVector<f64>,
    /// Joint velocities [rad/s].
    pub velocity: DVector<f64>,
}

impl JointState {
    pub fn new(timestamp: f64, position: DVector<f64>, velocity: DVector<f64>) -> Self {
        Self {
            timestamp,
            position,
            velocity,
        }
    }

    /// All-zero sample for an `n`-joint arm.
    pub fn zeros(n: usize) -> Self {
        Self::new(0.0, DVector::zeros(n), DVector::zeros(n))
    }
}

/// Target the control law regulates toward.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    /// Desired joint positions [rad].
    pub position: DVector<f64>,
    /// Desired joint velocities [rad/s].
    pub velocity: DVector<f64>,
}

impl DesiredState {
    pub fn new(position: DVector<f64>, velocity: DVector<f64>) -> Self {
        Self { position, velocity }
    }

    /// Stationary target at `position` with zero desired velocity.
    pub fn hold_at(position: DVector<f64>) -> Self {
        let n = position.len();
        Self::new(position, DVector::zeros(n))
    }

    pub fn zeros(n: usize) -> Self {
        Self::new(DVector::zeros(n), DVector::zeros(n))
    }
}

/// Torque command produced by one control cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TorqueCommand {
    /// Seconds since the UNIX epoch at evaluation time.
    pub timestamp: f64,
    /// Commanded joint torques [Nm].
    pub torque: DVector<f64>,
}

/// Events consumed by the controller event loop. Sensor and reference
/// feeds publish into one channel, so a control tick never observes a
/// half-applied update.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Fresh joint-state sample from the robot.
    Sample(JointState),
    /// New target from the reference feed.
    Reference(DesiredState),
}
