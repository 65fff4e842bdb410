//! Simulated input feeds. These stand in for the robot transport (a
//! hardware driver or middleware subscriber in a deployment) and push
//! typed events into the single controller channel.

use std::f64::consts::PI;

use nalgebra::DVector;
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration};

use crate::status::current_timestamp;
use crate::types::{DesiredState, InputEvent, JointState};

/// Publish joint-state samples at a fixed rate. The simulated arm sways
/// slowly around the zero pose with phase-shifted joints.
pub async fn joint_state_loop(tx: Sender<InputEvent>, joints: usize, period: Duration) {
    let mut interval = interval(period);
    let dt = period.as_secs_f64();
    let mut sample_count = 0u64;

    loop {
        interval.tick().await;

        let sample = mock_joint_state(sample_count, joints, dt);

        match tx.try_send(InputEvent::Sample(sample)) {
            Ok(_) => {
                sample_count += 1;
                if sample_count % 1000 == 0 {
                    eprintln!("[joints] {} samples", sample_count);
                }
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                eprintln!("[joints] Channel closed after {} samples", sample_count);
                break;
            }
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                // Channel full, drop this sample
            }
        }
    }
}

/// Publish a new stationary target every `period`. Targets wander
/// joint by joint so every gain sees some action.
pub async fn reference_loop(tx: Sender<InputEvent>, joints: usize, period: Duration) {
    let mut interval = interval(period);
    let mut step_count = 0u64;

    loop {
        interval.tick().await;

        let target = mock_reference(step_count, joints);

        match tx.try_send(InputEvent::Reference(target)) {
            Ok(_) => {
                step_count += 1;
                eprintln!("[reference] target {}", step_count);
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                eprintln!("[reference] Channel closed after {} targets", step_count);
                break;
            }
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                // Channel full, drop this target
            }
        }
    }
}

/// Deterministic stand-in for encoder readings: phase-shifted sway,
/// velocities are the analytic derivative of the positions.
fn mock_joint_state(step: u64, joints: usize, dt: f64) -> JointState {
    let t = step as f64 * dt;
    let omega = 2.0 * PI * 0.1;

    let position = DVector::from_fn(joints, |i, _| {
        let phase = i as f64 * 0.4;
        (t * omega + phase).sin() * 0.4
    });
    let velocity = DVector::from_fn(joints, |i, _| {
        let phase = i as f64 * 0.4;
        (t * omega + phase).cos() * 0.4 * omega
    });

    JointState::new(current_timestamp(), position, velocity)
}

/// Stationary pose that hops around the workspace on every step.
fn mock_reference(step: u64, joints: usize) -> DesiredState {
    let seq = step as f64;
    let position =
        DVector::from_fn(joints, |i, _| (seq * 0.7 + i as f64 * 0.4).sin() * 0.5);
    DesiredState::hold_at(position)
}
