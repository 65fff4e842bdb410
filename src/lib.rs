//! Active inference torque controller for a fixed-DOF manipulator.
//!
//! The crate separates the numeric core from transport: [`Controller`]
//! consumes joint samples and reference updates as plain values and
//! returns torque commands, while the binary wires it to tokio channel
//! feeds and a periodic control tick. Beliefs about the joint state are
//! maintained by [`BeliefEstimator`], a free-energy gradient descent
//! filter, and mapped to torques by [`ControlLaw`].

pub mod belief;
pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod feeds;
pub mod status;
pub mod types;

pub use belief::{BeliefEstimator, Precisions};
pub use config::ControllerConfig;
pub use control::{ControlLaw, Gains};
pub use controller::{Controller, Readiness};
pub use error::{ControllerError, Result};
pub use status::ControllerStatus;
pub use types::{DesiredState, InputEvent, JointState, TorqueCommand};
