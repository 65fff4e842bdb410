use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize, Deserialize, Clone)]
pub struct ControllerStatus {
    pub timestamp: f64,
    pub ready: bool,
    pub ticks: u64,
    pub samples_accepted: u64,
    pub samples_rejected: u64,
    pub references_accepted: u64,
    pub references_rejected: u64,
    pub torques_emitted: u64,
    pub uptime_seconds: u64,
    // Belief snapshot
    pub belief_position: Vec<f64>,
    pub belief_velocity: Vec<f64>,
    pub desired_position: Vec<f64>,
    pub integral_error: Vec<f64>,
    // Sensory prediction errors from the last cycle
    pub position_prediction_error: Vec<f64>,
    pub velocity_prediction_error: Vec<f64>,
    pub last_torque: Vec<f64>,
}

impl ControllerStatus {
    pub fn new(joints: usize) -> Self {
        Self {
            timestamp: current_timestamp(),
            ready: false,
            ticks: 0,
            samples_accepted: 0,
            samples_rejected: 0,
            references_accepted: 0,
            references_rejected: 0,
            torques_emitted: 0,
            uptime_seconds: 0,
            belief_position: vec![0.0; joints],
            belief_velocity: vec![0.0; joints],
            desired_position: vec![0.0; joints],
            integral_error: vec![0.0; joints],
            position_prediction_error: vec![0.0; joints],
            velocity_prediction_error: vec![0.0; joints],
            last_torque: Vec::new(),
        }
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
