use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use nalgebra::DVector;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use joint_aic_rs::config::ControllerConfig;
use joint_aic_rs::controller::Controller;
use joint_aic_rs::error::ControllerError;
use joint_aic_rs::feeds;
use joint_aic_rs::status::current_timestamp;
use joint_aic_rs::types::{InputEvent, TorqueCommand};

#[derive(Parser, Debug)]
#[command(name = "joint_aic")]
#[command(about = "Active inference joint torque controller", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Path to a JSON controller configuration
    #[arg(long)]
    config: Option<String>,

    /// Control cycle rate in Hz
    #[arg(long, default_value = "1000.0")]
    rate_hz: f64,

    /// Simulated joint feed rate in Hz
    #[arg(long, default_value = "500.0")]
    sensor_hz: f64,

    /// Comma-separated joint goal in radians, held after startup
    #[arg(long)]
    goal: Option<String>,

    /// Hold the startup pose instead of following the reference feed
    #[arg(long)]
    hold: bool,

    /// Output directory for status snapshots
    #[arg(long, default_value = "controller_status")]
    status_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    anyhow::ensure!(args.rate_hz > 0.0, "--rate-hz must be positive");
    anyhow::ensure!(args.sensor_hz > 0.0, "--sensor-hz must be positive");

    let config = match &args.config {
        Some(path) => ControllerConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => ControllerConfig::default(),
    };
    let joints = config.joints;

    println!("[{}] Joint AIC Starting", ts_now());
    println!("  Joints: {}", joints);
    println!("  Duration: {} seconds (0=continuous)", args.duration);
    println!("  Control Rate: {} Hz", args.rate_hz);
    println!("  Sensor Rate: {} Hz", args.sensor_hz);
    println!("  Status Dir: {}", args.status_dir);

    std::fs::create_dir_all(&args.status_dir)?;

    let startup_goal = match &args.goal {
        Some(raw) => Some(parse_goal(raw, joints)?),
        None => None,
    };

    let mut controller = Controller::new(config)?;

    // Feeds and ticks interleave on this one task through a single
    // event channel, so a control cycle never sees a half-applied
    // input.
    let (event_tx, mut event_rx) = mpsc::channel::<InputEvent>(500);
    let (torque_tx, torque_rx) = mpsc::channel::<TorqueCommand>(100);

    let sensor_period = Duration::from_secs_f64(1.0 / args.sensor_hz);
    let _sensor_handle = tokio::spawn(feeds::joint_state_loop(
        event_tx.clone(),
        joints,
        sensor_period,
    ));
    let _reference_handle = if args.hold {
        None
    } else {
        Some(tokio::spawn(feeds::reference_loop(
            event_tx.clone(),
            joints,
            Duration::from_secs(5),
        )))
    };
    let _sink_handle = tokio::spawn(torque_sink(torque_rx));

    // Drop the original sender so recv() ends once the feeds stop
    drop(event_tx);

    let mut torques_emitted = 0u64;
    let mut torques_dropped = 0u64;
    let mut last_torque: Vec<f64> = Vec::new();
    let mut startup_goal_set = false;
    let mut announced_waiting = false;

    let start = Utc::now();
    let mut last_status_update = Utc::now();

    let mut ticker = interval(Duration::from_secs_f64(1.0 / args.rate_hz));

    println!("[{}] Starting control loop...", ts_now());

    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        if let Err(e) = controller.apply(event) {
                            log::warn!("input rejected: {e}");
                        }
                        // The very first sample also fixes the startup
                        // target: an explicit goal if one was given,
                        // otherwise the pose the arm woke up in.
                        if !startup_goal_set && controller.is_ready() {
                            match &startup_goal {
                                Some(position) => controller.set_goal(position.clone())?,
                                None => controller.hold_current_pose()?,
                            }
                            startup_goal_set = true;
                            println!("[{}] First sample received, controller ready", ts_now());
                        }
                    }
                    None => {
                        println!("[{}] Input feeds stopped, shutting down", ts_now());
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                match controller.tick(current_timestamp()) {
                    Ok(command) => {
                        last_torque = command.torque.iter().copied().collect();
                        torques_emitted += 1;
                        if torque_tx.try_send(command).is_err() {
                            torques_dropped += 1;
                        }
                    }
                    Err(ControllerError::NotReady) => {
                        // No sample yet: emit nothing.
                        if !announced_waiting {
                            println!("[{}] Waiting for first joint sample...", ts_now());
                            announced_waiting = true;
                        }
                    }
                    Err(e) => log::warn!("control cycle failed: {e}"),
                }

                let now = Utc::now();
                if (now.signed_duration_since(last_status_update).num_seconds() as u64) >= 2 {
                    let uptime = now.signed_duration_since(start).num_seconds().max(0) as u64;
                    let mut status = controller.status();
                    status.torques_emitted = torques_emitted;
                    status.uptime_seconds = uptime;
                    status.last_torque = last_torque.clone();

                    let status_path = format!("{}/controller_status.json", args.status_dir);
                    let _ = status.save(&status_path);
                    last_status_update = now;
                }

                if args.duration > 0 {
                    let elapsed = Utc::now().signed_duration_since(start);
                    if elapsed.num_seconds() as u64 >= args.duration {
                        println!("[{}] Duration reached, stopping...", ts_now());
                        break;
                    }
                }
            }
        }
    }

    // Final status snapshot
    let uptime = Utc::now().signed_duration_since(start).num_seconds().max(0) as u64;
    let mut final_status = controller.status();
    final_status.torques_emitted = torques_emitted;
    final_status.uptime_seconds = uptime;
    final_status.last_torque = last_torque;
    let status_path = format!("{}/controller_status_final.json", args.status_dir);
    let _ = final_status.save(&status_path);

    println!("\n=== Final Stats ===");
    println!("Ticks: {}", final_status.ticks);
    println!("Samples accepted: {}", final_status.samples_accepted);
    println!("Samples rejected: {}", final_status.samples_rejected);
    println!("References accepted: {}", final_status.references_accepted);
    println!(
        "Torques emitted: {} ({} dropped)",
        torques_emitted, torques_dropped
    );

    Ok(())
}

/// Drains torque commands the way an actuator driver would, reporting
/// progress so long runs show signs of life.
async fn torque_sink(mut rx: mpsc::Receiver<TorqueCommand>) {
    let mut command_count = 0u64;
    while let Some(command) = rx.recv().await {
        command_count += 1;
        if command_count % 1000 == 0 {
            eprintln!(
                "[torque] {} commands, peak |u| {:.3} Nm",
                command_count,
                command.torque.amax()
            );
        }
    }
}

fn parse_goal(raw: &str, joints: usize) -> Result<DVector<f64>> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<f64>, _>>()
        .with_context(|| format!("invalid --goal value: {raw}"))?;
    anyhow::ensure!(
        values.len() == joints,
        "--goal needs {} comma-separated values, got {}",
        joints,
        values.len()
    );
    Ok(DVector::from_vec(values))
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
