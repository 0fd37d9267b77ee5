//! Simulate a small lake fleet and print updates and insights.
//!
//! ```text
//! cargo run -p limnos-runtime --example fleet
//! RUST_LOG=debug LIMNOS_LOG_FORMAT=json cargo run -p limnos-runtime --example fleet
//! ```

use std::time::Duration;

use chrono::Utc;
use limnos_core::{baseline_readings, Buoy, BuoyId, Insight, Parameter, SimulationConfig};
use limnos_runtime::{init_logging, LogFormat, Scheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let format = std::env::var("LIMNOS_LOG_FORMAT")
        .ok()
        .and_then(|f| f.parse().ok())
        .unwrap_or(LogFormat::Plain);
    init_logging(format)?;

    let now = Utc::now();
    let fleet = vec![
        Buoy::new(BuoyId::new(1), "North Inlet", now)
            .with_location(-0.05, 34.75)
            .with_readings(baseline_readings()),
        Buoy::new(BuoyId::new(2), "Papyrus Bay", now)
            .with_location(-0.09, 34.70)
            .with_readings(baseline_readings())
            .with_reading(Parameter::Phosphates, 0.48)
            .with_reading(Parameter::Temperature, 27.5)
            .with_reading(Parameter::HyacinthCoverage, 33.0),
        Buoy::new(BuoyId::new(3), "Outflow Channel", now)
            .with_location(-0.12, 34.81)
            .with_readings(baseline_readings())
            .with_reading(Parameter::DissolvedOxygen, 4.6)
            .with_reading(Parameter::Temperature, 26.0),
    ];

    let scheduler = Scheduler::new(SimulationConfig::demo())?;
    scheduler.set_fault_sink(|fault| eprintln!("fault: {}", fault));
    scheduler.start(
        fleet,
        |buoys: &[Buoy]| {
            for buoy in buoys {
                let oxygen = buoy.readings.get(&Parameter::DissolvedOxygen).copied().unwrap_or(f64::NAN);
                let coverage = buoy.readings.get(&Parameter::HyacinthCoverage).copied().unwrap_or(f64::NAN);
                println!(
                    "{:<16} {:<8} O2 {:>5.2} mg/L  hyacinth {:>5.1}%  alerts {}",
                    buoy.metadata.name,
                    buoy.status,
                    oxygen,
                    coverage,
                    buoy.alerts.len()
                );
            }
            println!();
        },
        |insight: &Insight| {
            println!(
                ">> [{}] {} ({}): {} (confidence {:.0}%, {})",
                insight.buoy,
                insight.title,
                insight.timeframe,
                insight.description,
                insight.confidence * 100.0,
                insight.impact
            );
        },
    )?;

    tokio::time::sleep(Duration::from_secs(20)).await;
    scheduler.stop();

    let stats = scheduler.stats();
    println!(
        "{} ticks, {} anomalies, {} insights, {} status changes",
        stats.ticks, stats.anomalies, stats.insights, stats.transitions
    );
    for anomaly in scheduler.recent_anomalies(5) {
        println!("{}", serde_json::to_string(&anomaly)?);
    }
    Ok(())
}
