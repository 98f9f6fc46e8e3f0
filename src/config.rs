use crate::drag::{SnapGrid, TimelineGeometry, MINUTES_PER_DAY};
use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Planner settings stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_lead_time_minutes")]
    pub lead_time_minutes: i64,
    #[serde(default = "default_snap_minutes")]
    pub snap_minutes: i64,
    #[serde(default = "default_timeline_start_hour")]
    pub timeline_start_hour: u32,
    #[serde(default = "default_timeline_end_hour")]
    pub timeline_end_hour: u32,
    #[serde(default = "default_hour_height")]
    pub hour_height: f64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_lead_time_minutes() -> i64 {
    10
}

fn default_snap_minutes() -> i64 {
    15
}

fn default_timeline_start_hour() -> u32 {
    6
}

fn default_timeline_end_hour() -> u32 {
    23
}

fn default_hour_height() -> f64 {
    60.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            lead_time_minutes: default_lead_time_minutes(),
            snap_minutes: default_snap_minutes(),
            timeline_start_hour: default_timeline_start_hour(),
            timeline_end_hour: default_timeline_end_hour(),
            hour_height: default_hour_height(),
            log_level: default_log_level(),
        }
    }
}

impl PlannerConfig {
    /// How long before a task starts its reminder fires, at most one day
    pub fn lead_time(&self) -> Duration {
        Duration::minutes(self.lead_time_minutes.clamp(0, MINUTES_PER_DAY))
    }

    pub fn snap_grid(&self) -> SnapGrid {
        SnapGrid::minutes(self.snap_minutes)
    }

    /// Timeline layout; an inverted or out-of-range window falls back to the default one
    pub fn geometry(&self) -> TimelineGeometry {
        let valid = self.timeline_start_hour < self.timeline_end_hour
            && self.timeline_end_hour <= 24
            && self.hour_height.is_finite()
            && self.hour_height > 0.0;
        if !valid {
            return TimelineGeometry::default();
        }
        TimelineGeometry {
            start_hour: self.timeline_start_hour,
            end_hour: self.timeline_end_hour,
            hour_height: self.hour_height,
        }
    }
}

/// Load config.json, or defaults when it does not exist
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PlannerConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(PlannerConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: PlannerConfig = serde_json::from_str(&content)?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &PlannerConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    crate::persistence::atomic_write(path, &json)?;
    Ok(())
}
