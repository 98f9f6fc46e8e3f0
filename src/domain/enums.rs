use crate::error::ValidationError;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Effort/focus classification of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EnergyLevel {
    Restful = 0,
    Light = 1,
    Moderate = 2,
    High = 3,
    Intense = 4,
}

impl EnergyLevel {
    /// Ordinal value (0..=4)
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Glyph shown next to a task
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Restful => "🌿",
            Self::Light => "◎",
            Self::Moderate => "🔥",
            Self::High => "🔥🔥",
            Self::Intense => "🔥🔥🔥",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Restful => "Restful",
            Self::Light => "Light",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::Intense => "Intense",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Restful => "Low effort, recovery activities",
            Self::Light => "Easy tasks, minimal focus required",
            Self::Moderate => "Regular effort, standard tasks",
            Self::High => "Demanding, requires full attention",
            Self::Intense => "Maximum effort, peak performance",
        }
    }

    pub fn all() -> &'static [EnergyLevel] {
        &[
            EnergyLevel::Restful,
            EnergyLevel::Light,
            EnergyLevel::Moderate,
            EnergyLevel::High,
            EnergyLevel::Intense,
        ]
    }
}

impl Default for EnergyLevel {
    fn default() -> Self {
        Self::Moderate
    }
}

impl TryFrom<u8> for EnergyLevel {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Restful),
            1 => Ok(Self::Light),
            2 => Ok(Self::Moderate),
            3 => Ok(Self::High),
            4 => Ok(Self::Intense),
            other => Err(ValidationError::EnergyOutOfRange(other)),
        }
    }
}

impl From<EnergyLevel> for u8 {
    fn from(level: EnergyLevel) -> Self {
        level.ordinal()
    }
}

/// Color tag of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskColor {
    Coral,
    Sage,
    Sky,
    Lavender,
    Amber,
    Rose,
    Slate,
    Night,
}

impl TaskColor {
    /// Parse a color name, falling back to sage for unknown names
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "coral" => Self::Coral,
            "sage" => Self::Sage,
            "sky" => Self::Sky,
            "lavender" => Self::Lavender,
            "amber" => Self::Amber,
            "rose" => Self::Rose,
            "slate" => Self::Slate,
            "night" => Self::Night,
            _ => Self::Sage,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Coral => "coral",
            Self::Sage => "sage",
            Self::Sky => "sky",
            Self::Lavender => "lavender",
            Self::Amber => "amber",
            Self::Rose => "rose",
            Self::Slate => "slate",
            Self::Night => "night",
        }
    }
}

impl Default for TaskColor {
    fn default() -> Self {
        Self::Sage
    }
}

/// Duration choices offered when creating a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationPreset {
    FifteenMin,
    ThirtyMin,
    FortyFiveMin,
    OneHour,
    OneAndHalfHour,
    TwoHours,
}

impl DurationPreset {
    pub fn duration(&self) -> Duration {
        match self {
            Self::FifteenMin => Duration::minutes(15),
            Self::ThirtyMin => Duration::minutes(30),
            Self::FortyFiveMin => Duration::minutes(45),
            Self::OneHour => Duration::minutes(60),
            Self::OneAndHalfHour => Duration::minutes(90),
            Self::TwoHours => Duration::minutes(120),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FifteenMin => "15m",
            Self::ThirtyMin => "30m",
            Self::FortyFiveMin => "45m",
            Self::OneHour => "1h",
            Self::OneAndHalfHour => "1.5h",
            Self::TwoHours => "2h",
        }
    }

    pub fn all() -> &'static [DurationPreset] {
        &[
            DurationPreset::FifteenMin,
            DurationPreset::ThirtyMin,
            DurationPreset::FortyFiveMin,
            DurationPreset::OneHour,
            DurationPreset::OneAndHalfHour,
            DurationPreset::TwoHours,
        ]
    }
}
