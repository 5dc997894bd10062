//! TOML configuration for a clinic deployment.
//!
//! ```toml
//! [schedule]
//! step_minutes = 30
//! slot_minutes = 30
//! dst_policy = "wall_clock"
//!
//! [[schedule.windows]]
//! name = "morning"
//! start = "10:00"
//! end = "13:00"
//!
//! [labels]
//! blocked_summary = "BLOCKED"
//! appointment_prefix = "Appointment: "
//!
//! [calendar]
//! backend = "google"
//! base_url = "https://www.googleapis.com/calendar/v3"
//! calendar_id = "primary"
//! access_token_env = "CLINIC_CALENDAR_TOKEN"
//! ```
//!
//! `schedule` and `labels` have defaults. `calendar` does not: the deployment
//! must name its backend explicitly.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dst::DstPolicy;
use crate::engine::{SlotEngine, DEFAULT_SLOT_MINUTES};
use crate::error::ConfigError;
use crate::file_store::FileCalendar;
use crate::gateway::CalendarGateway;
use crate::google::{GoogleCalendar, GoogleCalendarConfig};
use crate::grid::{default_windows, ShiftGrid, ShiftWindow, DEFAULT_STEP_MINUTES};
use crate::resolver::Labels;

/// A gateway chosen at runtime from configuration.
pub type DynGateway = Box<dyn CalendarGateway + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub step_minutes: u32,
    /// Length of blocking events written by the engine.
    pub slot_minutes: u32,
    pub dst_policy: DstPolicy,
    pub windows: Vec<ShiftWindow>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            step_minutes: DEFAULT_STEP_MINUTES,
            slot_minutes: DEFAULT_SLOT_MINUTES,
            dst_policy: DstPolicy::default(),
            windows: default_windows(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CalendarConfig {
    Google(GoogleCalendarConfig),
    /// Local JSON calendar; `timezone` seeds a file that does not exist yet.
    File { path: PathBuf, timezone: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClinicConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub calendar: Option<CalendarConfig>,
}

impl ClinicConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClinicConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid()?;
        if self.schedule.slot_minutes == 0 {
            return Err(ConfigError::Invalid(
                "schedule.slot_minutes must be positive".to_string(),
            ));
        }
        if self.labels.blocked_summary.is_empty() {
            return Err(ConfigError::Invalid(
                "labels.blocked_summary must not be empty".to_string(),
            ));
        }

        match self.calendar()? {
            CalendarConfig::Google(google) => {
                if google.base_url.is_empty() {
                    return Err(ConfigError::MissingField("calendar.base_url".to_string()));
                }
                if google.calendar_id.is_empty() {
                    return Err(ConfigError::MissingField("calendar.calendar_id".to_string()));
                }
            }
            CalendarConfig::File { timezone, .. } => {
                parse_zone(timezone)?;
            }
        }
        Ok(())
    }

    pub fn calendar(&self) -> Result<&CalendarConfig, ConfigError> {
        self.calendar
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("calendar".to_string()))
    }

    pub fn grid(&self) -> Result<ShiftGrid, ConfigError> {
        Ok(ShiftGrid::new(
            self.schedule.windows.clone(),
            self.schedule.step_minutes,
        )?)
    }

    /// Construct the configured backend.
    pub fn open_gateway(&self) -> Result<DynGateway, ConfigError> {
        match self.calendar()? {
            CalendarConfig::Google(google) => {
                let token = google.resolve_token()?;
                let gateway = GoogleCalendar::new(google, token)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                tracing::info!(calendar = %google.calendar_id, "using Google Calendar backend");
                Ok(Box::new(gateway))
            }
            CalendarConfig::File { path, timezone } => {
                let tz = parse_zone(timezone)?;
                tracing::info!(path = %path.display(), "using file calendar backend");
                Ok(Box::new(FileCalendar::new(path, tz)))
            }
        }
    }

    /// An engine over `gateway` with this configuration's grid and policies.
    pub fn build_engine<G: CalendarGateway>(&self, gateway: G) -> Result<SlotEngine<G>, ConfigError> {
        Ok(SlotEngine::new(gateway, self.grid()?)
            .with_labels(self.labels.clone())
            .with_slot_minutes(self.schedule.slot_minutes)
            .with_dst_policy(self.schedule.dst_policy))
    }
}

fn parse_zone(name: &str) -> Result<Tz, ConfigError> {
    name.parse()
        .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", name)))
}
