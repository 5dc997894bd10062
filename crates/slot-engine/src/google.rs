//! Google Calendar v3 REST gateway.
//!
//! Speaks the public JSON API with a caller-supplied bearer token. Obtaining
//! and refreshing that token is the deployment's job; this client only uses
//! it. Endpoint and calendar id come from [`GoogleCalendarConfig`] and have no
//! built-in default.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use chrono_tz::Tz;
use reqwest::blocking::{Client, Response};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, GatewayError};
use crate::gateway::{CalendarEvent, CalendarGateway, EventTime, NewEvent, SlotKind};

/// Key under `extendedProperties.private` that carries the [`SlotKind`] tag.
pub const SLOT_KIND_PROPERTY: &str = "slotKind";

fn default_timeout_secs() -> u64 {
    10
}

/// Connection settings for one Google calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleCalendarConfig {
    /// API root, e.g. `https://www.googleapis.com/calendar/v3`.
    pub base_url: String,
    /// Calendar identifier, e.g. `primary` or an address.
    pub calendar_id: String,
    /// Inline bearer token. Prefer `access_token_env` outside of tests.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Name of an environment variable holding the bearer token.
    #[serde(default)]
    pub access_token_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GoogleCalendarConfig {
    /// The bearer token: inline value first, then the named environment variable.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }
        match &self.access_token_env {
            Some(var) => std::env::var(var)
                .ok()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    ConfigError::MissingField(format!("environment variable {} is not set", var))
                }),
            None => Err(ConfigError::MissingField(
                "calendar.access_token or calendar.access_token_env".to_string(),
            )),
        }
    }
}

/// Blocking client for one calendar.
#[derive(Debug, Clone)]
pub struct GoogleCalendar {
    client: Client,
    base_url: Url,
    calendar_id: String,
    access_token: String,
}

impl GoogleCalendar {
    pub fn new(config: &GoogleCalendarConfig, access_token: String) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GatewayError::Malformed(format!("invalid base url '{}': {}", config.base_url, e))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            calendar_id: config.calendar_id.clone(),
            access_token,
        })
    }

    fn endpoint(&self, tail: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                GatewayError::Malformed(format!("base url '{}' cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty();
            path.push("calendars");
            path.push(&self.calendar_id);
            path.extend(tail);
        }
        Ok(url)
    }
}

impl CalendarGateway for GoogleCalendar {
    fn timezone(&self) -> Result<Tz, GatewayError> {
        let url = self.endpoint(&[])?;
        tracing::debug!(%url, "fetching calendar timezone");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .map_err(transport)?;
        let resource: CalendarResource = check(response)?.json().map_err(malformed)?;

        let name = resource
            .time_zone
            .ok_or_else(|| GatewayError::Malformed("calendar has no timeZone".to_string()))?;
        name.parse()
            .map_err(|_| GatewayError::Malformed(format!("unknown timezone '{}'", name)))
    }

    fn list_events(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, GatewayError> {
        let url = self.endpoint(&["events"])?;
        let time_min = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let time_max = end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("timeMin", time_min.clone()),
                ("timeMax", time_max.clone()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            tracing::debug!(%url, page = ?page_token, "listing events");
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .map_err(transport)?;
            let page: EventList = check(response)?.json().map_err(malformed)?;

            for item in page.items {
                if item.status.as_deref() == Some("cancelled") {
                    continue;
                }
                events.push(CalendarEvent::try_from(item)?);
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(events)
    }

    fn insert_event(&self, event: &NewEvent) -> Result<CalendarEvent, GatewayError> {
        let url = self.endpoint(&["events"])?;
        let body = GoogleEvent::from(event);
        tracing::debug!(%url, summary = %event.summary, "inserting event");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .map_err(transport)?;
        let created: GoogleEvent = check(response)?.json().map_err(malformed)?;
        CalendarEvent::try_from(created)
    }

    fn delete_event(&self, event_id: &str) -> Result<(), GatewayError> {
        let url = self.endpoint(&["events", event_id])?;
        tracing::debug!(%url, "deleting event");

        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .map_err(transport)?;
        check(response)?;
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> GatewayError {
    GatewayError::Transport(err.to_string())
}

fn malformed(err: reqwest::Error) -> GatewayError {
    GatewayError::Malformed(err.to_string())
}

/// Map non-2xx statuses onto gateway errors.
fn check(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => GatewayError::Unauthorized(message),
        404 | 410 => GatewayError::NotFound(message),
        code => GatewayError::Rejected {
            status: code,
            message,
        },
    })
}

// ---------------------------------------------------------------------------
// Wire types (subset of the v3 Event resource)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarResource {
    time_zone: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing)]
    html_link: Option<String>,
    #[serde(default, skip_serializing)]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<GoogleTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<GoogleTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extended_properties: Option<ExtendedProperties>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExtendedProperties {
    #[serde(default)]
    private: HashMap<String, String>,
}

impl From<&NewEvent> for GoogleEvent {
    fn from(event: &NewEvent) -> Self {
        let extended_properties = event.kind.map(|kind| ExtendedProperties {
            private: HashMap::from([(SLOT_KIND_PROPERTY.to_string(), kind.as_tag().to_string())]),
        });
        GoogleEvent {
            summary: Some(event.summary.clone()),
            description: event.description.clone(),
            start: Some(GoogleTime {
                date_time: Some(event.start),
                date: None,
            }),
            end: Some(GoogleTime {
                date_time: Some(event.end),
                date: None,
            }),
            extended_properties,
            ..GoogleEvent::default()
        }
    }
}

impl TryFrom<GoogleTime> for EventTime {
    type Error = GatewayError;

    fn try_from(time: GoogleTime) -> Result<Self, Self::Error> {
        match (time.date_time, time.date) {
            (Some(dt), _) => Ok(EventTime::DateTime(dt)),
            (None, Some(d)) => Ok(EventTime::Date(d)),
            (None, None) => Err(GatewayError::Malformed(
                "event time has neither dateTime nor date".to_string(),
            )),
        }
    }
}

impl TryFrom<GoogleEvent> for CalendarEvent {
    type Error = GatewayError;

    fn try_from(event: GoogleEvent) -> Result<Self, Self::Error> {
        let id = event
            .id
            .ok_or_else(|| GatewayError::Malformed("event has no id".to_string()))?;
        let start = event
            .start
            .ok_or_else(|| GatewayError::Malformed(format!("event {} has no start", id)))?;
        let end = event
            .end
            .ok_or_else(|| GatewayError::Malformed(format!("event {} has no end", id)))?;
        let kind = event
            .extended_properties
            .as_ref()
            .and_then(|p| p.private.get(SLOT_KIND_PROPERTY))
            .and_then(|tag| SlotKind::from_tag(tag));

        Ok(CalendarEvent {
            id,
            summary: event.summary.unwrap_or_default(),
            description: event.description,
            start: start.try_into()?,
            end: end.try_into()?,
            kind,
            link: event.html_link,
        })
    }
}
