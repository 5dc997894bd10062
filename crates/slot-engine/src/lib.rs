//! # slot-engine
//!
//! Fixed-grid appointment slots layered over an external calendar backend.
//!
//! A clinic day is a fixed grid of slot start-times (morning 10:00–13:00 and
//! evening 17:00–21:00 at 30-minute steps by default). The engine reconciles
//! that grid against the live events of one calendar to report each slot as
//! available, booked or blocked, and writes blocking events and appointments
//! back through a narrow gateway trait. All comparisons happen in the
//! calendar's own timezone.
//!
//! ## Modules
//!
//! - [`grid`]: `SlotTime`, shift windows and slot generation
//! - [`resolver`]: per-slot status from grid, events and now
//! - [`engine`]: `SlotEngine` reads with typed degraded-mode reporting
//! - [`mutator`]: block / unblock / book
//! - [`reconcile`]: duplicate controlling-event detection and repair
//! - [`gateway`]: the `CalendarGateway` trait and event model
//! - [`memory`], [`file_store`], [`google`]: gateway implementations
//! - [`locks`]: per-slot serialization of mutations
//! - [`dst`]: DST policies for local wall-clock times
//! - [`clock`]: injectable "now"
//! - [`wire`]: date, time and booking-start parsing; `Outcome`
//! - [`config`]: TOML configuration
//! - [`error`]: Error types

pub mod clock;
pub mod config;
pub mod dst;
pub mod engine;
pub mod error;
pub mod file_store;
pub mod gateway;
pub mod google;
pub mod grid;
pub mod locks;
pub mod memory;
pub mod mutator;
pub mod reconcile;
pub mod resolver;
pub mod wire;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ClinicConfig;
pub use engine::{DayStatus, EventSource, SlotEngine, ZoneSource};
pub use error::{ConfigError, GatewayError, SlotError};
pub use gateway::{CalendarEvent, CalendarGateway, EventTime, NewEvent, SlotKind};
pub use grid::{generate_slots, ShiftGrid, ShiftWindow, SlotTime};
pub use memory::InMemoryCalendar;
pub use mutator::{Booking, BookingRequest};
pub use reconcile::{find_duplicate_claims, ReconcileReport};
pub use resolver::{resolve_day, resolve_slot, SlotBoard, SlotState, SlotStatus};
pub use wire::{parse_date, BookingStart, Outcome, SlotAction};
