//! Real-time proximity alerts for points with recorded hazard history.
//!
//! A live position feed goes through [`tracker::PositionTracker`], nearby
//! hazards are ranked by [`proximity::nearby`], and
//! [`session::AlertSession`] turns the ranking into a spoken alert when the
//! user asks for one.
#![warn(
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    missing_debug_implementations,
    unreachable_pub
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod coord;
pub mod error;
pub mod hazard;
pub mod message;
pub mod proximity;
pub mod registration;
pub mod session;
pub mod settings;
pub mod source;
pub mod speech;
pub mod store;
pub mod tone;
pub mod tracker;

pub use coord::{distance_meters, Coordinate};
pub use error::{LocationError, RegistrationError, StoreError};
pub use hazard::{next_id, Hazard};
pub use proximity::{nearby, RankedHazard};
pub use session::AlertSession;
pub use settings::{Settings, SettingsHandle, Threshold};
pub use tracker::{PositionFix, PositionTracker};
