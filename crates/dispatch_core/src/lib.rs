pub mod booking;
pub mod cancellation;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod matching;
pub mod memory;
pub mod model;
pub mod pricing;
pub mod routing;
pub mod spatial;
pub mod store;
pub mod telemetry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use booking::{Booking, BookingCoordinator, BookingRequest};
pub use cancellation::{CancellationCoordinator, CancellationOutcome};
pub use config::DispatchConfig;
pub use engine::DispatchEngine;
pub use error::{DispatchError, ErrorClass};
pub use geo::GeoPoint;
pub use memory::MemoryStore;
