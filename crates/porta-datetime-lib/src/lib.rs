pub mod calendar;
pub mod datetime;
pub mod error;
pub mod expression;
pub mod zone;

pub use datetime::PortaDateTime;
pub use error::{PortaError, Result};
pub use zone::{prepare_timezone, PortaZone, TimezoneArg, ToPortaZone, ZoneOffset};

pub use chrono::{DateTime, Duration, Utc};

pub mod prelude {
    pub use crate::datetime::PortaDateTime;
    pub use crate::error::{PortaError, Result};
    pub use crate::zone::{PortaZone, TimezoneArg};
    pub use chrono::{DateTime, Utc};
}
