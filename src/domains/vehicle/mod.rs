//! Vehicle domain module.
//!
//! Owns the MAVLink UDP link and the lifespan that opens it lazily and
//! releases it at shutdown. Tools reach the link through
//! [`Lifespan::acquire`].

mod error;
mod lifespan;
mod link;

pub use error::LifespanError;
pub use lifespan::{Lifespan, VehicleLifespan};
pub use link::{
    Datagram, MAVLINK_V1_MAGIC, MAVLINK_V2_MAGIC, MavlinkVersion, VehicleConfig, VehicleLink,
    parse_address,
};
