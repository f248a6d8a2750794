//! Vehicle tools.

pub mod link_status;
pub mod wait_heartbeat;

pub use link_status::LinkStatusTool;
pub use wait_heartbeat::{WaitHeartbeatParams, WaitHeartbeatTool};
