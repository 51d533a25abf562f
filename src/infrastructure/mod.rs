pub mod bridge;
pub mod link;
pub mod logging;
pub mod tracking;
