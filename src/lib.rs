//! Pose Link
//!
//! Streams the position of a motion-tracked device to a paired peer as
//! fixed 12-byte frames.
//!
//! ```text
//!  tracking service ──pose──▶ StreamingBridge ──frame──▶ ConnectionManager ──▶ peer
//!   (PoseSource)              (ready? encode)            (StreamConnection)
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{ByteOrder, CoordinateFrame, CoordinateFramePair, PoseSample, Transport};
pub use error::{ConnectionError, EncodingError, WriteError};
pub use infrastructure::bridge::{BridgeState, Delivery, FrameLink, PoseForwarder, StreamingBridge};
pub use infrastructure::link::protocol::{encode, Frame, FrameEncoder, FRAME_LEN};
pub use infrastructure::link::ConnectionManager;
