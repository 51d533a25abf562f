use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Service UUID advertised by the receiving peer
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0xAEDBD263_E6EC_467D_8461_746329DE6754);

/// Reference frames a pose can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateFrame {
    /// Origin where the tracking service started.
    StartOfService,
    /// Origin of a previously learned area.
    AreaDescription,
    /// The device pose at the previous sample.
    PreviousDevicePose,
    /// The tracked device itself.
    Device,
}

/// A (base, target) pair: the pose of `target` expressed in `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinateFramePair {
    pub base: CoordinateFrame,
    pub target: CoordinateFrame,
}

impl CoordinateFramePair {
    pub fn new(base: CoordinateFrame, target: CoordinateFrame) -> Self {
        Self { base, target }
    }
}

impl Default for CoordinateFramePair {
    fn default() -> Self {
        Self::new(CoordinateFrame::StartOfService, CoordinateFrame::Device)
    }
}

/// One pose update from the tracking service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    // Translation in meters (x, y, z)
    pub position: [f64; 3],

    // Rotation quaternion (x, y, z, w)
    pub orientation: [f64; 4],

    // Service clock, seconds
    pub timestamp: f64,

    pub frame: CoordinateFramePair,
}

impl PoseSample {
    /// Sample at `position` with identity orientation in the default frame pair.
    pub fn at(position: [f64; 3]) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

impl Default for PoseSample {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
            timestamp: 0.0,
            frame: CoordinateFramePair::default(),
        }
    }
}

/// Transport used to reach the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    #[default]
    Tcp,
    LocalSocket,
}

/// Byte order of the f32 components on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    ConnectionStatus(ConnectionStatus),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
