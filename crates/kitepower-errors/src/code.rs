//! The closed error-code taxonomy.
//!
//! Codes are stable numeric identifiers. The numeric band of a code selects its
//! [`ErrorCategory`] and its default [`ErrorSeverity`]; see the crate docs for
//! the band table.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::ErrorSeverity;

/// Firmware-wide error code.
///
/// `ErrorCode` doubles as the error type of component lifecycle operations
/// (`Result<(), ErrorCode>`), so every variant carries a human-readable message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, thiserror::Error,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum ErrorCode {
    /// Success; never stored as a failure.
    #[error("success")]
    Ok = 0,

    /// Unclassified failure.
    #[error("unknown error")]
    Unknown = 1,
    /// Operation not valid in the current state.
    #[error("invalid state")]
    InvalidState = 2,
    /// An argument was out of range or malformed.
    #[error("invalid argument")]
    InvalidArgument = 3,
    /// Generic operation timeout.
    #[error("operation timed out")]
    Timeout = 4,
    /// Operation requires a prior `initialize()`.
    #[error("component not initialized")]
    NotInitialized = 5,
    /// `initialize()` was called on an already initialized component.
    #[error("component already initialized")]
    AlreadyInitialized = 6,
    /// Feature not supported by this component or build.
    #[error("operation not supported")]
    NotSupported = 7,
    /// A monitored component stopped sending heartbeats.
    #[error("watchdog heartbeat timeout")]
    WatchdogTimeout = 8,
    /// Configuration failed validation.
    #[error("invalid configuration")]
    ConfigInvalid = 20,
    /// Required configuration is missing.
    #[error("missing configuration")]
    ConfigMissing = 21,
    /// File does not exist.
    #[error("file not found")]
    FileNotFound = 30,
    /// File could not be read.
    #[error("file read failed")]
    FileReadFailed = 31,
    /// File could not be written.
    #[error("file write failed")]
    FileWriteFailed = 32,
    /// A shared resource is temporarily unavailable.
    #[error("resource unavailable")]
    ResourceUnavailable = 33,

    /// Unclassified hardware failure.
    #[error("hardware failure")]
    HardwareFailure = 100,
    /// A component failed its initialization sequence.
    #[error("component initialization failed")]
    ComponentInitFailed = 101,
    /// Unclassified sensor failure.
    #[error("sensor failure")]
    SensorFailure = 110,
    /// Inertial measurement unit failure.
    #[error("IMU failure")]
    ImuFailure = 111,
    /// Wind sensor failure.
    #[error("wind sensor failure")]
    WindSensorFailure = 112,
    /// Line tension sensor failure.
    #[error("tension sensor failure")]
    TensionSensorFailure = 113,
    /// Line length encoder failure.
    #[error("line length sensor failure")]
    LineLengthSensorFailure = 114,
    /// Unclassified actuator failure.
    #[error("actuator failure")]
    ActuatorFailure = 120,
    /// Steering servo failure.
    #[error("servo failure")]
    ServoFailure = 121,
    /// Winch motor failure.
    #[error("winch failure")]
    WinchFailure = 122,
    /// Display failure.
    #[error("display failure")]
    DisplayFailure = 130,
    /// Button or potentiometer input failure.
    #[error("input device failure")]
    InputFailure = 131,
    /// Calibration could not complete.
    #[error("calibration failed")]
    CalibrationFailed = 140,

    /// Unclassified communication failure.
    #[error("communication failure")]
    CommunicationFailure = 200,
    /// Connection could not be established.
    #[error("connection failed")]
    ConnectionFailed = 201,
    /// Sending data failed.
    #[error("send failed")]
    SendFailed = 202,
    /// Receiving data failed.
    #[error("receive failed")]
    ReceiveFailed = 203,
    /// Network operation timed out.
    #[error("network timeout")]
    NetworkTimeout = 204,
    /// Local server failed.
    #[error("server error")]
    ServerError = 205,
    /// API request failed.
    #[error("API error")]
    ApiError = 206,

    /// Allocation failure.
    #[error("out of memory")]
    OutOfMemory = 300,
    /// A task or thread could not be created.
    #[error("task creation failed")]
    TaskCreationFailed = 301,
    /// A lock could not be acquired or is poisoned.
    #[error("mutex failure")]
    MutexFailure = 302,
    /// The hardware watchdog could not be attached or fed.
    #[error("hardware watchdog failure")]
    HardwareWatchdogFailure = 303,
    /// Internal state is inconsistent.
    #[error("state corruption")]
    StateCorruption = 304,
    /// Failure threatening system integrity.
    #[error("critical failure")]
    CriticalFailure = 399,
}

impl ErrorCode {
    /// Every code in the taxonomy, in ascending numeric order.
    pub const ALL: [ErrorCode; 41] = [
        ErrorCode::Ok,
        ErrorCode::Unknown,
        ErrorCode::InvalidState,
        ErrorCode::InvalidArgument,
        ErrorCode::Timeout,
        ErrorCode::NotInitialized,
        ErrorCode::AlreadyInitialized,
        ErrorCode::NotSupported,
        ErrorCode::WatchdogTimeout,
        ErrorCode::ConfigInvalid,
        ErrorCode::ConfigMissing,
        ErrorCode::FileNotFound,
        ErrorCode::FileReadFailed,
        ErrorCode::FileWriteFailed,
        ErrorCode::ResourceUnavailable,
        ErrorCode::HardwareFailure,
        ErrorCode::ComponentInitFailed,
        ErrorCode::SensorFailure,
        ErrorCode::ImuFailure,
        ErrorCode::WindSensorFailure,
        ErrorCode::TensionSensorFailure,
        ErrorCode::LineLengthSensorFailure,
        ErrorCode::ActuatorFailure,
        ErrorCode::ServoFailure,
        ErrorCode::WinchFailure,
        ErrorCode::DisplayFailure,
        ErrorCode::InputFailure,
        ErrorCode::CalibrationFailed,
        ErrorCode::CommunicationFailure,
        ErrorCode::ConnectionFailed,
        ErrorCode::SendFailed,
        ErrorCode::ReceiveFailed,
        ErrorCode::NetworkTimeout,
        ErrorCode::ServerError,
        ErrorCode::ApiError,
        ErrorCode::OutOfMemory,
        ErrorCode::TaskCreationFailed,
        ErrorCode::MutexFailure,
        ErrorCode::HardwareWatchdogFailure,
        ErrorCode::StateCorruption,
        ErrorCode::CriticalFailure,
    ];

    /// Numeric value of the code.
    ///
    /// ```
    /// use kitepower_errors::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::WinchFailure.value(), 122);
    /// ```
    #[must_use]
    pub const fn value(self) -> u16 {
        self as u16
    }

    /// Look up a code by numeric value.
    #[must_use]
    pub fn from_value(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.value() == value)
    }

    /// `true` for [`ErrorCode::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, ErrorCode::Ok)
    }

    /// Severity derived from the numeric band of the code.
    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        ErrorSeverity::from_code_value(self.value())
    }

    /// Category derived from the numeric band of the code.
    #[must_use]
    pub const fn category(self) -> ErrorCategory {
        match self.value() {
            0 => ErrorCategory::Success,
            1..=99 => ErrorCategory::General,
            100..=199 => ErrorCategory::Hardware,
            200..=299 => ErrorCategory::Communication,
            _ => ErrorCategory::System,
        }
    }

    /// Upper-case token used in logs, config files and the status report.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::AlreadyInitialized => "ALREADY_INITIALIZED",
            ErrorCode::NotSupported => "NOT_SUPPORTED",
            ErrorCode::WatchdogTimeout => "WATCHDOG_TIMEOUT",
            ErrorCode::ConfigInvalid => "CONFIG_INVALID",
            ErrorCode::ConfigMissing => "CONFIG_MISSING",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::FileReadFailed => "FILE_READ_FAILED",
            ErrorCode::FileWriteFailed => "FILE_WRITE_FAILED",
            ErrorCode::ResourceUnavailable => "RESOURCE_UNAVAILABLE",
            ErrorCode::HardwareFailure => "HARDWARE_FAILURE",
            ErrorCode::ComponentInitFailed => "COMPONENT_INIT_FAILED",
            ErrorCode::SensorFailure => "SENSOR_FAILURE",
            ErrorCode::ImuFailure => "IMU_FAILURE",
            ErrorCode::WindSensorFailure => "WIND_SENSOR_FAILURE",
            ErrorCode::TensionSensorFailure => "TENSION_SENSOR_FAILURE",
            ErrorCode::LineLengthSensorFailure => "LINE_LENGTH_SENSOR_FAILURE",
            ErrorCode::ActuatorFailure => "ACTUATOR_FAILURE",
            ErrorCode::ServoFailure => "SERVO_FAILURE",
            ErrorCode::WinchFailure => "WINCH_FAILURE",
            ErrorCode::DisplayFailure => "DISPLAY_FAILURE",
            ErrorCode::InputFailure => "INPUT_FAILURE",
            ErrorCode::CalibrationFailed => "CALIBRATION_FAILED",
            ErrorCode::CommunicationFailure => "COMMUNICATION_FAILURE",
            ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
            ErrorCode::SendFailed => "SEND_FAILED",
            ErrorCode::ReceiveFailed => "RECEIVE_FAILED",
            ErrorCode::NetworkTimeout => "NETWORK_TIMEOUT",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::OutOfMemory => "OUT_OF_MEMORY",
            ErrorCode::TaskCreationFailed => "TASK_CREATION_FAILED",
            ErrorCode::MutexFailure => "MUTEX_FAILURE",
            ErrorCode::HardwareWatchdogFailure => "HARDWARE_WATCHDOG_FAILURE",
            ErrorCode::StateCorruption => "STATE_CORRUPTION",
            ErrorCode::CriticalFailure => "CRITICAL_FAILURE",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.value()
    }
}

/// Coarse grouping of error codes by numeric band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCategory {
    /// The success code.
    Success = 0,
    /// General, configuration and file errors.
    General = 1,
    /// Sensor, actuator, display and input hardware.
    Hardware = 2,
    /// WiFi, web server and API communication.
    Communication = 3,
    /// Runtime resources and system integrity.
    System = 4,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Success => write!(f, "Success"),
            ErrorCategory::General => write!(f, "General"),
            ErrorCategory::Hardware => write!(f, "Hardware"),
            ErrorCategory::Communication => write!(f, "Communication"),
            ErrorCategory::System => write!(f, "System"),
        }
    }
}
