//! # Application status codes.
//!
//! Three-digit codes shared with the backend: `<severity><source><description>`.
//! The publisher prefixes the origin, so the code seen on the bus is
//! [`bus_code`]`(origin, code)` = `origin * 1000 + code`.
//!
//! Keep this table in sync with the backend's status code list.

use super::message::{Origin, Severity};

/// Known application status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // Lifecycle and components (10-29)
    /// Component finished initialization.
    CompInitFinished = 211,
    /// Component finished configuration.
    CompConfigFinished = 212,
    /// Component finished shutdown.
    CompShutdownFinished = 213,
    /// Component initialization failed.
    CompInitFailed = 411,

    // Exporter (40)
    /// Exporter started.
    ExporterStarted = 241,
    /// Exporter stopped.
    ExporterStopped = 242,
    /// Exporter finished subscribing.
    ExporterSubscribingFinished = 243,
    /// Exporter subscribed to only some of the requested topics.
    ExporterPartialSubscription = 341,
    /// Exporter could not subscribe to any topic.
    ExporterNoSubscription = 342,
    /// Exporter trigger not found.
    ExporterTriggerNotFound = 441,
    /// Exporter file format not supported.
    ExporterFileFormatNotSupported = 442,
    /// Exporter configuration not supported.
    ExporterConfigurationNotSupported = 443,

    // Player (50-69)
    /// Recording loaded.
    RecordingLoaded = 251,
    /// Loading the recording failed.
    RecordingLoadFailed = 451,
    /// Player trigger finished.
    PlayerTriggerFinished = 252,
    /// Player trigger failed.
    PlayerTriggerFailed = 452,
    /// Player trigger found no receiver.
    PlayerTriggerNoReceiver = 352,
    /// Player started loading a recording.
    StartLoadRecording = 153,

    // Bridges (70-89)
    /// Backend configuration set up.
    SetupBackendConfigFinished = 271,
    /// Bridge processed its queue.
    ProcessQueueFinished = 272,
    /// Bridge acknowledged a websocket connection check.
    ReceivedCheckWebsocketConnection = 273,
    /// Requested plugin not found.
    PluginNotFound = 371,
}

impl StatusCode {
    /// Every known code.
    pub const ALL: [StatusCode; 22] = [
        StatusCode::CompInitFinished,
        StatusCode::CompConfigFinished,
        StatusCode::CompShutdownFinished,
        StatusCode::CompInitFailed,
        StatusCode::ExporterStarted,
        StatusCode::ExporterStopped,
        StatusCode::ExporterSubscribingFinished,
        StatusCode::ExporterPartialSubscription,
        StatusCode::ExporterNoSubscription,
        StatusCode::ExporterTriggerNotFound,
        StatusCode::ExporterFileFormatNotSupported,
        StatusCode::ExporterConfigurationNotSupported,
        StatusCode::RecordingLoaded,
        StatusCode::RecordingLoadFailed,
        StatusCode::PlayerTriggerFinished,
        StatusCode::PlayerTriggerFailed,
        StatusCode::PlayerTriggerNoReceiver,
        StatusCode::StartLoadRecording,
        StatusCode::SetupBackendConfigFinished,
        StatusCode::ProcessQueueFinished,
        StatusCode::ReceivedCheckWebsocketConnection,
        StatusCode::PluginNotFound,
    ];

    /// Three-digit application value.
    #[inline]
    pub const fn value(self) -> u16 {
        self as u16
    }

    /// Resolves a three-digit application value.
    pub fn from_value(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.value() == value)
    }

    /// Code as published on the bus by a process of the given origin.
    #[inline]
    pub fn on(self, origin: Origin) -> u32 {
        u32::from(origin.as_u8()) * 1000 + u32::from(self.value())
    }

    /// Severity encoded in the code.
    pub fn severity(self) -> Severity {
        Severity::of(Some(u32::from(self.value())))
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        u32::from(code.value())
    }
}

/// Largest application code; the thousands digit belongs to the origin.
pub const MAX_APP_CODE: u32 = 999;

/// Combines an origin and an application code into the code seen on the bus.
///
/// Returns `None` if `code` does not fit in three digits.
#[inline]
pub fn bus_code(origin: Origin, code: u32) -> Option<u32> {
    if code > MAX_APP_CODE {
        return None;
    }
    (u32::from(origin.as_u8()) * 1000).checked_add(code)
}

/// Splits a bus code into its origin and application part.
///
/// Returns `None` if the leading digit is not a known origin.
pub fn split_bus_code(code: u32) -> Option<(Origin, u32)> {
    let origin = u8::try_from(code / 1000).ok().and_then(Origin::from_u8)?;
    Some((origin, code % 1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_code_prefixes_origin() {
        assert_eq!(StatusCode::ExporterStarted.on(Origin::DataBridge), 2241);
        assert_eq!(StatusCode::CompInitFinished.on(Origin::SimNode), 5211);
        assert_eq!(bus_code(Origin::Default, 153), Some(1153));
    }

    #[test]
    fn bus_code_rejects_codes_wider_than_three_digits() {
        assert_eq!(bus_code(Origin::SimNode, MAX_APP_CODE), Some(5999));
        assert_eq!(bus_code(Origin::SimNode, 1000), None);
        assert_eq!(bus_code(Origin::Player, u32::MAX), None);
    }

    #[test]
    fn split_reverses_bus_code() {
        assert_eq!(split_bus_code(4251), Some((Origin::Player, 251)));
        assert_eq!(split_bus_code(9251), None);
        assert_eq!(split_bus_code(251), None);
    }

    #[test]
    fn severity_survives_origin_prefix() {
        for code in StatusCode::ALL {
            for origin in Origin::ALL {
                assert_eq!(Severity::of(Some(code.on(origin))), code.severity());
            }
        }
    }

    #[test]
    fn catalogue_values_are_unique_and_resolvable() {
        for code in StatusCode::ALL {
            assert_eq!(StatusCode::from_value(code.value()), Some(code));
        }
        assert_eq!(StatusCode::from_value(999), None);
    }
}
