use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{DispatchResult, LocationError, PermissionState, Position, StorageError, TimerId, TimerOutcome};
use crate::store::{HelplineEntry, PrefKey, SubscriptionPlan};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContactId(pub String);

impl ContactId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone: String,
}

// Redact debug output: contact details are sensitive user data.
impl fmt::Debug for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contact")
            .field("id", &self.id)
            .field("name_present", &!self.name.is_empty())
            .field("phone_present", &!self.phone.is_empty())
            .finish()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    AppStarted,

    // Persistence responses
    PrefLoaded {
        key: PrefKey,
        response: Result<Option<Vec<u8>>, StorageError>,
    },
    PrefWritten {
        key: PrefKey,
        response: Result<(), StorageError>,
    },

    // Location permissions
    LocationPermissionRequested,
    LocationPermissionChecked {
        state: PermissionState,
    },
    LocationPermissionResult {
        state: PermissionState,
    },

    // Contacts & message
    AddContactRequested {
        name: String,
        phone: String,
    },
    DeleteContactRequested {
        id: ContactId,
    },
    SosMessageUpdated {
        message: String,
    },

    // Profile, subscription, helplines
    ProfileNameUpdated {
        name: String,
    },
    SubscriptionSelected {
        plan: SubscriptionPlan,
    },
    HelplinesUpdated {
        entries: Vec<HelplineEntry>,
    },
    HelplineCallRequested {
        number: String,
    },
    HelplineCallResult(DispatchResult),

    // Shake monitoring
    MonitoringToggled,
    MotionSample {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
    },
    /// Emitted by shells whose native service performs its own detection.
    ShakeDetected,

    // Broadcast SOS
    SosActivated,
    BroadcastFixAcquired {
        position: Position,
    },
    BroadcastFixFailed {
        error: LocationError,
    },
    CountdownTick {
        id: TimerId,
        outcome: TimerOutcome,
    },
    SosCancelRequested,
    BroadcastSmsResult(DispatchResult),
    SosReset {
        id: TimerId,
        outcome: TimerOutcome,
    },

    // Targeted SOS
    TargetedSosRequested {
        id: ContactId,
    },
    TargetedSosConfirmed,
    TargetedSosDeclined,
    TargetedFixAcquired {
        position: Position,
    },
    TargetedFixFailed {
        error: LocationError,
    },
    TargetedDispatchResult(DispatchResult),

    // UI surfaces
    ToastDismissed,
    ErrorDismissed,
}

impl Event {
    /// Stable name used as a telemetry label.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppStarted => "app_started",
            Self::PrefLoaded { .. } => "pref_loaded",
            Self::PrefWritten { .. } => "pref_written",
            Self::LocationPermissionRequested => "location_permission_requested",
            Self::LocationPermissionChecked { .. } => "location_permission_checked",
            Self::LocationPermissionResult { .. } => "location_permission_result",
            Self::AddContactRequested { .. } => "add_contact_requested",
            Self::DeleteContactRequested { .. } => "delete_contact_requested",
            Self::SosMessageUpdated { .. } => "sos_message_updated",
            Self::ProfileNameUpdated { .. } => "profile_name_updated",
            Self::SubscriptionSelected { .. } => "subscription_selected",
            Self::HelplinesUpdated { .. } => "helplines_updated",
            Self::HelplineCallRequested { .. } => "helpline_call_requested",
            Self::HelplineCallResult(_) => "helpline_call_result",
            Self::MonitoringToggled => "monitoring_toggled",
            Self::MotionSample { .. } => "motion_sample",
            Self::ShakeDetected => "shake_detected",
            Self::SosActivated => "sos_activated",
            Self::BroadcastFixAcquired { .. } => "broadcast_fix_acquired",
            Self::BroadcastFixFailed { .. } => "broadcast_fix_failed",
            Self::CountdownTick { .. } => "countdown_tick",
            Self::SosCancelRequested => "sos_cancel_requested",
            Self::BroadcastSmsResult(_) => "broadcast_sms_result",
            Self::SosReset { .. } => "sos_reset",
            Self::TargetedSosRequested { .. } => "targeted_sos_requested",
            Self::TargetedSosConfirmed => "targeted_sos_confirmed",
            Self::TargetedSosDeclined => "targeted_sos_declined",
            Self::TargetedFixAcquired { .. } => "targeted_fix_acquired",
            Self::TargetedFixFailed { .. } => "targeted_fix_failed",
            Self::TargetedDispatchResult(_) => "targeted_dispatch_result",
            Self::ToastDismissed => "toast_dismissed",
            Self::ErrorDismissed => "error_dismissed",
        }
    }

    /// Motion samples arrive at sensor rate; counting them as telemetry
    /// events would drown everything else out.
    #[must_use]
    pub const fn is_high_frequency(&self) -> bool {
        matches!(self, Self::MotionSample { .. })
    }
}
