#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod event;
pub mod monitor;
pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::{render::Render, App as CruxApp};
pub use event::{Contact, ContactId, Event};
pub use monitor::ShakeDetector;

use capabilities::{PermissionState, TimerId};
use store::{Discount, HelplineEntry, Subscription, UserProfile};

pub const DEFAULT_SOS_MESSAGE: &str =
    "I am in DANGER, i need help. Please urgently reach me out.";

/// Euclidean-norm acceleration (m/s^2) a sample must exceed to count as a
/// shake.
pub const SHAKE_THRESHOLD: f64 = 25.0;
/// Minimum gap between two fired shake signals.
pub const SHAKE_COOLDOWN_MS: u64 = 10_000;

pub const SOS_COUNTDOWN_SECONDS: u8 = 5;
pub const COUNTDOWN_TICK_MS: u64 = 1_000;
/// How long the dispatch result stays on screen before the app returns to
/// idle.
pub const DISPATCH_RESET_DELAY_MS: u64 = 500;
/// Location wait bound on the targeted path only; the broadcast path waits
/// without a deadline because the countdown gives the user a cancel window.
pub const TARGETED_LOCATION_TIMEOUT_MS: u64 = 10_000;

pub const MAPS_QUERY_URL: &str = "https://www.google.com/maps?q=";
pub const BROADCAST_LOCATION_FALLBACK: &str = "Location services failed.";
pub const TARGETED_LOCATION_FALLBACK: &str = "Location not available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Location,
    LocationPermissionDenied,
    Dispatch,
    Storage,
    Serialization,
    Deserialization,
    Validation,
    InvalidState,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Location => "LOCATION_ERROR",
            Self::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::Dispatch => "DISPATCH_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Location | Self::Dispatch | Self::Storage => ErrorSeverity::Transient,
            Self::Serialization | Self::Deserialization | Self::InvalidState => {
                ErrorSeverity::Fatal
            }
            Self::LocationPermissionDenied | Self::Validation | Self::Unknown => {
                ErrorSeverity::Permanent
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Location => {
                "Unable to determine your location. Please check your GPS settings.".into()
            }
            ErrorKind::LocationPermissionDenied => {
                "Location permission was denied. Please enable it in your phone settings to use this app."
                    .into()
            }
            // Dispatch and validation failures carry their detail verbatim.
            ErrorKind::Dispatch | ErrorKind::Validation => self.message.clone(),
            ErrorKind::Storage => {
                "Unable to save data locally. Please free up some storage space.".into()
            }
            ErrorKind::Serialization | ErrorKind::Deserialization => {
                "A data error occurred. Please contact support if this persists.".into()
            }
            ErrorKind::InvalidState => {
                "The app is in an invalid state. Please restart the app.".into()
            }
            ErrorKind::Unknown => "An unexpected error occurred. Please try again.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Error)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatedCoordinate {
    lat: f64,
    lon: f64,
}

impl ValidatedCoordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lon(self) -> f64 {
        self.lon
    }
}

/// Map link of the fixed form shared with recipients.
#[must_use]
pub fn map_link(coordinate: ValidatedCoordinate) -> String {
    format!("{MAPS_QUERY_URL}{},{}", coordinate.lat(), coordinate.lon())
}

/// Builds the outgoing SOS text: the user's message, a newline, then either
/// a map link for the coordinate or the path's fallback sentence. Pure and
/// deterministic.
#[must_use]
pub fn compose_sos_message(
    user_message: &str,
    coordinate: Option<ValidatedCoordinate>,
    fallback: &str,
) -> String {
    match coordinate {
        Some(coordinate) => format!("{user_message}\n{}", map_link(coordinate)),
        None => format!("{user_message}\n{fallback}"),
    }
}

#[must_use]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at_ms: get_current_time_ms(),
            duration_ms: kind.default_duration_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AppState {
    #[default]
    Loading,
    /// Location permission not granted yet; the shell shows the grant
    /// prompt.
    PermissionGate,
    Ready,
}

/// Where the SOS state machine currently is. At most one SOS is in flight;
/// triggers arriving while non-idle are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SosPhase {
    #[default]
    Idle,
    /// Broadcast path: waiting for a fix, recipients already snapshotted so
    /// later contact edits cannot change who is alerted.
    AwaitingLocation {
        recipients: String,
    },
    CountingDown(SosSession),
    Dispatching {
        session: SosSession,
        reset_timer: Option<TimerId>,
    },
    /// Targeted path: waiting for the user's yes/no on the snapshot contact.
    ConfirmingTargeted {
        contact: Contact,
    },
    AwaitingTargetedFix {
        contact: Contact,
    },
}

impl SosPhase {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Ephemeral broadcast session; never persisted, destroyed on cancel or
/// after dispatch settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SosSession {
    pub message: String,
    /// Comma-joined phone numbers in contact-list order.
    pub recipients: String,
    pub remaining_seconds: u8,
    pub tick_timer: TimerId,
}

pub struct Model {
    pub state: AppState,
    pub location_permission: PermissionState,
    pub contacts: Vec<Contact>,
    pub sos_message: String,
    pub monitoring_armed: bool,
    /// Set while a persisted "armed" flag waits for the permission check to
    /// come back granted.
    pub pending_monitoring_restore: bool,
    pub detector: ShakeDetector,
    pub sos: SosPhase,
    pub profile: UserProfile,
    pub subscription: Subscription,
    pub discount: Discount,
    pub helplines: Vec<HelplineEntry>,
    pub active_toast: Option<ToastMessage>,
    pub active_error: Option<AppError>,
    pub view_timestamp_ms: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            state: AppState::Loading,
            location_permission: PermissionState::Pending,
            contacts: Vec::new(),
            sos_message: DEFAULT_SOS_MESSAGE.into(),
            monitoring_armed: false,
            pending_monitoring_restore: false,
            detector: ShakeDetector::new(),
            sos: SosPhase::Idle,
            profile: UserProfile::default(),
            subscription: Subscription::default(),
            discount: Discount::default(),
            helplines: store::default_helplines(),
            active_toast: None,
            active_error: None,
            view_timestamp_ms: get_current_time_ms(),
        }
    }
}

impl Model {
    pub fn update_timestamp(&mut self) {
        self.view_timestamp_ms = get_current_time_ms();
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactView {
    pub id: String,
    pub name: String,
    pub phone: String,
}

impl From<&Contact> for ContactView {
    fn from(c: &Contact) -> Self {
        Self {
            id: c.id.0.clone(),
            name: c.name.clone(),
            phone: c.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionView {
    pub status: String,
    pub end_date_ms: Option<u64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorView {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum ViewState {
    Loading,
    PermissionGate {
        permission: PermissionState,
    },
    Ready {
        monitoring_armed: bool,
        contacts: Vec<ContactView>,
        sos_message: String,
        helplines: Vec<HelplineEntry>,
        profile: UserProfile,
        subscription: SubscriptionView,
        discount_remaining_ms: u64,
    },
    /// Full-screen cancellable countdown; `remaining_seconds` reaches 0 while
    /// the dispatch result is pending.
    SosCountdown {
        message: String,
        recipients: String,
        remaining_seconds: u8,
    },
    ConfirmTargetedSos {
        contact_name: String,
        contact_phone: String,
        prompt: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub state: ViewState,
    pub toast: Option<ToastMessage>,
    pub error: Option<ErrorView>,
}

pub mod app {
    use super::*;
    use crate::capabilities::{Capabilities, Position, TimerOutcome};
    use crate::store::PrefKey;

    #[derive(Default)]
    pub struct App;

    impl App {
        fn persist_pref(caps: &Capabilities, key: PrefKey, bytes: Vec<u8>) {
            caps.storage
                .set(key.storage_key().to_string(), bytes, move |response| {
                    Event::PrefWritten { key, response }
                });
        }

        fn persist_json<T: Serialize>(caps: &Capabilities, key: PrefKey, value: &T) {
            match serde_json::to_vec(value) {
                Ok(bytes) => Self::persist_pref(caps, key, bytes),
                Err(e) => {
                    caps.telemetry
                        .error("pref_serialize_failed", &format!("{}: {e}", key.storage_key()));
                }
            }
        }

        fn apply_loaded_pref(
            model: &mut Model,
            caps: &Capabilities,
            key: PrefKey,
            value: Option<Vec<u8>>,
        ) {
            let bytes = value.as_deref();
            match key {
                PrefKey::Contacts => {
                    model.contacts = store::decode_contacts(bytes);
                }
                PrefKey::SosMessage => match store::decode_message(bytes) {
                    Some(message) if !message.is_empty() => model.sos_message = message,
                    // First run: seed the default so the editor has something
                    // to reset to.
                    _ => Self::persist_pref(
                        caps,
                        PrefKey::SosMessage,
                        DEFAULT_SOS_MESSAGE.as_bytes().to_vec(),
                    ),
                },
                PrefKey::Monitoring => {
                    model.pending_monitoring_restore = store::decode_monitoring_flag(bytes);
                }
                PrefKey::Profile => {
                    model.profile = store::decode_or_default(key, bytes);
                }
                PrefKey::Subscription => {
                    model.subscription = store::decode_or_default(key, bytes);
                }
                PrefKey::Discount => {
                    let stored: Discount = store::decode_or_default(key, bytes);
                    let now_ms = get_current_time_ms();
                    if stored.is_active(now_ms) {
                        model.discount = stored;
                    } else {
                        model.discount = Discount::starting_at(now_ms);
                        Self::persist_json(caps, PrefKey::Discount, &model.discount);
                    }
                }
                PrefKey::Helplines => {
                    model.helplines = store::decode_helplines(bytes);
                }
            }
        }

        /// The persisted "armed" flag is only honored once the permission
        /// check has come back granted; either event can arrive first.
        fn maybe_restore_monitoring(model: &mut Model, caps: &Capabilities) {
            if model.pending_monitoring_restore
                && model.location_permission.is_granted()
                && !model.monitoring_armed
            {
                model.pending_monitoring_restore = false;
                Self::start_monitoring(model, caps);
            }
        }

        fn start_monitoring(model: &mut Model, caps: &Capabilities) {
            caps.motion.start();
            model.detector.start();
            model.monitoring_armed = true;
            Self::persist_pref(
                caps,
                PrefKey::Monitoring,
                store::encode_monitoring_flag(true),
            );
            caps.telemetry.event("monitoring_started", &[]);
        }

        fn stop_monitoring(model: &mut Model, caps: &Capabilities) {
            caps.motion.stop();
            model.detector.stop();
            model.monitoring_armed = false;
            Self::persist_pref(
                caps,
                PrefKey::Monitoring,
                store::encode_monitoring_flag(false),
            );
            caps.telemetry.event("monitoring_stopped", &[]);
        }

        fn persist_contacts(model: &Model, caps: &Capabilities) {
            Self::persist_json(caps, PrefKey::Contacts, &model.contacts);
        }

        /// Broadcast entry point, shared by shake signals and the manual
        /// activate action.
        fn trigger_broadcast_sos(model: &mut Model, caps: &Capabilities) {
            if model.contacts.is_empty() {
                tracing::warn!("SOS trigger with no contacts configured, ignoring");
                caps.telemetry.warn("sos_ignored_no_contacts", "");
                return;
            }
            if !model.sos.is_idle() {
                // Policy: one SOS at a time; re-triggers are dropped.
                caps.telemetry.warn("sos_retrigger_ignored", "");
                return;
            }

            let recipients = model
                .contacts
                .iter()
                .map(|c| c.phone.as_str())
                .collect::<Vec<_>>()
                .join(",");
            model.sos = SosPhase::AwaitingLocation { recipients };

            caps.location.get_current(None, |result| match result {
                Ok(position) => Event::BroadcastFixAcquired { position },
                Err(error) => Event::BroadcastFixFailed { error },
            });
            caps.telemetry.event("sos_triggered", &[]);
            caps.render.render();
        }

        fn begin_countdown(
            model: &mut Model,
            caps: &Capabilities,
            message: String,
            recipients: String,
        ) {
            let tick = TimerId::fresh();
            model.sos = SosPhase::CountingDown(SosSession {
                message,
                recipients,
                remaining_seconds: SOS_COUNTDOWN_SECONDS,
                tick_timer: tick.clone(),
            });
            caps.timer
                .start(tick.clone(), COUNTDOWN_TICK_MS, move |outcome| {
                    Event::CountdownTick { id: tick, outcome }
                });
            caps.render.render();
        }

        fn dispatch_targeted(
            model: &mut Model,
            caps: &Capabilities,
            contact: &Contact,
            message: String,
        ) {
            model.sos = SosPhase::Idle;
            caps.dispatch.send_sos_and_call(
                contact.phone.clone(),
                message,
                Event::TargetedDispatchResult,
            );
            caps.telemetry.event("targeted_sos_dispatched", &[]);
            caps.render.render();
        }

        fn coordinate_from(position: Position, caps: &Capabilities) -> Option<ValidatedCoordinate> {
            match ValidatedCoordinate::new(position.latitude, position.longitude) {
                Ok(coordinate) => Some(coordinate),
                Err(e) => {
                    // Treated like a failed fix: the message falls back.
                    caps.telemetry.error("fix_invalid", &e.to_string());
                    None
                }
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            model.update_timestamp();

            if !event.is_high_frequency() {
                caps.telemetry.counter(&format!("event.{}", event.name()), 1);
            }

            match event {
                Event::AppStarted => {
                    model.state = AppState::Loading;

                    for key in PrefKey::ALL {
                        caps.storage
                            .get(key.storage_key().to_string(), move |response| {
                                Event::PrefLoaded { key, response }
                            });
                    }
                    caps.location
                        .check_permissions(|state| Event::LocationPermissionChecked { state });
                    caps.render.render();
                }

                Event::PrefLoaded { key, response } => {
                    let value = match response {
                        Ok(value) => value,
                        Err(e) => {
                            caps.telemetry
                                .error("pref_read_failed", &format!("{}: {e}", key.storage_key()));
                            None
                        }
                    };
                    Self::apply_loaded_pref(model, caps, key, value);
                    Self::maybe_restore_monitoring(model, caps);
                    caps.render.render();
                }

                Event::PrefWritten { key, response } => {
                    // Best-effort persistence: the in-memory state stays
                    // authoritative, the failure only gets logged.
                    if let Err(e) = response {
                        caps.telemetry
                            .error("pref_write_failed", &format!("{}: {e}", key.storage_key()));
                    }
                }

                Event::LocationPermissionRequested => {
                    caps.location
                        .request_permissions(|state| Event::LocationPermissionResult { state });
                    caps.render.render();
                }

                Event::LocationPermissionChecked { state } => {
                    model.location_permission = state;
                    model.state = if state.is_granted() {
                        AppState::Ready
                    } else {
                        AppState::PermissionGate
                    };
                    Self::maybe_restore_monitoring(model, caps);
                    caps.render.render();
                }

                Event::LocationPermissionResult { state } => {
                    model.location_permission = state;
                    if state.is_granted() {
                        model.state = AppState::Ready;
                    } else {
                        model.state = AppState::PermissionGate;
                        model.set_error(AppError::new(
                            ErrorKind::LocationPermissionDenied,
                            "Location permission was denied",
                        ));
                    }
                    Self::maybe_restore_monitoring(model, caps);
                    caps.render.render();
                }

                Event::AddContactRequested { name, phone } => {
                    let name = name.trim().to_string();
                    let phone = phone.trim().to_string();
                    if name.is_empty() || phone.is_empty() {
                        model.set_error(AppError::new(
                            ErrorKind::Validation,
                            "Contact name and phone number are required.",
                        ));
                        caps.render.render();
                        return;
                    }

                    model.contacts.push(Contact {
                        id: store::new_contact_id(),
                        name,
                        phone,
                    });
                    Self::persist_contacts(model, caps);
                    caps.telemetry.event("contact_added", &[]);
                    caps.render.render();
                }

                Event::DeleteContactRequested { id } => {
                    model.contacts.retain(|c| c.id != id);
                    Self::persist_contacts(model, caps);
                    caps.render.render();
                }

                Event::SosMessageUpdated { message } => {
                    if message.trim().is_empty() {
                        model.show_toast("SOS message cannot be empty.", ToastKind::Warning);
                        caps.render.render();
                        return;
                    }
                    model.sos_message = message;
                    Self::persist_pref(
                        caps,
                        PrefKey::SosMessage,
                        model.sos_message.as_bytes().to_vec(),
                    );
                    caps.render.render();
                }

                Event::ProfileNameUpdated { name } => {
                    model.profile.name = name;
                    Self::persist_json(caps, PrefKey::Profile, &model.profile);
                    caps.render.render();
                }

                Event::SubscriptionSelected { plan } => {
                    let now_ms = get_current_time_ms();
                    model.subscription = Subscription {
                        status: plan,
                        end_date_ms: plan.duration_ms().map(|d| now_ms + d),
                    };
                    model.show_toast(
                        format!("You've subscribed to the {} plan!", plan.as_str()),
                        ToastKind::Success,
                    );
                    Self::persist_json(caps, PrefKey::Subscription, &model.subscription);
                    caps.telemetry
                        .event("subscription_selected", &[("plan", plan.as_str())]);
                    caps.render.render();
                }

                Event::HelplinesUpdated { entries } => {
                    model.helplines = entries;
                    Self::persist_json(caps, PrefKey::Helplines, &model.helplines);
                    caps.render.render();
                }

                Event::HelplineCallRequested { number } => {
                    caps.dispatch.make_call(number, Event::HelplineCallResult);
                }

                Event::HelplineCallResult(result) => {
                    if let Err(e) = result {
                        model.set_error(AppError::new(ErrorKind::Dispatch, e.to_string()));
                        caps.render.render();
                    }
                }

                Event::MonitoringToggled => {
                    if !model.location_permission.is_granted() {
                        model.show_toast(
                            "Please grant location permission first.",
                            ToastKind::Warning,
                        );
                        self.update(Event::LocationPermissionRequested, model, caps);
                        return;
                    }

                    if model.monitoring_armed {
                        Self::stop_monitoring(model, caps);
                    } else {
                        if model.contacts.is_empty() {
                            model.show_toast(
                                "Please add at least one emergency contact first.",
                                ToastKind::Warning,
                            );
                            caps.render.render();
                            return;
                        }
                        Self::start_monitoring(model, caps);
                    }
                    caps.render.render();
                }

                Event::MotionSample { x, y, z } => {
                    let now_ms = get_current_time_ms();
                    if model.detector.on_sample(x, y, z, now_ms) {
                        caps.telemetry.event("shake_signal", &[]);
                        Self::trigger_broadcast_sos(model, caps);
                    }
                }

                Event::ShakeDetected => {
                    caps.telemetry.event("shake_signal_native", &[]);
                    Self::trigger_broadcast_sos(model, caps);
                }

                Event::SosActivated => {
                    Self::trigger_broadcast_sos(model, caps);
                }

                Event::BroadcastFixAcquired { position } => {
                    let SosPhase::AwaitingLocation { recipients } = &model.sos else {
                        caps.telemetry.warn("broadcast_fix_ignored", "not awaiting a fix");
                        return;
                    };
                    let recipients = recipients.clone();
                    let coordinate = Self::coordinate_from(position, caps);
                    let message = compose_sos_message(
                        &model.sos_message,
                        coordinate,
                        BROADCAST_LOCATION_FALLBACK,
                    );
                    Self::begin_countdown(model, caps, message, recipients);
                }

                Event::BroadcastFixFailed { error } => {
                    let SosPhase::AwaitingLocation { recipients } = &model.sos else {
                        return;
                    };
                    let recipients = recipients.clone();
                    // Never terminal on this path: the message degrades, the
                    // countdown still runs.
                    caps.telemetry.error("broadcast_fix_failed", &error.to_string());
                    let message = compose_sos_message(
                        &model.sos_message,
                        None,
                        BROADCAST_LOCATION_FALLBACK,
                    );
                    Self::begin_countdown(model, caps, message, recipients);
                }

                Event::CountdownTick { id, outcome } => {
                    if outcome == TimerOutcome::Cancelled {
                        return;
                    }
                    let SosPhase::CountingDown(session) = &mut model.sos else {
                        // The session was cancelled between scheduling and
                        // firing.
                        return;
                    };
                    if session.tick_timer != id {
                        caps.telemetry.warn("countdown_tick_stale", &id.0);
                        return;
                    }

                    session.remaining_seconds = session.remaining_seconds.saturating_sub(1);
                    let remaining = session.remaining_seconds;

                    if remaining == 0 {
                        if let SosPhase::CountingDown(session) =
                            std::mem::replace(&mut model.sos, SosPhase::Idle)
                        {
                            let recipients: Vec<String> = session
                                .recipients
                                .split(',')
                                .filter(|s| !s.is_empty())
                                .map(str::to_string)
                                .collect();
                            caps.dispatch.send_sms(
                                recipients,
                                session.message.clone(),
                                Event::BroadcastSmsResult,
                            );
                            model.sos = SosPhase::Dispatching {
                                session,
                                reset_timer: None,
                            };
                        }
                    } else {
                        let next = TimerId::fresh();
                        session.tick_timer = next.clone();
                        caps.timer
                            .start(next.clone(), COUNTDOWN_TICK_MS, move |outcome| {
                                Event::CountdownTick { id: next, outcome }
                            });
                    }
                    caps.render.render();
                }

                Event::SosCancelRequested => {
                    if let SosPhase::CountingDown(session) = &model.sos {
                        caps.timer.cancel(session.tick_timer.clone());
                        model.sos = SosPhase::Idle;
                        caps.telemetry.event("sos_cancelled", &[]);
                        caps.render.render();
                    }
                }

                Event::BroadcastSmsResult(result) => {
                    if !matches!(model.sos, SosPhase::Dispatching { .. }) {
                        return;
                    }
                    match result {
                        Ok(_) => {
                            model.active_toast = Some(ToastMessage::new(
                                "SOS message sent successfully!",
                                ToastKind::Success,
                            ));
                            caps.telemetry.event("broadcast_sms_sent", &[]);
                        }
                        Err(e) => {
                            model.active_error = Some(AppError::new(
                                ErrorKind::Dispatch,
                                format!("Failed to send SMS: {e}"),
                            ));
                            caps.telemetry.error("broadcast_sms_failed", &e.to_string());
                        }
                    }

                    let id = TimerId::fresh();
                    if let SosPhase::Dispatching { reset_timer, .. } = &mut model.sos {
                        *reset_timer = Some(id.clone());
                    }
                    caps.timer
                        .start(id.clone(), DISPATCH_RESET_DELAY_MS, move |outcome| {
                            Event::SosReset { id, outcome }
                        });
                    caps.render.render();
                }

                Event::SosReset { id, outcome: _ } => {
                    let SosPhase::Dispatching { reset_timer, .. } = &model.sos else {
                        return;
                    };
                    if reset_timer.as_ref() != Some(&id) {
                        return;
                    }
                    model.sos = SosPhase::Idle;
                    caps.render.render();
                }

                Event::TargetedSosRequested { id } => {
                    if !model.sos.is_idle() {
                        caps.telemetry.warn("targeted_sos_ignored", "sos already in flight");
                        return;
                    }
                    let Some(contact) = model.contacts.iter().find(|c| c.id == id).cloned()
                    else {
                        caps.telemetry.warn("targeted_sos_unknown_contact", &id.0);
                        return;
                    };
                    model.sos = SosPhase::ConfirmingTargeted { contact };
                    caps.render.render();
                }

                Event::TargetedSosDeclined => {
                    if matches!(model.sos, SosPhase::ConfirmingTargeted { .. }) {
                        model.sos = SosPhase::Idle;
                        caps.render.render();
                    }
                }

                Event::TargetedSosConfirmed => {
                    let SosPhase::ConfirmingTargeted { contact } = &model.sos else {
                        return;
                    };
                    let contact = contact.clone();
                    model.sos = SosPhase::AwaitingTargetedFix { contact };
                    caps.location.get_current(
                        Some(TARGETED_LOCATION_TIMEOUT_MS),
                        |result| match result {
                            Ok(position) => Event::TargetedFixAcquired { position },
                            Err(error) => Event::TargetedFixFailed { error },
                        },
                    );
                    caps.render.render();
                }

                Event::TargetedFixAcquired { position } => {
                    let SosPhase::AwaitingTargetedFix { contact } = &model.sos else {
                        return;
                    };
                    let contact = contact.clone();
                    let coordinate = Self::coordinate_from(position, caps);
                    let message = compose_sos_message(
                        &model.sos_message,
                        coordinate,
                        TARGETED_LOCATION_FALLBACK,
                    );
                    Self::dispatch_targeted(model, caps, &contact, message);
                }

                Event::TargetedFixFailed { error } => {
                    let SosPhase::AwaitingTargetedFix { contact } = &model.sos else {
                        return;
                    };
                    let contact = contact.clone();
                    caps.telemetry.error("targeted_fix_failed", &error.to_string());
                    // Non-blocking notice; the dispatch still goes out with
                    // the fallback text.
                    model.show_toast(
                        "Could not get location. Preparing message without location.",
                        ToastKind::Warning,
                    );
                    let message =
                        compose_sos_message(&model.sos_message, None, TARGETED_LOCATION_FALLBACK);
                    Self::dispatch_targeted(model, caps, &contact, message);
                }

                Event::TargetedDispatchResult(result) => {
                    match result {
                        Ok(_) => {
                            caps.telemetry.event("targeted_sos_sent", &[]);
                        }
                        Err(e) => {
                            model.set_error(AppError::new(ErrorKind::Dispatch, e.to_string()));
                            caps.telemetry.error("targeted_sos_failed", &e.to_string());
                        }
                    }
                    caps.render.render();
                }

                Event::ToastDismissed => {
                    model.clear_toast();
                    caps.render.render();
                }

                Event::ErrorDismissed => {
                    model.clear_error();
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let now_ms = model.view_timestamp_ms;

            let state = match &model.sos {
                SosPhase::CountingDown(session) => ViewState::SosCountdown {
                    message: session.message.clone(),
                    recipients: session.recipients.clone(),
                    remaining_seconds: session.remaining_seconds,
                },
                SosPhase::Dispatching { session, .. } => ViewState::SosCountdown {
                    message: session.message.clone(),
                    recipients: session.recipients.clone(),
                    remaining_seconds: 0,
                },
                SosPhase::ConfirmingTargeted { contact } => ViewState::ConfirmTargetedSos {
                    contact_name: contact.name.clone(),
                    contact_phone: contact.phone.clone(),
                    prompt: format!(
                        "This will send an SOS to {} and then immediately call them. Continue?",
                        contact.name
                    ),
                },
                SosPhase::Idle
                | SosPhase::AwaitingLocation { .. }
                | SosPhase::AwaitingTargetedFix { .. } => match model.state {
                    AppState::Loading => ViewState::Loading,
                    AppState::PermissionGate => ViewState::PermissionGate {
                        permission: model.location_permission,
                    },
                    AppState::Ready => ViewState::Ready {
                        monitoring_armed: model.monitoring_armed,
                        contacts: model.contacts.iter().map(ContactView::from).collect(),
                        sos_message: model.sos_message.clone(),
                        helplines: model.helplines.clone(),
                        profile: model.profile.clone(),
                        subscription: SubscriptionView {
                            status: model.subscription.status.as_str().to_string(),
                            end_date_ms: model.subscription.end_date_ms,
                            is_active: model
                                .subscription
                                .end_date_ms
                                .is_some_and(|end| end > now_ms),
                        },
                        discount_remaining_ms: model
                            .discount
                            .end_date_ms
                            .map_or(0, |end| end.saturating_sub(now_ms)),
                    },
                },
            };

            ViewModel {
                state,
                toast: model.active_toast.clone(),
                error: model.active_error.as_ref().map(|e| ErrorView {
                    code: e.code().to_string(),
                    message: e.user_facing_message(),
                }),
            }
        }
    }
}
