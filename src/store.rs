//! Persisted preference records and their encoding.
//!
//! Every read tolerates a missing or malformed entry by falling back to the
//! record's default; every write is best-effort. The in-memory `Model` stays
//! authoritative for the running session regardless of persistence outcome.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::event::{Contact, ContactId};

pub const FREE_TRIAL_DURATION_MS: u64 = 7 * 24 * 60 * 60 * 1000;
pub const MONTHLY_DURATION_MS: u64 = 30 * 24 * 60 * 60 * 1000;
pub const YEARLY_DURATION_MS: u64 = 365 * 24 * 60 * 60 * 1000;
pub const DISCOUNT_DURATION_MS: u64 = 48 * 60 * 60 * 1000;

/// One enum value per persisted record, mapped to its stable storage key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PrefKey {
    Contacts,
    SosMessage,
    Monitoring,
    Profile,
    Subscription,
    Discount,
    Helplines,
}

impl PrefKey {
    pub const ALL: [Self; 7] = [
        Self::Contacts,
        Self::SosMessage,
        Self::Monitoring,
        Self::Profile,
        Self::Subscription,
        Self::Discount,
        Self::Helplines,
    ];

    /// Storage keys are load-bearing: they must match what existing
    /// installations already have on disk.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Contacts => "emergency-contacts",
            Self::SosMessage => "emergency-sos-message",
            Self::Monitoring => "emergency-monitoring-status",
            Self::Profile => "fortiguard-profile",
            Self::Subscription => "fortiguard-subscription",
            Self::Discount => "fortiguard-discount",
            Self::Helplines => "emergency-helplines",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "User".into(),
            email: "user@example.com".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SubscriptionPlan {
    #[default]
    None,
    FreeTrial,
    Monthly,
    Yearly,
}

impl SubscriptionPlan {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FreeTrial => "free-trial",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// How long a newly selected plan runs, `None` for the unsubscribed
    /// state.
    #[must_use]
    pub const fn duration_ms(self) -> Option<u64> {
        match self {
            Self::None => None,
            Self::FreeTrial => Some(FREE_TRIAL_DURATION_MS),
            Self::Monthly => Some(MONTHLY_DURATION_MS),
            Self::Yearly => Some(YEARLY_DURATION_MS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Subscription {
    pub status: SubscriptionPlan,
    #[serde(rename = "endDate")]
    pub end_date_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Discount {
    #[serde(rename = "endDate")]
    pub end_date_ms: Option<u64>,
}

impl Discount {
    #[must_use]
    pub fn is_active(&self, now_ms: u64) -> bool {
        self.end_date_ms.is_some_and(|end| end > now_ms)
    }

    #[must_use]
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            end_date_ms: Some(now_ms + DISCOUNT_DURATION_MS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelplineEntry {
    pub id: String,
    pub name: String,
    pub number: String,
    pub icon: String,
}

#[must_use]
pub fn default_helplines() -> Vec<HelplineEntry> {
    [
        ("1", "Ambulance", "108", "ambulance"),
        ("2", "Gas leak", "1906", "alert"),
        ("3", "Disaster Management", "104", "alert"),
        ("4", "Police", "100", "shield"),
        ("5", "Fire Management", "101", "flame"),
    ]
    .into_iter()
    .map(|(id, name, number, icon)| HelplineEntry {
        id: id.into(),
        name: name.into(),
        number: number.into(),
        icon: icon.into(),
    })
    .collect()
}

/// Decodes a stored JSON record, falling back to the default on a missing or
/// malformed entry.
#[must_use]
pub fn decode_or_default<T>(key: PrefKey, bytes: Option<&[u8]>) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(bytes) = bytes else {
        return T::default();
    };
    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key = key.storage_key(), error = %e, "malformed stored record, using default");
            T::default()
        }
    }
}

/// The monitoring flag is stored as the literal strings `"true"`/`"false"`,
/// matching what existing installations wrote.
#[must_use]
pub fn decode_monitoring_flag(bytes: Option<&[u8]>) -> bool {
    bytes == Some(b"true".as_slice())
}

#[must_use]
pub fn encode_monitoring_flag(armed: bool) -> Vec<u8> {
    if armed { b"true".to_vec() } else { b"false".to_vec() }
}

/// Stored messages are plain UTF-8, not JSON. Invalid bytes fall back to
/// `None` so the caller can substitute the default message.
#[must_use]
pub fn decode_message(bytes: Option<&[u8]>) -> Option<String> {
    let bytes = bytes?;
    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => Some(s),
        Err(_) => {
            tracing::warn!("stored SOS message is not valid UTF-8, using default");
            None
        }
    }
}

/// A missing record means first run, which gets the built-in directory. A
/// present record is authoritative even when the user emptied the list.
#[must_use]
pub fn decode_helplines(bytes: Option<&[u8]>) -> Vec<HelplineEntry> {
    let Some(bytes) = bytes else {
        return default_helplines();
    };
    match serde_json::from_slice(bytes) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "malformed stored helplines, using defaults");
            default_helplines()
        }
    }
}

#[must_use]
pub fn decode_contacts(bytes: Option<&[u8]>) -> Vec<Contact> {
    let contacts: Vec<Contact> = decode_or_default(PrefKey::Contacts, bytes);
    // Entries with an empty id can never be deleted by the UI; drop them.
    contacts
        .into_iter()
        .filter(|c| !c.id.0.is_empty())
        .collect()
}

#[must_use]
pub fn new_contact_id() -> ContactId {
    ContactId(uuid::Uuid::new_v4().to_string())
}
