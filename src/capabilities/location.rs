use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    #[default]
    Pending,
    Granted,
    Denied,
}

impl PermissionState {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    #[must_use]
    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "data")]
pub enum LocationOperation {
    CheckPermissions,
    RequestPermissions,
    GetCurrentPosition { timeout_ms: Option<u64> },
}

impl Operation for LocationOperation {
    type Output = LocationResult;
}

/// Raw fix as reported by the platform; validated into a
/// `ValidatedCoordinate` before the core consumes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location request timed out")]
    Timeout,

    #[error("location unavailable: {reason}")]
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum LocationOutput {
    PermissionStatus(PermissionState),
    Position(Position),
}

pub type LocationResult = Result<LocationOutput, LocationError>;

pub struct Location<Ev> {
    context: CapabilityContext<LocationOperation, Ev>,
}

impl<Ev> Capability<Ev> for Location<Ev> {
    type Operation = LocationOperation;
    type MappedSelf<MappedEv> = Location<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Location::new(self.context.map_event(f))
    }
}

impl<Ev> Location<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<LocationOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn check_permissions<F>(&self, make_event: F)
    where
        F: FnOnce(PermissionState) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let response = ctx.request_from_shell(LocationOperation::CheckPermissions).await;
            ctx.update_app(make_event(permission_from(response)));
        });
    }

    pub fn request_permissions<F>(&self, make_event: F)
    where
        F: FnOnce(PermissionState) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let response = ctx
                .request_from_shell(LocationOperation::RequestPermissions)
                .await;
            ctx.update_app(make_event(permission_from(response)));
        });
    }

    /// Requests a single fix. `timeout_ms` of `None` lets the platform wait
    /// indefinitely.
    pub fn get_current<F>(&self, timeout_ms: Option<u64>, make_event: F)
    where
        F: FnOnce(Result<Position, LocationError>) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let response = ctx
                .request_from_shell(LocationOperation::GetCurrentPosition { timeout_ms })
                .await;
            let result = match response {
                Ok(LocationOutput::Position(position)) => Ok(position),
                Ok(LocationOutput::PermissionStatus(_)) => Err(LocationError::Unavailable {
                    reason: "unexpected permission response to a position request".into(),
                }),
                Err(e) => Err(e),
            };
            ctx.update_app(make_event(result));
        });
    }
}

fn permission_from(response: LocationResult) -> PermissionState {
    match response {
        Ok(LocationOutput::PermissionStatus(state)) => state,
        Ok(LocationOutput::Position(_)) => PermissionState::Pending,
        Err(LocationError::PermissionDenied) => PermissionState::Denied,
        Err(_) => PermissionState::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_state_checks() {
        assert!(PermissionState::Granted.is_granted());
        assert!(!PermissionState::Pending.is_granted());
        assert!(PermissionState::Denied.is_denied());
        assert!(!PermissionState::Granted.is_denied());
    }

    #[test]
    fn permission_from_maps_errors_conservatively() {
        assert_eq!(
            permission_from(Err(LocationError::PermissionDenied)),
            PermissionState::Denied
        );
        assert_eq!(
            permission_from(Err(LocationError::Timeout)),
            PermissionState::Pending
        );
        assert_eq!(
            permission_from(Ok(LocationOutput::PermissionStatus(PermissionState::Granted))),
            PermissionState::Granted
        );
    }

    #[test]
    fn operation_round_trips_through_json() {
        let op = LocationOperation::GetCurrentPosition {
            timeout_ms: Some(10_000),
        };
        let json = serde_json::to_string(&op).unwrap();
        let back: LocationOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }
}
