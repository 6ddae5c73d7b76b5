mod dispatch;
mod location;
mod motion;
mod storage;
mod telemetry;
mod timer;

pub use self::dispatch::{
    Dispatch, DispatchError, DispatchOperation, DispatchOutput, DispatchResult,
};
pub use self::location::{
    Location, LocationError, LocationOperation, LocationOutput, LocationResult, PermissionState,
    Position,
};
pub use self::motion::{Motion, MotionOperation};
pub use self::storage::{Storage, StorageError, StorageOperation, StorageOutput, StorageResult};
pub use self::telemetry::{Telemetry, TelemetryOperation};
pub use self::timer::{Timer, TimerId, TimerOperation, TimerOutcome};

pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

pub type AppRender = Render<Event>;
pub type AppStorage = Storage<Event>;
pub type AppLocation = Location<Event>;
pub type AppDispatch = Dispatch<Event>;
pub type AppMotion = Motion<Event>;
pub type AppTimer = Timer<Event>;
pub type AppTelemetry = Telemetry<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub storage: Storage<Event>,
    pub location: Location<Event>,
    pub dispatch: Dispatch<Event>,
    pub motion: Motion<Event>,
    pub timer: Timer<Event>,
    pub telemetry: Telemetry<Event>,
}
