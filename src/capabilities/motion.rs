use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// Accelerometer sampling control. Start and stop are notifications: a shell
/// without a usable sensor simply never delivers samples, so arming never
/// fails into the core. While sampling, the shell feeds each reading back as
/// `Event::MotionSample` (or emits `Event::ShakeDetected` directly when a
/// native service does its own detection).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MotionOperation {
    StartSampling,
    StopSampling,
}

impl Operation for MotionOperation {
    type Output = ();
}

pub struct Motion<Ev> {
    context: CapabilityContext<MotionOperation, Ev>,
}

impl<Ev> Capability<Ev> for Motion<Ev> {
    type Operation = MotionOperation;
    type MappedSelf<MappedEv> = Motion<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Motion::new(self.context.map_event(f))
    }
}

impl<Ev> Motion<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<MotionOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn start(&self) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(MotionOperation::StartSampling).await;
        });
    }

    pub fn stop(&self) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(MotionOperation::StopSampling).await;
        });
    }
}
