use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// Fire-and-forget structured logging and metrics. The shell decides where
/// records go (logcat, os_log, analytics); the core never waits on them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "data")]
pub enum TelemetryOperation {
    Counter {
        name: String,
        value: u64,
    },
    Gauge {
        name: String,
        value: f64,
    },
    Event {
        name: String,
        fields: Vec<(String, String)>,
    },
    Warn {
        name: String,
        detail: String,
    },
    Error {
        name: String,
        detail: String,
    },
}

impl Operation for TelemetryOperation {
    type Output = ();
}

pub struct Telemetry<Ev> {
    context: CapabilityContext<TelemetryOperation, Ev>,
}

impl<Ev> Capability<Ev> for Telemetry<Ev> {
    type Operation = TelemetryOperation;
    type MappedSelf<MappedEv> = Telemetry<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Telemetry::new(self.context.map_event(f))
    }
}

impl<Ev> Telemetry<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<TelemetryOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn counter(&self, name: &str, value: u64) {
        self.notify(TelemetryOperation::Counter {
            name: name.into(),
            value,
        });
    }

    pub fn gauge(&self, name: &str, value: f64) {
        self.notify(TelemetryOperation::Gauge {
            name: name.into(),
            value,
        });
    }

    pub fn event(&self, name: &str, fields: &[(&str, &str)]) {
        self.notify(TelemetryOperation::Event {
            name: name.into(),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
    }

    pub fn warn(&self, name: &str, detail: &str) {
        self.notify(TelemetryOperation::Warn {
            name: name.into(),
            detail: detail.into(),
        });
    }

    pub fn error(&self, name: &str, detail: &str) {
        self.notify(TelemetryOperation::Error {
            name: name.into(),
            detail: detail.into(),
        });
    }

    fn notify(&self, operation: TelemetryOperation) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
