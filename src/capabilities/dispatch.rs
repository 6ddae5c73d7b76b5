use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform SMS/call boundary. All operations are single-shot: no retry, no
/// queueing; failures carry the platform's reason verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "data")]
pub enum DispatchOperation {
    SendSms {
        recipients: Vec<String>,
        message: String,
    },
    MakeCall {
        number: String,
    },
    /// Platform-optimized SMS-then-call chain for a single recipient. Shells
    /// that cannot chain directly fall back to a user-confirmed call prompt
    /// and report `call_chained: false`.
    SendSosAndCall {
        recipient: String,
        message: String,
    },
}

impl Operation for DispatchOperation {
    type Output = DispatchResult;
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DispatchError {
    #[error("SMS send failed: {reason}")]
    SmsFailed { reason: String },

    #[error("call failed: {reason}")]
    CallFailed { reason: String },

    #[error("dispatch not supported on this platform")]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum DispatchOutput {
    SmsSent,
    CallPlaced,
    SosDelivered { call_chained: bool },
}

pub type DispatchResult = Result<DispatchOutput, DispatchError>;

pub struct Dispatch<Ev> {
    context: CapabilityContext<DispatchOperation, Ev>,
}

impl<Ev> Capability<Ev> for Dispatch<Ev> {
    type Operation = DispatchOperation;
    type MappedSelf<MappedEv> = Dispatch<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Dispatch::new(self.context.map_event(f))
    }
}

impl<Ev> Dispatch<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<DispatchOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn send_sms<F>(&self, recipients: Vec<String>, message: String, make_event: F)
    where
        F: FnOnce(DispatchResult) -> Ev + Send + 'static,
    {
        self.request(DispatchOperation::SendSms { recipients, message }, make_event);
    }

    pub fn make_call<F>(&self, number: String, make_event: F)
    where
        F: FnOnce(DispatchResult) -> Ev + Send + 'static,
    {
        self.request(DispatchOperation::MakeCall { number }, make_event);
    }

    pub fn send_sos_and_call<F>(&self, recipient: String, message: String, make_event: F)
    where
        F: FnOnce(DispatchResult) -> Ev + Send + 'static,
    {
        self.request(
            DispatchOperation::SendSosAndCall { recipient, message },
            make_event,
        );
    }

    fn request<F>(&self, operation: DispatchOperation, make_event: F)
    where
        F: FnOnce(DispatchResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let response = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(response));
        });
    }
}
