use crux_core::testing::AppTester;
use crux_core::Request;

use shared::capabilities::{
    DispatchOperation, DispatchOutput, LocationError, LocationOperation, LocationOutput,
    PermissionState, Position,
};
use shared::{
    App, AppState, Contact, ContactId, Effect, Event, Model, SosPhase, ToastKind, ViewState,
    DEFAULT_SOS_MESSAGE,
};

fn ready_model_with_ada() -> Model {
    Model {
        state: AppState::Ready,
        location_permission: PermissionState::Granted,
        contacts: vec![Contact {
            id: ContactId::new("c1"),
            name: "Ada".into(),
            phone: "+15550001".into(),
        }],
        ..Model::default()
    }
}

fn take_location(effects: Vec<Effect>) -> Request<LocationOperation> {
    effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Location(request) => Some(request),
            _ => None,
        })
        .expect("expected a location request")
}

fn take_dispatch(effects: Vec<Effect>) -> Request<DispatchOperation> {
    effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Dispatch(request) => Some(request),
            _ => None,
        })
        .expect("expected a dispatch request")
}

fn feed_all(app: &AppTester<App, Effect>, events: Vec<Event>, model: &mut Model) -> Vec<Effect> {
    let mut effects = Vec::new();
    for event in events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

#[test]
fn request_shows_the_confirmation_prompt() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model_with_ada();

    let update = app.update(
        Event::TargetedSosRequested {
            id: ContactId::new("c1"),
        },
        &mut model,
    );

    assert!(matches!(model.sos, SosPhase::ConfirmingTargeted { .. }));
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Location(_))));

    let view = app.view(&model);
    let ViewState::ConfirmTargetedSos {
        contact_name,
        contact_phone,
        prompt,
    } = view.state
    else {
        panic!("expected the confirmation view, got {:?}", view.state);
    };
    assert_eq!(contact_name, "Ada");
    assert_eq!(contact_phone, "+15550001");
    assert!(prompt.contains("Ada"));
}

#[test]
fn decline_produces_no_location_or_dispatch_work() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model_with_ada();

    let first = app.update(
        Event::TargetedSosRequested {
            id: ContactId::new("c1"),
        },
        &mut model,
    );
    let second = app.update(Event::TargetedSosDeclined, &mut model);

    assert!(model.sos.is_idle());
    for effects in [first.effects, second.effects] {
        assert!(!effects.iter().any(|e| matches!(e, Effect::Location(_))));
        assert!(!effects.iter().any(|e| matches!(e, Effect::Dispatch(_))));
    }
}

#[test]
fn confirm_requests_a_bounded_fix_then_dispatches_sms_and_call() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model_with_ada();

    app.update(
        Event::TargetedSosRequested {
            id: ContactId::new("c1"),
        },
        &mut model,
    );
    let update = app.update(Event::TargetedSosConfirmed, &mut model);

    let mut location = take_location(update.effects);
    assert_eq!(
        location.operation,
        LocationOperation::GetCurrentPosition {
            timeout_ms: Some(10_000)
        }
    );

    let update = app
        .resolve(
            &mut location,
            Ok(LocationOutput::Position(Position {
                latitude: 51.5074,
                longitude: -0.1278,
                accuracy_m: None,
            })),
        )
        .expect("resolve location");
    let effects = feed_all(&app, update.events, &mut model);

    assert!(model.sos.is_idle());

    let mut dispatch = take_dispatch(effects);
    let DispatchOperation::SendSosAndCall { recipient, message } = &dispatch.operation else {
        panic!("expected an SMS-then-call dispatch, got {:?}", dispatch.operation);
    };
    assert_eq!(recipient, "+15550001");
    assert_eq!(
        message,
        &format!("{DEFAULT_SOS_MESSAGE}\nhttps://www.google.com/maps?q=51.5074,-0.1278")
    );

    let update = app
        .resolve(&mut dispatch, Ok(DispatchOutput::SosDelivered { call_chained: true }))
        .expect("resolve dispatch");
    feed_all(&app, update.events, &mut model);
    assert!(model.active_error.is_none());
}

#[test]
fn fix_timeout_warns_and_dispatches_the_fallback_text_once() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model_with_ada();

    app.update(
        Event::TargetedSosRequested {
            id: ContactId::new("c1"),
        },
        &mut model,
    );
    let update = app.update(Event::TargetedSosConfirmed, &mut model);
    let mut location = take_location(update.effects);

    let update = app
        .resolve(&mut location, Err(LocationError::Timeout))
        .expect("resolve location");
    let effects = feed_all(&app, update.events, &mut model);

    let toast = model.active_toast.as_ref().expect("expected a notice toast");
    assert_eq!(
        toast.message,
        "Could not get location. Preparing message without location."
    );
    assert_eq!(toast.kind, ToastKind::Warning);

    let dispatches: Vec<_> = effects
        .iter()
        .filter(|e| matches!(e, Effect::Dispatch(_)))
        .collect();
    assert_eq!(dispatches.len(), 1, "no retry on this path");

    let mut dispatch = take_dispatch(effects);
    let DispatchOperation::SendSosAndCall { message, .. } = &dispatch.operation else {
        panic!("expected an SMS-then-call dispatch");
    };
    assert_eq!(
        message,
        &format!("{DEFAULT_SOS_MESSAGE}\nLocation not available.")
    );

    let update = app
        .resolve(&mut dispatch, Ok(DispatchOutput::SosDelivered { call_chained: false }))
        .expect("resolve dispatch");
    feed_all(&app, update.events, &mut model);
    assert!(model.active_error.is_none());
}

#[test]
fn dispatch_failure_surfaces_a_visible_error() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model_with_ada();

    app.update(
        Event::TargetedSosRequested {
            id: ContactId::new("c1"),
        },
        &mut model,
    );
    let update = app.update(Event::TargetedSosConfirmed, &mut model);
    let mut location = take_location(update.effects);
    let update = app
        .resolve(&mut location, Err(LocationError::Timeout))
        .expect("resolve location");
    let effects = feed_all(&app, update.events, &mut model);

    let mut dispatch = take_dispatch(effects);
    let update = app
        .resolve(
            &mut dispatch,
            Err(shared::capabilities::DispatchError::CallFailed {
                reason: "no dialer".into(),
            }),
        )
        .expect("resolve dispatch");
    feed_all(&app, update.events, &mut model);

    let view = app.view(&model);
    let error = view.error.expect("expected a user-facing error");
    assert_eq!(error.code, "DISPATCH_ERROR");
    assert_eq!(error.message, "call failed: no dialer");
}

#[test]
fn unknown_contact_is_ignored() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model_with_ada();

    let update = app.update(
        Event::TargetedSosRequested {
            id: ContactId::new("missing"),
        },
        &mut model,
    );

    assert!(model.sos.is_idle());
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Location(_))));
}
