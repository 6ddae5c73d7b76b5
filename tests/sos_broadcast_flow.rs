use crux_core::testing::AppTester;
use crux_core::Request;

use shared::capabilities::{
    DispatchOperation, DispatchOutput, LocationError, LocationOperation, LocationOutput,
    PermissionState, Position, TimerOperation, TimerOutcome,
};
use shared::{
    App, AppState, Contact, ContactId, Effect, Event, Model, SosPhase, ToastKind,
    DEFAULT_SOS_MESSAGE, SOS_COUNTDOWN_SECONDS,
};

fn ready_model(contacts: Vec<Contact>) -> Model {
    Model {
        state: AppState::Ready,
        location_permission: PermissionState::Granted,
        contacts,
        ..Model::default()
    }
}

fn contact(id: &str, name: &str, phone: &str) -> Contact {
    Contact {
        id: ContactId::new(id),
        name: name.into(),
        phone: phone.into(),
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

fn take_timer(effects: Vec<Effect>) -> Request<TimerOperation> {
    effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Timer(request) => Some(request),
            _ => None,
        })
        .expect("expected a timer request")
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
fn happy_path_sends_one_sms_to_all_contacts_in_order() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model(vec![
        contact("c1", "Ada", "+15550001"),
        contact("c2", "Grace", "+15550002"),
    ]);

    let update = app.update(Event::SosActivated, &mut model);
    assert!(matches!(model.sos, SosPhase::AwaitingLocation { .. }));

    // The broadcast path asks for a fix without a deadline.
    let mut location = take_location(update.effects);
    assert_eq!(
        location.operation,
        LocationOperation::GetCurrentPosition { timeout_ms: None }
    );

    let update = app
        .resolve(
            &mut location,
            Ok(LocationOutput::Position(Position {
                latitude: 12.9716,
                longitude: 77.5946,
                accuracy_m: Some(5.0),
            })),
        )
        .expect("resolve location");
    let effects = feed_all(&app, update.events, &mut model);

    let SosPhase::CountingDown(session) = &model.sos else {
        panic!("expected a running countdown, got {:?}", model.sos);
    };
    assert_eq!(session.remaining_seconds, SOS_COUNTDOWN_SECONDS);
    assert_eq!(session.recipients, "+15550001,+15550002");
    assert_eq!(
        session.message,
        format!("{DEFAULT_SOS_MESSAGE}\nhttps://www.google.com/maps?q=12.9716,77.5946")
    );

    // Run the countdown to zero, one scheduled tick at a time.
    let mut effects = effects;
    for expected_remaining in (0..SOS_COUNTDOWN_SECONDS).rev() {
        let mut tick = take_timer(effects);
        assert!(matches!(
            tick.operation,
            TimerOperation::Start { millis: 1_000, .. }
        ));
        let update = app.resolve(&mut tick, TimerOutcome::Fired).expect("resolve tick");
        effects = feed_all(&app, update.events, &mut model);

        if expected_remaining > 0 {
            let SosPhase::CountingDown(session) = &model.sos else {
                panic!("countdown ended early");
            };
            assert_eq!(session.remaining_seconds, expected_remaining);
        }
    }

    assert!(matches!(model.sos, SosPhase::Dispatching { .. }));

    let mut dispatch = take_dispatch(effects);
    let DispatchOperation::SendSms { recipients, message } = &dispatch.operation else {
        panic!("expected an SMS dispatch, got {:?}", dispatch.operation);
    };
    assert_eq!(recipients, &["+15550001".to_string(), "+15550002".to_string()]);
    assert!(message.ends_with("https://www.google.com/maps?q=12.9716,77.5946"));

    let update = app
        .resolve(&mut dispatch, Ok(DispatchOutput::SmsSent))
        .expect("resolve dispatch");
    let effects = feed_all(&app, update.events, &mut model);

    let toast = model.active_toast.as_ref().expect("expected a success toast");
    assert_eq!(toast.message, "SOS message sent successfully!");
    assert_eq!(toast.kind, ToastKind::Success);

    // Short linger, then back to idle.
    let mut reset = take_timer(effects);
    assert!(matches!(
        reset.operation,
        TimerOperation::Start { millis: 500, .. }
    ));
    let update = app.resolve(&mut reset, TimerOutcome::Fired).expect("resolve reset");
    feed_all(&app, update.events, &mut model);

    assert!(model.sos.is_idle());
}

#[test]
fn cancel_during_countdown_aborts_without_dispatch() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model(vec![contact("c1", "Ada", "+15550001")]);

    let update = app.update(Event::SosActivated, &mut model);
    let mut location = take_location(update.effects);
    let update = app
        .resolve(&mut location, Err(LocationError::Unavailable { reason: "gps off".into() }))
        .expect("resolve location");
    let effects = feed_all(&app, update.events, &mut model);
    let mut tick = take_timer(effects);

    // Two ticks elapse, then the user cancels.
    for _ in 0..2 {
        let update = app.resolve(&mut tick, TimerOutcome::Fired).expect("resolve tick");
        let effects = feed_all(&app, update.events, &mut model);
        tick = take_timer(effects);
    }

    let update = app.update(Event::SosCancelRequested, &mut model);
    assert!(model.sos.is_idle());
    assert!(update.effects.iter().any(|e| matches!(
        e,
        Effect::Timer(request)
            if matches!(request.operation, TimerOperation::Cancel { .. })
    )));
    assert!(!update
        .effects
        .iter()
        .any(|e| matches!(e, Effect::Dispatch(_))));

    // A tick already in flight when the cancel landed must be ignored.
    let update = app.resolve(&mut tick, TimerOutcome::Cancelled).expect("resolve tick");
    let effects = feed_all(&app, update.events, &mut model);
    assert!(model.sos.is_idle());
    assert!(!effects.iter().any(|e| matches!(e, Effect::Dispatch(_))));
}

#[test]
fn trigger_with_no_contacts_is_ignored() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model(Vec::new());

    let update = app.update(Event::SosActivated, &mut model);

    assert!(model.sos.is_idle());
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Location(_))));
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Dispatch(_))));
}

#[test]
fn retrigger_while_in_flight_is_ignored() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model(vec![contact("c1", "Ada", "+15550001")]);

    let update = app.update(Event::SosActivated, &mut model);
    let _location = take_location(update.effects);

    let update = app.update(Event::SosActivated, &mut model);
    assert!(matches!(model.sos, SosPhase::AwaitingLocation { .. }));
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Location(_))));
}

#[test]
fn location_failure_degrades_to_the_fallback_sentence() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model(vec![contact("c1", "Ada", "+15550001")]);

    let update = app.update(Event::SosActivated, &mut model);
    let mut location = take_location(update.effects);
    let update = app
        .resolve(&mut location, Err(LocationError::Unavailable { reason: "gps off".into() }))
        .expect("resolve location");
    feed_all(&app, update.events, &mut model);

    let SosPhase::CountingDown(session) = &model.sos else {
        panic!("expected the countdown to run despite the failed fix");
    };
    assert_eq!(
        session.message,
        format!("{DEFAULT_SOS_MESSAGE}\nLocation services failed.")
    );
}

#[test]
fn shake_sample_above_threshold_triggers_the_broadcast_path() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model(vec![contact("c1", "Ada", "+15550001")]);
    model.detector.start();
    model.monitoring_armed = true;

    let update = app.update(
        Event::MotionSample {
            x: Some(30.0),
            y: Some(0.0),
            z: Some(0.0),
        },
        &mut model,
    );

    assert!(matches!(model.sos, SosPhase::AwaitingLocation { .. }));
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Location(_))));
}

#[test]
fn gentle_sample_does_not_trigger() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model(vec![contact("c1", "Ada", "+15550001")]);
    model.detector.start();
    model.monitoring_armed = true;

    let update = app.update(
        Event::MotionSample {
            x: Some(1.0),
            y: Some(2.0),
            z: Some(9.8),
        },
        &mut model,
    );

    assert!(model.sos.is_idle());
    assert!(update.effects.is_empty());
}

#[test]
fn sms_failure_surfaces_an_error_and_still_resets() {
    let app = AppTester::<App, Effect>::default();
    let mut model = ready_model(vec![contact("c1", "Ada", "+15550001")]);

    let update = app.update(Event::SosActivated, &mut model);
    let mut location = take_location(update.effects);
    let update = app
        .resolve(&mut location, Err(LocationError::Timeout))
        .expect("resolve location");
    let mut effects = feed_all(&app, update.events, &mut model);

    for _ in 0..SOS_COUNTDOWN_SECONDS {
        let mut tick = take_timer(effects);
        let update = app.resolve(&mut tick, TimerOutcome::Fired).expect("resolve tick");
        effects = feed_all(&app, update.events, &mut model);
    }

    let mut dispatch = take_dispatch(effects);
    let update = app
        .resolve(
            &mut dispatch,
            Err(shared::capabilities::DispatchError::SmsFailed {
                reason: "radio off".into(),
            }),
        )
        .expect("resolve dispatch");
    let effects = feed_all(&app, update.events, &mut model);

    let error = model.active_error.as_ref().expect("expected a dispatch error");
    assert_eq!(
        error.user_facing_message(),
        "Failed to send SMS: SMS send failed: radio off"
    );

    let mut reset = take_timer(effects);
    let update = app.resolve(&mut reset, TimerOutcome::Fired).expect("resolve reset");
    feed_all(&app, update.events, &mut model);
    assert!(model.sos.is_idle());
}
