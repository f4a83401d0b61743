//! The members module wired into a real registry over the in-memory store.

use chrono::NaiveDate;
use members::{Birthday, Gender, MemberEvent, MembersModule, Portrait};
use modulith_core::event::PendingEvent;
use modulith_core::module::{App, Registry};
use modulith_core::stream::{Sequence, StreamId};
use modulith_memory::MemoryEventStore;
use modulith_web::WebHandler;
use std::sync::Arc;
use uuid::Uuid;

#[allow(clippy::expect_used)] // Panics: Test will fail if wiring fails
fn boot() -> (MembersModule, App<WebHandler>) {
    let mut registry: Registry<WebHandler> = Registry::new(Arc::new(MemoryEventStore::new()));
    let module = MembersModule::new(registry.bus());
    registry
        .register(&module)
        .expect("registration should succeed");
    (module, registry.build())
}

fn approved(member_id: Uuid, name: &str, gender: Gender, birth_year: i32) -> MemberEvent {
    #[allow(clippy::expect_used)] // Panics: Test will fail on an invalid date
    let birthday = Birthday::new(NaiveDate::from_ymd_opt(birth_year, 3, 1).expect("valid date"));
    MemberEvent::RegistrationApproved {
        registration_id: Uuid::new_v4(),
        member_id,
        name: name.to_string(),
        gender,
        birthday,
        email: format!("{name}@example.com"),
        portrait: Portrait::default_for(gender),
    }
}

#[allow(clippy::expect_used)] // Panics: Test will fail if the publish fails
async fn publish(app: &App<WebHandler>, event: &MemberEvent, stream: Uuid) {
    let pending = PendingEvent::from_event(event, StreamId::from_uuid(stream))
        .expect("serialization should succeed");
    let receipt = app.bus.publish(pending).await.expect("publish should succeed");
    assert!(receipt.is_clean());
}

#[tokio::test]
async fn approvals_and_flirts_build_the_view() {
    let (module, app) = boot();
    let bob = Uuid::new_v4();
    let nancy = Uuid::new_v4();

    publish(&app, &approved(bob, "bob", Gender::Male, 2000), bob).await;
    publish(&app, &approved(nancy, "nancy", Gender::Female, 2001), nancy).await;
    publish(
        &app,
        &MemberEvent::FlirtSent {
            flirt_id: Uuid::new_v4(),
            from: nancy,
            to: bob,
        },
        nancy,
    )
    .await;

    let view = module.snapshot();
    assert_eq!(view.member_count(), 2);
    assert_eq!(view.flirts_between(&nancy, &bob), 1);
    assert_eq!(view.flirts_between(&bob, &nancy), 0);
}

#[tokio::test]
#[allow(clippy::expect_used)] // Panics: Test will fail if the replay fails
async fn replay_after_reset_rebuilds_the_identical_view() {
    let (module, app) = boot();
    let bob = Uuid::new_v4();
    let nancy = Uuid::new_v4();

    publish(&app, &approved(bob, "bob", Gender::Male, 2000), bob).await;
    publish(&app, &approved(nancy, "nancy", Gender::Female, 2001), nancy).await;
    publish(
        &app,
        &MemberEvent::FlirtSent {
            flirt_id: Uuid::new_v4(),
            from: nancy,
            to: bob,
        },
        nancy,
    )
    .await;
    let before = module.snapshot();

    app.resets.reset_all();
    assert!(module.snapshot().is_empty());

    let failures = app.bus.replay().await.expect("replay should succeed");
    assert!(failures.is_empty());
    assert_eq!(module.snapshot(), before);
}

#[tokio::test]
#[allow(clippy::expect_used)] // Panics: Test will fail if the read fails
async fn reset_wipes_the_view_but_never_the_log() {
    let (module, app) = boot();
    let bob = Uuid::new_v4();

    publish(&app, &approved(bob, "bob", Gender::Male, 2000), bob).await;
    app.resets.reset_all();

    assert!(module.snapshot().is_empty());
    let records = app
        .bus
        .store()
        .read_from(Sequence::new(1))
        .await
        .expect("read should succeed");
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn redelivery_during_replay_is_idempotent() {
    let (module, app) = boot();
    let bob = Uuid::new_v4();
    let nancy = Uuid::new_v4();

    publish(&app, &approved(bob, "bob", Gender::Male, 2000), bob).await;
    publish(
        &app,
        &MemberEvent::FlirtSent {
            flirt_id: Uuid::new_v4(),
            from: nancy,
            to: bob,
        },
        nancy,
    )
    .await;
    let after_publish = module.snapshot();

    // Replay without resetting: every record is delivered a second time.
    #[allow(clippy::expect_used)] // Panics: Test will fail if the replay fails
    let failures = app.bus.replay().await.expect("replay should succeed");
    assert!(failures.is_empty());
    assert_eq!(module.snapshot(), after_publish);
}
