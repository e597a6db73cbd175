use std::time::Duration;

use super::*;

const P1: PresentationId = PresentationId(1);
const P2: PresentationId = PresentationId(2);

async fn recv_within(subscription: &mut RegisterSubscription) -> Option<RegisterChange> {
    tokio::time::timeout(Duration::from_millis(200), subscription.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn other_processes_observe_writes() {
    let hub = LoopbackHub::new();
    let control = hub.attach("control");
    let output = hub.attach("output");

    let mut sub = output.subscribe(P1, RegisterKey::Control);
    control
        .write(P1, RegisterKey::Control, "{\"slideIndex\":3}".into())
        .await
        .expect("write");

    let change = recv_within(&mut sub).await.expect("change delivered");
    assert_eq!(change.origin, "control");
    assert_eq!(change.payload, "{\"slideIndex\":3}");
    assert_eq!(
        output.read(P1, RegisterKey::Control).await.expect("read"),
        Some("{\"slideIndex\":3}".to_string())
    );
}

#[tokio::test]
async fn writer_does_not_observe_its_own_write() {
    let hub = LoopbackHub::new();
    let control = hub.attach("control");
    let mut own = control.subscribe(P1, RegisterKey::Rotation);

    control
        .write(P1, RegisterKey::Rotation, "{}".into())
        .await
        .expect("write");

    assert!(recv_within(&mut own).await.is_none());
    assert_eq!(
        control.read(P1, RegisterKey::Rotation).await.expect("read"),
        Some("{}".to_string())
    );
}

#[tokio::test]
async fn subscriptions_are_scoped_by_presentation_and_key() {
    let hub = LoopbackHub::new();
    let control = hub.attach("control");
    let presenter = hub.attach("presenter");
    let mut sub = presenter.subscribe(P1, RegisterKey::Control);

    control
        .write(P2, RegisterKey::Control, "other".into())
        .await
        .expect("write");
    control
        .write(P1, RegisterKey::Rotation, "rotation".into())
        .await
        .expect("write");
    control
        .write(P1, RegisterKey::Control, "mine".into())
        .await
        .expect("write");

    let change = recv_within(&mut sub).await.expect("change");
    assert_eq!(change.payload, "mine");
    assert!(recv_within(&mut sub).await.is_none());
}

#[tokio::test]
async fn last_write_wins() {
    let hub = LoopbackHub::new();
    let a = hub.attach("a");
    let b = hub.attach("b");

    a.write(P1, RegisterKey::Control, "first".into())
        .await
        .expect("write");
    b.write(P1, RegisterKey::Control, "second".into())
        .await
        .expect("write");

    assert_eq!(
        a.read(P1, RegisterKey::Control).await.expect("read"),
        Some("second".to_string())
    );
}

#[test]
fn register_keys_round_trip_through_names() {
    for key in RegisterKey::ALL {
        assert_eq!(RegisterKey::parse(key.as_str()), Some(key));
    }
    assert_eq!(RegisterKey::parse("slides"), None);
}
