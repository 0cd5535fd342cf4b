use super::*;

#[tokio::test]
async fn publish_reaches_every_subscriber() {
    let topic: EventTopic<u32> = EventTopic::new("test", 16);
    let mut rx1 = topic.subscribe();
    let mut rx2 = topic.subscribe();

    assert_eq!(topic.publish(7), 2);
    assert_eq!(rx1.recv().await.unwrap(), 7);
    assert_eq!(rx2.recv().await.unwrap(), 7);
}

#[test]
fn publish_without_subscriber_is_dropped() {
    let topic: EventTopic<u32> = EventTopic::new("test", 16);

    assert_eq!(topic.subscriber_count(), 0);
    assert_eq!(topic.publish(1), 0);
}

#[tokio::test]
async fn cloned_topic_shares_subscribers() {
    let topic: EventTopic<&'static str> = EventTopic::new("test", 4);
    let publisher = topic.clone();
    let mut rx = topic.subscribe();

    publisher.publish("hello");

    assert_eq!(rx.recv().await.unwrap(), "hello");
    assert_eq!(publisher.name(), "test");
}
