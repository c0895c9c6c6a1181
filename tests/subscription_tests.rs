use notification_service::models::{
    notification_type::{NotificationType, NotificationTypeEvent},
    subscriber::{Channel, SubscriberChannel},
    subscription::SubscriptionCriteria,
    template::Template,
};
use serde_json::json;

use crate::common::{email_subscriber, form_submitted, subscription, tenant_id};

/// Test: No event means nothing is sent
#[test]
fn test_should_send_requires_event() {
    let subscription = subscription(email_subscriber("s1"), None);

    assert!(!subscription.should_send(None));
    assert!(subscription.should_send(Some(&form_submitted())));
}

/// Test: Correlation id criteria must match exactly
#[test]
fn test_correlation_id_criteria() {
    let subscription = subscription(
        email_subscriber("s1"),
        Some(SubscriptionCriteria::correlated("form-123")),
    );

    assert!(!subscription.should_send(Some(&form_submitted())));
    assert!(!subscription.should_send(Some(&form_submitted().with_correlation_id("form-999"))));
    assert!(subscription.should_send(Some(&form_submitted().with_correlation_id("form-123"))));
}

/// Test: Every context criterion must equal the event's value
#[test]
fn test_context_criteria() {
    let criteria = SubscriptionCriteria::default()
        .with_context("formDefinitionId", json!("benefits"))
        .with_context("priority", json!(2));
    let subscription = subscription(email_subscriber("s1"), Some(criteria));

    let matching = form_submitted()
        .with_context("formDefinitionId", json!("benefits"))
        .with_context("priority", json!(2))
        .with_context("extra", json!(true));
    let partial = form_submitted().with_context("formDefinitionId", json!("benefits"));
    let different = form_submitted()
        .with_context("formDefinitionId", json!("benefits"))
        .with_context("priority", json!("2"));

    assert!(subscription.should_send(Some(&matching)));
    assert!(!subscription.should_send(Some(&partial)));
    assert!(!subscription.should_send(Some(&different)));
}

/// Test: Numeric context criteria match by value across integer and float
#[test]
fn test_numeric_context_criteria_match_by_value() {
    let criteria = SubscriptionCriteria::default().with_context("priority", json!(1));
    let subscription = subscription(email_subscriber("s1"), Some(criteria));

    let float = form_submitted().with_context("priority", json!(1.0));
    let other = form_submitted().with_context("priority", json!(1.5));
    let text = form_submitted().with_context("priority", json!("1"));

    assert!(subscription.should_send(Some(&float)));
    assert!(!subscription.should_send(Some(&other)));
    assert!(!subscription.should_send(Some(&text)));
}

/// Test: Empty context criteria match any event
#[test]
fn test_empty_context_criteria_match() {
    let criteria = SubscriptionCriteria {
        correlation_id: None,
        context: Some(Default::default()),
    };
    let subscription = subscription(email_subscriber("s1"), Some(criteria));

    assert!(subscription.should_send(Some(&form_submitted())));
}

fn multi_channel_type() -> (NotificationType, NotificationTypeEvent) {
    let event = NotificationTypeEvent::new("form-service", "form-submitted")
        .with_template(Channel::Email, Template::new("Email", "Email body"))
        .with_template(Channel::Sms, Template::new("SMS", "SMS body"));

    let notification_type = NotificationType::builder("form-status-updates", "Form status updates")
        .tenant_id(tenant_id())
        .channel(Channel::Email)
        .channel(Channel::Sms)
        .event(event.clone())
        .build()
        .unwrap();

    (notification_type, event)
}

/// Test: The subscriber's channel order decides the channel
#[test]
fn test_channel_resolution_follows_subscriber_preference() {
    let (notification_type, event) = multi_channel_type();

    let mut subscriber = email_subscriber("s1");
    subscriber.channels = vec![
        SubscriberChannel::verified(Channel::Sms, "+15555550100"),
        SubscriberChannel::verified(Channel::Email, "s1@example.com"),
    ];
    let sms_first = subscription(subscriber.clone(), None);

    subscriber.channels.reverse();
    let email_first = subscription(subscriber, None);

    assert_eq!(
        sms_first
            .get_subscriber_channel(&notification_type, &event)
            .map(|c| c.channel),
        Some(Channel::Sms)
    );
    assert_eq!(
        email_first
            .get_subscriber_channel(&notification_type, &event)
            .map(|c| c.channel),
        Some(Channel::Email)
    );
}

/// Test: Unverified and disallowed channels are passed over
#[test]
fn test_channel_resolution_skips_unusable_channels() {
    let (notification_type, event) = multi_channel_type();

    let mut subscriber = email_subscriber("s1");
    subscriber.channels = vec![
        SubscriberChannel::verified(Channel::Slack, "@s1"),
        SubscriberChannel::unverified(Channel::Sms, "+15555550100"),
        SubscriberChannel::verified(Channel::Email, "s1@example.com"),
    ];
    let resolved = subscription(subscriber.clone(), None);

    let channel = resolved
        .get_subscriber_channel(&notification_type, &event)
        .unwrap();
    assert_eq!(channel.channel, Channel::Email);
    assert_eq!(channel.address, "s1@example.com");

    subscriber.channels.truncate(2);
    let unresolved = subscription(subscriber, None);
    assert!(
        unresolved
            .get_subscriber_channel(&notification_type, &event)
            .is_none()
    );
}
