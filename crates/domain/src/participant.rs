use crate::{Estimation, Message, MessageBody, ParticipantInfo, Role};

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Pending messages of one participant.
#[derive(Debug)]
pub(crate) struct Inbox {
    messages: VecDeque<Message>,
    last_message_id: u64,
    notifier: watch::Sender<Option<Message>>,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        Self::restore(Vec::new(), 0)
    }

    pub(crate) fn restore(messages: Vec<Message>, last_message_id: u64) -> Self {
        let last_message_id = messages
            .iter()
            .map(|message| message.id)
            .fold(last_message_id, u64::max);

        Self {
            messages: messages.into(),
            last_message_id,
            notifier: watch::channel(None).0,
        }
    }

    pub(crate) fn push(&mut self, body: MessageBody) {
        self.last_message_id += 1;
        let message = Message {
            id: self.last_message_id,
            body,
        };
        self.messages.push_back(message.clone());
        self.notifier.send_replace(Some(message));
    }
}

/// A member or observer of a team.
///
/// Participants only exist inside a [`ScrumTeam`](crate::ScrumTeam), which
/// creates and destroys them.
#[derive(Debug)]
pub struct Participant {
    name: String,
    role: Role,
    estimation: Option<Estimation>,
    last_activity: DateTime<Utc>,
    dormant: bool,
    inbox: Inbox,
}

impl Participant {
    pub(crate) fn new(name: String, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            name,
            role,
            estimation: None,
            last_activity: now,
            dormant: false,
            inbox: Inbox::new(),
        }
    }

    pub(crate) fn restore(
        name: String,
        role: Role,
        estimation: Option<Estimation>,
        last_activity: DateTime<Utc>,
        dormant: bool,
        inbox: Inbox,
    ) -> Self {
        Self {
            name,
            role,
            estimation,
            last_activity,
            dormant,
            inbox,
        }
    }

    /// The participant's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The participant's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// A payload reference to this participant.
    #[must_use]
    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo::new(self.name.clone(), self.role)
    }

    /// The current vote. Always `None` for observers.
    #[must_use]
    pub const fn estimation(&self) -> Option<Estimation> {
        self.estimation
    }

    /// When the participant was last active.
    #[must_use]
    pub const fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Whether the participant is a scrum master that disconnected without
    /// giving up the team.
    #[must_use]
    pub const fn is_dormant(&self) -> bool {
        self.dormant
    }

    /// Whether there are undelivered messages.
    #[must_use]
    pub fn has_message(&self) -> bool {
        !self.inbox.messages.is_empty()
    }

    /// The undelivered messages, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.inbox.messages.iter()
    }

    /// The id of the most recently queued message.
    #[must_use]
    pub const fn last_message_id(&self) -> u64 {
        self.inbox.last_message_id
    }

    /// Watches the most recently queued message.
    ///
    /// The current value is marked as seen, so `changed()` resolves on the
    /// next message only.
    #[must_use]
    pub fn subscribe_messages(&self) -> watch::Receiver<Option<Message>> {
        self.inbox.notifier.subscribe()
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        crate::names_equal(&self.name, name)
    }

    pub(crate) fn send(&mut self, body: MessageBody) {
        self.inbox.push(body);
    }

    pub(crate) fn pop_message(&mut self) -> Option<Message> {
        self.inbox.messages.pop_front()
    }

    pub(crate) fn take_messages(&mut self) -> Vec<Message> {
        self.inbox.messages.drain(..).collect()
    }

    pub(crate) fn set_estimation(&mut self, estimation: Option<Estimation>) {
        self.estimation = estimation;
    }

    pub(crate) fn set_last_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub(crate) fn set_dormant(&mut self, dormant: bool) {
        self.dormant = dormant;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_increase_per_participant() {
        let mut participant = Participant::new("Alice".to_string(), Role::Member, Utc::now());

        participant.send(MessageBody::EstimationStarted);
        participant.send(MessageBody::EstimationCanceled);

        let ids: Vec<u64> = participant.messages().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert_eq!(participant.pop_message().map(|m| m.id), Some(1));
        participant.send(MessageBody::TimerCanceled);
        assert_eq!(participant.last_message_id(), 3);
    }

    #[test]
    fn test_subscription_sees_next_message() {
        let mut participant = Participant::new("Alice".to_string(), Role::Observer, Utc::now());
        participant.send(MessageBody::EstimationStarted);

        let mut receiver = participant.subscribe_messages();
        assert!(!receiver.has_changed().unwrap());

        participant.send(MessageBody::EstimationCanceled);
        assert!(receiver.has_changed().unwrap());
        assert_eq!(
            receiver.borrow_and_update().as_ref().map(|m| m.id),
            Some(2)
        );
    }

    #[test]
    fn test_restored_inbox_continues_numbering() {
        let inbox = Inbox::restore(
            vec![Message {
                id: 41,
                body: MessageBody::Empty,
            }],
            12,
        );
        let mut participant =
            Participant::restore("Bob".to_string(), Role::Member, None, Utc::now(), false, inbox);

        participant.send(MessageBody::TimerCanceled);
        assert_eq!(participant.last_message_id(), 42);
    }
}
