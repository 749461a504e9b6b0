use crate::{Error, Estimation, EstimationResultItem, ParticipantInfo};

/// Votes of one round of estimation, keyed by member name.
///
/// The key set is fixed when the round starts. Once every member still in the
/// team has voted the result is frozen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EstimationResult {
    entries: Vec<(ParticipantInfo, Option<Estimation>)>,
    read_only: bool,
}

impl EstimationResult {
    /// Creates an empty result for the given members.
    pub fn new<I>(members: I) -> Self
    where
        I: IntoIterator<Item = ParticipantInfo>,
    {
        Self {
            entries: members.into_iter().map(|member| (member, None)).collect(),
            read_only: false,
        }
    }

    pub(crate) const fn restore(
        entries: Vec<(ParticipantInfo, Option<Estimation>)>,
        read_only: bool,
    ) -> Self {
        Self { entries, read_only }
    }

    /// Whether the member was asked to vote in this round.
    #[must_use]
    pub fn contains_member(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// The member's vote, `None` if the member is unknown or has not voted.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Estimation> {
        self.position(name).and_then(|index| self.entries[index].1)
    }

    /// Records a member's vote.
    ///
    /// # Errors
    /// Fails if the result is read-only or the member is not part of it.
    pub fn set(&mut self, name: &str, estimation: Option<Estimation>) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::EstimationResultReadOnly);
        }

        let index = self
            .position(name)
            .ok_or_else(|| Error::MemberNotFound(name.to_string()))?;
        self.entries[index].1 = estimation;
        Ok(())
    }

    /// Whether the result has been frozen.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) const fn set_read_only(&mut self) {
        self.read_only = true;
    }

    /// Number of members in the result.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no member was asked to vote.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The members and their votes, in the order they were listed when the
    /// round started.
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantInfo, Option<Estimation>)> {
        self.entries.iter().map(|(member, estimation)| (member, *estimation))
    }

    /// The result as message payload.
    #[must_use]
    pub fn items(&self) -> Vec<EstimationResultItem> {
        self.entries
            .iter()
            .map(|(member, estimation)| EstimationResultItem {
                member: member.clone(),
                estimation: *estimation,
            })
            .collect()
    }

    /// Whether nobody in `current_members` still owes a vote.
    ///
    /// Members that left the team do not block completion.
    pub(crate) fn is_complete<'a, I>(&self, current_members: I) -> bool
    where
        I: Iterator<Item = &'a str> + Clone,
    {
        self.entries.iter().all(|(member, estimation)| {
            estimation.is_some()
                || !current_members
                    .clone()
                    .any(|name| crate::names_equal(name, &member.name))
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(member, _)| crate::names_equal(&member.name, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    use assert_matches::assert_matches;

    fn result() -> EstimationResult {
        EstimationResult::new([
            ParticipantInfo::new("Alice", Role::ScrumMaster),
            ParticipantInfo::new("Bob", Role::Member),
        ])
    }

    #[test]
    fn test_votes_are_looked_up_case_insensitively() {
        let mut result = result();
        let five = Estimation::new(5.0).unwrap();

        result.set("BOB", Some(five)).unwrap();

        assert_eq!(result.get("bob"), Some(five));
        assert_eq!(result.get("Alice"), None);
        assert!(result.contains_member("alice"));
        assert!(!result.contains_member("Carol"));
    }

    #[test]
    fn test_unknown_member_is_rejected() {
        let mut result = result();

        assert_matches!(
            result.set("Carol", None),
            Err(Error::MemberNotFound(name)) if name == "Carol"
        );
    }

    #[test]
    fn test_read_only_result_rejects_votes() {
        let mut result = result();
        result.set_read_only();

        assert_matches!(
            result.set("Bob", Some(Estimation::question_mark())),
            Err(Error::EstimationResultReadOnly)
        );
    }

    #[test]
    fn test_departed_members_do_not_block_completion() {
        let mut result = result();
        result.set("Alice", Some(Estimation::infinity())).unwrap();

        assert!(!result.is_complete(["Alice", "Bob"].into_iter()));
        assert!(result.is_complete(["Alice"].into_iter()));
    }

    #[test]
    fn test_items_keep_member_order() {
        let items = result().items();

        let names: Vec<&str> = items.iter().map(|item| item.member.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert!(items.iter().all(|item| item.estimation.is_none()));
    }
}
