use std::collections::HashMap;

use crate::{util::Id, HubError, UserId};

pub type PollId = Id<PollState>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Open,
    Closed,
}

/// The single poll a room may be running.
///
/// The one-open-poll-per-room invariant is enforced by the room's
/// `create_poll`, not by convention: the active slot holds at most one of
/// these, and it is only ever in the `Open` phase while it sits there.
#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    pub id: PollId,
    pub question: String,
    /// Ordered and unique per poll
    pub options: Vec<String>,
    /// Option to vote count, every option present
    pub votes: HashMap<String, u64>,
    /// Which option each user voted for; at most one entry per user
    pub voters: HashMap<UserId, String>,
    pub phase: PollPhase,
}

impl PollState {
    /// Validates the question and options and opens a new poll
    pub fn open(question: String, options: Vec<String>) -> Result<Self, HubError> {
        let question = question.trim().to_string();

        if question.is_empty() {
            return Err(HubError::validation("question", "must not be empty"));
        }

        let options: Vec<String> = options
            .into_iter()
            .map(|option| option.trim().to_string())
            .collect();

        if options.len() < 2 {
            return Err(HubError::validation("options", "at least 2 are required"));
        }

        if options.iter().any(|option| option.is_empty()) {
            return Err(HubError::validation("options", "must not contain empty entries"));
        }

        for (index, option) in options.iter().enumerate() {
            if options[..index].contains(option) {
                return Err(HubError::validation(
                    "options",
                    format!("duplicate option {:?}", option),
                ));
            }
        }

        let votes = options.iter().map(|option| (option.clone(), 0)).collect();

        Ok(Self {
            id: PollId::new(),
            question,
            options,
            votes,
            voters: HashMap::new(),
            phase: PollPhase::Open,
        })
    }

    /// Counts a user's vote, at most once per user.
    ///
    /// A repeated vote is rejected and leaves the tally untouched.
    pub fn register_vote(&mut self, user_id: &UserId, option: &str) -> Result<(), HubError> {
        if !self.options.iter().any(|o| o == option) {
            return Err(HubError::validation(
                "option",
                format!("{:?} is not among this poll's options", option),
            ));
        }

        if self.voters.contains_key(user_id) {
            return Err(HubError::conflict(
                "vote",
                format!("user {} has already voted in this poll", user_id),
            ));
        }

        self.voters.insert(user_id.clone(), option.to_string());

        *self
            .votes
            .get_mut(option)
            .expect("every option has a tally entry") += 1;

        Ok(())
    }

    /// The tally in option order
    pub fn tally(&self) -> Vec<(String, u64)> {
        self.options
            .iter()
            .map(|option| (option.clone(), self.votes[option]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polls_need_a_question_and_two_distinct_options() {
        let no_question = PollState::open("  ".into(), vec!["A".into(), "B".into()]);
        assert!(no_question.is_err());

        let one_option = PollState::open("Q?".into(), vec!["A".into()]);
        assert!(one_option.is_err());

        let duplicates = PollState::open("Q?".into(), vec!["A".into(), "A ".into()]);
        assert!(duplicates.is_err());

        let blank_option = PollState::open("Q?".into(), vec!["A".into(), " ".into()]);
        assert!(blank_option.is_err());

        PollState::open("Q?".into(), vec!["A".into(), "B".into()]).unwrap();
    }

    #[test]
    fn every_option_starts_at_zero() {
        let poll = PollState::open("Q?".into(), vec!["A".into(), "B".into(), "C".into()]).unwrap();

        assert_eq!(
            poll.tally(),
            vec![
                ("A".to_string(), 0),
                ("B".to_string(), 0),
                ("C".to_string(), 0)
            ]
        );
    }

    #[test]
    fn votes_are_counted_once_per_user() {
        let mut poll = PollState::open("Q?".into(), vec!["A".into(), "B".into()]).unwrap();

        poll.register_vote(&"u1".to_string(), "A").unwrap();

        let unknown = poll.register_vote(&"u2".to_string(), "C");
        assert!(matches!(unknown, Err(HubError::Validation { .. })));

        let repeat = poll.register_vote(&"u1".to_string(), "B");
        assert!(matches!(repeat, Err(HubError::Conflict { .. })));

        assert_eq!(poll.tally(), vec![("A".to_string(), 1), ("B".to_string(), 0)]);
    }
}
