use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{HubConfig, UserId};

/// One row of a ranked leaderboard snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub display_name: String,
    /// Derived from weighted contribution counts, never mutated directly
    pub score: u64,
    /// 1-based, computed at snapshot time
    pub rank: usize,
}

#[derive(Debug, Clone)]
struct Contribution {
    display_name: String,
    messages: u64,
    votes: u64,
    attendance: u64,
    first_contribution_at: DateTime<Utc>,
}

/// Per-room contribution counts behind the leaderboard.
///
/// The ranking is a total order for any event history: score descending,
/// then earliest first contribution, then user id. The last key exists so
/// two users whose first contributions land on the same timestamp still
/// rank deterministically.
#[derive(Debug, Default)]
pub struct Scoreboard {
    contributions: HashMap<UserId, Contribution>,
}

impl Scoreboard {
    pub fn record_message(&mut self, user_id: &UserId, display_name: &str) {
        self.entry(user_id, display_name).messages += 1;
    }

    pub fn record_vote(&mut self, user_id: &UserId, display_name: &str) {
        self.entry(user_id, display_name).votes += 1;
    }

    pub fn record_attendance(&mut self, user_id: &UserId, display_name: &str) {
        self.entry(user_id, display_name).attendance += 1;
    }

    fn entry(&mut self, user_id: &UserId, display_name: &str) -> &mut Contribution {
        self.contributions
            .entry(user_id.clone())
            .or_insert_with(|| Contribution {
                display_name: display_name.to_string(),
                messages: 0,
                votes: 0,
                attendance: 0,
                first_contribution_at: Utc::now(),
            })
    }

    /// The ranked snapshot, sorted by the deterministic total order
    pub fn ranked(&self, config: &HubConfig) -> Vec<LeaderboardEntry> {
        let mut scored: Vec<_> = self
            .contributions
            .iter()
            .map(|(user_id, contribution)| {
                let score = contribution.messages * config.message_weight
                    + contribution.votes * config.vote_weight
                    + contribution.attendance * config.attendance_weight;

                (user_id, contribution, score)
            })
            .collect();

        scored.sort_by(|(a_id, a, a_score), (b_id, b, b_score)| {
            b_score
                .cmp(a_score)
                .then(a.first_contribution_at.cmp(&b.first_contribution_at))
                .then(a_id.cmp(b_id))
        });

        scored
            .into_iter()
            .enumerate()
            .map(|(index, (user_id, contribution, score))| LeaderboardEntry {
                user_id: user_id.clone(),
                display_name: contribution.display_name.clone(),
                score,
                rank: index + 1,
            })
            .collect()
    }

    /// The current top-ranked user, if anyone has contributed
    pub fn leader(&self, config: &HubConfig) -> Option<LeaderboardEntry> {
        self.ranked(config).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: u32) -> (UserId, String) {
        (format!("u{}", n), format!("User {}", n))
    }

    #[test]
    fn scores_weigh_contribution_kinds() {
        let config = HubConfig::default();
        let mut scoreboard = Scoreboard::default();

        let (a, a_name) = user(1);
        let (b, b_name) = user(2);

        scoreboard.record_message(&a, &a_name);
        scoreboard.record_message(&a, &a_name);
        scoreboard.record_vote(&b, &b_name);

        let ranked = scoreboard.ranked(&config);

        assert_eq!(ranked[0].user_id, b);
        assert_eq!(ranked[0].score, config.vote_weight);
        assert_eq!(ranked[1].user_id, a);
        assert_eq!(ranked[1].score, 2 * config.message_weight);
    }

    #[test]
    fn ranking_is_a_total_order() {
        let config = HubConfig::default();
        let mut scoreboard = Scoreboard::default();

        // Four users with identical scores still rank deterministically
        for n in [3, 1, 4, 2] {
            let (id, name) = user(n);
            scoreboard.record_message(&id, &name);
        }

        let first = scoreboard.ranked(&config);
        let second = scoreboard.ranked(&config);

        assert_eq!(first, second);

        let ranks: Vec<_> = first.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn ties_break_on_earliest_contribution() {
        let config = HubConfig::default();
        let mut scoreboard = Scoreboard::default();

        let (early, early_name) = user(9);
        let (late, late_name) = user(1);

        scoreboard.record_message(&early, &early_name);
        std::thread::sleep(std::time::Duration::from_millis(5));
        scoreboard.record_message(&late, &late_name);

        let ranked = scoreboard.ranked(&config);

        assert_eq!(ranked[0].user_id, early);
        assert_eq!(ranked[1].user_id, late);
    }

    #[test]
    fn the_leader_is_the_top_rank() {
        let config = HubConfig::default();
        let mut scoreboard = Scoreboard::default();

        assert!(scoreboard.leader(&config).is_none());

        let (a, a_name) = user(1);
        scoreboard.record_attendance(&a, &a_name);

        assert_eq!(scoreboard.leader(&config).unwrap().user_id, a);
    }
}
