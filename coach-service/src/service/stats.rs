//! Grade statistics over stored portfolios.

use std::str::FromStr;

use tracing::debug;

use super::CoachService;
use crate::db::Skill;
use crate::error::{ServiceError, ServiceResult, StatsError};
use crate::stats::{DateStats, GradeBuckets};

fn parse_skill(skill: &str) -> Result<Skill, StatsError> {
    Skill::from_str(&skill.trim().to_lowercase()).map_err(|_| StatsError::UnknownSkill {
        skill: skill.to_string(),
    })
}

impl CoachService {
    /// Per-date stats of one user's portfolio for a skill
    pub fn stats_for_user(&self, user_id: &str, skill: &str) -> ServiceResult<DateStats> {
        let skill = parse_skill(skill)?;
        let user = self
            .db
            .get_user(user_id)?
            .ok_or_else(|| ServiceError::UserNotFound {
                user_id: user_id.to_string(),
            })?;

        let mut buckets = GradeBuckets::new();
        buckets.add_portfolio(user.portfolio.get(skill))?;
        Ok(buckets.compute()?)
    }

    /// Per-date stats over every user's portfolio for a skill
    pub fn stats_for_class(&self, skill: &str) -> ServiceResult<DateStats> {
        let skill = parse_skill(skill)?;
        let users = self.db.list_users()?;

        let mut buckets = GradeBuckets::new();
        for user in &users {
            buckets.add_portfolio(user.portfolio.get(skill))?;
        }

        debug!(skill = %skill, users = users.len(), "Computed class stats");
        Ok(buckets.compute()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{GradingOutcome, UserData, Work};
    use crate::service::testing::Harness;

    fn user(id: &str, grades: &[(&str, f64)]) -> UserData {
        let mut user = UserData {
            id: id.to_string(),
            name: id.to_string(),
            handedness: Default::default(),
            folder_paths: Default::default(),
            portfolio: Default::default(),
            gpt_conversation_ids: Default::default(),
        };
        for (key, grade) in grades {
            user.portfolio.get_mut(Skill::Smash).insert(
                key.to_string(),
                Work {
                    date_time: key.to_string(),
                    thumbnail: String::new(),
                    video: String::new(),
                    comparison_video: String::new(),
                    reflection: String::new(),
                    preview_note: String::new(),
                    ai_note: String::new(),
                    grading_outcome: GradingOutcome {
                        grading_details: Vec::new(),
                        total_grade: *grade,
                    },
                },
            );
        }
        user
    }

    #[test]
    fn test_user_stats() {
        let h = Harness::new();
        h.db.put_user(&user(
            "U1",
            &[("2025-03-01-09-00", 10.0), ("2025-03-01-10-00", 20.0), ("2025-03-01-11-00", 30.0)],
        ))
        .unwrap();

        let stats = h.service.stats_for_user("U1", "smash").unwrap();
        let day = stats["2025-03-01"];
        assert_eq!(day.avg, 20.0);
        assert_eq!(day.min, 10.0);
        assert_eq!(day.max, 30.0);
        assert!((day.std - 8.1650).abs() < 1e-4);

        assert!(h.service.stats_for_user("U1", "serve").unwrap().is_empty());
    }

    #[test]
    fn test_skill_is_case_insensitive() {
        let h = Harness::new();
        h.db.put_user(&user("U1", &[("2025-03-01-09-00", 42.0)])).unwrap();

        let stats = h.service.stats_for_class(" Smash ").unwrap();
        assert_eq!(stats["2025-03-01"].max, 42.0);
        assert_eq!(h.service.stats_for_user("U1", "SMASH").unwrap(), stats);
    }

    #[test]
    fn test_unknown_skill_and_missing_user() {
        let h = Harness::new();
        assert!(matches!(
            h.service.stats_for_user("U1", "drop"),
            Err(ServiceError::Stats(StatsError::UnknownSkill { .. }))
        ));
        assert!(matches!(
            h.service.stats_for_user("nobody", "smash"),
            Err(ServiceError::UserNotFound { .. })
        ));
        assert!(h.service.stats_for_class("").is_err());
    }

    #[test]
    fn test_class_stats_merge_users_and_fail_on_bad_key() {
        let h = Harness::new();
        h.db.put_user(&user("U1", &[("2025-03-01-09-00", 40.0)])).unwrap();
        h.db.put_user(&user("U2", &[("2025-03-01-10-00", 60.0), ("2025-03-02-10-00", 90.0)]))
            .unwrap();

        let stats = h.service.stats_for_class("smash").unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["2025-03-01"].avg, 50.0);
        assert_eq!(stats["2025-03-02"].std, 0.0);

        h.db.put_user(&user("U3", &[("yesterday", 70.0)])).unwrap();
        assert!(matches!(
            h.service.stats_for_class("smash"),
            Err(ServiceError::Stats(StatsError::InvalidDateKey { .. }))
        ));
    }
}
