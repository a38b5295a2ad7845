//! First-contact setup of users and sessions.

use bytes::Bytes;
use strum::IntoEnumIterator;
use tracing::info;

use super::CoachService;
use super::fanout::fan_out;
use crate::db::{ConversationIds, FolderPaths, Handedness, Portfolios, Skill, UserData, UserSession};
use crate::error::{ServiceError, ServiceResult};

const PLACEHOLDER_NAME: &str = ".folder_placeholder";

impl CoachService {
    /// Load the user, onboarding them if this is their first contact
    pub async fn ensure_user(&self, user_id: &str) -> ServiceResult<UserData> {
        match self.db.get_user(user_id)? {
            Some(user) => Ok(user),
            None => self.onboard(user_id).await,
        }
    }

    /// Load the session, creating an idle one if missing
    pub fn ensure_session(&self, user_id: &str) -> ServiceResult<UserSession> {
        if let Some(session) = self.db.get_session(user_id)? {
            return Ok(session);
        }
        let session = UserSession::default();
        self.db.put_session(user_id, &session)?;
        Ok(session)
    }

    async fn onboard(&self, user_id: &str) -> ServiceResult<UserData> {
        let name = self.platform.profile_name(user_id).await?;

        let folder_paths = FolderPaths {
            root: user_id.to_string(),
            serve: format!("{}/{}", user_id, Skill::Serve),
            smash: format!("{}/{}", user_id, Skill::Smash),
            clear: format!("{}/{}", user_id, Skill::Clear),
            thumbnail: format!("{}/thumbnail", user_id),
        };

        let placeholders = [
            &folder_paths.serve,
            &folder_paths.smash,
            &folder_paths.clear,
            &folder_paths.thumbnail,
        ]
        .into_iter()
        .map(|prefix| {
            let blobs = self.blobs.clone();
            let path = format!("{}/{}", prefix, PLACEHOLDER_NAME);
            async move {
                blobs
                    .put(&path, Bytes::new())
                    .await
                    .map_err(ServiceError::from)
            }
        })
        .collect();
        fan_out(placeholders).await?;

        let conversations = Skill::iter()
            .map(|skill| {
                let ai = self.ai.clone();
                async move { ai.create_conversation().await.map(|id| (skill, id)) }
            })
            .collect();
        let mut gpt_conversation_ids = ConversationIds::default();
        for (skill, id) in fan_out(conversations).await? {
            gpt_conversation_ids.set(skill, id);
        }

        let user = UserData {
            id: user_id.to_string(),
            name,
            handedness: Handedness::Right,
            folder_paths,
            portfolio: Portfolios::default(),
            gpt_conversation_ids,
        };
        self.db.put_user(&user)?;

        info!(user_id = %user_id, name = %user.name, "Onboarded new user");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::service::testing::{FakeAi, Harness, HarnessOptions, USER_ID, blob};

    #[tokio::test]
    async fn test_onboarding_creates_user_conversations_and_placeholders() {
        let h = Harness::new();

        let user = h.service.ensure_user(USER_ID).await.unwrap();

        assert_eq!(user.name, "Amy");
        assert_eq!(user.handedness, Handedness::Right);
        assert_eq!(user.folder_paths.smash, "U1234/smash");
        assert_eq!(h.ai.created.load(Ordering::SeqCst), 3);
        for skill in Skill::iter() {
            assert!(user.gpt_conversation_ids.get(skill).is_some());
        }
        assert!(blob(&h.blobs, "U1234/thumbnail/.folder_placeholder").await.is_some());
        assert!(blob(&h.blobs, "U1234/clear/.folder_placeholder").await.is_some());
        assert_eq!(h.db.get_user(USER_ID).unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_existing_user_is_not_onboarded_again() {
        let h = Harness::new();
        h.service.ensure_user(USER_ID).await.unwrap();
        h.service.ensure_user(USER_ID).await.unwrap();

        assert_eq!(h.ai.created.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_conversation_failure_aborts_onboarding() {
        let h = Harness::with(HarnessOptions {
            ai: FakeAi {
                fail: true,
                ..FakeAi::default()
            },
            ..HarnessOptions::default()
        });

        assert!(h.service.ensure_user(USER_ID).await.is_err());
        assert!(h.db.get_user(USER_ID).unwrap().is_none());
    }

    #[test]
    fn test_ensure_session_creates_idle_session() {
        let h = Harness::new();
        let session = h.service.ensure_session(USER_ID).unwrap();

        assert!(session.is_reset());
        assert_eq!(h.db.get_session(USER_ID).unwrap(), Some(session));
    }
}
