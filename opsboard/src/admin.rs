//! Score administration: leaderboard, manual override and full reset.

use mockable::Clock;
use opsboard_proto::event::Notification;
use opsboard_proto::operative::OperativeId;

use crate::dispatch::{Effects, Outcome};
use crate::error::CommandError;
use crate::lifecycle::MissionEngine;
use crate::model::{Operative, Requester};
use crate::policy::Policy;
use crate::ports::{OperativeStore, ResetScope, TaskStore};

impl<S, C> MissionEngine<S, C>
where
    S: TaskStore + OperativeStore,
    C: Clock + Send + Sync,
{
    /// Every operative, highest score first. Ties are ordered by id.
    ///
    /// # Errors
    ///
    /// [`CommandError::Store`] if the store query fails.
    pub async fn leaderboard(&self) -> Result<Vec<Operative>, CommandError> {
        let mut operatives = self.store().list_operatives().await?;
        operatives.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        Ok(operatives)
    }

    /// Sets one operative's score to an explicit value.
    ///
    /// # Errors
    ///
    /// [`CommandError::Forbidden`] unless the requester is the Chair;
    /// [`CommandError::NotFound`] if the operative does not exist.
    pub async fn override_score(
        &self,
        requester: &Requester,
        operative: &OperativeId,
        score: u32,
    ) -> Result<Operative, CommandError> {
        if !Policy::for_requester(requester).can_administer_scores() {
            return Err(CommandError::Forbidden(
                "only the Chair can change scores".to_string(),
            ));
        }
        let updated = self.store().set_score(operative, score).await?;
        tracing::info!(operative = %operative, score, by = %requester.id, "score overridden");
        Ok(updated)
    }

    /// Zeroes every operative's score, Chair included.
    ///
    /// # Errors
    ///
    /// [`CommandError::Forbidden`] unless the requester is the Chair.
    pub async fn reset_scores(&self, requester: &Requester) -> Result<Outcome<usize>, CommandError> {
        if !Policy::for_requester(requester).can_administer_scores() {
            return Err(CommandError::Forbidden(
                "only the Chair can reset scores".to_string(),
            ));
        }
        let affected = self.store().reset_scores(ResetScope::Everyone).await?;
        tracing::info!(affected, by = %requester.id, "all scores reset");
        Ok(Outcome::new(affected, scores_reset(affected)))
    }
}

pub(crate) fn scores_reset(affected: usize) -> Effects {
    let mut effects = Effects::new();
    effects.broadcast(Notification::ScoresReset {
        affected: u32::try_from(affected).unwrap_or(u32::MAX),
    });
    effects
}
