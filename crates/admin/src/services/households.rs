//! Household enrollment, editing, views and comments.

use std::sync::Arc;

use chrono::{DateTime, Local};
use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

use foodbank_core::{CommentId, HouseholdId, SmsIntent, start_of_day};

use super::auth::AuthenticatedActor;
use super::sms_queue::SmsQueueService;
use super::validation::{check_verification, validate_comment, validate_household};
use crate::db::{
    CommentRepository, HouseholdRepository, ParcelRepository, VerificationQuestionRepository,
};
use crate::error::AppError;
use crate::github::GithubProfile;
use crate::models::{
    Comment, CommentView, Household, HouseholdDetail, HouseholdInput, HouseholdSummary, ParcelView,
};
use crate::state::AppState;

/// Household operations on behalf of a staff member.
pub struct HouseholdService<'a> {
    state: &'a AppState,
}

impl<'a> HouseholdService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> HouseholdRepository<'a> {
        HouseholdRepository::new(self.state.pool())
    }

    /// The household list, cached briefly.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    pub async fn list(
        &self,
        include_anonymized: bool,
        now: &DateTime<Local>,
    ) -> Result<Arc<Vec<HouseholdSummary>>, AppError> {
        let views = self.state.views();
        let today = now.date_naive();
        if let Some(list) = views.list(include_anonymized, today).await {
            return Ok(list);
        }

        let list = Arc::new(self.repo().list(include_anonymized, start_of_day(now)).await?);
        views
            .put_list(include_anonymized, today, Arc::clone(&list))
            .await;
        Ok(list)
    }

    /// Everything on the household page, cached briefly.
    ///
    /// `token` is the viewer's GitHub token, used to look up comment authors.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown household.
    #[instrument(skip(self, token, now))]
    pub async fn detail(
        &self,
        id: HouseholdId,
        token: Option<&SecretString>,
        now: &DateTime<Local>,
    ) -> Result<Arc<HouseholdDetail>, AppError> {
        let views = self.state.views();
        let today = now.date_naive();
        if let Some(detail) = views.detail(id, today).await {
            return Ok(detail);
        }

        let repo = self.repo();
        let household = repo.get(id).await?.ok_or(AppError::NotFound("Household"))?;

        let parcels = ParcelRepository::new(self.state.pool())
            .list_for_household(id)
            .await?
            .into_iter()
            .map(|(parcel, location_name)| ParcelView::new(parcel, location_name, now))
            .collect();

        let mut comments = Vec::new();
        for comment in CommentRepository::new(self.state.pool())
            .list_for_household(id)
            .await?
        {
            comments.push(self.comment_view(comment, token).await);
        }

        let detail = Arc::new(HouseholdDetail {
            members: repo.members(id).await?,
            pets: repo.pets(id).await?,
            dietary_restrictions: repo.dietary_restrictions(id).await?,
            additional_needs: repo.additional_needs(id).await?,
            household,
            parcels,
            comments,
        });
        views.put_detail(id, today, Arc::clone(&detail)).await;
        Ok(detail)
    }

    /// Attach the author's GitHub name and avatar when they can be found.
    async fn comment_view(&self, comment: Comment, token: Option<&SecretString>) -> CommentView {
        let profile = match comment.author.as_deref() {
            Some(login) => self.profile(login, token).await,
            None => None,
        };
        let mut view = CommentView::from(comment);
        if let Some(profile) = profile {
            view.author_name = profile.name;
            view.author_avatar_url = profile.avatar_url;
        }
        view
    }

    async fn profile(&self, login: &str, token: Option<&SecretString>) -> Option<GithubProfile> {
        let cache = self.state.profiles();
        if let Some(profile) = cache.get(login).await {
            return Some(profile);
        }

        match self.state.github().user_profile(login, token).await {
            Ok(profile) => {
                cache.insert(login.to_string(), profile.clone()).await;
                Some(profile)
            }
            Err(e) => {
                debug!(login, error = %e, "GitHub profile lookup failed");
                None
            }
        }
    }

    /// Enroll a new household.
    ///
    /// Every required verification question must be confirmed. A welcome
    /// SMS is queued when SMS is configured.
    ///
    /// # Errors
    ///
    /// Returns a validation error, `VERIFICATION_INCOMPLETE`, or a database
    /// error.
    #[instrument(skip_all, fields(actor = %actor.login))]
    pub async fn enroll(
        &self,
        input: &HouseholdInput,
        actor: &AuthenticatedActor,
        now: &DateTime<Local>,
    ) -> Result<Household, AppError> {
        let data = validate_household(input)?;
        let required = VerificationQuestionRepository::new(self.state.pool())
            .required_ids()
            .await?;
        check_verification(&required, &input.verified_question_ids)?;

        let household = self
            .repo()
            .create(HouseholdId::generate(), &data, Some(actor.login()))
            .await?;
        self.state.views().invalidate_lists().await;
        info!(household_id = %household.id, "Household enrolled");

        if let Some(sms) = self.state.sms() {
            let queue = SmsQueueService::new(self.state.pool().clone(), Some(sms.clone()));
            if let Err(e) = queue
                .enqueue(SmsIntent::Enrolment, household.id, None, now)
                .await
            {
                warn!(error = %e, "Failed to queue enrolment SMS");
            }
        }

        Ok(household)
    }

    /// Replace a household's details and composition.
    ///
    /// # Errors
    ///
    /// Returns a validation error, `NotFound`, or `ALREADY_ANONYMIZED`.
    #[instrument(skip(self, input, actor), fields(actor = %actor.login))]
    pub async fn update(
        &self,
        id: HouseholdId,
        input: &HouseholdInput,
        actor: &AuthenticatedActor,
    ) -> Result<Household, AppError> {
        let data = validate_household(input)?;
        let repo = self.repo();
        let Some(household) = repo.update(id, &data).await? else {
            return Err(match repo.get(id).await? {
                Some(_) => AppError::already_anonymized(),
                None => AppError::NotFound("Household"),
            });
        };

        self.state.views().invalidate_household(id).await;
        info!("Household updated");
        Ok(household)
    }

    /// Add a comment written by `actor`.
    ///
    /// # Errors
    ///
    /// Returns a validation error, `NotFound`, or `ALREADY_ANONYMIZED`.
    #[instrument(skip(self, text, actor), fields(actor = %actor.login))]
    pub async fn add_comment(
        &self,
        household_id: HouseholdId,
        text: &str,
        actor: &AuthenticatedActor,
    ) -> Result<Comment, AppError> {
        let text = validate_comment(text)?;
        let Some(comment) = CommentRepository::new(self.state.pool())
            .create(household_id, Some((actor.github_id, actor.login())), &text)
            .await?
        else {
            return Err(match self.repo().get(household_id).await? {
                Some(_) => AppError::already_anonymized(),
                None => AppError::NotFound("Household"),
            });
        };

        self.state.views().invalidate_household(household_id).await;
        Ok(comment)
    }

    /// Delete a comment. Only its author may do so.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    #[instrument(skip(self, actor), fields(actor = %actor.login))]
    pub async fn delete_comment(
        &self,
        id: CommentId,
        actor: &AuthenticatedActor,
    ) -> Result<(), AppError> {
        let repo = CommentRepository::new(self.state.pool());
        let comment = repo.get(id).await?.ok_or(AppError::NotFound("Comment"))?;

        if !comment.is_written_by(actor.github_id) {
            return Err(AppError::Forbidden(
                "Only the author can delete a comment".to_string(),
            ));
        }
        if !repo.delete_by_author(id, actor.github_id).await? {
            return Err(AppError::NotFound("Comment"));
        }

        self.state
            .views()
            .invalidate_household(comment.household_id)
            .await;
        Ok(())
    }
}

