use crate::application::services::projection_view::ProjectionView;
use crate::application::services::reconciler::{ReconcileOutcome, Reconciler};
use crate::domain::entities::film::FIELD_NOTE;
use crate::domain::entities::{FeaturedFilm, FilmRef, MemberRole};
use crate::domain::value_objects::{ClubId, Collection, OwnerRef, RecordId};
use crate::shared::{AppError, ValidationFailureKind};
use serde_json::Value;
use tracing::debug;

pub const FEATURED_TABLE: &str = "club_featured_films";

/// Featured films shown on a club page. Only owners and admins edit them.
pub struct FeaturedFilmService {
    club: ClubId,
    editor: OwnerRef,
    role: MemberRole,
    view: ProjectionView,
    reconciler: Reconciler,
}

impl FeaturedFilmService {
    pub fn new(
        club: ClubId,
        editor: OwnerRef,
        role: MemberRole,
        view: ProjectionView,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            club,
            editor,
            role,
            view,
            reconciler,
        }
    }

    pub fn collection(club: &ClubId) -> Collection {
        Collection::scoped(FEATURED_TABLE, club)
    }

    pub fn view(&self) -> &ProjectionView {
        &self.view
    }

    pub async fn feature_film(
        &self,
        film: FilmRef,
        note: Option<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.ensure_editor()?;
        film.validate()
            .map_err(|message| AppError::validation(ValidationFailureKind::Generic, message))?;

        let mut payload = film.to_payload();
        if let Some(note) = note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            payload.insert(FIELD_NOTE, Value::String(note.to_string()));
        }

        let outcome = self
            .reconciler
            .submit(&self.view, &self.editor, payload, Some(film.title.clone()))
            .await?;
        debug!(club = %self.club, film_id = %film.film_id, "Featured film submitted");
        Ok(outcome)
    }

    pub async fn unfeature_film(&self, id: &RecordId) -> Result<(), AppError> {
        self.ensure_editor()?;
        self.reconciler.delete(&self.view, id).await
    }

    pub async fn films(&self) -> Vec<FeaturedFilm> {
        self.view.render(|record| FeaturedFilm::from(record)).await
    }

    pub async fn refresh(&self) -> Result<usize, AppError> {
        let since = self.view.read().await.revision();
        let rows = self
            .reconciler
            .remote()
            .list(self.view.collection())
            .await?;
        let count = rows.len();
        self.view
            .mutate(|store| store.reset_with(rows, since))
            .await;
        Ok(count)
    }

    fn ensure_editor(&self) -> Result<(), AppError> {
        if self.role.can_edit_club_metadata() {
            return Ok(());
        }
        Err(AppError::validation(
            ValidationFailureKind::PermissionDenied,
            "Only club owners and admins can change featured films.",
        ))
    }
}
