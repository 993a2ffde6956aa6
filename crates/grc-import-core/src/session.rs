//! One import, from loaded candidates through review to commit.
//!
//! ```text
//! Idle --load--> Parsed --> Valid | ParsedWithErrors --commit--> Committing --> Done | Error
//! ```
//!
//! Edits during review revalidate and move between `Valid` and
//! `ParsedWithErrors`. A failed commit leaves the session in `Error`, from
//! which it can be edited again or reset. `reset` returns to `Idle` from any
//! state.

use std::fmt;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    domain::{
        DryRunSummary, FrameworkRecord, FrameworkRow, PreviewRow, RequirementCandidate,
        RequirementRecord, Strictness,
    },
    importer::{FrameworkEntry, Loaded},
    link::{self, EntityKind},
    reconcile::{CommitError, CommitPlan, CommitProgress, CommitReport, Committer},
    store::Store,
    validate::{preview_frameworks, preview_requirements},
};

/// Lifecycle state of an [`ImportSession`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing loaded.
    #[default]
    Idle,
    /// Input loaded, not yet validated.
    Parsed,
    /// Every included row is valid.
    Valid,
    /// Some included rows are invalid.
    ParsedWithErrors,
    /// A commit is running.
    Committing,
    /// The last commit finished.
    Done,
    /// The last commit failed.
    Error,
}

impl SessionState {
    const fn is_reviewable(self) -> bool {
        matches!(self, Self::Valid | Self::ParsedWithErrors | Self::Error)
    }

    const fn is_committable(self) -> bool {
        matches!(self, Self::Valid | Self::ParsedWithErrors)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Parsed => "parsed",
            Self::Valid => "valid",
            Self::ParsedWithErrors => "parsed with errors",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Error => "in error",
        })
    }
}

/// Errors raised by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation is not allowed in the current state.
    #[error("Cannot {action} while the session is {state}")]
    InvalidState {
        /// The attempted operation.
        action: &'static str,
        /// The current state.
        state: SessionState,
    },

    /// The input produced nothing to import.
    #[error("Nothing to import: the source produced no frameworks or requirements")]
    NothingToImport,

    /// No candidate exists at the index.
    #[error("No candidate at index {0}")]
    NoSuchCandidate(usize),

    /// Validation errors block an all-or-nothing commit.
    #[error("Commit blocked: {invalid} row(s) failed validation")]
    Blocked {
        /// Number of invalid rows.
        invalid: usize,
    },

    /// Nothing valid is left to commit.
    #[error("Nothing to commit: no included row passed validation")]
    NothingToCommit,

    /// The commit failed.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// Validation result for one included candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementPreview {
    /// Position of the candidate in the session.
    pub index: usize,
    /// The validation result.
    #[serde(flatten)]
    pub row: PreviewRow<RequirementRecord>,
}

/// Dry-run view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPreview {
    /// One entry per framework.
    pub frameworks: Vec<PreviewRow<FrameworkRecord>>,
    /// One entry per included candidate.
    pub requirements: Vec<RequirementPreview>,
    /// Counts of both.
    pub summary: DryRunSummary,
}

/// One import in progress.
#[derive(Debug, Clone, Default)]
pub struct ImportSession {
    state: SessionState,
    strictness: Strictness,
    frameworks: Vec<FrameworkEntry>,
    candidates: Vec<RequirementCandidate>,
    title: Option<String>,
    report: Option<CommitReport>,
    last_error: Option<String>,
}

impl ImportSession {
    /// Creates an idle session.
    #[must_use]
    pub fn new(strictness: Strictness) -> Self {
        Self {
            strictness,
            ..Self::default()
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// How invalid rows and commit failures are handled.
    #[must_use]
    pub const fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Frameworks staged for writing.
    #[must_use]
    pub fn frameworks(&self) -> &[FrameworkEntry] {
        &self.frameworks
    }

    /// All candidates, included or not.
    #[must_use]
    pub fn candidates(&self) -> &[RequirementCandidate] {
        &self.candidates
    }

    /// Best-effort title of the loaded source.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Report of the last successful commit.
    #[must_use]
    pub const fn report(&self) -> Option<&CommitReport> {
        self.report.as_ref()
    }

    /// Message of the last failed commit.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Loads input into an idle session and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is idle, and
    /// [`SessionError::NothingToImport`] for empty input.
    pub fn load(&mut self, loaded: Loaded) -> Result<SessionState, SessionError> {
        self.require(SessionState::Idle, "load a source")?;
        if loaded.frameworks.is_empty() && loaded.candidates.is_empty() {
            return Err(SessionError::NothingToImport);
        }

        self.frameworks = loaded.frameworks;
        self.candidates = loaded.candidates;
        self.title = loaded.title;
        self.state = SessionState::Parsed;
        tracing::debug!(
            frameworks = self.frameworks.len(),
            candidates = self.candidates.len(),
            "session loaded"
        );
        Ok(self.revalidate())
    }

    /// Returns to `Idle`, discarding everything but the strictness.
    pub fn reset(&mut self) {
        *self = Self::new(self.strictness);
    }

    /// Edits one candidate and revalidates.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] outside review and
    /// [`SessionError::NoSuchCandidate`] for a bad index.
    pub fn edit<F>(&mut self, index: usize, edit: F) -> Result<SessionState, SessionError>
    where
        F: FnOnce(&mut RequirementCandidate),
    {
        self.require_reviewable("edit candidates")?;
        let candidate = self
            .candidates
            .get_mut(index)
            .ok_or(SessionError::NoSuchCandidate(index))?;
        edit(candidate);
        Ok(self.revalidate())
    }

    /// Edits one framework row and revalidates.
    ///
    /// # Errors
    ///
    /// See [`ImportSession::edit`].
    pub fn edit_framework<F>(&mut self, index: usize, edit: F) -> Result<SessionState, SessionError>
    where
        F: FnOnce(&mut FrameworkRow),
    {
        self.require_reviewable("edit frameworks")?;
        let entry = self
            .frameworks
            .get_mut(index)
            .ok_or(SessionError::NoSuchCandidate(index))?;
        edit(&mut entry.row);
        Ok(self.revalidate())
    }

    /// Includes or excludes one candidate.
    ///
    /// # Errors
    ///
    /// See [`ImportSession::edit`].
    pub fn set_include(&mut self, index: usize, include: bool) -> Result<SessionState, SessionError> {
        self.edit(index, |candidate| candidate.include = include)
    }

    /// Sets or clears one link of a candidate.
    ///
    /// # Errors
    ///
    /// See [`ImportSession::edit`].
    pub fn link(
        &mut self,
        index: usize,
        kind: EntityKind,
        target: Option<Uuid>,
    ) -> Result<SessionState, SessionError> {
        self.edit(index, |candidate| link::set_link(candidate, kind, target))
    }

    /// Links a newly created target to the first included candidate without
    /// a link of that kind, then revalidates.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] outside review.
    pub fn attach(&mut self, kind: EntityKind, target: Uuid) -> Result<Option<usize>, SessionError> {
        self.require_reviewable("link candidates")?;
        let attached = link::attach_to_first_unlinked(&mut self.candidates, kind, target);
        self.revalidate();
        Ok(attached)
    }

    /// Validates frameworks and included candidates.
    #[must_use]
    pub fn preview(&self) -> SessionPreview {
        let frameworks = preview_frameworks(
            &self
                .frameworks
                .iter()
                .map(|entry| entry.row.clone())
                .collect::<Vec<_>>(),
        );

        let included: Vec<usize> = self
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.include)
            .map(|(index, _)| index)
            .collect();
        let rows = preview_requirements(included.iter().map(|&index| &self.candidates[index]));
        let requirements: Vec<RequirementPreview> = included
            .into_iter()
            .zip(rows)
            .map(|(index, row)| RequirementPreview { index, row })
            .collect();

        let requirement_rows: Vec<_> = requirements.iter().map(|preview| preview.row.clone()).collect();
        let summary = DryRunSummary::from_previews(&frameworks, &requirement_rows);

        SessionPreview {
            frameworks,
            requirements,
            summary,
        }
    }

    /// Ok/error counts of the current preview.
    #[must_use]
    pub fn summary(&self) -> DryRunSummary {
        self.preview().summary
    }

    /// Whether [`ImportSession::commit`] would start.
    #[must_use]
    pub fn can_commit(&self) -> bool {
        self.state.is_committable() && self.commit_blocker(&self.preview()).is_none()
    }

    /// The writes a commit would perform.
    #[must_use]
    pub fn plan(&self) -> CommitPlan {
        self.plan_from(&self.preview())
    }

    fn plan_from(&self, preview: &SessionPreview) -> CommitPlan {
        let mut plan = CommitPlan::default();
        for (entry, row) in self.frameworks.iter().zip(&preview.frameworks) {
            if let Some(record) = row.data() {
                plan.stage_framework(record.clone(), entry.sections.clone());
            }
        }
        for requirement in &preview.requirements {
            if let Some(record) = requirement.row.data() {
                plan.stage_requirement(
                    requirement.index,
                    record.clone(),
                    &self.candidates[requirement.index],
                );
            }
        }
        plan
    }

    fn commit_blocker(&self, preview: &SessionPreview) -> Option<SessionError> {
        let summary = preview.summary;
        if self.strictness == Strictness::AllOrNothing && summary.has_errors() {
            return Some(SessionError::Blocked {
                invalid: summary.framework_err + summary.req_err,
            });
        }
        if summary.framework_ok + summary.req_ok == 0 {
            return Some(SessionError::NothingToCommit);
        }
        None
    }

    /// Commits the valid, included rows.
    ///
    /// # Errors
    ///
    /// See [`ImportSession::commit_with_progress`].
    pub async fn commit<S: Store + ?Sized>(
        &mut self,
        store: &S,
        cancel: CancellationToken,
    ) -> Result<&CommitReport, SessionError> {
        self.commit_with_progress(store, cancel, |_| {}).await
    }

    /// Commits the valid, included rows, reporting progress per row.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] outside review,
    /// [`SessionError::Blocked`] when an all-or-nothing import has invalid
    /// rows, [`SessionError::NothingToCommit`] when no row is valid, and
    /// [`SessionError::Commit`] when the commit fails; the session is then
    /// in `Error`.
    pub async fn commit_with_progress<S, F>(
        &mut self,
        store: &S,
        cancel: CancellationToken,
        on_progress: F,
    ) -> Result<&CommitReport, SessionError>
    where
        S: Store + ?Sized,
        F: FnMut(CommitProgress) + Send,
    {
        if !self.state.is_committable() {
            return Err(SessionError::InvalidState {
                action: "commit",
                state: self.state,
            });
        }
        let preview = self.preview();
        if let Some(blocker) = self.commit_blocker(&preview) {
            return Err(blocker);
        }

        let plan = self.plan_from(&preview);
        self.state = SessionState::Committing;
        let outcome = Committer::new(store, self.strictness)
            .with_cancellation(cancel)
            .commit_with_progress(&plan, on_progress)
            .await;

        match outcome {
            Ok(report) => {
                self.state = SessionState::Done;
                self.last_error = None;
                Ok(&*self.report.insert(report))
            }
            Err(error) => {
                tracing::error!(%error, "commit failed");
                self.state = SessionState::Error;
                self.last_error = Some(error.to_string());
                Err(error.into())
            }
        }
    }

    fn revalidate(&mut self) -> SessionState {
        self.state = if self.preview().summary.has_errors() {
            SessionState::ParsedWithErrors
        } else {
            SessionState::Valid
        };
        self.state
    }

    fn require(&self, expected: SessionState, action: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    const fn require_reviewable(&self, action: &'static str) -> Result<(), SessionError> {
        if self.state.is_reviewable() {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                action,
                state: self.state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    use super::{ImportSession, SessionError, SessionState};
    use crate::{
        domain::{FrameworkRow, RequirementCandidate, Strictness},
        importer::Loaded,
        link::EntityKind,
        store::{MemoryStore, Table},
    };

    fn loaded(candidates: Vec<RequirementCandidate>) -> Loaded {
        let mut loaded = Loaded {
            candidates,
            ..Loaded::default()
        };
        loaded.assign_framework(FrameworkRow::new("KVKK", "Data Protection Law"));
        loaded
    }

    #[test]
    fn load_moves_to_valid_or_errors() {
        let mut valid = ImportSession::new(Strictness::BestEffort);
        let mut invalid = ImportSession::new(Strictness::BestEffort);

        valid
            .load(loaded(vec![RequirementCandidate::new("A", "T", "X")]))
            .unwrap();
        invalid
            .load(loaded(vec![RequirementCandidate::new("A", "", "X")]))
            .unwrap();

        assert_eq!(valid.state(), SessionState::Valid);
        assert_eq!(invalid.state(), SessionState::ParsedWithErrors);
    }

    #[test]
    fn empty_input_stays_idle() {
        let mut session = ImportSession::new(Strictness::BestEffort);
        assert!(matches!(
            session.load(Loaded::default()),
            Err(SessionError::NothingToImport)
        ));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn excluding_the_invalid_row_makes_the_session_valid() {
        let mut session = ImportSession::new(Strictness::AllOrNothing);
        session
            .load(loaded(vec![
                RequirementCandidate::new("A", "T", "X"),
                RequirementCandidate::new("B", "", "X"),
            ]))
            .unwrap();
        assert!(!session.can_commit());

        let state = session.set_include(1, false).unwrap();

        assert_eq!(state, SessionState::Valid);
        assert!(session.can_commit());
        assert_eq!(session.summary().req_ok, 1);
        assert_eq!(session.preview().requirements.len(), 1);
    }

    #[test]
    fn edits_are_rejected_before_load() {
        let mut session = ImportSession::new(Strictness::BestEffort);
        assert!(matches!(
            session.set_include(0, false),
            Err(SessionError::InvalidState { state: SessionState::Idle, .. })
        ));
    }

    #[test]
    fn bad_index_is_reported() {
        let mut session = ImportSession::new(Strictness::BestEffort);
        session
            .load(loaded(vec![RequirementCandidate::new("A", "T", "X")]))
            .unwrap();
        assert!(matches!(
            session.link(3, EntityKind::Risk, Some(Uuid::new_v4())),
            Err(SessionError::NoSuchCandidate(3))
        ));
    }

    #[tokio::test]
    async fn strict_session_with_errors_is_blocked() {
        let store = MemoryStore::new();
        let mut session = ImportSession::new(Strictness::AllOrNothing);
        session
            .load(loaded(vec![RequirementCandidate::new("A", "", "X")]))
            .unwrap();

        let error = session
            .commit(&store, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, SessionError::Blocked { invalid: 1 }));
        assert_eq!(session.state(), SessionState::ParsedWithErrors);
        assert!(store.rows(Table::Frameworks).is_empty());
    }

    #[tokio::test]
    async fn lenient_commit_skips_invalid_rows_and_finishes() {
        let store = MemoryStore::new();
        let mut session = ImportSession::new(Strictness::BestEffort);
        session
            .load(loaded(vec![
                RequirementCandidate::new("MADDE 1", "MADDE 1: Amaç", "MADDE 1 – Amaç"),
                RequirementCandidate::new("MADDE 2", "", "MADDE 2 –"),
            ]))
            .unwrap();
        let risk = Uuid::new_v4();
        assert_eq!(session.attach(EntityKind::Risk, risk).unwrap(), Some(0));

        let report = session
            .commit(&store, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.requirements.len(), 1);
        assert_eq!(report.mappings, 1);
        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(store.rows(Table::RequirementMappings)[0]["risk_id"], risk.to_string());
    }

    #[tokio::test]
    async fn failed_commit_can_be_edited_or_reset() {
        let store = MemoryStore::new();
        let mut session = ImportSession::new(Strictness::AllOrNothing);
        let mut input = Loaded {
            candidates: vec![RequirementCandidate {
                framework_code: Some("ABSENT".into()),
                ..RequirementCandidate::new("A", "T", "X")
            }],
            ..Loaded::default()
        };
        input.title = Some("Law".into());
        session.load(input).unwrap();

        let error = session.commit(&store, CancellationToken::new()).await;

        assert!(matches!(error, Err(SessionError::Commit(_))));
        assert_eq!(session.state(), SessionState::Error);
        assert!(session.last_error().unwrap().contains("ABSENT"));

        let state = session
            .edit(0, |candidate| candidate.include = false)
            .unwrap();
        assert_eq!(state, SessionState::Valid);

        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.candidates().is_empty());
        assert_eq!(session.strictness(), Strictness::AllOrNothing);
    }

    #[tokio::test]
    async fn attaching_after_a_failed_commit_leaves_the_error_state() {
        let store = MemoryStore::new();
        let mut session = ImportSession::new(Strictness::AllOrNothing);
        session
            .load(Loaded {
                candidates: vec![RequirementCandidate {
                    framework_code: Some("ABSENT".into()),
                    ..RequirementCandidate::new("A", "T", "X")
                }],
                ..Loaded::default()
            })
            .unwrap();
        assert!(session.commit(&store, CancellationToken::new()).await.is_err());
        assert_eq!(session.state(), SessionState::Error);

        let attached = session.attach(EntityKind::Risk, Uuid::new_v4()).unwrap();

        assert_eq!(attached, Some(0));
        assert_eq!(session.state(), SessionState::Valid);
    }
}
