//! Committing validated rows to a [`Store`].
//!
//! Writes happen in dependency order: frameworks, then their sections, then
//! requirements, then requirement mappings. Every write is keyed so that
//! committing the same plan twice leaves the store unchanged:
//!
//! - frameworks are looked up by case-insensitive code and updated or
//!   inserted;
//! - sections upsert on `(framework_id, code)`;
//! - requirements upsert on `(framework_id, requirement_code)`;
//! - mappings upsert on `(requirement_id, control_id)` or
//!   `(requirement_id, risk_id)`.
//!
//! Mapping failures never fail the requirement they belong to; they are
//! collected in the [`CommitReport`].

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    domain::{
        Framework, FrameworkRecord, RequirementCandidate, RequirementRecord, Strictness,
        framework::{SectionRow, normalize_code},
    },
    link::EntityKind,
    store::{Query, Store, StoreError, Table, from_row, row_id},
};

const SECTION_KEY: [&str; 2] = ["framework_id", "code"];
const REQUIREMENT_KEY: [&str; 2] = ["framework_id", "requirement_code"];

/// A validated framework and the sections to create under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFramework {
    /// The framework.
    pub record: FrameworkRecord,
    /// Its sections.
    pub sections: Vec<SectionRow>,
}

/// A validated requirement and where it belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRequirement {
    /// Position of the source candidate, for reporting.
    pub index: usize,
    /// The requirement.
    pub record: RequirementRecord,
    /// Owning framework by id; preferred over `framework_code`.
    pub framework_id: Option<Uuid>,
    /// Owning framework by code.
    pub framework_code: Option<String>,
    /// Control to map to.
    pub linked_control_id: Option<Uuid>,
    /// Risk to map to.
    pub linked_risk_id: Option<Uuid>,
}

/// Everything a commit will write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPlan {
    /// Frameworks, written first.
    pub frameworks: Vec<StagedFramework>,
    /// Requirements, written after every framework.
    pub requirements: Vec<StagedRequirement>,
}

impl CommitPlan {
    /// Stages a framework with its sections.
    pub fn stage_framework(&mut self, record: FrameworkRecord, sections: Vec<SectionRow>) {
        self.frameworks.push(StagedFramework { record, sections });
    }

    /// Stages a validated requirement, taking ownership and links from its
    /// candidate.
    pub fn stage_requirement(
        &mut self,
        index: usize,
        record: RequirementRecord,
        candidate: &RequirementCandidate,
    ) {
        self.requirements.push(StagedRequirement {
            index,
            record,
            framework_id: candidate.framework_id,
            framework_code: candidate.framework_code.clone(),
            linked_control_id: candidate.linked_control_id,
            linked_risk_id: candidate.linked_risk_id,
        });
    }

    /// Whether there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty() && self.requirements.is_empty()
    }

    fn len(&self) -> usize {
        self.frameworks.len() + self.requirements.len()
    }
}

/// A framework written by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedFramework {
    /// Framework code.
    pub code: String,
    /// Stored id.
    pub id: Uuid,
    /// Whether the framework was created rather than updated.
    pub created: bool,
}

/// A requirement written by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedRequirement {
    /// Position of the source candidate.
    pub index: usize,
    /// Requirement code.
    pub requirement_code: String,
    /// Stored id.
    pub id: Uuid,
}

/// A row that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    /// Position of the source candidate; `None` for framework rows.
    pub index: Option<usize>,
    /// Code of the failed row.
    pub code: String,
    /// What went wrong.
    pub message: String,
}

/// A mapping that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingFailure {
    /// Requirement the mapping belongs to.
    pub requirement_code: String,
    /// Kind of mapping target.
    pub kind: EntityKind,
    /// Mapping target.
    pub target_id: Uuid,
    /// What went wrong.
    pub message: String,
}

/// Outcome of a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    /// Frameworks written.
    pub frameworks: Vec<CommittedFramework>,
    /// Number of sections written.
    pub sections: usize,
    /// Requirements written.
    pub requirements: Vec<CommittedRequirement>,
    /// Number of mappings written.
    pub mappings: usize,
    /// Rows that failed (best-effort commits only).
    pub failures: Vec<RowFailure>,
    /// Mappings that failed.
    pub mapping_failures: Vec<MappingFailure>,
}

impl CommitReport {
    /// Whether every staged row and mapping was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.mapping_failures.is_empty()
    }
}

/// Errors that abort a commit.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// A requirement's framework could not be found.
    #[error("Cannot resolve framework '{reference}' for requirement {requirement_code}")]
    UnresolvedFramework {
        /// The requirement.
        requirement_code: String,
        /// The framework code or id that was looked up.
        reference: String,
    },

    /// A store operation failed.
    #[error("{context}: {source}")]
    Store {
        /// What was being written.
        context: String,
        /// Underlying error.
        #[source]
        source: StoreError,
    },

    /// The commit was cancelled between rows.
    #[error("Import cancelled after {completed} of {total} rows")]
    Cancelled {
        /// Rows handled before cancellation.
        completed: usize,
        /// Rows staged.
        total: usize,
    },
}

impl CommitError {
    fn store(context: impl Into<String>) -> impl FnOnce(StoreError) -> Self {
        let context = context.into();
        move |source| Self::Store { context, source }
    }
}

/// Commit progress, reported after each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitProgress {
    /// Rows handled so far.
    pub done: usize,
    /// Rows staged.
    pub total: usize,
}

/// Whether a framework was found or created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameworkOutcome {
    /// Stored id.
    pub id: Uuid,
    /// Whether it was created by this call.
    pub created: bool,
}

/// Looks up a framework by case-insensitive, normalized code.
///
/// # Errors
///
/// Returns the store's error, or [`StoreError::MalformedRow`] if the stored
/// row cannot be read.
pub async fn find_framework<S: Store + ?Sized>(
    store: &S,
    code: &str,
) -> Result<Option<Framework>, StoreError> {
    let query = Query::new()
        .eq_ignore_case("code", &normalize_code(code))
        .limit(1);
    store
        .select(Table::Frameworks, &query)
        .await?
        .into_iter()
        .next()
        .map(|row| from_row(Table::Frameworks, row))
        .transpose()
}

/// Updates the framework with the record's code, or inserts it.
///
/// An update overwrites the name and only those optional fields the record
/// supplies.
///
/// # Errors
///
/// Returns the store's error.
pub async fn ensure_framework<S: Store + ?Sized>(
    store: &S,
    record: &FrameworkRecord,
) -> Result<FrameworkOutcome, StoreError> {
    if let Some(existing) = find_framework(store, record.code.as_str()).await? {
        store
            .update(
                Table::Frameworks,
                &Query::new().eq("id", existing.id.to_string()),
                record.to_update_row(),
            )
            .await?;
        return Ok(FrameworkOutcome {
            id: existing.id,
            created: false,
        });
    }

    let stored = store
        .insert(Table::Frameworks, record.to_insert_row())
        .await?;
    Ok(FrameworkOutcome {
        id: row_id(Table::Frameworks, &stored)?,
        created: true,
    })
}

fn framework_key(code: &str) -> String {
    normalize_code(code).to_lowercase()
}

/// Writes a [`CommitPlan`] to a store.
pub struct Committer<'a, S: Store + ?Sized> {
    store: &'a S,
    strictness: Strictness,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Resolved {
    frameworks: HashMap<String, Uuid>,
    sections: HashMap<(Uuid, String), Option<Uuid>>,
}

impl<'a, S: Store + ?Sized> Committer<'a, S> {
    /// Creates a committer.
    #[must_use]
    pub fn new(store: &'a S, strictness: Strictness) -> Self {
        Self {
            store,
            strictness,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops the commit at the next row boundary once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Commits a plan.
    ///
    /// # Errors
    ///
    /// See [`Committer::commit_with_progress`].
    pub async fn commit(&self, plan: &CommitPlan) -> Result<CommitReport, CommitError> {
        self.commit_with_progress(plan, |_| {}).await
    }

    /// Commits a plan, calling `on_progress` after each framework and
    /// requirement.
    ///
    /// Rows already written stay written when the commit stops early.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::Cancelled`] when cancelled. Under
    /// [`Strictness::AllOrNothing`] the first row error is returned; under
    /// [`Strictness::BestEffort`] row errors are collected in the report.
    #[tracing::instrument(
        skip_all,
        fields(frameworks = plan.frameworks.len(), requirements = plan.requirements.len())
    )]
    pub async fn commit_with_progress<F>(
        &self,
        plan: &CommitPlan,
        mut on_progress: F,
    ) -> Result<CommitReport, CommitError>
    where
        F: FnMut(CommitProgress) + Send,
    {
        let total = plan.len();
        let mut done = 0;
        let mut report = CommitReport::default();
        let mut resolved = Resolved::default();

        for staged in &plan.frameworks {
            self.check_cancelled(done, total)?;
            let code = staged.record.code.as_str();
            if let Err(error) = self.commit_framework(staged, &mut resolved, &mut report).await {
                self.fail(&mut report, None, code, error)?;
            }
            done += 1;
            on_progress(CommitProgress { done, total });
        }

        for staged in &plan.requirements {
            self.check_cancelled(done, total)?;
            let code = staged.record.requirement_code.as_str();
            if let Err(error) = self.commit_requirement(staged, &mut resolved, &mut report).await {
                self.fail(&mut report, Some(staged.index), code, error)?;
            }
            done += 1;
            on_progress(CommitProgress { done, total });
        }

        tracing::info!(
            frameworks = report.frameworks.len(),
            requirements = report.requirements.len(),
            mappings = report.mappings,
            failures = report.failures.len(),
            "commit finished"
        );
        Ok(report)
    }

    fn check_cancelled(&self, completed: usize, total: usize) -> Result<(), CommitError> {
        if self.cancel.is_cancelled() {
            tracing::warn!(completed, total, "commit cancelled");
            return Err(CommitError::Cancelled { completed, total });
        }
        Ok(())
    }

    fn fail(
        &self,
        report: &mut CommitReport,
        index: Option<usize>,
        code: &str,
        error: CommitError,
    ) -> Result<(), CommitError> {
        match self.strictness {
            Strictness::AllOrNothing => Err(error),
            Strictness::BestEffort => {
                tracing::warn!(code, %error, "row not committed");
                report.failures.push(RowFailure {
                    index,
                    code: code.to_string(),
                    message: error.to_string(),
                });
                Ok(())
            }
        }
    }

    async fn commit_framework(
        &self,
        staged: &StagedFramework,
        resolved: &mut Resolved,
        report: &mut CommitReport,
    ) -> Result<(), CommitError> {
        let code = staged.record.code.as_str();
        let outcome = ensure_framework(self.store, &staged.record)
            .await
            .map_err(CommitError::store(format!("framework {code}")))?;
        resolved.frameworks.insert(framework_key(code), outcome.id);
        report.frameworks.push(CommittedFramework {
            code: code.to_string(),
            id: outcome.id,
            created: outcome.created,
        });

        for section in &staged.sections {
            let (Some(section_code), Some(row)) =
                (section.code.as_deref(), section.to_row(outcome.id))
            else {
                continue;
            };
            let stored = self
                .store
                .upsert(Table::Sections, row, &SECTION_KEY)
                .await
                .map_err(CommitError::store(format!("section {section_code}")))?;
            let id = row_id(Table::Sections, &stored)
                .map_err(CommitError::store(format!("section {section_code}")))?;
            resolved
                .sections
                .insert((outcome.id, section_code.to_string()), Some(id));
            report.sections += 1;
        }
        Ok(())
    }

    async fn commit_requirement(
        &self,
        staged: &StagedRequirement,
        resolved: &mut Resolved,
        report: &mut CommitReport,
    ) -> Result<(), CommitError> {
        let code = staged.record.requirement_code.as_str();
        let framework_id = self.resolve_framework(staged, resolved).await?;
        let section_id = match staged.record.section_code.as_deref() {
            Some(section_code) => {
                self.resolve_section(framework_id, section_code, resolved)
                    .await?
            }
            None => None,
        };

        let stored = self
            .store
            .upsert(
                Table::Requirements,
                staged.record.to_row(framework_id, section_id),
                &REQUIREMENT_KEY,
            )
            .await
            .map_err(CommitError::store(format!("requirement {code}")))?;
        let id = row_id(Table::Requirements, &stored)
            .map_err(CommitError::store(format!("requirement {code}")))?;
        report.requirements.push(CommittedRequirement {
            index: staged.index,
            requirement_code: code.to_string(),
            id,
        });

        let links = [
            (EntityKind::Control, staged.linked_control_id),
            (EntityKind::Risk, staged.linked_risk_id),
        ];
        for (kind, target) in links {
            let Some(target) = target else { continue };
            match self.map_requirement(id, kind, target).await {
                Ok(()) => report.mappings += 1,
                Err(error) => {
                    tracing::warn!(requirement = code, %kind, %target, %error, "mapping not created");
                    report.mapping_failures.push(MappingFailure {
                        requirement_code: code.to_string(),
                        kind,
                        target_id: target,
                        message: error.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn resolve_framework(
        &self,
        staged: &StagedRequirement,
        resolved: &mut Resolved,
    ) -> Result<Uuid, CommitError> {
        if let Some(id) = staged.framework_id {
            return Ok(id);
        }

        let requirement_code = staged.record.requirement_code.to_string();
        let code = staged
            .framework_code
            .as_deref()
            .map(normalize_code)
            .filter(|code| !code.is_empty())
            .ok_or_else(|| CommitError::UnresolvedFramework {
                requirement_code: requirement_code.clone(),
                reference: String::new(),
            })?;

        let key = framework_key(&code);
        if let Some(id) = resolved.frameworks.get(&key) {
            return Ok(*id);
        }

        let found = find_framework(self.store, &code)
            .await
            .map_err(CommitError::store(format!("framework {code}")))?;
        let framework = found.ok_or(CommitError::UnresolvedFramework {
            requirement_code,
            reference: code,
        })?;
        resolved.frameworks.insert(key, framework.id);
        Ok(framework.id)
    }

    async fn resolve_section(
        &self,
        framework_id: Uuid,
        code: &str,
        resolved: &mut Resolved,
    ) -> Result<Option<Uuid>, CommitError> {
        let key = (framework_id, code.to_string());
        if let Some(id) = resolved.sections.get(&key) {
            return Ok(*id);
        }

        let query = Query::new()
            .eq("framework_id", framework_id.to_string())
            .eq("code", code)
            .limit(1);
        let rows = self
            .store
            .select(Table::Sections, &query)
            .await
            .map_err(CommitError::store(format!("section {code}")))?;
        let id = match rows.first() {
            Some(row) => Some(
                row_id(Table::Sections, row)
                    .map_err(CommitError::store(format!("section {code}")))?,
            ),
            None => {
                tracing::debug!(section = code, "section not found; requirement left unsectioned");
                None
            }
        };
        resolved.sections.insert(key, id);
        Ok(id)
    }

    async fn map_requirement(
        &self,
        requirement_id: Uuid,
        kind: EntityKind,
        target: Uuid,
    ) -> Result<(), StoreError> {
        let column = kind.mapping_column();
        let mut row = Map::new();
        row.insert("requirement_id".into(), json!(requirement_id));
        row.insert(column.into(), json!(target));
        self.store
            .upsert(Table::RequirementMappings, row, &["requirement_id", column])
            .await?;
        Ok(())
    }
}
