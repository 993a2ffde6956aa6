//! Compliance framework import pipeline.
//!
//! Turns spreadsheets, delimited files, JSON bundles, Word documents, web
//! pages and pasted text into reviewed requirement candidates, then commits
//! them to a table-oriented persistence service with idempotent upserts.
//!
//! The stages compose leaves-first:
//!
//! 1. [`source`] reads raw content for one input mode.
//! 2. [`normalize`] turns it into discrete rows or a single plain-text block.
//! 3. [`segment`] splits a text block into `(code, title, body)` candidates.
//! 4. [`validate`] and [`reconcile`] check candidates and commit them through
//!    a [`Store`].
//!
//! [`importer`] runs the first three stages for the bulk and rich flows, and
//! [`session::ImportSession`] carries one import through review to commit.

pub mod domain;
pub use domain::{
    CONFIG_KEYS, Config, DryRunSummary, Framework, FrameworkRecord, FrameworkRow, PreviewRow,
    Priority, Requirement, RequirementCandidate, RequirementRecord, Strictness,
};

pub mod enrich;
pub mod importer;
pub use importer::{ImportError, Loaded, RichSource};

pub mod link;
pub mod normalize;
pub mod reconcile;
pub use reconcile::{CommitError, CommitPlan, CommitReport, Committer};

pub mod segment;
pub use segment::{Segment, SegmentError, Segmenter};

pub mod session;
pub use session::{ImportSession, SessionError, SessionState};

pub mod source;
pub use source::{FileKind, SourceError};

/// The persistence-service seam and its implementations.
pub mod store;
pub use store::{MemoryStore, RestStore, Store, StoreError, Table};

pub mod validate;
