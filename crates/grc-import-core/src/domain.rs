//! Domain models for compliance imports.
//!
//! Raw rows and candidates carry user-supplied strings exactly as read;
//! records are the validated forms that may be committed.

/// Compliance frameworks and their raw/validated row forms.
pub mod framework;
pub use framework::{Framework, FrameworkRecord, FrameworkRow, Section, SectionRow};

/// Requirements, priorities and their validated form.
pub mod requirement;
pub use requirement::{Priority, Requirement, RequirementRecord};

/// In-memory requirement candidates pending review.
pub mod candidate;
pub use candidate::RequirementCandidate;

/// Validation results and dry-run counts.
pub mod preview;
pub use preview::{DryRunSummary, PreviewRow, Strictness};

mod config;
pub use config::{Config, ControlDefaults, KEYS as CONFIG_KEYS, RiskDefaults};
