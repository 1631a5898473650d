//! 动作模块
//!
//! 应用与撤销视觉修改

pub mod applier;
pub mod placeholder;
pub mod restore;

pub use applier::{ActionApplier, AppliedModification, OriginalState};
pub use placeholder::placeholder_for;
pub use restore::{RecoveryOutcome, RestoreReport};
