// Ratify - field-level form validation for Rust
//
// This library provides a validation engine for interactive forms: ordered
// per-field rules, keyed cross-field rules, debouncing, and async rules whose
// stale results never overwrite newer ones.

// Re-export the engine
pub use ratify_validation::*;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AllEqual,
        AsyncRule,
        EngineConfig,
        Field,
        FieldId,
        FieldRules,
        FormError,
        InRange,
        IsEmail,
        IsUrl,
        Matches,
        MaxLength,
        MinLength,
        NotEmpty,
        Rule,
        RuleError,
        RuleRejection,
        RuleSpec,
        SyncRule,
        ValidationBehavior,
        ValidationEngine,
        ValidationReport,
    };
}
