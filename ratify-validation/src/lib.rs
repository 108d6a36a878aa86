//! Field-level validation engine
//!
//! Registers form fields with ordered rule lists, runs synchronous and
//! asynchronous rules, debounces them, discards results that were overtaken
//! by newer invocations, and lets several fields share one keyed rule
//! (password confirmation, date ranges).
//!
//! # Examples
//!
//! ## Simple Rules
//!
//! ```
//! use ratify_validation::{FieldRules, MinLength, NotEmpty, SyncRule, ValidationEngine};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = ValidationEngine::new();
//! let rules = FieldRules::new()
//!     .simple(NotEmpty.into_rule())
//!     .simple(MinLength(3).into_rule());
//! let name = engine
//!     .register_field("name", Some("name"), json!("jo"), rules)
//!     .unwrap();
//!
//! // untouched fields are not validated
//! engine.validate("name").await;
//! assert!(engine.errors().is_empty());
//!
//! name.touch();
//! engine.validate("name").await;
//! assert_eq!(engine.errors(), vec!["must be at least 3 characters"]);
//! # }
//! ```
//!
//! ## Keyed Rules
//!
//! ```
//! use ratify_validation::{AllEqual, FieldRules, SyncRule, ValidationEngine};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = ValidationEngine::new();
//! engine
//!     .register_field(
//!         "password",
//!         Some("password"),
//!         json!("hunter2"),
//!         FieldRules::new().keyed("confirm", Some(AllEqual.into_rule())),
//!     )
//!     .unwrap();
//! engine
//!     .register_field(
//!         "confirm",
//!         Some("confirm"),
//!         json!("hunter3"),
//!         FieldRules::new().keyed("confirm", None),
//!     )
//!     .unwrap();
//!
//! assert!(engine.validate_all(None).await.is_err());
//! assert_eq!(engine.errors(), vec!["values do not match"]);
//! # }
//! ```
//!
//! ## Async Rules
//!
//! ```
//! use ratify_validation::{FieldRules, Rule, RuleRejection, ValidationEngine};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let taken = Rule::future(|values| async move {
//!     if values[0] == json!("admin") {
//!         Err(RuleRejection::message("username is taken"))
//!     } else {
//!         Ok(None)
//!     }
//! });
//!
//! let engine = ValidationEngine::new();
//! engine
//!     .register_field("user", Some("user"), json!("admin"), FieldRules::new().simple(taken))
//!     .unwrap();
//! assert!(engine.submit().await.is_err());
//! assert!(!engine.validating());
//! # }
//! ```

mod behavior;
pub mod cancel;
mod config;
pub mod debounce;
mod engine;
mod errors;
mod field;
pub mod generation;
mod group;
mod pending;
mod rules;
mod traits;
mod validators;

pub use behavior::*;
pub use config::*;
pub use engine::*;
pub use errors::*;
pub use field::*;
pub use group::*;
pub use pending::*;
pub use rules::*;
pub use traits::*;
pub use validators::*;
