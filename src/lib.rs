//! This library evaluates a holder's credentials against a [DIF Presentation
//! Exchange] presentation definition.
//!
//! [DIF Presentation Exchange]: <https://identity.foundation/presentation-exchange/spec/v1.0.0/>
//!
//! # Usage
//!
//! A wallet receiving a presentation definition from a verifier registers it
//! with a [`PresentationExchange`] engine, then asks the engine which of its
//! credentials should be presented:
//!
//! ```ignore
//! use presentation_exchange::{config::Config, PresentationExchange};
//!
//! let mut engine = PresentationExchange::new(Config::default())?;
//!
//! // Fails eagerly on malformed definitions, before any credential is read.
//! engine.validate_and_register(presentation_definition)?;
//!
//! // Show the holder what is being requested.
//! for requirement in engine.requirement_details()? {
//!     println!("{}: {}", requirement.name, requirement.rule_description);
//! }
//!
//! // Select credentials, falling back to manifest credentials for the
//! // requirements no stored credential fulfils.
//! let submission = engine
//!     .create_presentation_submission(&credentials, Some(&manifests))
//!     .await?;
//!
//! // The submission is an unsigned Verifiable Presentation.
//! let presentation: serde_json::Value = submission.into();
//! ```
//!
//! # Evaluation Overview
//!
//! 1. *Definition validation*: the definition is checked against an embedded
//!    JSON Schema, then for unique input descriptor ids and consistent `pick`
//!    bounds. See [`core::definition_validation`].
//! 2. *Registration*: input descriptors are indexed by the groups the
//!    submission requirements select. See [`core::registry`].
//! 3. *Type resolution*: each credential's `type` tokens are expanded with its
//!    JSON-LD contexts, which are fetched once per process. See [`json_ld`].
//! 4. *Matching*: credentials are matched against input descriptors by schema
//!    and constraints fields, under the `all` and `pick` rules of the
//!    submission requirements. See [`core::evaluation`].
//! 5. *Assembly*: matches are laid out in a presentation whose descriptor map
//!    is co-indexed with its credentials. See [`core::presentation_submission`].
//!
//! Signing the resulting presentation is left to the caller.

pub mod config;
pub mod core;
pub mod json_ld;
pub mod presentation_exchange;
pub mod utils;

pub use presentation_exchange::{EngineError, PresentationExchange};
pub use serde_json_path::JsonPath;
