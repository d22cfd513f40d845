pub mod credential;
pub mod definition_validation;
pub mod evaluation;
pub mod filter;
pub mod input_descriptor;
pub mod presentation_definition;
pub mod presentation_submission;
pub mod registry;
pub mod requirement_details;
pub mod util;
