//! These models represent the objects passed around by the agent loop
//!
//! The provider modules translate between these and each model API's wire format, and
//! the tool modules translate tool arguments into calls against a remote instance. Nothing
//! outside those modules should see raw JSON content blocks.
pub mod content;
pub mod conversation;
pub mod message;
pub mod role;
