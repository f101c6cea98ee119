//! Weighted form builder with AI-suggested questions.
//!
//! A form is a title, instructions and an ordered list of questions. Weighted
//! parameters steer a generation service toward suggesting questions, which the
//! user accepts into the form or rejects, before the form is published to a
//! document store.

pub mod codec;
pub mod config;
pub mod error;
pub mod form;
pub mod llm;
pub mod parameter;
pub mod prompt;
pub mod question;
pub mod response;
pub mod review;
pub mod server;
pub mod session;
pub mod store;
pub mod telemetry;
