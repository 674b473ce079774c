//! Applicant-tracking-system style scoring of one resume against a job
//! description.

pub mod handlers;
pub mod keywords;
pub mod prompts;
pub mod scoring;
