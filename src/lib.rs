//! Conclave: conference abstract submission, review, payment verification and
//! notification backend, plus an API-key protected transactional Email API.

#![allow(missing_docs)]

pub mod api;
pub mod app;
pub mod app_info;
pub mod boot;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod conference;
pub mod config;
pub mod database;
pub mod email_api;
pub mod emails;
pub mod environment;
pub mod job_queue;
pub mod jobs;
pub mod mailer;
pub mod monitoring;
pub mod router;
pub mod setup_tracing;
