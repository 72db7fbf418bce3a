#![doc = "evidence-collector-core: evidence pipelines for Tugboat Logic."]

//! Source clients, document formatters, the evidence uploader and the
//! orchestrator that ties them together. The CLI crate only loads
//! configuration and calls into [`collect`].
//!
//! # Usage
//! Build a [`github::GithubClient`] or [`jira::JiraClient`] and an
//! [`uploader::TugboatClient`] from a [`config::CollectorConfig`], then call
//! [`collect::collect_github`] or [`collect::collect_jira`].

pub mod collect;
pub mod config;
pub mod contract;
pub mod csv_document;
pub mod document;
pub mod error;
pub mod github;
pub mod http;
pub mod jira;
pub mod uploader;
pub mod workbook;
