//! Incident selection by filter criteria.
//!
//! The criteria themselves live on [`crate::model::filter::FilterSpec`];
//! this module turns them into storage queries.

pub mod queryset;
