//! umlsmith Core Types and Definitions
//!
//! This crate provides the data model shared by every stage of the umlsmith
//! pipeline. It includes:
//!
//! - **Records**: Normalized entities extracted from tabular or semi-structured
//!   input ([`record::Record`], [`record::Relation`])
//! - **Diagram kinds**: The two diagram families the pipeline produces
//!   ([`kind::DiagramKind`])
//! - **Graphs**: Components and directed edges read back out of diagram source
//!   ([`graph::DiagramGraph`])
//! - **Artifacts**: Accepted diagrams and the uniform result contract returned
//!   to callers ([`artifact::DiagramArtifact`], [`artifact::ResultEnvelope`])

pub mod artifact;
pub mod graph;
pub mod kind;
pub mod record;
