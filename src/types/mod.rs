//! # Protocol Types
//!
//! Built-in wire types and the service shapes assembled from them.

pub mod builtin;
pub mod service;

pub use builtin::{
    ByteString, DateTime, DiagnosticInfo, ExpandedNodeId, ExtensionObject, Guid, Identifier,
    LocalizedText, NodeId, QualifiedName, StatusCode,
};
