//! Effective-POM resolution for pomscan.
//!
//! Parses pom.xml files, resolves `${...}` properties, walks parent chains
//! and BOM imports into effective models, processes multi-module trees, and
//! collects transitive dependency graphs shaped by the depth-aware selection
//! policy.

pub mod effective;
pub mod error;
pub mod graph;
pub mod module_tree;
pub mod parser;
pub mod policy;
pub mod properties;
pub mod types;

pub use effective::{EffectiveModelBuilder, PomCache};
pub use error::{PomError, Result};
pub use graph::{CodeLocation, DependencyGraph, ExternalId, GraphCollector, GraphScope};
pub use module_tree::{
    CodeLocationSink, FailedModule, ModuleTreeProcessor, NullSink, ScanConfig, ScanReport,
};
pub use parser::parse_pom;
pub use policy::{SelectionPolicy, VersionRange};
pub use properties::PropertyResolver;
pub use types::{
    EffectiveProject, Exclusion, ParentRef, PomDependency, Repository, Scope, UnresolvedPom,
};
