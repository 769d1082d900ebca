//! Capability/requirement resolver for dynamic module systems.
//!
//! Resources declare capabilities and requirements. [`ModuleContainer`]
//! keeps the installed resources and their committed wiring and resolves
//! new resources against it, consulting registered resolver hooks and
//! explaining failures through a [`ResolutionReport`].

pub mod config;
pub mod container;
pub mod dependency_graph;
pub mod error;
pub mod event;
pub mod filter;
pub mod hook;
pub mod report;
pub mod resource;
pub mod solver;
pub mod universe;
pub mod wiring;

pub use config::ResolverConfig;
pub use container::{ModuleContainer, ModuleContainerBuilder};
pub use error::{ResolverError, Result};
pub use event::{ContainerEvent, ContainerListener};
pub use filter::{Filter, FilterError};
pub use hook::{HookError, HookRegistration, HookResult, HookStage, ResolverHook, ResolverHookFactory};
pub use report::{Entry, EntryData, EntryType, ReportBuilder, ResolutionReport};
pub use resource::{Capability, CapabilityRef, Requirement, RequirementRef, Resource, ResourceBuilder, ResourceId};
pub use solver::{Policy, Resolution, Solver};
pub use universe::Universe;
pub use wiring::{Wire, WiringDelta, WiringGraph};

pub use modwire_version::{Version, VersionRange};
