//! Client side of the remote skill store.
//!
//! The local engine only ever talks to the store through [`SkillRepository`]:
//! create, update, fetch by id, and paginated listing. [`HttpSkillRepository`]
//! speaks the JSON API; [`MemorySkillRepository`] keeps everything in process
//! and backs the engine's tests.

pub mod error;
pub mod http;
pub mod memory;
pub mod repository;
pub mod types;

pub use {
    error::{RemoteError, Result},
    http::HttpSkillRepository,
    memory::{FailOn, MemorySkillRepository},
    repository::{SkillRepository, list_all},
    types::{
        ListFilter, RemoteResource, RemoteSkill, ResourceChange, ResourceInput, ResourceKind,
        SkillInput, SkillPage, SkillPatch, SkillSummary, Visibility,
    },
};
