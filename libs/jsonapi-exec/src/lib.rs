//! Executes validated query plans against a resource repository.

pub mod executor;
pub mod fingerprint;
pub mod memory;
pub mod repository;

pub use executor::{Execution, Executor, Pagination};
pub use memory::InMemoryRepository;
pub use repository::{
    ConstraintViolation, FindResult, IncludedByPath, OrderField, OrderKey, PageMeta,
    RepositoryError, RepositoryQuery, ResourceRepository, SortOrder, ViolationTarget,
};
