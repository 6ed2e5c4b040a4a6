//! Filter expressions, per-field predicates, and their compilation into document queries.

pub mod builder;
pub mod filter;
pub mod predicate;

pub use builder::{CompiledQuery, QueryBuilder, ResolvedField};
pub use filter::{
    DEFAULT_PAGE, DEFAULT_PAGE_SIZE, FieldFilter, FilterExpr, MAX_PAGE_SIZE, Operator, PaginatedResponse, Paging,
    SearchResult, SortOrder, SortSpec,
};
pub use predicate::{Operand, Predicate};
