//! A query and update engine that gives schemaless document stores relational guarantees.
//!
//! This crate is the core of the docbridge project and provides:
//!
//! - **Entities and schemas** ([`document`], [`schema`]) - The entity trait and static per-type field tables
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Query AST** ([`query`]) - Store-agnostic filter expressions and the visitor backends implement
//! - **Search** ([`search`], [`value`], [`predicate`]) - Search parameters and their compilation to filters
//! - **Sorting and paging** ([`sort`], [`page`]) - Sort plans, page windows and result envelopes
//! - **Writes** ([`diff`], [`delta`]) - Full-object diffs and explicit-path partial updates
//! - **References** ([`relation`]) - Pruning and hydration of denormalized references
//! - **Operations** ([`store`], [`collection`]) - The entry point sequencing all of the above
//! - **Results and errors** ([`result`], [`error`]) - The caller-facing envelope and error taxonomy
//! - **Context** ([`context`], [`access`], [`cancel`], [`config`]) - Callers, access control, cancellation and configuration
//!
//! # Example
//!
//! ```ignore
//! use docbridge_core::{collection::GetOptions, context::{Caller, OperationContext}, store::EntityStore};
//!
//! let store = EntityStore::new(backend);
//! let ctx = OperationContext::new(Caller::user("jdoe"));
//!
//! let contact = store
//!     .collection::<PhoneBookContact>()
//!     .get(&ctx, id, GetOptions::lookup())
//!     .await;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_core;

pub mod access;
pub mod backend;
pub mod cancel;
pub mod collection;
pub mod config;
pub mod context;
pub mod delta;
pub mod diff;
pub mod document;
pub mod error;
pub mod page;
pub mod predicate;
pub mod query;
pub mod relation;
pub mod result;
pub mod schema;
pub mod search;
pub mod sort;
pub mod store;
pub mod value;
