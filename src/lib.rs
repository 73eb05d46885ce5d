//! Client common library for the canvassing application
//!
//! Schema metadata drives generic read, store, filter, sort and paging behaviour for
//! arbitrary entity types. Server payloads are normalised through a [`schema::Schema`],
//! cached in a shared [`store::Store`] as objects or [`resource_list::ResourceList`]s,
//! and fetched over a pluggable [`api::RestTransport`].

pub mod api;
pub mod compare;
pub mod config;
pub mod debug_log;
pub mod factory;
pub mod filter;
pub mod pager;
pub mod query;
pub mod resource_list;
pub mod schema;
pub mod sort;
pub mod store;
pub mod value;

pub use api::{HttpTransport, Method, RestError, RestRequest, RestTransport};
pub use config::ClientConfig;
pub use debug_log::DebugLog;
pub use factory::{
    Callbacks, EntityFactory, FactoryRegistry, ResourceAction, ResourceCall, ResourceConfig,
    StandardFactory, StoreRspArgs, Stored, SubDocArgs, date_convert, store_server_rsp,
    store_server_rsp_joined,
};
pub use filter::ResourceFilter;
pub use pager::Pager;
pub use query::{MultiOp, Query, QueryBuilder, QueryOp};
pub use resource_list::ResourceList;
pub use schema::{FieldType, FilterInit, ModelProp, ReadArgs, Schema, SchemaField};
pub use sort::SortOption;
pub use store::{KeyedStore, SharedStore, Store, StoreFlags};
