pub mod bootstrap;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod redirect;
pub mod registry;
pub mod router;
pub mod session;
pub mod state;

pub use config::Config;
pub use dispatcher::{CallbackData, MultiProviderDispatcher, RouteTable, RouteTarget};
pub use error::{Error, Result};
pub use provider::{HandlerRef, Identity, ProviderKey};
pub use registry::ProviderRegistry;
pub use router::{CallbackRouter, HandlerContext, RequestOrigin, ResolvedProvider};
