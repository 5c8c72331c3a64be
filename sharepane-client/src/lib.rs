pub mod backend;
pub mod cli;
pub mod settings;
pub mod view_model;

pub use backend::{BackendConnection, ChannelInvoker, InvokeError, Invoker, WsInvoker, connect};
pub use view_model::{ToDelete, ViewModel};
