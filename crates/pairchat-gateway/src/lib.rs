pub mod connection;
pub mod dispatcher;
pub mod hub;

pub use dispatcher::Dispatcher;
pub use hub::Hub;
