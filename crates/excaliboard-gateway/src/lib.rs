pub mod connection;
pub mod session;

pub use connection::handle_connection;
pub use session::Session;
