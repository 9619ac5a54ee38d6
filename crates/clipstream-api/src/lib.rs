pub mod error;
pub mod password;
pub mod routes;
pub mod state;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};
