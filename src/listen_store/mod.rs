mod models;
mod schema;
mod store;

pub use models::*;
pub use schema::{LISTEN_TIME_INDEX, LISTEN_VERSIONED_SCHEMAS};
pub use store::ListenStore;
