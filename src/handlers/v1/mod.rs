//! V1 API handlers.

mod profiles;
mod sessions;

pub use profiles::list_profiles;
pub use sessions::{create_session, delete_session, get_session, send_message};
