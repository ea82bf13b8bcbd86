pub mod chat;
pub mod response;
pub mod state;

pub use response::ApiError;
pub use state::AppState;
