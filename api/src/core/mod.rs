pub mod app_state;
pub mod chat_store;
pub mod http;
