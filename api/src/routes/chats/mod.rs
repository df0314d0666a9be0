pub mod chat_events_route;
pub mod chat_request;
pub mod chats_route;
pub mod submit_question_route;
