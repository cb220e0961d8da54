pub mod achievements;
pub mod mentor;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers so the binary can build the router from one place.
pub use achievements::{
    activity_calendar_handler, award_handler, list_achievements_handler,
    update_preferences_handler,
};
pub use mentor::{
    chat_handler, complete_activity_handler, create_conversation_handler,
    delete_conversation_handler, get_conversation_handler, send_message_handler,
    tap_chip_handler,
};
pub use middleware::require_auth;
