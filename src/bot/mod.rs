pub mod command;
pub mod reply;
pub mod router;
pub mod telegram;
