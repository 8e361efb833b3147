//! Small helpers shared by the widget sources and the app shell.

pub mod command;
pub mod path;
pub mod periodic;
pub mod thread;
