pub mod add;
pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod delete;
pub mod edit;
pub mod list;
pub mod reorder;
pub mod show;
pub mod status;
pub mod sync;
pub mod watch;
