pub mod cache;
pub mod collect;
pub mod hosts;
pub mod remote_search;
pub mod search;

// Re-export handler functions for convenience
pub use cache::handle_cache_command;
pub use collect::handle_collect_command;
pub use hosts::handle_hosts_command;
pub use remote_search::{handle_remote_search_command, RemoteSearchArgs};
pub use search::handle_search_command;
pub use ssh_test::handle_ssh_test_command;
