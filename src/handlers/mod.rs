pub mod registry_handlers;

pub use registry_handlers::{
    find_server_handler, get_server_handler, health_handler, heartbeat_handler,
    list_servers_handler, register_server_handler, search_tools_handler,
};
