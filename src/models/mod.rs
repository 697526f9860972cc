pub mod search;
pub mod server;
pub mod tool;

pub use search::{DiscoveredServer, SearchDocument, SearchHit, SearchRequest, ToolMatch, ToolMetadata};
pub use server::{
    EndpointSpec, HeartbeatReceipt, HttpMethod, RegisterServerRequest, RegistrationOverrides,
    RegistrationReceipt, ServerRecord, TransportKind,
};
pub use tool::{PromptDescriptor, ResourceDescriptor, ToolDescriptor};
