mod api_server;
mod client_ip;
mod visit_page;

pub use api_server::{router, ApiServer, ApiState};
pub use client_ip::{extract_client_ip, CLIENT_IP_HEADERS};
pub use visit_page::VisitResponse;

// Re-export for external use (e.g., integration tests)
#[allow(unused_imports)]
pub use api_server::{ApiError, CreateLinkRequest, UpdateLocationRequest, ACCESS_ID_HEADER, ADMIN_TOKEN_HEADER};
