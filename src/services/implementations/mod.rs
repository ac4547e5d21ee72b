mod audit_service;
mod refresh_service;

pub use audit_service::AuditService;
pub use refresh_service::RefreshService;
