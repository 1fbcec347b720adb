pub mod file_handlers;
pub mod health_handlers;
pub mod knowledge_base_handlers;
pub mod upload_handlers;
