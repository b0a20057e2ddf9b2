pub mod handle;
pub mod model;
pub mod repository;
pub mod repository_memory;
pub mod repository_pg;
pub mod route;
pub mod schema;
pub mod service;

pub use repository::TextRecordRepository;
pub use repository_memory::TextRecordMemoryRepository;
pub use repository_pg::TextRecordPgRepository;
pub use service::TextRecordService;
