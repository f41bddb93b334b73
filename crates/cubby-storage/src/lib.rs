pub mod file;
pub mod memory;
pub mod postgres;

pub use file::FileRepository;
pub use memory::MemoryRepository;
pub use postgres::PgRepository;
