pub mod machine;
pub mod model;
pub mod storage;

pub use model::TaskRecord;
pub use storage::TaskStorage;
