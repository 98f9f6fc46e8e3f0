pub mod files;
pub mod gateway;
pub mod snapshot;

pub use files::{
    atomic_write, config_file, day_file, ensure_data_dir, get_data_dir, init_local_data_dir,
    read_file, reminders_file,
};
pub use gateway::{save_with_retry, JsonFileGateway, MemoryGateway, PersistenceGateway, SaveSession};
pub use snapshot::{EntityKind, StoreSnapshot};
