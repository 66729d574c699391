pub mod clock;
pub mod key;
pub mod record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{KEY_LEN, generate_key};
pub use record::{FileRecord, NewFileRecord};
