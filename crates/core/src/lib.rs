pub mod change;
pub mod clock;
pub mod decision;
pub mod domain;
pub mod entity;
pub mod error;
pub mod ids;
pub mod image;
pub mod rows;
pub mod state;

pub use change::{ChangeRecord, LogAction};
pub use clock::{LogClock, Timestamp};
pub use entity::EntityKind;
pub use error::CoreError;
pub use ids::*;
pub use image::RowImage;
pub use state::{Checkpoint, LogMode, Watermark};
