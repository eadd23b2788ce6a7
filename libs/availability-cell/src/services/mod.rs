pub mod blocks;
pub mod registry;
pub mod slots;

pub use blocks::BlockedSlotStore;
pub use registry::WorkingHoursRegistry;
pub use slots::SlotGenerator;
