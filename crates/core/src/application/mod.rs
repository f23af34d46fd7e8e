// Application Layer - Job runner

pub mod constants;
pub mod destination;
pub mod panic_guard;
pub mod processor;
pub mod registry;

// Re-exports
pub use destination::{DestinationError, ExportNaming};
pub use panic_guard::{execute_guarded, PanicGuardResult};
pub use processor::{JobContext, Processor, ProcessorSnapshot, ProcessorState};
pub use registry::{BackgroundWork, JobRegistry, RegistryBuilder, RegistryConfig, ReservationTable};
