pub mod clock;
pub mod controller;
pub mod gpu_context;
pub mod input_adapter;
pub mod timer;

pub use clock::Clock;
pub use controller::{Button, Controller, HeldButtons};
pub use gpu_context::GpuContext;
pub use input_adapter::WinitController;
pub use timer::{Accumulator, FpsCounter};
