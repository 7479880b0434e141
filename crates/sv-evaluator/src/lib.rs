//! Deviation Evaluator (C4), Cooloff Gate (C5), and Message Renderer (C6).
//!
//! These three sit back to back in the data flow: a truncated window is
//! reduced to a `SignalReading` (evaluator), the reading is checked against
//! the alert's threshold and cooloff (cooloff gate), and — if it survives
//! both — the alert's message template is expanded against the reading
//! (renderer).

mod cooloff;
mod evaluator;
mod renderer;

pub use cooloff::CooloffGate;
pub use evaluator::evaluate;
pub use renderer::render;
