//! assist-bridge: real-time call-audio interception and agent-assist fan-out.
//!
//! The deployable pieces live in `services/` (the Audiohook interception
//! service and the agent-UI subscription hub) with shared wire types and the
//! broker contract under `crates/`.  This root crate hosts the
//! workspace-level integration suites in `tests/integration/`.
