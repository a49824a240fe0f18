//! Biolock - Behavioral-biometric lock screen engine
//!
//! Biolock captures how a user enters a PIN and checks it against what is
//! expected: keystroke timing and touch placement are recorded per attempt, an
//! optional device-motion gesture is compared with an enrolled reference, and a
//! decision policy combines code correctness, decoy-key presses, correction
//! counts and the motion result into a single verdict.
//!
//! ## Modules
//!
//! - **Capture**: [`recorder`] collects raw events per attempt, [`features`]
//!   derives hold times, intervals and touch sides
//! - **Motion**: [`motion`] resamples and records traces, [`scorer`] compares
//!   them, [`enrollment`] keeps the reference pattern in a [`store`]
//! - **Decision**: [`policy`] turns the signals into a [`Verdict`]
//! - **Orchestration**: [`pipeline`] drives all of the above from UI callbacks

pub mod clock;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod export;
pub mod features;
pub mod keypad;
pub mod motion;
pub mod pipeline;
pub mod policy;
pub mod recorder;
pub mod scorer;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use clock::{Clock, ManualClock, Millis, MonotonicClock};
pub use config::EngineConfig;
pub use enrollment::{MotionAuthenticator, MotionCheck};
pub use error::AuthError;
pub use pipeline::{replay_attempt, replay_attempt_json, AttemptOutcome, AttemptStart, LockEngine};
pub use store::{EnrolledPattern, MemoryPatternStore, PatternStore};
pub use types::{InputEvent, ReasonCode, Verdict};

/// Biolock version reported by the CLI and FFI
pub const BIOLOCK_VERSION: &str = env!("CARGO_PKG_VERSION");
