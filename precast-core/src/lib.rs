//! Skill latency-compensation engine for a client-side MMORPG proxy plugin.
//!
//! This crate has no socket, no UI, and no opinion on how packets reach
//! it - it only answers one question, quickly and deterministically:
//! given everything it currently knows about the local player, what should
//! happen to a skill the player just tried to cast, before the server's
//! own answer can possibly arrive. The host (an intercepting proxy) owns
//! every byte on the wire; this crate owns only the decision.

pub mod action_tracker;
pub mod arrow;
pub mod bugfixes;
pub mod catalog;
pub mod cc_gate;
pub mod clock;
pub mod commands;
pub mod config;
pub mod cooldown;
pub mod decision_engine;
pub mod dispatcher;
pub mod effects;
pub mod error;
pub mod host;
pub mod network_monitor;
pub mod queue;
pub mod session;

pub use clock::{Clock, SystemClock};
pub use commands::{parse_command, Command};
pub use config::ProxyConfig;
pub use decision_engine::{resolve, CastRefusal, DecisionContext, JobClass, TransitionDescriptor};
pub use error::PrecastError;
pub use host::{HostHooks, SubscribeError, Subscription};
pub use session::PrecastSession;
