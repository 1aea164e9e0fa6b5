//! Upload client for Sealpost.
//!
//! This module implements the client side of the document summarization
//! service: envelope construction, the authenticated upload request, and the
//! consumption of the streamed progress response.
//!
//! # Design Principles
//! - Auth isolation: the token comes from an injected [`AuthProvider`],
//!   never from storage accessed by the core
//! - One pipeline per attempt: each upload owns its state and its timer
//! - Explicit outcomes: every failure mode is a variant of the common
//!   error type, never a hung state

pub mod auth;
pub mod envelope;
pub mod frame;
pub mod session;
pub mod state;

pub use auth::{AuthProvider, StaticToken, TokenCell};
pub use envelope::{seal, Envelope, EnvelopeFormat, SealedEnvelope};
pub use frame::{FrameReader, ProgressRecord};
pub use session::{UploadConfig, UploadHandle, UploadMonitor, UploadSession};
pub use state::{format_elapsed, Phase, StateMachine, UploadOutcome, UploadState};
