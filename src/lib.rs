//! smsgw: forwards SMS received by a GSM modem to a Telegram chat.
//!
//! The modem daemon runs `smsgw receive` for every inbound message. The
//! message is either delivered directly or persisted in a crash-safe
//! directory queue ([`queue`]) that `smsgw worker` ([`worker`]) drains.
//!
//! See `DESIGN.md` for the architecture.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod delivery;
pub mod logging;
pub mod queue;
pub mod sms;
pub mod worker;
