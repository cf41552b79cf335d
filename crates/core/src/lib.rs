// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pv-core: entities and value types for the preview session engine

pub mod macros;

pub mod application;
pub mod clock;
pub mod config;
pub mod duration;
pub mod event;
pub mod event_bus;
pub mod id;
pub mod session;
pub mod template;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use application::{
    Application, Commit, Notification, NotificationKind, RefState, RefsAtCommit,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    validate_applications, ApplicationConfig, BranchOverride, CommandConfig, ConfigError,
    FetchConfig, HealthcheckConfig, PortsConfig, RecycleConfig, StartupConfig, WarmupConfig,
    WarmupsConfig,
};
pub use duration::{parse_duration, DurationError};
pub use event::{ApplicationEvent, SessionEvent};
pub use event_bus::{EventBus, Subscription};
pub use id::{short, SessionId};
pub use session::{
    KillReason, LogEntry, LogLevel, NewSession, Session, SessionError, SessionMetrics,
    SessionSnapshot, SessionStatus,
};
