//! Topic names published by the noaide server
//!
//! Topics are free-form strings on the wire; these are the ones the server
//! currently emits.

/// JSONL messages from agent sessions
pub const SESSION_MESSAGES: &str = "session/messages";

/// File system change events
pub const FILE_CHANGES: &str = "files/changes";

/// Task list updates
pub const TASK_UPDATES: &str = "tasks/updates";

/// Multi-agent team metrics
pub const AGENT_METRICS: &str = "agents/metrics";

/// System lifecycle events
pub const SYSTEM_EVENTS: &str = "system/events";

/// API proxy request/response pairs
pub const API_REQUESTS: &str = "api/requests";

/// Every topic the server publishes
pub const ALL_TOPICS: &[&str] = &[
    SESSION_MESSAGES,
    FILE_CHANGES,
    TASK_UPDATES,
    AGENT_METRICS,
    SYSTEM_EVENTS,
    API_REQUESTS,
];
