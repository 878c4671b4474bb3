//! TigerStyle constants for Holon
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Collection Limits
// =============================================================================

/// Maximum number of members in a staged collection
pub const COLLECTION_MEMBERS_COUNT_MAX: usize = 1_000_000;

/// Maximum number of cursors open at once over one staged collection
pub const COLLECTION_CURSORS_OPEN_COUNT_MAX: usize = 4096;

// =============================================================================
// Scheduler Limits
// =============================================================================

/// Default delay between two scheduling ticks in milliseconds
pub const SCHEDULER_TICK_INTERVAL_MS_DEFAULT: u64 = 10;

/// Maximum delay between two scheduling ticks in milliseconds (1 min)
pub const SCHEDULER_TICK_INTERVAL_MS_MAX: u64 = 60 * 1000;

/// Default number of partitions for a partitioned live pass
pub const SCHEDULER_PARTITIONS_COUNT_DEFAULT: usize = 1;

/// Maximum number of partitions for a partitioned live pass
pub const SCHEDULER_PARTITIONS_COUNT_MAX: usize = 64;

// =============================================================================
// Mailbox Limits
// =============================================================================

/// Maximum depth of a mailbox (live queue plus buffer)
pub const MAILBOX_DEPTH_MAX: usize = 10_000;

/// Interval between two polls of a waiting mailbox read in milliseconds
pub const MAILBOX_POLL_INTERVAL_MS_DEFAULT: u64 = 5;

/// Maximum length of an agent address in bytes
pub const ADDRESS_LENGTH_BYTES_MAX: usize = 256;

/// Maximum length of a message kind in bytes
pub const MESSAGE_KIND_LENGTH_BYTES_MAX: usize = 128;

// =============================================================================
// Outcome Codes
// =============================================================================

/// Success
pub const OUTCOME_CODE_SUCCESS: i32 = 0;

/// Cancellation requested
pub const OUTCOME_CODE_CANCELLATION: i32 = -1;

/// Generic error
pub const OUTCOME_CODE_ERROR: i32 = -2;

/// Generic warning
pub const OUTCOME_CODE_WARNING: i32 = -3;

/// Role is not defined in the organization
pub const OUTCOME_CODE_ROLE_NOT_DEFINED_IN_ORGANIZATION: i32 = 1000;

/// No such role player
pub const OUTCOME_CODE_NO_SUCH_ROLEPLAYER: i32 = 1001;

/// No role player at all
pub const OUTCOME_CODE_NO_ROLEPLAYER: i32 = 1002;

/// Remote kernel is not supported
pub const OUTCOME_CODE_REMOTE_KERNEL_NOT_SUPPORTED: i32 = 1003;

/// Heavy agent failed
pub const OUTCOME_CODE_HEAVY_AGENT_FAILED: i32 = 1004;

/// No kernel agent
pub const OUTCOME_CODE_NO_KERNEL_AGENT: i32 = 1005;

/// Invalid address: agent not found
pub const OUTCOME_CODE_INVALID_ADDRESS_AGENT_NOT_FOUND: i32 = 1006;

/// Agent is dead
pub const OUTCOME_CODE_AGENT_IS_DEAD: i32 = 1007;

/// Killing the agent is forbidden
pub const OUTCOME_CODE_KILL_AGENT_FORBIDDEN: i32 = 1008;

/// Entity was in an unexpected state when activation was requested
pub const OUTCOME_CODE_UNEXPECTED_STATE_DURING_ACTIVATION: i32 = 1009;

/// Entity was in an unexpected state when destruction was requested
pub const OUTCOME_CODE_UNEXPECTED_STATE_DURING_DESTRUCTION: i32 = 1010;

/// No kernel termination look-up task
pub const OUTCOME_CODE_NO_KERNEL_TERMINATION_LOOKUP_TASK: i32 = 1011;

// =============================================================================
// DST Limits
// =============================================================================

/// Maximum simulation steps before forced termination
pub const DST_STEPS_COUNT_MAX: u64 = 10_000_000;

/// Maximum simulated time in milliseconds (24 hours)
pub const DST_TIME_MS_MAX: u64 = 24 * 60 * 60 * 1000;

/// Default fault injection probability
pub const DST_FAULT_PROBABILITY_DEFAULT: f64 = 0.01;

// =============================================================================
// Observability - Metric Names (TigerStyle: explicit, with units)
// =============================================================================

/// Metric: Total number of scheduling passes (counter, labels: stage, severity)
pub const METRIC_NAME_PASSES_TOTAL: &str = "holon_passes_total";

/// Metric: Scheduling pass duration in seconds (histogram, labels: stage)
pub const METRIC_NAME_PASS_DURATION_SECONDS: &str = "holon_pass_duration_seconds";

/// Metric: Total number of member faults caught (counter, labels: stage)
pub const METRIC_NAME_MEMBER_FAULTS_TOTAL: &str = "holon_member_faults_total";

/// Metric: Total number of messages made visible by a synchronize (counter)
pub const METRIC_NAME_MAILBOX_DELIVERED_TOTAL: &str = "holon_mailbox_delivered_total";

/// Metric: Total number of messages rejected by a full mailbox (counter)
pub const METRIC_NAME_MAILBOX_REJECTED_TOTAL: &str = "holon_mailbox_rejected_total";

// Compile-time assertions for constant validity
const _: () = {
    assert!(COLLECTION_MEMBERS_COUNT_MAX >= MAILBOX_DEPTH_MAX);
    assert!(COLLECTION_CURSORS_OPEN_COUNT_MAX > 0);
    assert!(SCHEDULER_TICK_INTERVAL_MS_DEFAULT <= SCHEDULER_TICK_INTERVAL_MS_MAX);
    assert!(SCHEDULER_PARTITIONS_COUNT_DEFAULT <= SCHEDULER_PARTITIONS_COUNT_MAX);
    assert!(MAILBOX_POLL_INTERVAL_MS_DEFAULT > 0);
    assert!(ADDRESS_LENGTH_BYTES_MAX >= 64);
    assert!(OUTCOME_CODE_SUCCESS == 0);
    assert!(OUTCOME_CODE_UNEXPECTED_STATE_DURING_DESTRUCTION == 1010);
};
