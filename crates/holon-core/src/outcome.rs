//! Outcome model
//!
//! TigerStyle: Immutable result values, explicit severity order, bounded folds.
//!
//! An [`Outcome`] is either a [`SingleOutcome`] reported by one provider or a
//! [`MultipleOutcome`] aggregating many. Aggregates keep their children sorted
//! by descending severity, so the worst result is always the head and the
//! aggregate reports the head's severity, provider, code and message.
//!
//! [`Outcome::pack`] normalizes an aggregate to the smallest value with the same
//! severity meaning: every success collapses into at most one representative,
//! an empty result becomes a plain `OK`, and a single survivor is unwrapped.

use crate::constants::*;
use crate::logging::{LogLevel, OutcomeLog};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Severity
// =============================================================================

/// Severity of an outcome, least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Success
    Ok,
    /// Success with information
    Info,
    /// Success with a non-fatal concern
    Warning,
    /// Expected, validated rejection
    Failure,
    /// Unexpected runtime fault, caught and wrapped
    Error,
    /// Interrupted by request
    Cancel,
    /// Unrecoverable
    Fatal,
}

/// Mask of the success severities (`OK`, `INFO`, `WARNING`)
pub const SEVERITY_MASK_SUCCESS: u8 = 0x01 | 0x02 | 0x04;

/// Mask of the failure severities (`FAILURE`, `ERROR`, `CANCEL`, `FATAL`)
pub const SEVERITY_MASK_FAILURE: u8 = 0x08 | 0x10 | 0x20 | 0x40;

/// Mask of every severity
pub const SEVERITY_MASK_ALL: u8 = SEVERITY_MASK_SUCCESS | SEVERITY_MASK_FAILURE;

impl Severity {
    /// Every severity, ascending
    pub const ALL: [Severity; 7] = [
        Severity::Ok,
        Severity::Info,
        Severity::Warning,
        Severity::Failure,
        Severity::Error,
        Severity::Cancel,
        Severity::Fatal,
    ];

    /// Bit mask of this severity (`OK` = 0x01 up to `FATAL` = 0x40)
    pub fn mask(self) -> u8 {
        1u8 << (self as u8)
    }

    /// `OK`, `INFO` or `WARNING`
    pub fn is_success(self) -> bool {
        self.mask() & SEVERITY_MASK_SUCCESS != 0
    }

    /// `FAILURE`, `ERROR`, `CANCEL` or `FATAL`
    pub fn is_failure(self) -> bool {
        self.mask() & SEVERITY_MASK_FAILURE != 0
    }

    /// Level at which an outcome of this severity is logged
    pub fn log_level(self) -> LogLevel {
        match self {
            Severity::Ok => LogLevel::Off,
            Severity::Info => LogLevel::Info,
            Severity::Warning => LogLevel::Warning,
            Severity::Failure | Severity::Error | Severity::Cancel | Severity::Fatal => {
                LogLevel::Severe
            }
        }
    }

    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Failure => "failure",
            Severity::Error => "error",
            Severity::Cancel => "cancel",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// SingleOutcome
// =============================================================================

/// Result reported by one provider
///
/// Equality compares severity, provider and code only.
#[derive(Debug, Clone)]
pub struct SingleOutcome {
    severity: Severity,
    provider: Arc<str>,
    code: i32,
    message: Option<String>,
    fault: Option<String>,
    loggable: bool,
}

impl SingleOutcome {
    /// Create a single outcome
    pub fn new(severity: Severity, provider: impl Into<Arc<str>>, code: i32) -> Self {
        Self {
            severity,
            provider: provider.into(),
            code,
            message: None,
            fault: None,
            loggable: true,
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the description of the fault that produced this outcome
    pub fn with_fault(mut self, fault: impl Into<String>) -> Self {
        self.fault = Some(fault.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Loggable flag set and a severity that is logged at all
    pub fn is_loggable(&self) -> bool {
        self.loggable && self.severity.log_level() != LogLevel::Off
    }
}

impl PartialEq for SingleOutcome {
    fn eq(&self, other: &Self) -> bool {
        self.severity == other.severity
            && self.code == other.code
            && self.provider == other.provider
    }
}

impl Eq for SingleOutcome {}

impl fmt::Display for SingleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}#{}]", self.severity, self.provider, self.code)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

// =============================================================================
// MultipleOutcome
// =============================================================================

/// Aggregate of outcomes, sorted by descending severity
///
/// Insertion is stable: a child lands after every child of equal severity.
#[derive(Debug, Clone)]
pub struct MultipleOutcome {
    children: Vec<Outcome>,
    loggable: bool,
}

impl Default for MultipleOutcome {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipleOutcome {
    /// Create an empty aggregate
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            loggable: true,
        }
    }

    /// Insert a child at its severity position
    pub fn push(&mut self, outcome: Outcome) {
        let severity = outcome.severity();
        let position = self
            .children
            .partition_point(|child| child.severity() >= severity);
        self.children.insert(position, outcome);

        debug_assert!(self
            .children
            .windows(2)
            .all(|pair| pair[0].severity() >= pair[1].severity()));
    }

    /// Builder form of [`MultipleOutcome::push`]
    pub fn with(mut self, outcome: Outcome) -> Self {
        self.push(outcome);
        self
    }

    /// Children, most severe first
    pub fn children(&self) -> &[Outcome] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Most severe child
    pub fn head(&self) -> Option<&Outcome> {
        self.children.first()
    }

    /// Severity of the head (`OK` when empty)
    pub fn severity(&self) -> Severity {
        self.head().map(Outcome::severity).unwrap_or(Severity::Ok)
    }

    /// Whether a child has exactly this severity (binary search)
    pub fn matches(&self, severity: Severity) -> bool {
        self.children
            .binary_search_by(|child| severity.cmp(&child.severity()))
            .is_ok()
    }

    /// Whether a child has a severity in `mask`
    ///
    /// One binary search per severity bit set in the mask.
    pub fn matches_mask(&self, mask: u8) -> bool {
        Severity::ALL
            .iter()
            .filter(|severity| severity.mask() & mask != 0)
            .any(|severity| self.matches(*severity))
    }

    /// Loggable flag set, non-empty, and a loggable head
    pub fn is_loggable(&self) -> bool {
        self.loggable && self.head().map(Outcome::is_loggable).unwrap_or(false)
    }

    /// Normalize to the smallest equivalent outcome
    pub fn pack(&self, provider: &str) -> Outcome {
        let mut representative: Option<Outcome> = None;
        let mut packed = MultipleOutcome {
            children: Vec::with_capacity(self.children.len()),
            loggable: self.loggable,
        };

        for child in &self.children {
            let child = child.pack(provider);
            if child.severity() <= Severity::Info {
                if representative.is_none() {
                    representative = Some(child);
                }
            } else {
                packed.push(child);
            }
        }

        if packed.is_empty() {
            if let Some(representative) = representative {
                packed.push(representative);
            }
        }

        if packed.len() > 1 {
            return Outcome::Multiple(packed);
        }

        match packed.children.pop() {
            Some(mut only) => {
                only.set_loggable(self.loggable);
                only
            }
            None => {
                let mut ok = Outcome::ok(provider);
                ok.set_loggable(self.loggable);
                ok
            }
        }
    }
}

impl PartialEq for MultipleOutcome {
    fn eq(&self, other: &Self) -> bool {
        self.children == other.children
    }
}

impl Eq for MultipleOutcome {}

impl FromIterator<Outcome> for MultipleOutcome {
    fn from_iter<I: IntoIterator<Item = Outcome>>(iter: I) -> Self {
        let mut multiple = MultipleOutcome::new();
        multiple.extend(iter);
        multiple
    }
}

impl Extend<Outcome> for MultipleOutcome {
    fn extend<I: IntoIterator<Item = Outcome>>(&mut self, iter: I) {
        for outcome in iter {
            self.push(outcome);
        }
    }
}

impl fmt::Display for MultipleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", child)?;
        }
        write!(f, "]")
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Single or aggregated execution result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Single(SingleOutcome),
    Multiple(MultipleOutcome),
}

impl Outcome {
    /// Single outcome with the given severity
    pub fn single(severity: Severity, provider: impl Into<Arc<str>>, code: i32) -> Self {
        Outcome::Single(SingleOutcome::new(severity, provider, code))
    }

    /// Success
    pub fn ok(provider: impl Into<Arc<str>>) -> Self {
        Self::single(Severity::Ok, provider, OUTCOME_CODE_SUCCESS)
    }

    /// Cancellation
    pub fn cancel(provider: impl Into<Arc<str>>) -> Self {
        Self::single(Severity::Cancel, provider, OUTCOME_CODE_CANCELLATION)
    }

    /// Warning with a message
    pub fn warning(provider: impl Into<Arc<str>>, message: impl Into<String>) -> Self {
        Outcome::Single(
            SingleOutcome::new(Severity::Warning, provider, OUTCOME_CODE_WARNING)
                .with_message(message),
        )
    }

    /// Unexpected fault, caught and wrapped
    pub fn error(provider: impl Into<Arc<str>>, fault: impl Into<String>) -> Self {
        let fault = fault.into();
        Outcome::Single(
            SingleOutcome::new(Severity::Error, provider, OUTCOME_CODE_ERROR)
                .with_message(fault.clone())
                .with_fault(fault),
        )
    }

    /// Validated rejection with a specific code
    pub fn failure(provider: impl Into<Arc<str>>, code: i32, message: impl Into<String>) -> Self {
        Outcome::Single(SingleOutcome::new(Severity::Failure, provider, code).with_message(message))
    }

    /// The single outcome reported by this outcome, following heads
    pub fn leading(&self) -> Option<&SingleOutcome> {
        let mut current = self;
        loop {
            match current {
                Outcome::Single(single) => return Some(single),
                Outcome::Multiple(multiple) => current = multiple.head()?,
            }
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Outcome::Single(single) => single.severity(),
            Outcome::Multiple(multiple) => multiple.severity(),
        }
    }

    /// Provider of the leading single outcome
    pub fn provider(&self) -> Option<&str> {
        self.leading().map(SingleOutcome::provider)
    }

    /// Code of the leading single outcome (`SUCCESS` when empty)
    pub fn code(&self) -> i32 {
        self.leading()
            .map(SingleOutcome::code)
            .unwrap_or(OUTCOME_CODE_SUCCESS)
    }

    pub fn message(&self) -> Option<&str> {
        self.leading().and_then(SingleOutcome::message)
    }

    pub fn fault(&self) -> Option<&str> {
        self.leading().and_then(SingleOutcome::fault)
    }

    /// `OK`, `INFO` or `WARNING` (false for an empty aggregate)
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Single(single) => single.severity().is_success(),
            Outcome::Multiple(multiple) => {
                !multiple.is_empty() && multiple.severity().is_success()
            }
        }
    }

    /// `FAILURE`, `ERROR`, `CANCEL` or `FATAL` (false for an empty aggregate)
    pub fn is_failure(&self) -> bool {
        match self {
            Outcome::Single(single) => single.severity().is_failure(),
            Outcome::Multiple(multiple) => {
                !multiple.is_empty() && multiple.severity().is_failure()
            }
        }
    }

    /// Exact severity membership
    pub fn matches(&self, severity: Severity) -> bool {
        match self {
            Outcome::Single(single) => single.severity() == severity,
            Outcome::Multiple(multiple) => multiple.matches(severity),
        }
    }

    /// Severity mask intersection
    pub fn matches_mask(&self, mask: u8) -> bool {
        match self {
            Outcome::Single(single) => single.severity().mask() & mask != 0,
            Outcome::Multiple(multiple) => multiple.matches_mask(mask),
        }
    }

    pub fn is_loggable(&self) -> bool {
        match self {
            Outcome::Single(single) => single.is_loggable(),
            Outcome::Multiple(multiple) => multiple.is_loggable(),
        }
    }

    /// Set the per-instance loggable flag
    pub fn set_loggable(&mut self, loggable: bool) {
        match self {
            Outcome::Single(single) => single.loggable = loggable,
            Outcome::Multiple(multiple) => multiple.loggable = loggable,
        }
    }

    /// Children of an aggregate (empty for a single outcome)
    pub fn children(&self) -> &[Outcome] {
        match self {
            Outcome::Single(_) => &[],
            Outcome::Multiple(multiple) => multiple.children(),
        }
    }

    /// Number of outcomes at the top level (1 for a single outcome)
    pub fn len(&self) -> usize {
        match self {
            Outcome::Single(_) => 1,
            Outcome::Multiple(multiple) => multiple.len(),
        }
    }

    /// Whether this is an empty aggregate
    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Multiple(multiple) if multiple.is_empty())
    }

    /// Normalize to the smallest equivalent outcome
    ///
    /// Single outcomes are returned unchanged; `provider` names the `OK`
    /// produced when nothing is left.
    pub fn pack(&self, provider: &str) -> Outcome {
        match self {
            Outcome::Single(_) => self.clone(),
            Outcome::Multiple(multiple) => multiple.pack(provider),
        }
    }

    /// Emit every loggable single outcome, in order, to `sink`
    pub fn log_on(&self, sink: &dyn OutcomeLog) {
        let mut stack: Vec<&Outcome> = vec![self];
        while let Some(outcome) = stack.pop() {
            match outcome {
                Outcome::Single(single) => {
                    if single.is_loggable() {
                        sink.record(single.severity().log_level(), single);
                    }
                }
                Outcome::Multiple(multiple) => {
                    if multiple.loggable {
                        stack.extend(multiple.children.iter().rev());
                    }
                }
            }
        }
    }
}

impl From<SingleOutcome> for Outcome {
    fn from(single: SingleOutcome) -> Self {
        Outcome::Single(single)
    }
}

impl From<MultipleOutcome> for Outcome {
    fn from(multiple: MultipleOutcome) -> Self {
        Outcome::Multiple(multiple)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Single(single) => single.fmt(f),
            Outcome::Multiple(multiple) => multiple.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingLog {
        records: RefCell<Vec<(LogLevel, String)>>,
    }

    impl OutcomeLog for RecordingLog {
        fn record(&self, level: LogLevel, outcome: &SingleOutcome) {
            self.records
                .borrow_mut()
                .push((level, outcome.provider().to_string()));
        }
    }

    fn of(severity: Severity, provider: &str) -> Outcome {
        Outcome::single(severity, provider, 0)
    }

    #[test]
    fn test_severity_order_and_masks() {
        assert!(Severity::Ok < Severity::Info);
        assert!(Severity::Cancel < Severity::Fatal);
        assert_eq!(Severity::Ok.mask(), 0x01);
        assert_eq!(Severity::Error.mask(), 0x10);
        assert_eq!(Severity::Fatal.mask(), 0x40);
        assert!(Severity::Warning.is_success());
        assert!(!Severity::Warning.is_failure());
        assert!(Severity::Failure.is_failure());
        assert_eq!(Severity::Cancel.log_level(), LogLevel::Severe);
        assert_eq!(Severity::Ok.log_level(), LogLevel::Off);
    }

    #[test]
    fn test_multiple_head_is_most_severe() {
        let multiple: MultipleOutcome = [
            of(Severity::Warning, "a"),
            of(Severity::Ok, "b"),
            of(Severity::Fatal, "c"),
            of(Severity::Info, "d"),
        ]
        .into_iter()
        .collect();
        let outcome = Outcome::Multiple(multiple);

        assert_eq!(outcome.severity(), Severity::Fatal);
        assert_eq!(outcome.provider(), Some("c"));
        assert!(outcome.is_failure());
        assert!(!outcome.is_success());

        let order: Vec<Severity> = outcome.children().iter().map(Outcome::severity).collect();
        assert_eq!(
            order,
            vec![
                Severity::Fatal,
                Severity::Warning,
                Severity::Info,
                Severity::Ok
            ]
        );
    }

    #[test]
    fn test_equal_severities_keep_insertion_order() {
        let multiple = MultipleOutcome::new()
            .with(of(Severity::Error, "first"))
            .with(of(Severity::Fatal, "worst"))
            .with(of(Severity::Error, "second"))
            .with(of(Severity::Error, "third"));

        let providers: Vec<&str> = multiple
            .children()
            .iter()
            .filter_map(Outcome::provider)
            .collect();
        assert_eq!(providers, vec!["worst", "first", "second", "third"]);
    }

    #[test]
    fn test_empty_multiple_is_neither_success_nor_failure() {
        let outcome = Outcome::Multiple(MultipleOutcome::new());
        assert!(!outcome.is_success());
        assert!(!outcome.is_failure());
        assert!(outcome.is_empty());
        assert_eq!(outcome.code(), OUTCOME_CODE_SUCCESS);
        assert!(outcome.provider().is_none());
    }

    #[test]
    fn test_matches_severity_and_mask() {
        let outcome = Outcome::Multiple(
            MultipleOutcome::new()
                .with(of(Severity::Warning, "a"))
                .with(of(Severity::Error, "b"))
                .with(of(Severity::Ok, "c")),
        );

        assert!(outcome.matches(Severity::Error));
        assert!(outcome.matches(Severity::Ok));
        assert!(!outcome.matches(Severity::Fatal));
        assert!(!outcome.matches(Severity::Info));

        assert!(outcome.matches_mask(SEVERITY_MASK_FAILURE));
        assert!(outcome.matches_mask(Severity::Info.mask() | Severity::Warning.mask()));
        assert!(!outcome.matches_mask(Severity::Cancel.mask() | Severity::Fatal.mask()));

        let single = of(Severity::Cancel, "x");
        assert!(single.matches(Severity::Cancel));
        assert!(single.matches_mask(SEVERITY_MASK_FAILURE));
        assert!(!single.matches_mask(SEVERITY_MASK_SUCCESS));
    }

    #[test]
    fn test_pack_all_ok_yields_single_ok() {
        let outcome = Outcome::Multiple(
            MultipleOutcome::new()
                .with(Outcome::ok("a"))
                .with(Outcome::ok("b"))
                .with(Outcome::ok("c")),
        );

        let packed = outcome.pack("activator");
        assert!(matches!(packed, Outcome::Single(_)));
        assert_eq!(packed.severity(), Severity::Ok);
    }

    #[test]
    fn test_pack_empty_yields_ok_of_provider() {
        let packed = Outcome::Multiple(MultipleOutcome::new()).pack("activator");
        assert_eq!(packed, Outcome::ok("activator"));
    }

    #[test]
    fn test_pack_unwraps_single_survivor() {
        let outcome = Outcome::Multiple(
            MultipleOutcome::new()
                .with(Outcome::ok("a"))
                .with(Outcome::error("b", "boom"))
                .with(Outcome::single(Severity::Info, "c", 0)),
        );

        let packed = outcome.pack("activator");
        assert_eq!(packed, Outcome::error("b", "boom"));
        assert_eq!(packed.fault(), Some("boom"));
    }

    #[test]
    fn test_pack_drops_successes_next_to_failures() {
        let outcome = Outcome::Multiple(
            MultipleOutcome::new()
                .with(Outcome::ok("a"))
                .with(Outcome::warning("b", "slow"))
                .with(Outcome::error("c", "boom"))
                .with(Outcome::single(Severity::Info, "d", 0)),
        );

        let packed = outcome.pack("activator");
        assert_eq!(packed.len(), 2);
        assert_eq!(packed.severity(), Severity::Error);
        assert!(!packed.matches(Severity::Ok));
        assert!(!packed.matches(Severity::Info));
    }

    #[test]
    fn test_pack_flattens_nested_healthy_subtrees() {
        let healthy = Outcome::Multiple(
            MultipleOutcome::new()
                .with(Outcome::ok("x"))
                .with(Outcome::ok("y")),
        );
        let outcome = Outcome::Multiple(
            MultipleOutcome::new()
                .with(healthy.clone())
                .with(healthy)
                .with(Outcome::cancel("z")),
        );

        assert_eq!(outcome.pack("root"), Outcome::cancel("z"));
    }

    #[test]
    fn test_pack_is_idempotent() {
        let inner = Outcome::Multiple(
            MultipleOutcome::new()
                .with(Outcome::warning("w", "careful"))
                .with(Outcome::error("e", "boom"))
                .with(Outcome::ok("o")),
        );
        let samples = vec![
            Outcome::ok("p"),
            Outcome::Multiple(MultipleOutcome::new()),
            inner.clone(),
            Outcome::Multiple(
                MultipleOutcome::new()
                    .with(inner)
                    .with(Outcome::single(Severity::Fatal, "f", 7))
                    .with(Outcome::single(Severity::Info, "i", 0)),
            ),
        ];

        for sample in samples {
            let once = sample.pack("root");
            let twice = once.pack("root");
            assert_eq!(once, twice, "pack not idempotent for {}", sample);
        }
    }

    #[test]
    fn test_pack_single_is_identity() {
        let outcome = Outcome::failure("role", OUTCOME_CODE_NO_SUCH_ROLEPLAYER, "missing");
        assert_eq!(outcome.pack("other"), outcome);
        assert_eq!(outcome.code(), OUTCOME_CODE_NO_SUCH_ROLEPLAYER);
    }

    #[test]
    fn test_equality_ignores_message_and_loggable() {
        let mut a = Outcome::warning("p", "one");
        let b = Outcome::warning("p", "two");
        a.set_loggable(false);
        assert_eq!(a, b);
        assert_ne!(Outcome::warning("p", "x"), Outcome::warning("q", "x"));
    }

    #[test]
    fn test_warning_factory_is_warning() {
        let outcome = Outcome::warning("p", "careful");
        assert_eq!(outcome.severity(), Severity::Warning);
        assert_eq!(outcome.code(), OUTCOME_CODE_WARNING);
        assert_eq!(outcome.message(), Some("careful"));
    }

    #[test]
    fn test_log_on_walks_children_in_order() {
        let outcome = Outcome::Multiple(
            MultipleOutcome::new()
                .with(Outcome::ok("silent"))
                .with(Outcome::warning("warned", "w"))
                .with(Outcome::Multiple(
                    MultipleOutcome::new()
                        .with(Outcome::error("nested", "boom"))
                        .with(Outcome::single(Severity::Info, "info", 0)),
                )),
        );

        let log = RecordingLog::default();
        outcome.log_on(&log);

        let records = log.records.into_inner();
        assert_eq!(
            records,
            vec![
                (LogLevel::Severe, "nested".to_string()),
                (LogLevel::Info, "info".to_string()),
                (LogLevel::Warning, "warned".to_string()),
            ]
        );
    }

    #[test]
    fn test_log_on_respects_loggable_flag() {
        let mut outcome = Outcome::error("p", "boom");
        outcome.set_loggable(false);
        assert!(!outcome.is_loggable());

        let log = RecordingLog::default();
        outcome.log_on(&log);
        assert!(log.records.borrow().is_empty());

        assert!(!Outcome::ok("p").is_loggable());
        assert!(Outcome::error("p", "boom").is_loggable());
    }

    #[test]
    fn test_display() {
        let outcome = Outcome::warning("agent-1", "slow");
        assert_eq!(outcome.to_string(), "warning [agent-1#-3]: slow");
    }
}
