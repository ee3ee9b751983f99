/// Per-URL processing stages
///
/// A worker walks every frontier entry through these stages. Transitions are
/// checked so that an out-of-order step (e.g. storing a record that was never
/// extracted) surfaces as an error instead of silently corrupting counters.
use crate::HarvestError;
use std::fmt;

/// Represents where a URL currently is in the worker pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStage {
    /// Dequeued, nothing attempted yet
    Pending,

    /// Navigation and readiness wait in progress
    Loading,

    /// Last load attempt timed out; another attempt is scheduled
    RetryPending,

    /// Infinite scroll and expansion clicks
    Expanding,

    /// Extractor is building the record
    Extracting,

    /// A record was produced and handed to the admission gate
    Admitted,

    /// No record will be stored for this URL
    Rejected,

    /// Following links from an accepted page
    LinkDiscovery,

    /// URL is finished and marked visited
    Done,
}

impl PageStage {
    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: PageStage) -> bool {
        use PageStage::*;
        matches!(
            (self, next),
            (Pending, Loading)
                | (Pending, Done)
                | (Loading, Expanding)
                | (Loading, RetryPending)
                | (Loading, Rejected)
                | (Loading, Done)
                | (RetryPending, Loading)
                | (RetryPending, Done)
                | (Expanding, Extracting)
                | (Extracting, Admitted)
                | (Extracting, Rejected)
                | (Admitted, LinkDiscovery)
                | (Admitted, Rejected)
                | (Rejected, Done)
                | (LinkDiscovery, Done)
        )
    }

    /// Performs a checked transition
    pub fn transition(self, next: PageStage) -> Result<PageStage, HarvestError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(HarvestError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns true once the URL needs no further work
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true while the worker holds an admission permit for this stage
    pub fn holds_permit(&self) -> bool {
        matches!(self, Self::Loading | Self::Expanding | Self::Extracting)
    }

    /// Short lowercase name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::RetryPending => "retry_pending",
            Self::Expanding => "expanding",
            Self::Extracting => "extracting",
            Self::Admitted => "admitted",
            Self::Rejected => "rejected",
            Self::LinkDiscovery => "link_discovery",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
