/// Crawl phase definitions for tracking pipeline progress
use std::fmt;

/// Where the pipeline currently is in its page → item → product walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nothing fetched yet
    Idle,

    /// Fetching a listing page (through the retry orchestrator)
    FetchingListing,

    /// Splitting the listing into items and reading their previews
    ExtractingItems,

    /// Fetching an item's detail and spec pages
    FetchingDetail,

    ExtractingFullInfo,

    /// Appending the assembled product
    Accumulating,

    // ===== Terminal =====
    /// All configured pages walked
    Done,
}

impl CrawlPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the pipeline may move from this phase to `next`
    ///
    /// `Accumulating` loops back to `FetchingDetail` (next item), to
    /// `Accumulating` (next item has no product link), or to
    /// `FetchingListing` (next page). A page with no items goes straight from
    /// `ExtractingItems` to the next page or to `Done`.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        matches!(
            (self, next),
            (Idle, FetchingListing)
                | (Idle, Done)
                | (FetchingListing, ExtractingItems)
                | (ExtractingItems, FetchingDetail)
                | (ExtractingItems, Accumulating)
                | (ExtractingItems, FetchingListing)
                | (ExtractingItems, Done)
                | (FetchingDetail, ExtractingFullInfo)
                | (ExtractingFullInfo, Accumulating)
                | (Accumulating, FetchingDetail)
                | (Accumulating, Accumulating)
                | (Accumulating, FetchingListing)
                | (Accumulating, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingListing => "fetching_listing",
            Self::ExtractingItems => "extracting_items",
            Self::FetchingDetail => "fetching_detail",
            Self::ExtractingFullInfo => "extracting_full_info",
            Self::Accumulating => "accumulating",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
