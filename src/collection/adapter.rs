//! The data-adapter contract (spec §6) and the payload trait items must
//! implement to participate in placeholder synthesis.

use async_trait::async_trait;
use std::borrow::Cow;

use crate::error::ConfigError;

/// A payload stored in the list's sparse array.
///
/// Mirrors spec §9's resolution of the `any`-payload design note: rather
/// than a duck-typed object, items are a monomorphic type per list instance,
/// carrying a stable id accessor and an optional sampling hook used only
/// for placeholder synthesis (spec §4.4 "Placeholder synthesis").
pub trait ListItem: Clone + PartialEq + 'static {
    /// A stable identifier, unique within the list and independent of
    /// position (spec §6: "Each item MUST have a stable `id` (string)").
    fn stable_id(&self) -> Cow<'_, str>;

    /// String-coercible sample fields, used only when learning placeholder
    /// structure from the first loaded batch. Returns `(field name, string
    /// length)` pairs; implementors that don't want placeholder synthesis
    /// may leave this at its default empty implementation.
    fn sample_fields(&self) -> Vec<(&'static str, usize)> {
        Vec::new()
    }
}

/// Parameters for a page-based load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    /// 1-indexed page number.
    pub page: usize,
    /// Items per page.
    pub limit: usize,
}

/// Parameters for an offset-based load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetParams {
    /// Zero-indexed starting offset.
    pub offset: usize,
    /// Number of items requested.
    pub limit: usize,
}

/// Parameters for a cursor-based load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorParams {
    /// Opaque cursor, or `None` to request the first page.
    pub cursor: Option<String>,
    /// Number of items requested.
    pub limit: usize,
}

/// Optional metadata an adapter response may carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
    /// The adapter's authoritative total item count, if known. Spec §4.4:
    /// honored only monotonically upward for massive lists.
    pub total: Option<usize>,
}

/// An adapter-reported (non-exceptional) error (spec §6: `{error}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterError {
    /// Human-readable message, surfaced in `range:failed` events.
    pub message: String,
}

/// The result of a single range load: either items (with optional metadata)
/// or an adapter-reported error. A panicking/rejecting adapter call is
/// handled separately, at the call site, and converted into the same
/// [`AdapterError`] shape.
pub struct LoadOutcome<T> {
    /// Items returned for the requested range.
    pub items: Vec<T>,
    /// Optional response metadata.
    pub meta: ResponseMeta,
}

/// The injected data source (spec §6 "Data adapter contract"). Any one of
/// `load_page`/`load_range`/`load_with_cursor` satisfies the strategy it
/// corresponds to; `read` is the generic fallback satisfying all three.
///
/// Implementors return `Err(AdapterError)` for application-level failures
/// (spec's `{error}` response shape); a future that resolves to a Rust
/// `panic` or a rejected JS promise is caught by the collection coordinator
/// itself and converted into the same `AdapterError` shape, so adapters
/// never need to catch their own transport errors.
#[async_trait(?Send)]
pub trait DataAdapter<T: ListItem> {
    /// Load a page of items (spec: `loadPage({page, limit})`).
    async fn load_page(&self, _params: PageParams) -> Result<LoadOutcome<T>, AdapterError> {
        Err(AdapterError {
            message: "load_page is not implemented by this adapter".to_string(),
        })
    }

    /// Load a contiguous offset range (spec: `loadRange({offset, limit})`).
    async fn load_range(&self, _params: OffsetParams) -> Result<LoadOutcome<T>, AdapterError> {
        Err(AdapterError {
            message: "load_range is not implemented by this adapter".to_string(),
        })
    }

    /// Load starting from an opaque cursor (spec: `loadWithCursor({limit,
    /// cursor})`).
    async fn load_with_cursor(&self, _params: CursorParams) -> Result<LoadOutcome<T>, AdapterError> {
        Err(AdapterError {
            message: "load_with_cursor is not implemented by this adapter".to_string(),
        })
    }

    /// Whether `load_page` is implemented by this adapter (used at
    /// configuration time to fail fast — spec §7 "Configuration errors").
    fn supports_page(&self) -> bool { false }
    /// Whether `load_range` is implemented by this adapter.
    fn supports_range(&self) -> bool { false }
    /// Whether `load_with_cursor` is implemented by this adapter.
    fn supports_cursor(&self) -> bool { false }
}

/// Which pagination strategy the collection dispatches against the adapter.
/// Changing this at runtime clears `loadedRanges`/`pendingRanges` and emits
/// `strategy:changed` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStrategy {
    /// `page = floor(offset / limit) + 1`.
    Page,
    /// Direct `{offset, limit}`.
    Offset,
    /// Opaque cursor derived from the previously-loaded item at `offset -
    /// 1` (spec §9 Open Question, resolved in SPEC_FULL.md).
    Cursor,
}

impl PaginationStrategy {
    /// Validate that `adapter` implements the method this strategy requires,
    /// per spec §7 ("Configuration errors... fail fast and synchronously at
    /// construction").
    pub fn validate<T: ListItem, A: DataAdapter<T>>(self, adapter: &A) -> Result<(), ConfigError> {
        let (method, supported) = match self {
            Self::Page => ("load_page", adapter.supports_page()),
            Self::Offset => ("load_range", adapter.supports_range()),
            Self::Cursor => ("load_with_cursor", adapter.supports_cursor()),
        };
        if supported {
            Ok(())
        } else {
            Err(ConfigError::MissingAdapterMethod {
                strategy: self.name(),
                method,
            })
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Offset => "offset",
            Self::Cursor => "cursor",
        }
    }
}
