//! Cursor kinds and their lifecycle table (spec.md §4.5).

/// The five cursor kinds the manager distinguishes. Each kind has its own
/// state/resumption/close-trigger row in spec.md §4.5's lifecycle table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorKind {
    /// A regular `find`/`aggregate` cursor that streams pages on demand.
    Streamable,
    /// `find` with `singleBatch: true` or a pipeline whose shape guarantees
    /// one page (e.g. a terminal `$group` with no downstream consumer).
    SingleBatch,
    /// A recognized `_id`-equality point read against the shard key.
    PointRead,
    /// A capped-collection `find` with `tailable: true`.
    Tailable,
    /// A cursor explicitly kept alive across getMores beyond the default
    /// inactivity timeout (`noCursorTimeout`) or backed by a spill file.
    Persistent,
}

/// How a client resumes consuming a cursor of this kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumptionMode {
    /// Spec.md §6.3: `{primaryKey, table-continuations, params}`.
    ContinuationToken,
    /// No resumption; the whole result fits in the first response.
    None,
    /// The client re-issues a `getMore` and the server resumes scanning
    /// from its last-returned position in capped-collection order.
    Implicit,
    /// The client presents the cursor id minted on the first response.
    CursorId,
}

/// What closes a cursor of this kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseTrigger {
    ExhaustionBatchCapOrTtl,
    AfterFirstResponse,
    ClientCloseOrTtl,
    ClientCloseTtlOrExplicitKill,
}

impl CursorKind {
    pub fn resumption(self) -> ResumptionMode {
        match self {
            CursorKind::Streamable => ResumptionMode::ContinuationToken,
            CursorKind::SingleBatch | CursorKind::PointRead => ResumptionMode::None,
            CursorKind::Tailable => ResumptionMode::Implicit,
            CursorKind::Persistent => ResumptionMode::CursorId,
        }
    }

    pub fn close_trigger(self) -> CloseTrigger {
        match self {
            CursorKind::Streamable => CloseTrigger::ExhaustionBatchCapOrTtl,
            CursorKind::SingleBatch | CursorKind::PointRead => CloseTrigger::AfterFirstResponse,
            CursorKind::Tailable => CloseTrigger::ClientCloseOrTtl,
            CursorKind::Persistent => CloseTrigger::ClientCloseTtlOrExplicitKill,
        }
    }

    /// Whether this kind ever hands the client a cursor id to resume with
    /// (spec.md §6.2: `find`/`aggregate` responses carry `{firstBatch,
    /// id}`; `id` is `0` when no further batches exist).
    pub fn allocates_cursor_id(self) -> bool {
        matches!(
            self,
            CursorKind::Streamable | CursorKind::Tailable | CursorKind::Persistent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_read_closes_after_first_response_and_mints_no_id() {
        assert_eq!(CursorKind::PointRead.close_trigger(), CloseTrigger::AfterFirstResponse);
        assert!(!CursorKind::PointRead.allocates_cursor_id());
    }

    #[test]
    fn persistent_cursor_resumes_by_id_and_survives_until_killed() {
        assert_eq!(CursorKind::Persistent.resumption(), ResumptionMode::CursorId);
        assert_eq!(
            CursorKind::Persistent.close_trigger(),
            CloseTrigger::ClientCloseTtlOrExplicitKill
        );
        assert!(CursorKind::Persistent.allocates_cursor_id());
    }

    #[test]
    fn tailable_resumes_implicitly() {
        assert_eq!(CursorKind::Tailable.resumption(), ResumptionMode::Implicit);
    }
}
