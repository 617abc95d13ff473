/// Configuration for a single [crate::lift] call.
///
/// Mirrors the shape of small per-call config structs elsewhere in this toolkit's family (e.g. a
/// data-flow solver's "should this run interprocedurally" flag): a handful of integers with a
/// builder-style setter each, not a session-wide options surface.
#[derive(Debug, Clone)]
pub struct LifterOptions {
    fresh_id_start: i64,
}

impl Default for LifterOptions {
    fn default() -> Self {
        Self { fresh_id_start: -1 }
    }
}

impl LifterOptions {
    /// Get a new, default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub const fn fresh_id_start(&self) -> i64 {
        self.fresh_id_start
    }

    /// Set the starting value for the monotonically-decreasing synthetic id counter (see
    /// [crate::error::LiftError]'s fresh-id discipline). Defaults to `-1`. Callers embedding this
    /// crate's output into a larger id space that already uses small negative numbers for
    /// something else should pick a more negative start so that synthetic ids stay disjoint.
    pub fn set_fresh_id_start(&mut self, start: i64) -> &mut Self {
        self.fresh_id_start = start;
        self
    }
}
