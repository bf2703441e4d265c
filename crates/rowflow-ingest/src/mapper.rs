//! Row mapper collaborator interface.

use rowflow_model::{ImportEntry, Result};

/// Maps a typed line to zero or one domain object.
///
/// `skip_lines` declares how many leading rows per group belong to the
/// header zone. When `needed` is false the reader yields the typed line
/// unwrapped instead of invoking `map`.
pub trait RowMapper<L, N> {
    fn skip_lines(&self) -> usize {
        1
    }

    fn needed(&self) -> bool {
        true
    }

    fn map(&self, line: &L) -> Result<Option<N>>;
}

/// Closure-backed [`RowMapper`].
pub struct FnMapper<F> {
    map: F,
    skip_lines: usize,
}

impl<F> FnMapper<F> {
    pub fn new(map: F) -> Self {
        Self { map, skip_lines: 1 }
    }

    pub fn with_skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }
}

impl<L, N, F> RowMapper<L, N> for FnMapper<F>
where
    F: Fn(&L) -> Result<Option<N>>,
{
    fn skip_lines(&self) -> usize {
        self.skip_lines
    }

    fn map(&self, line: &L) -> Result<Option<N>> {
        (self.map)(line)
    }
}

/// Mapper that declares itself not needed: readers return the raw typed
/// line unwrapped and never call `map`.
#[derive(Debug, Clone)]
pub struct UnmappedMapper {
    skip_lines: usize,
}

impl UnmappedMapper {
    pub fn new() -> Self {
        Self { skip_lines: 1 }
    }

    pub fn with_skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }
}

impl Default for UnmappedMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl<L, N> RowMapper<L, N> for UnmappedMapper {
    fn skip_lines(&self) -> usize {
        self.skip_lines
    }

    fn needed(&self) -> bool {
        false
    }

    fn map(&self, _line: &L) -> Result<Option<N>> {
        Ok(None)
    }
}

/// Callback run on every produced entry before it is yielded onward; the
/// strategies route the processor chain through this hook.
pub type EntryHook<'h, N, L> = &'h mut dyn FnMut(&mut ImportEntry<N, L>) -> Result<()>;
