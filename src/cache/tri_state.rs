use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

/// Value of one candidate path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    True,
    False,
    /// Node missing, empty or not a recognized boolean
    #[default]
    Unset,
}

impl TriState {
    /// `true`/`1` and `false`/`0`, ASCII case-insensitive. Anything else,
    /// including invalid UTF-8, is [`TriState::Unset`].
    pub fn parse(raw: &[u8]) -> Self {
        match std::str::from_utf8(raw) {
            Ok(text) if text == "1" || text.eq_ignore_ascii_case("true") => TriState::True,
            Ok(text) if text == "0" || text.eq_ignore_ascii_case("false") => TriState::False,
            _ => TriState::Unset,
        }
    }

    pub fn from_data(data: Option<&[u8]>) -> Self {
        data.map(Self::parse).unwrap_or(TriState::Unset)
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            TriState::True => Some(true),
            TriState::False => Some(false),
            TriState::Unset => None,
        }
    }

    pub fn is_set(self) -> bool {
        self != TriState::Unset
    }

    fn to_raw(self) -> u8 {
        match self {
            TriState::Unset => 0,
            TriState::False => 1,
            TriState::True => 2,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => TriState::False,
            2 => TriState::True,
            _ => TriState::Unset,
        }
    }
}

/// Lock-free cell holding a [`TriState`]
#[derive(Debug, Default)]
pub(crate) struct AtomicTriState(AtomicU8);

impl AtomicTriState {
    pub(crate) fn new(state: TriState) -> Self {
        Self(AtomicU8::new(state.to_raw()))
    }

    pub(crate) fn load(&self) -> TriState {
        TriState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(
        &self,
        state: TriState,
    ) {
        self.0.store(state.to_raw(), Ordering::Release);
    }
}
