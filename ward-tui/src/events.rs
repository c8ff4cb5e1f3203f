//! Event types for the client event loop.

use crossterm::event::KeyEvent;
use ward_cache::QueryKey;

#[derive(Debug, Clone)]
pub enum TuiEvent {
    Input(KeyEvent),
    Tick,
    Resize { width: u16, height: u16 },
    /// An entry the client watches changed state.
    CacheUpdated(QueryKey),
}
