//! The input channel between the keypad and the kiosk loop.
//!
//! The keypad driver pushes raw key presses into a [`KeyEventSink`]. The sink owns the buffering rules for the
//! current input mode and emits complete tokens into a bounded queue, which the kiosk loop reads through
//! [`InputChannel`].
//!
//! * In [`InputMode::SingleDigit`] mode every digit is a token on its own. `#` and `*` are ignored.
//! * In [`InputMode::MultiDigit`] mode digits accumulate. `#` submits the buffer as one token (an empty buffer is
//!   not submitted) and `*` clears it.
//!
//! The kiosk calls [`InputChannel::begin_phase`] before every prompt, which sets the mode, clears the buffer and
//! throws away any tokens that were queued for an earlier prompt.
use std::{
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::*;
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_KEY_QUEUE_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    /// `#`, the submit key.
    Hash,
    /// `*`, the clear key.
    Star,
}

impl Key {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0'..='9' => c.to_digit(10).map(|d| Key::Digit(d as u8)),
            '#' => Some(Key::Hash),
            '*' => Some(Key::Star),
            _ => None,
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Digit(d) => write!(f, "{d}"),
            Key::Hash => write!(f, "#"),
            Key::Star => write!(f, "*"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    SingleDigit,
    MultiDigit,
}

#[derive(Debug, Default)]
struct KeypadState {
    mode: InputMode,
    buffer: String,
}

impl KeypadState {
    /// Applies a key press and returns the token it completes, if any.
    fn on_key(&mut self, key: Key) -> Option<String> {
        match (self.mode, key) {
            (InputMode::SingleDigit, Key::Digit(d)) => Some(d.to_string()),
            (InputMode::SingleDigit, _) => None,
            (InputMode::MultiDigit, Key::Digit(d)) => {
                self.buffer.push(char::from(b'0' + d));
                None
            },
            (InputMode::MultiDigit, Key::Star) => {
                self.buffer.clear();
                None
            },
            (InputMode::MultiDigit, Key::Hash) => {
                if self.buffer.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.buffer))
                }
            },
        }
    }

    fn reset(&mut self, mode: InputMode) {
        self.mode = mode;
        self.buffer.clear();
    }
}

fn lock(state: &Mutex<KeypadState>) -> MutexGuard<'_, KeypadState> {
    // The state is always left consistent, so a panic in another holder does not invalidate it
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The producer side of the input channel. Handed to the keypad driver, which calls [`KeyEventSink::push`] from
/// whatever thread or task it reads keys on.
#[derive(Clone)]
pub struct KeyEventSink {
    state: Arc<Mutex<KeypadState>>,
    sender: mpsc::Sender<String>,
}

impl KeyEventSink {
    pub fn push(&self, key: Key) {
        let mut state = lock(&self.state);
        trace!("⌨️ Key {key} pressed in {:?} mode", state.mode);
        if let Some(token) = state.on_key(key) {
            // Sent while holding the lock so that `begin_phase` can never race with a half-delivered token
            match self.sender.try_send(token) {
                Ok(()) => {},
                Err(TrySendError::Full(_)) => warn!("⌨️ Key queue is full. Input was dropped."),
                Err(TrySendError::Closed(_)) => debug!("⌨️ Key queue is closed. Input was dropped."),
            }
        }
    }
}

/// The consumer side of the input channel, owned by the kiosk loop.
pub struct InputChannel {
    state: Arc<Mutex<KeypadState>>,
    sender: mpsc::Sender<String>,
    receiver: mpsc::Receiver<String>,
}

impl Default for InputChannel {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_QUEUE_SIZE)
    }
}

impl InputChannel {
    pub fn new(queue_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_size);
        Self { state: Arc::new(Mutex::new(KeypadState::default())), sender, receiver }
    }

    /// A sink for the keypad driver to push key presses into.
    pub fn sink(&self) -> KeyEventSink {
        KeyEventSink { state: Arc::clone(&self.state), sender: self.sender.clone() }
    }

    /// Starts a new input phase: sets the mode, clears any partial entry and discards queued tokens.
    pub fn begin_phase(&mut self, mode: InputMode) {
        let mut state = lock(&self.state);
        state.reset(mode);
        let mut discarded = 0;
        while self.receiver.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("⌨️ Discarded {discarded} stale tokens");
        }
        trace!("⌨️ New input phase in {mode:?} mode");
    }

    /// The digits typed so far in multi-digit mode. Used to echo the entry on the display.
    pub fn buffer_snapshot(&self) -> String {
        lock(&self.state).buffer.clone()
    }

    /// Waits for the next token. Cancel safe, so it can be used in `select!`.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Waits up to `timeout` for the next token.
    pub async fn next_token(&mut self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.receiver.recv()).await.ok().flatten()
    }
}
