use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// the hex keypad laid over the left-hand side of a qwerty keyboard
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// terminals don't send key-up, so a key stays down this long after its
/// last press or auto-repeat
const TERM_KEY_HOLD: Duration = Duration::from_millis(100);

/// Where the interpreter reads the 16-key hex keypad from. Keys are `0x0..=0xf`.
pub trait Keypad {
    /// is `key` down right now
    fn is_held(&mut self, key: u8) -> bool;

    /// Non-blocking: `None` arms a wait, and the first fresh press after that
    /// is handed back (once) by a later call. Presses made while nobody was
    /// waiting don't count. The interpreter retries `fx0a` until this returns
    /// something.
    fn wait_for_key(&mut self) -> Option<u8>;
}

impl<K: Keypad + ?Sized> Keypad for &mut K {
    fn is_held(&mut self, key: u8) -> bool {
        (**self).is_held(key)
    }

    fn wait_for_key(&mut self) -> Option<u8> {
        (**self).wait_for_key()
    }
}

/// Key state fed by down/up events. Doubles as the headless keypad.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyState {
    held: u16,
    waiting: bool,
    latched: Option<u8>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// a fresh press (not a repeat of a held key) is latched if a
    /// `wait_for_key` is pending
    pub fn key_down(&mut self, key: u8) {
        let bit = 1 << (key & 0xf);
        if self.waiting && self.held & bit == 0 {
            self.latched = Some(key & 0xf);
        }
        self.held |= bit;
    }

    pub fn key_up(&mut self, key: u8) {
        self.held &= !(1 << (key & 0xf));
    }

    pub fn release_all(&mut self) {
        self.held = 0;
    }

    /// drop a pending wait and any press it caught
    pub fn cancel_wait(&mut self) {
        self.waiting = false;
        self.latched = None;
    }

    /// bitmask of held keys, bit n for key n
    pub fn held_mask(&self) -> u16 {
        self.held
    }
}

impl Keypad for KeyState {
    fn is_held(&mut self, key: u8) -> bool {
        self.held & (1 << (key & 0xf)) != 0
    }

    fn wait_for_key(&mut self) -> Option<u8> {
        let key = self.latched.take();
        self.waiting = key.is_none();
        key
    }
}

/// keypad read from the terminal with crossterm; puts stdin in raw mode for
/// as long as it lives
pub struct TermKeypad {
    state: KeyState,
    keymap: HashMap<char, u8>,
    last_seen: [Option<Instant>; 16],
    quit: Arc<AtomicBool>,
}

impl TermKeypad {
    /// `quit` gets set when Esc or ctrl-c is pressed
    pub fn new(quit: Arc<AtomicBool>) -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(TermKeypad {
            state: KeyState::new(),
            keymap: HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            last_seen: [None; 16],
            quit,
        })
    }

    /// drain pending terminal events into the key state
    fn read_stdin(&mut self) -> Result<(), io::Error> {
        while poll(Duration::from_millis(0))? {
            let evt = match read()? {
                Event::Key(evt) => evt,
                _ => continue,
            };
            match evt.code {
                KeyCode::Esc => self.quit.store(true, Ordering::SeqCst),
                KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.quit.store(true, Ordering::SeqCst)
                }
                KeyCode::Char(c) => match self.keymap.get(&c.to_ascii_lowercase()) {
                    Some(&key) => {
                        self.state.key_down(key);
                        self.last_seen[key as usize] = Some(Instant::now());
                    }
                    None => log::warn!("can't map {:?} to a CHIP-8 key", c),
                },
                other => log::debug!("ignoring key {:?}", other),
            }
        }
        Ok(())
    }

    fn release_stale(&mut self) {
        let now = Instant::now();
        for key in 0..16u8 {
            if let Some(seen) = self.last_seen[key as usize] {
                if now.duration_since(seen) > TERM_KEY_HOLD {
                    self.state.key_up(key);
                    self.last_seen[key as usize] = None;
                }
            }
        }
    }

    fn refresh(&mut self) {
        if let Err(e) = self.read_stdin() {
            log::warn!("reading keyboard: {}", e);
        }
        self.release_stale();
    }
}

impl Drop for TermKeypad {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl Keypad for TermKeypad {
    fn is_held(&mut self, key: u8) -> bool {
        self.refresh();
        self.state.is_held(key)
    }

    fn wait_for_key(&mut self) -> Option<u8> {
        self.refresh();
        self.state.wait_for_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_down_up() {
        let mut k = KeyState::new();
        k.key_down(0xa);
        assert!(k.is_held(0xa));
        assert!(!k.is_held(0xb));
        assert_eq!(k.held_mask(), 1 << 0xa);
        k.key_up(0xa);
        assert!(!k.is_held(0xa));
    }

    #[test]
    fn test_press_is_latched_once() {
        let mut k = KeyState::new();
        assert_eq!(k.wait_for_key(), None);
        k.key_down(3);
        // a repeat of a held key isn't a new press
        k.key_down(3);
        assert_eq!(k.wait_for_key(), Some(3));
        assert_eq!(k.wait_for_key(), None);
    }

    #[test]
    fn test_latest_press_wins() {
        let mut k = KeyState::new();
        assert_eq!(k.wait_for_key(), None);
        k.key_down(1);
        k.key_down(2);
        assert_eq!(k.wait_for_key(), Some(2));
        assert_eq!(k.wait_for_key(), None);
        k.key_up(2);
        k.key_down(2);
        k.cancel_wait();
        assert_eq!(k.wait_for_key(), None);
        assert!(k.is_held(1));
        k.release_all();
        assert_eq!(k.held_mask(), 0);
    }

    #[test]
    fn test_press_before_wait_is_ignored() {
        let mut k = KeyState::new();
        k.key_down(5);
        k.key_up(5);
        assert_eq!(k.wait_for_key(), None);
        k.key_down(6);
        assert_eq!(k.wait_for_key(), Some(6));
    }

    #[test]
    fn test_key_held_into_wait_needs_pressing_again() {
        let mut k = KeyState::new();
        k.key_down(7);
        assert_eq!(k.wait_for_key(), None);
        k.key_down(7); // repeat
        assert_eq!(k.wait_for_key(), None);
        k.key_up(7);
        k.key_down(7);
        assert_eq!(k.wait_for_key(), Some(7));
    }

    #[test]
    fn test_keys_masked_to_nibble() {
        let mut k = KeyState::new();
        assert_eq!(k.wait_for_key(), None);
        k.key_down(0x1f);
        assert!(k.is_held(0xf));
        assert_eq!(k.wait_for_key(), Some(0xf));
    }

    #[test]
    fn test_keymap_covers_every_key() {
        let mut keys = CHIP8_CONVENTIONAL_KEYMAP.iter().map(|&(_, k)| k).collect::<Vec<_>>();
        keys.sort_unstable();
        assert_eq!(keys, (0..16).collect::<Vec<u8>>());
    }
}
