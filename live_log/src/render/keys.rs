//! Key bindings for the live view

use crate::graph::LogLevel;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// Actions the live view reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Scroll back one page and stop following new output
    PageUp,
    /// Scroll forward one page; reaching the bottom resumes following
    PageDown,
    /// Show entries at or above this level
    SetThreshold(LogLevel),
    /// Stop the live view
    Quit,
}

impl FromStr for KeyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "page_up" | "pageup" => Ok(KeyAction::PageUp),
            "page_down" | "pagedown" => Ok(KeyAction::PageDown),
            "quit" => Ok(KeyAction::Quit),
            other => match other.strip_prefix("level:") {
                Some(level) => level.parse().map(KeyAction::SetThreshold),
                None => Err(format!("unknown key action `{other}`")),
            },
        }
    }
}

/// New terminal dimensions, reported when the window is resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub width: u16,
    pub height: u16,
}

/// A key plus modifiers, parsed from strings like `"pageup"` or `"ctrl+c"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    fn from_event(key: &KeyEvent) -> Self {
        // Shift is implied by the character itself.
        let modifiers = key.modifiers.difference(KeyModifiers::SHIFT);
        Self::new(key.code, modifiers)
    }
}

impl FromStr for KeyBinding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let mut modifiers = KeyModifiers::NONE;
        let mut parts: Vec<&str> = lower.split('+').collect();
        let key = parts.pop().filter(|k| !k.is_empty()).ok_or_else(|| format!("empty key binding `{s}`"))?;

        for part in parts {
            match part {
                "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
                "alt" => modifiers |= KeyModifiers::ALT,
                other => return Err(format!("unknown modifier `{other}` in `{s}`")),
            }
        }

        let code = match key {
            "pageup" | "pgup" => KeyCode::PageUp,
            "pagedown" | "pgdn" => KeyCode::PageDown,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "esc" | "escape" => KeyCode::Esc,
            "enter" => KeyCode::Enter,
            "space" => KeyCode::Char(' '),
            single if single.chars().count() == 1 => {
                KeyCode::Char(single.chars().next().unwrap_or(' '))
            }
            other => return Err(format!("unknown key `{other}`")),
        };
        Ok(Self::new(code, modifiers))
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            write!(f, "ctrl+")?;
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            write!(f, "alt+")?;
        }
        match self.code {
            KeyCode::Char(c) => write!(f, "{c}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Maps key presses to actions.
#[derive(Debug, Clone)]
pub struct KeyDispatcher {
    bindings: HashMap<KeyBinding, KeyAction>,
}

impl Default for KeyDispatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl KeyDispatcher {
    /// No bindings at all.
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Page up/down, digits `0`..=`4` for thresholds, `q` and Ctrl-C to quit.
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::empty();
        dispatcher.bind(KeyBinding::plain(KeyCode::PageUp), KeyAction::PageUp);
        dispatcher.bind(KeyBinding::plain(KeyCode::PageDown), KeyAction::PageDown);
        for (digit, level) in LogLevel::ALL.iter().enumerate() {
            let c = char::from(b'0' + digit as u8);
            dispatcher.bind(KeyBinding::plain(KeyCode::Char(c)), KeyAction::SetThreshold(*level));
        }
        dispatcher.bind(KeyBinding::plain(KeyCode::Char('q')), KeyAction::Quit);
        dispatcher.bind(
            KeyBinding::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            KeyAction::Quit,
        );
        dispatcher
    }

    pub fn bind(&mut self, binding: KeyBinding, action: KeyAction) {
        self.bindings.insert(binding, action);
    }

    pub fn unbind(&mut self, binding: &KeyBinding) {
        self.bindings.remove(binding);
    }

    pub fn dispatch(&self, key: &KeyEvent) -> Option<KeyAction> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        self.bindings.get(&KeyBinding::from_event(key)).copied()
    }
}

/// Poll the terminal for key presses and resizes and forward them.
///
/// The reader exits when `sender` is disconnected, or when `stop` receives a
/// message or is dropped.
pub fn spawn_key_reader<T>(sender: Sender<T>, stop: Receiver<()>) -> thread::JoinHandle<()>
where
    T: From<KeyEvent> + From<TerminalSize> + Send + 'static,
{
    thread::spawn(move || loop {
        if !matches!(stop.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }
        match event::poll(Duration::from_millis(100)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if sender.send(T::from(key)).is_err() {
                        break;
                    }
                }
                Ok(Event::Resize(width, height)) => {
                    if sender.send(T::from(TerminalSize { width, height })).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("key reader stopped: {}", e);
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("key reader stopped: {}", e);
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_default_bindings() {
        let keys = KeyDispatcher::with_defaults();
        assert_eq!(keys.dispatch(&press(KeyCode::PageUp, KeyModifiers::NONE)), Some(KeyAction::PageUp));
        assert_eq!(
            keys.dispatch(&press(KeyCode::Char('3'), KeyModifiers::NONE)),
            Some(KeyAction::SetThreshold(LogLevel::Debug))
        );
        assert_eq!(
            keys.dispatch(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyAction::Quit)
        );
        assert_eq!(keys.dispatch(&press(KeyCode::Char('c'), KeyModifiers::NONE)), None);
        assert_eq!(keys.dispatch(&press(KeyCode::Char('9'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_parse_bindings() {
        assert_eq!(
            "ctrl+c".parse::<KeyBinding>(),
            Ok(KeyBinding::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
        );
        assert_eq!("PageUp".parse::<KeyBinding>(), Ok(KeyBinding::plain(KeyCode::PageUp)));
        assert_eq!("x".parse::<KeyBinding>(), Ok(KeyBinding::plain(KeyCode::Char('x'))));
        assert!("hyper+x".parse::<KeyBinding>().is_err());
        assert!("".parse::<KeyBinding>().is_err());
        assert!("f13x".parse::<KeyBinding>().is_err());
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!("quit".parse::<KeyAction>(), Ok(KeyAction::Quit));
        assert_eq!(
            "level:warn".parse::<KeyAction>(),
            Ok(KeyAction::SetThreshold(LogLevel::Warn))
        );
        assert!("level:loud".parse::<KeyAction>().is_err());
        assert!("dance".parse::<KeyAction>().is_err());
    }

    #[test]
    fn test_rebinding_replaces_action() {
        let mut keys = KeyDispatcher::with_defaults();
        let esc = KeyBinding::plain(KeyCode::Esc);
        keys.bind(esc, KeyAction::Quit);
        keys.unbind(&KeyBinding::plain(KeyCode::Char('q')));

        assert_eq!(keys.dispatch(&press(KeyCode::Esc, KeyModifiers::NONE)), Some(KeyAction::Quit));
        assert_eq!(keys.dispatch(&press(KeyCode::Char('q'), KeyModifiers::NONE)), None);
    }
}
