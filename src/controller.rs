use std::time::Duration;
use tracing::trace;

use crate::domain::{GVConfig, GVError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &GVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, GVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            return Ok(self.handle_key(key, model.raw_keyevents()));
        }
        Ok(None)
    }

    /// While a prompt is open every key goes to the line editor.
    pub fn handle_key(&self, key: KeyEvent, raw: bool) -> Option<Message> {
        if raw {
            return Some(Message::RawKey(key));
        }
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::Char('h'), _) | (KeyCode::Left, _) => Some(Message::MoveLeft),
            (KeyCode::Char('l'), _) | (KeyCode::Right, _) => Some(Message::MoveRight),
            (KeyCode::Char('n'), _) | (KeyCode::PageDown, _) => Some(Message::NextPage),
            (KeyCode::Char('p'), _) | (KeyCode::PageUp, _) => Some(Message::PrevPage),
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::FirstPage),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::LastPage),
            (KeyCode::Tab, _) => Some(Message::NextSheet),
            (KeyCode::BackTab, _) => Some(Message::PrevSheet),
            (KeyCode::Char('z'), _) => Some(Message::CyclePageSize),
            (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char('f'), _) => Some(Message::Filter),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('x'), _) => Some(Message::RemoveLastFilter),
            (KeyCode::Char('X'), _) => Some(Message::ClearFilters),
            (KeyCode::Char(c @ '1'..='9'), _) => c.to_digit(10).map(|d| Message::QuickFilter(d as usize)),
            (KeyCode::Char('d'), _) | (KeyCode::Delete, _) => Some(Message::Delete),
            (KeyCode::Char('c'), _) => Some(Message::CopyCell),
            (KeyCode::Char('C'), _) => Some(Message::CopyRow),
            (KeyCode::Char('t'), _) => Some(Message::ToggleTheme),
            (KeyCode::Char(':'), _) => Some(Message::EnterCommand),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn keys_map_to_messages() {
        let controller = Controller::new(&GVConfig::default());
        assert_eq!(controller.handle_key(key(KeyCode::Char('j')), false), Some(Message::MoveDown));
        assert_eq!(controller.handle_key(key(KeyCode::PageDown), false), Some(Message::NextPage));
        assert_eq!(controller.handle_key(key(KeyCode::Char('3')), false), Some(Message::QuickFilter(3)));
        assert_eq!(
            controller.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), false),
            Some(Message::Quit)
        );
        assert_eq!(controller.handle_key(key(KeyCode::Char('w')), false), None);
    }

    #[test]
    fn prompt_receives_raw_keys() {
        let controller = Controller::new(&GVConfig::default());
        let q = key(KeyCode::Char('q'));
        assert_eq!(controller.handle_key(q, true), Some(Message::RawKey(q)));
    }
}
