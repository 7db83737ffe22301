use anyhow::{Context, Result, bail};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::{Terminal, TerminalOptions, Viewport};
use std::io::{self, Stderr};
use tracing::debug;

use crate::input::{self, Action};
use crate::terminal::{CrosstermTerminal, RawModeGuard};
use crate::ui;

pub const MAX_VISIBLE_ROWS: usize = 10;

type PickerTerminal = Terminal<CrosstermBackend<Stderr>>;

pub trait Prompt {
    fn select(
        &mut self,
        title: &str,
        options: &[String],
        initial: Option<&str>,
    ) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Pending,
    Selected(String),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Picker {
    title: String,
    options: Vec<String>,
    filter: String,
    visible: Vec<usize>,
    selected: usize,
}

impl Picker {
    pub fn new(title: impl Into<String>, options: Vec<String>, initial: Option<&str>) -> Self {
        let visible = (0..options.len()).collect::<Vec<_>>();
        let selected = initial
            .and_then(|initial| options.iter().position(|option| option == initial))
            .unwrap_or(0);
        Self {
            title: title.into(),
            options,
            filter: String::new(),
            visible,
            selected,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn visible_options(&self) -> Vec<&str> {
        self.visible
            .iter()
            .map(|index| self.options[*index].as_str())
            .collect()
    }

    pub fn selected(&self) -> Option<usize> {
        (!self.visible.is_empty()).then_some(self.selected)
    }

    pub fn current(&self) -> Option<&str> {
        self.visible
            .get(self.selected)
            .map(|index| self.options[*index].as_str())
    }

    pub fn viewport_height(&self) -> u16 {
        (self.options.len().clamp(1, MAX_VISIBLE_ROWS) + 2) as u16
    }

    pub fn apply(&mut self, action: Action) -> PickerOutcome {
        match action {
            Action::Up => self.move_by(-1),
            Action::Down => self.move_by(1),
            Action::PageUp => self.move_by(-(MAX_VISIBLE_ROWS as isize)),
            Action::PageDown => self.move_by(MAX_VISIBLE_ROWS as isize),
            Action::Top => self.selected = 0,
            Action::Bottom => self.selected = self.visible.len().saturating_sub(1),
            Action::Submit => {
                if let Some(current) = self.current() {
                    return PickerOutcome::Selected(current.to_string());
                }
            }
            Action::Cancel => return PickerOutcome::Cancelled,
            Action::Backspace => {
                if self.filter.pop().is_some() {
                    self.refilter();
                }
            }
            Action::InputChar(c) => {
                self.filter.push(c);
                self.refilter();
            }
        }
        PickerOutcome::Pending
    }

    fn move_by(&mut self, delta: isize) {
        if self.visible.is_empty() {
            return;
        }
        let last = self.visible.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    fn refilter(&mut self) {
        let previous = self.visible.get(self.selected).copied();
        let needle = self.filter.to_lowercase();
        self.visible = self
            .options
            .iter()
            .enumerate()
            .filter(|(_, option)| needle.is_empty() || option.to_lowercase().contains(&needle))
            .map(|(index, _)| index)
            .collect();
        self.selected = previous
            .and_then(|previous| self.visible.iter().position(|index| *index == previous))
            .unwrap_or(0);
    }
}

#[derive(Debug, Default)]
pub struct InlinePrompt;

impl Prompt for InlinePrompt {
    fn select(
        &mut self,
        title: &str,
        options: &[String],
        initial: Option<&str>,
    ) -> Result<Option<String>> {
        if options.is_empty() {
            bail!("nothing to choose from for '{title}'");
        }

        let mut picker = Picker::new(title, options.to_vec(), initial);
        let mut mode = CrosstermTerminal;
        let _raw = RawModeGuard::enter(&mut mode)?;
        let mut terminal = Terminal::with_options(
            CrosstermBackend::new(io::stderr()),
            TerminalOptions {
                viewport: Viewport::Inline(picker.viewport_height()),
            },
        )
        .context("failed to create picker viewport")?;

        let outcome = run_picker(&mut terminal, &mut picker);
        if let Err(error) = terminal.clear() {
            debug!("failed to clear picker viewport: {error}");
        }
        if let Err(error) = terminal.show_cursor() {
            debug!("failed to show cursor: {error}");
        }
        outcome
    }
}

fn run_picker(terminal: &mut PickerTerminal, picker: &mut Picker) -> Result<Option<String>> {
    loop {
        terminal
            .draw(|frame| ui::render(frame, picker))
            .context("failed to render picker")?;

        if let Event::Key(key) = event::read().context("failed to read terminal event")?
            && key.kind == KeyEventKind::Press
            && let Some(action) = input::map_key(key)
        {
            match picker.apply(action) {
                PickerOutcome::Pending => {}
                PickerOutcome::Selected(choice) => return Ok(Some(choice)),
                PickerOutcome::Cancelled => return Ok(None),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{MAX_VISIBLE_ROWS, Picker, PickerOutcome};
    use crate::input::Action;

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn initial_value_is_preselected() {
        let picker = Picker::new("ctx", options(&["a", "b", "c"]), Some("b"));
        assert_eq!(picker.current(), Some("b"));

        let picker = Picker::new("ctx", options(&["a", "b"]), Some("missing"));
        assert_eq!(picker.current(), Some("a"));
    }

    #[test]
    fn movement_is_clamped() {
        let mut picker = Picker::new("ns", options(&["a", "b", "c"]), None);
        picker.apply(Action::Up);
        assert_eq!(picker.selected(), Some(0));
        picker.apply(Action::PageDown);
        assert_eq!(picker.current(), Some("c"));
        picker.apply(Action::Down);
        assert_eq!(picker.current(), Some("c"));
        picker.apply(Action::Top);
        assert_eq!(picker.current(), Some("a"));
        picker.apply(Action::Bottom);
        assert_eq!(picker.current(), Some("c"));
    }

    #[test]
    fn typing_filters_case_insensitively() {
        let mut picker = Picker::new(
            "ns",
            options(&["default", "kube-system", "kube-public", "team-a"]),
            None,
        );
        for c in "KUBE".chars() {
            picker.apply(Action::InputChar(c));
        }
        assert_eq!(picker.filter(), "KUBE");
        assert_eq!(picker.visible_options(), vec!["kube-system", "kube-public"]);

        picker.apply(Action::Down);
        assert_eq!(
            picker.apply(Action::Submit),
            PickerOutcome::Selected("kube-public".to_string())
        );
    }

    #[test]
    fn filter_keeps_highlight_when_still_visible() {
        let mut picker = Picker::new("ns", options(&["alpha", "beta", "gamma"]), Some("gamma"));
        picker.apply(Action::InputChar('a'));
        assert_eq!(picker.current(), Some("gamma"));
        picker.apply(Action::InputChar('l'));
        assert_eq!(picker.current(), Some("alpha"));
        picker.apply(Action::Backspace);
        assert_eq!(picker.visible_options().len(), 3);
        assert_eq!(picker.current(), Some("alpha"));
    }

    #[test]
    fn submit_without_matches_keeps_waiting() {
        let mut picker = Picker::new("ns", options(&["alpha"]), None);
        picker.apply(Action::InputChar('z'));
        assert_eq!(picker.selected(), None);
        assert_eq!(picker.apply(Action::Submit), PickerOutcome::Pending);
        picker.apply(Action::Down);
        assert_eq!(picker.apply(Action::Cancel), PickerOutcome::Cancelled);
    }

    #[test]
    fn viewport_height_is_bounded() {
        let many = (0..40).map(|index| format!("pod-{index}")).collect();
        assert_eq!(
            Picker::new("pods", many, None).viewport_height(),
            MAX_VISIBLE_ROWS as u16 + 2
        );
        assert_eq!(Picker::new("pods", options(&["a"]), None).viewport_height(), 3);
    }
}
