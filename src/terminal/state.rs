use ratatui::widgets::ListState;

use crate::aggregate::{Gathered, SourceReport};
use crate::domain::message::{Message, Source};
use crate::ranking::score;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    ListOnly,
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFilter {
    #[default]
    All,
    Only(Source),
}

impl SourceFilter {
    pub fn next(self) -> Self {
        match self {
            SourceFilter::All => SourceFilter::Only(Source::Gmail),
            SourceFilter::Only(Source::Gmail) => SourceFilter::Only(Source::Slack),
            SourceFilter::Only(Source::Slack) => SourceFilter::All,
        }
    }

    fn admits(self, m: &Message) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Only(s) => m.source == s,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceFilter::All => "all",
            SourceFilter::Only(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub message: Message,
    pub score: f64,
}

pub struct AppState {
    /// Ranked rows from the last refresh, unfiltered
    ranked: Vec<Row>,
    /// What the list shows under the current filter
    pub items: Vec<Row>,
    pub list_state: ListState,
    pub filter: SourceFilter,

    /// The message currently opened in the right panel (only when Split)
    pub opened: Option<Row>,
    pub body_scroll: u16,

    pub focus: Focus,
    pub mode: ViewMode,

    pub reports: Vec<SourceReport>,
    pub now_millis: i64,
    pub refreshing: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            ranked: vec![],
            items: vec![],
            list_state: ListState::default(),
            filter: SourceFilter::All,
            opened: None,
            body_scroll: 0,
            focus: Focus::List,
            mode: ViewMode::ListOnly,
            reports: vec![],
            now_millis: 0,
            refreshing: false,
        }
    }

    /// Replace the list with a fresh aggregation, keeping the selection on
    /// the same message when it is still there.
    pub fn load(&mut self, gathered: Gathered) {
        let selected = self.current_selected_id();
        let now_millis = gathered.ranked_at_millis;

        self.now_millis = now_millis;
        self.reports = gathered.reports;
        self.ranked = gathered
            .messages
            .into_iter()
            .map(|message| Row {
                score: score(&message, now_millis),
                message,
            })
            .collect();
        self.refreshing = false;

        self.apply_filter();
        if let Some(id) = selected {
            self.try_select_id(&id);
        }
    }

    fn apply_filter(&mut self) {
        self.items = self
            .ranked
            .iter()
            .filter(|r| self.filter.admits(&r.message))
            .cloned()
            .collect();

        if self.items.is_empty() {
            self.list_state.select(None);
        } else {
            let idx = self.list_state.selected().unwrap_or(0);
            self.list_state.select(Some(idx.min(self.items.len() - 1)));
        }
    }

    pub fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
        self.list_state.select(Some(0));
        self.apply_filter();
    }

    pub fn current_selected_id(&self) -> Option<String> {
        let idx = self.list_state.selected()?;
        self.items.get(idx).map(|r| r.message.id.clone())
    }

    pub fn try_select_id(&mut self, id: &str) {
        if let Some(pos) = self.items.iter().position(|r| r.message.id == id) {
            self.list_state.select(Some(pos));
        }
    }

    pub fn move_selection(&mut self, delta: i32) {
        if self.items.is_empty() {
            self.list_state.select(None);
            return;
        }
        let cur = self.list_state.selected().unwrap_or(0) as i32;
        let len = self.items.len() as i32;
        let next = (cur + delta).clamp(0, len - 1) as usize;
        self.list_state.select(Some(next));
    }

    pub fn select_first(&mut self) {
        if !self.items.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if !self.items.is_empty() {
            self.list_state.select(Some(self.items.len() - 1));
        }
    }

    pub fn open_selected(&mut self) {
        let Some(row) = self
            .list_state
            .selected()
            .and_then(|i| self.items.get(i))
            .cloned()
        else {
            return;
        };
        self.opened = Some(row);
        self.mode = ViewMode::Split;
        self.focus = Focus::Body;
        self.body_scroll = 0;
    }

    pub fn close_message(&mut self) {
        self.mode = ViewMode::ListOnly;
        self.focus = Focus::List;
        self.opened = None;
        self.body_scroll = 0;
    }

    pub fn toggle_focus(&mut self) {
        if self.mode != ViewMode::Split {
            return;
        }
        self.focus = match self.focus {
            Focus::List => Focus::Body,
            Focus::Body => Focus::List,
        };
    }

    pub fn scroll_body(&mut self, delta: i32) {
        if self.mode != ViewMode::Split {
            return;
        }
        if delta < 0 {
            self.body_scroll = self.body_scroll.saturating_sub((-delta) as u16);
        } else {
            self.body_scroll = self.body_scroll.saturating_add(delta as u16);
        }
    }

    /// "5m", "3h", "2d" relative to the last refresh.
    pub fn age_label(&self, m: &Message) -> String {
        let mins = self.now_millis.saturating_sub(m.timestamp_millis).max(0) / 60_000;
        if mins < 60 {
            format!("{mins}m")
        } else if mins < 60 * 24 {
            format!("{}h", mins / 60)
        } else {
            format!("{}d", mins / (60 * 24))
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
