pub mod events;
pub mod state;
pub mod ui;

use anyhow::{Result, anyhow};
use ratatui::{
    DefaultTerminal,
    crossterm::event::{self, Event, KeyEventKind},
};

use crate::aggregate::LiveAggregator;
use crate::terminal::events::{Action, handle_key};
use crate::terminal::state::AppState;

/// Ranked-inbox dashboard. Fetches once on start and again on `r`.
pub fn run_dashboard(aggregator: &LiveAggregator, user_id: &str) -> Result<()> {
    color_eyre::install().map_err(|e| anyhow!("{e}"))?;

    let terminal = ratatui::init();
    let result = run(terminal, aggregator, user_id);
    ratatui::restore();

    result
}

fn run(mut terminal: DefaultTerminal, aggregator: &LiveAggregator, user_id: &str) -> Result<()> {
    let mut state = AppState::new();
    state.refreshing = true;

    loop {
        terminal.draw(|f| ui::render(f, &state))?;

        if state.refreshing {
            // Blocks until every source settles or the deadline passes
            state.load(aggregator.live_report(user_id));
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match handle_key(key, &mut state) {
                Action::Quit => break,
                Action::Refresh | Action::None => {}
            }
        }
    }

    Ok(())
}
