use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use dapp_console::{
    StatusKind,
    Variant,
    ViewModel,
    history::{
        Category,
        EntryStatus,
        HistoryEntry,
    },
    orchestrator::TxState,
    sync::{
        BallotSnapshot,
        TokenSnapshot,
    },
    validation::{
        format_amount,
        short_address,
    },
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use unicode_width::UnicodeWidthStr;

const BAR_WIDTH: usize = 24;
const LABEL_WIDTH: usize = 18;

/// A write the user asked for, held until they approve the signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignIntent {
    Vote { label: String },
    SetVotingActive(bool),
    Transfer { to: String, amount: String },
    Approve { spender: String, amount: String },
}

impl SignIntent {
    fn describe(&self) -> String {
        match self {
            SignIntent::Vote { label } => format!("Vote for {label}"),
            SignIntent::SetVotingActive(true) => "Open voting".to_string(),
            SignIntent::SetVotingActive(false) => "Close voting".to_string(),
            SignIntent::Transfer { to, amount } => format!("Transfer {amount} to {to}"),
            SignIntent::Approve { spender, amount } => format!("Approve {spender} for {amount}"),
        }
    }
}

pub enum UserEvent {
    Quit,
    Connect,
    Disconnect,
    Refresh,
    NextOption,
    PrevOption,
    Sign(SignIntent),
    DeclineSignature,
    WatchSpender(String),
    Redraw,
}

#[derive(Clone, Debug, Default)]
struct FormState {
    fields: [String; 2],
    focus: usize,
}

impl FormState {
    fn field_mut(&mut self) -> &mut String {
        &mut self.fields[self.focus.min(1)]
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    TransferModal(FormState),
    ApproveModal(FormState),
    SpenderModal(String),
    ConfirmSign(SignIntent),
    QuitModal,
}

pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    variant: Variant,
    voting_active: Option<bool>,
    selected_label: Option<String>,
}

impl UiState {
    pub fn new(variant: Variant) -> Self {
        Self {
            mode: Mode::Normal,
            terminal: None,
            variant,
            voting_active: None,
            selected_label: None,
        }
    }
}

pub type InputEvents = EventStream;

pub fn input_event_stream() -> InputEvents {
    EventStream::new()
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, view: &ViewModel) -> Result<()> {
    // key handling needs a few facts from the latest view
    let ballot = view.snapshot.as_ref().and_then(|s| s.ballot());
    state.variant = view.variant;
    state.voting_active = ballot.map(|b| b.voting_active);
    state.selected_label = ballot.and_then(|b| {
        view.selected_option
            .and_then(|i| b.options.get(i))
            .cloned()
    });
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, view))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub async fn next_raw_event(events: &mut InputEvents) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

/// Maps a terminal event to an action, updating modal state on the way.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    match &mut state.mode {
        Mode::TransferModal(_) => form_key(state, key, true),
        Mode::ApproveModal(_) => form_key(state, key, false),
        Mode::SpenderModal(input) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let spender = input.trim().to_string();
                state.mode = Mode::Normal;
                Some(UserEvent::WatchSpender(spender))
            }
            KeyCode::Backspace => {
                input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                input.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::ConfirmSign(intent) => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                let intent = intent.clone();
                state.mode = Mode::Normal;
                Some(UserEvent::Sign(intent))
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::DeclineSignature)
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => normal_key(state, key),
    }
}

fn normal_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    let event = match (key.code, state.variant) {
        (KeyCode::Char('q') | KeyCode::Esc, _) => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        (KeyCode::Char('c'), _) => UserEvent::Connect,
        (KeyCode::Char('d'), _) => UserEvent::Disconnect,
        (KeyCode::Char('r'), _) => UserEvent::Refresh,
        (KeyCode::Down | KeyCode::Char('j'), Variant::Ballot) => UserEvent::NextOption,
        (KeyCode::Up | KeyCode::Char('k'), Variant::Ballot) => UserEvent::PrevOption,
        (KeyCode::Char('v') | KeyCode::Enter, Variant::Ballot) => {
            // no selection still goes through so the controller can say so
            let label = state.selected_label.clone().unwrap_or_default();
            if label.is_empty() {
                return Some(UserEvent::Sign(SignIntent::Vote { label }));
            }
            state.mode = Mode::ConfirmSign(SignIntent::Vote { label });
            UserEvent::Redraw
        }
        (KeyCode::Char('o'), Variant::Ballot) => {
            let active = state.voting_active?;
            state.mode = Mode::ConfirmSign(SignIntent::SetVotingActive(!active));
            UserEvent::Redraw
        }
        (KeyCode::Char('t'), Variant::Token) => {
            state.mode = Mode::TransferModal(FormState::default());
            UserEvent::Redraw
        }
        (KeyCode::Char('a'), Variant::Token) => {
            state.mode = Mode::ApproveModal(FormState::default());
            UserEvent::Redraw
        }
        (KeyCode::Char('s'), Variant::Token) => {
            state.mode = Mode::SpenderModal(String::new());
            UserEvent::Redraw
        }
        _ => return None,
    };
    Some(event)
}

fn form_key(state: &mut UiState, key: KeyEvent, is_transfer: bool) -> Option<UserEvent> {
    let (Mode::TransferModal(form) | Mode::ApproveModal(form)) = &mut state.mode else {
        return None;
    };
    match key.code {
        KeyCode::Esc => {
            state.mode = Mode::Normal;
        }
        KeyCode::Tab | KeyCode::Down | KeyCode::Up | KeyCode::BackTab => {
            form.focus = 1 - form.focus.min(1);
        }
        KeyCode::Backspace => {
            form.field_mut().pop();
        }
        KeyCode::Char(c) => form.field_mut().push(c),
        KeyCode::Enter if form.focus == 0 => form.focus = 1,
        KeyCode::Enter => {
            let [address, amount] = std::mem::take(&mut form.fields);
            let address = address.trim().to_string();
            let amount = amount.trim().to_string();
            let intent = if is_transfer {
                SignIntent::Transfer { to: address, amount }
            } else {
                SignIntent::Approve {
                    spender: address,
                    amount,
                }
            };
            state.mode = Mode::ConfirmSign(intent);
        }
        _ => return None,
    }
    Some(UserEvent::Redraw)
}

fn ui(f: &mut Frame, state: &UiState, view: &ViewModel) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Min(8),
            Constraint::Length(5),
            Constraint::Length(3),
        ])
        .split(f.area());
    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);

    draw_top(f, chunks[0], view);
    match view.snapshot.as_ref() {
        Some(snapshot) => match (snapshot.ballot(), snapshot.token()) {
            (Some(ballot), _) => draw_ballot(f, middle[0], ballot, view),
            (_, Some(token)) => draw_token(f, middle[0], token, view),
            _ => {}
        },
        None => draw_placeholder(f, middle[0], view),
    }
    draw_history(f, middle[1], view);
    draw_errors(f, chunks[2], view);
    draw_help(f, chunks[3], view.variant);
    draw_modals(f, state);
}

fn status_style(kind: StatusKind) -> Style {
    match kind {
        StatusKind::Info => Style::default(),
        StatusKind::Success => Style::default().fg(Color::Green),
        StatusKind::Warning => Style::default().fg(Color::Yellow),
        StatusKind::Error => Style::default().fg(Color::Red),
    }
}

fn draw_top(f: &mut Frame, area: Rect, view: &ViewModel) {
    let wallet = match &view.session {
        Some(session) => {
            let network = if session.network_mismatch {
                Span::styled(
                    format!("chain {} (expected {})", session.chain_id, view.expected_chain_id),
                    Style::default().fg(Color::Yellow),
                )
            } else {
                Span::raw(format!("chain {}", session.chain_id))
            };
            Line::from(vec![
                Span::raw(format!("Wallet: {} | ", short_address(&session.account))),
                network,
                Span::raw(format!(" | session {}", session.id)),
            ])
        }
        None => Line::styled("Wallet: not connected", Style::default().fg(Color::DarkGray)),
    };
    let contract = Line::from(format!(
        "{} contract: {}",
        view.variant,
        view.contract.to_checksum(None)
    ));
    let status = match &view.status {
        Some(status) => Line::styled(status.text.clone(), status_style(status.kind)),
        None => Line::from(""),
    };
    let tx = Line::from(tx_line(view));
    let p = Paragraph::new(vec![wallet, contract, tx, status])
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}

fn tx_line(view: &ViewModel) -> String {
    match (&view.tx_state, &view.pending) {
        (TxState::Submitted { description, hash }, Some(pending)) => format!(
            "Pending: {description} {} since {}",
            short_hash(hash),
            pending.submitted_at.format("%H:%M:%S")
        ),
        (TxState::Submitted { description, hash }, None) => {
            format!("Pending: {description} {}", short_hash(hash))
        }
        (TxState::Validating, _) => "Preparing transaction".to_string(),
        (TxState::Confirmed { hash, block_number }, _) => {
            format!("Last tx {} confirmed in block {block_number}", short_hash(hash))
        }
        (TxState::Reverted { hash, .. }, _) => format!("Last tx {} reverted", short_hash(hash)),
        (TxState::TimedOut { hash }, _) => {
            format!("Tx {} unconfirmed, still watching", short_hash(hash))
        }
        (TxState::Idle, _) => "No transaction in flight".to_string(),
    }
}

fn draw_placeholder(f: &mut Frame, area: Rect, view: &ViewModel) {
    let text = if view.session.is_some() {
        "Loading contract state..."
    } else {
        "Press c to connect a wallet"
    };
    let p = Paragraph::new(Line::styled(text, Style::default().fg(Color::DarkGray)))
        .block(Block::default().borders(Borders::ALL).title(view.variant.to_string()));
    f.render_widget(p, area);
}

fn draw_ballot(f: &mut Frame, area: Rect, ballot: &BallotSnapshot, view: &ViewModel) {
    let total = ballot.total_votes();
    let mut lines = Vec::new();
    let voting = if ballot.voting_active {
        Span::styled("open", Style::default().fg(Color::Green))
    } else {
        Span::styled("closed", Style::default().fg(Color::Red))
    };
    lines.push(Line::from(vec![
        Span::raw("Voting: "),
        voting,
        Span::raw(format!(" | total votes {total}")),
    ]));
    if ballot.has_voted {
        lines.push(Line::styled(
            "You have already voted",
            Style::default().fg(Color::DarkGray),
        ));
    }
    lines.push(Line::from(""));
    for (i, label) in ballot.options.iter().enumerate() {
        let tally = ballot.tallies.get(i).copied().unwrap_or_default();
        let filled = if total.is_zero() {
            0
        } else {
            let scaled = tally.saturating_mul(alloy::primitives::U256::from(BAR_WIDTH)) / total;
            scaled.saturating_to::<usize>().min(BAR_WIDTH)
        };
        let selected = view.selected_option == Some(i);
        let marker = if selected { ">" } else { " " };
        let text = format!(
            "{marker} {} {}{} {tally}",
            pad_label(label),
            "█".repeat(filled),
            "░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)),
        );
        let style = if selected {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::styled(text, style));
    }
    if let Some(session) = &view.session {
        if session.account == ballot.owner {
            lines.push(Line::from(""));
            lines.push(Line::from("You own this ballot (o toggles voting)"));
        }
    }
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(ballot.title.clone()),
    );
    f.render_widget(p, area);
}

/// Pads or truncates by display width so bars line up.
fn pad_label(label: &str) -> String {
    let mut out = String::new();
    let mut width = 0;
    for c in label.chars() {
        let w = c.to_string().width();
        if width + w > LABEL_WIDTH {
            break;
        }
        out.push(c);
        width += w;
    }
    out.push_str(&" ".repeat(LABEL_WIDTH - width));
    out
}

fn draw_token(f: &mut Frame, area: Rect, token: &TokenSnapshot, view: &ViewModel) {
    let amount = |value| format!("{} {}", format_amount(value, token.decimals), token.symbol);
    let mut lines = vec![
        Line::from(format!("Balance: {}", amount(token.balance))),
        Line::from(format!("Total supply: {}", amount(token.total_supply))),
        Line::from(format!("Decimals: {}", token.decimals)),
        Line::from(""),
    ];
    match (token.allowance, view.spender) {
        (Some((spender, value)), _) => lines.push(Line::from(format!(
            "Allowance for {}: {}",
            short_address(&spender),
            amount(value)
        ))),
        (None, Some(spender)) => lines.push(Line::from(format!(
            "Allowance for {}: loading",
            short_address(&spender)
        ))),
        (None, None) => lines.push(Line::styled(
            "No spender watched (s to pick one)",
            Style::default().fg(Color::DarkGray),
        )),
    }
    let title = format!("{} ({})", token.name, token.symbol);
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn history_text(entry: &HistoryEntry, view: &ViewModel) -> String {
    let token = view.snapshot.as_ref().and_then(|s| s.token());
    let amount = entry
        .amount
        .map(|value| match token {
            Some(t) => format!("{} {}", format_amount(value, t.decimals), t.symbol),
            None => value.to_string(),
        })
        .unwrap_or_default();
    let party = entry
        .counterparty
        .as_ref()
        .map(short_address)
        .unwrap_or_default();
    match &entry.category {
        Category::Vote { label, .. } => format!("Vote {label} by {party}"),
        Category::VotingStatus { active: true } => "Voting opened".to_string(),
        Category::VotingStatus { active: false } => "Voting closed".to_string(),
        Category::TransferOut => format!("Sent {amount} to {party}"),
        Category::TransferIn => format!("Received {amount} from {party}"),
        Category::Approval => format!("Approved {party} for {amount}"),
    }
}

fn draw_history(f: &mut Frame, area: Rect, view: &ViewModel) {
    let mut lines = Vec::new();
    if view.history.is_empty() {
        lines.push(Line::styled("None", Style::default().fg(Color::DarkGray)));
    }
    for entry in &view.history {
        let (tag, style) = match entry.status {
            EntryStatus::Pending => ("pending", Style::default().fg(Color::Yellow)),
            EntryStatus::Confirmed => ("ok", Style::default()),
        };
        let block = entry
            .block_number
            .map(|b| format!("#{b}"))
            .unwrap_or_default();
        lines.push(Line::styled(
            format!(
                "{} {:<7} {block} {}",
                short_hash(&entry.tx_hash),
                tag,
                history_text(entry, view)
            ),
            style,
        ));
    }
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("History"));
    f.render_widget(p, area);
}

fn draw_errors(f: &mut Frame, area: Rect, view: &ViewModel) {
    let visible = usize::from(area.height.saturating_sub(2)).max(1);
    let mut lines: Vec<Line> = Vec::new();
    if view.errors.is_empty() {
        lines.push(Line::from("No errors"));
    } else {
        let skip = view.errors.len().saturating_sub(visible);
        for e in view.errors.iter().skip(skip) {
            lines.push(Line::from(e.clone()));
        }
    }
    let color = if view.errors.is_empty() {
        Color::DarkGray
    } else {
        Color::Red
    };
    let errors = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Errors"))
        .style(Style::default().fg(color));
    f.render_widget(errors, area);
}

fn draw_help(f: &mut Frame, area: Rect, variant: Variant) {
    let keys = match variant {
        Variant::Ballot => {
            "c connect | d disconnect | r refresh | ↑/↓ select | v vote | o open/close | q quit"
        }
        Variant::Token => {
            "c connect | d disconnect | r refresh | t transfer | a approve | s watch spender | q quit"
        }
    };
    let help = Paragraph::new(keys).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_form(f: &mut Frame, title: &str, labels: [&str; 2], form: &FormState) {
    let area = centered_rect(60, 30, f.area());
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let mut lines = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        let cursor = if form.focus == i { "_" } else { "" };
        let style = if form.focus == i {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::styled(
            format!("{label}: {}{cursor}", form.fields[i]),
            style,
        ));
    }
    lines.push(Line::from(""));
    lines.push(Line::from("Tab=switch field Enter=next/confirm Esc=cancel"));
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(lines), block.inner(area));
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::TransferModal(form) => draw_form(f, "Transfer", ["Recipient", "Amount"], form),
        Mode::ApproveModal(form) => draw_form(f, "Approve", ["Spender", "Amount"], form),
        Mode::SpenderModal(input) => {
            let area = centered_rect(60, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Watch Allowance");
            let p = Paragraph::new(format!(
                "Spender: {input}_\nEnter=confirm Esc=cancel"
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::ConfirmSign(intent) => {
            let area = centered_rect(50, 25, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Signature Request");
            let p = Paragraph::new(format!(
                "{}\n\nSign and send? (Y/N)",
                intent.describe()
            ))
            .wrap(Wrap { trim: true });
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn short_hash(hash: &alloy::primitives::TxHash) -> String {
    let full = hash.to_string();
    format!("{}…{}", &full[..8], &full[full.len() - 4..])
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(state: &mut UiState, text: &str) {
        for c in text.chars() {
            interpret_event(state, key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn interpret_event__transfer_form_asks_for_signature() {
        // given
        let mut state = UiState::new(Variant::Token);
        interpret_event(&mut state, key(KeyCode::Char('t')));
        type_text(&mut state, "0xabc");
        interpret_event(&mut state, key(KeyCode::Tab));
        type_text(&mut state, "1.5");
        interpret_event(&mut state, key(KeyCode::Enter));

        // when
        let event = interpret_event(&mut state, key(KeyCode::Char('y')));

        // then
        let Some(UserEvent::Sign(intent)) = event else {
            panic!("expected a signature request");
        };
        assert_eq!(
            intent,
            SignIntent::Transfer {
                to: "0xabc".to_string(),
                amount: "1.5".to_string()
            }
        );
    }

    #[test]
    fn interpret_event__declining_signature_returns_to_normal() {
        // given
        let mut state = UiState::new(Variant::Ballot);
        state.selected_label = Some("Rust".to_string());
        interpret_event(&mut state, key(KeyCode::Char('v')));

        // when
        let event = interpret_event(&mut state, key(KeyCode::Char('n')));

        // then
        assert!(matches!(event, Some(UserEvent::DeclineSignature)));
        assert!(matches!(state.mode, Mode::Normal));
    }

    #[test]
    fn interpret_event__token_keys_ignored_for_ballot() {
        // given
        let mut state = UiState::new(Variant::Ballot);

        // when
        let event = interpret_event(&mut state, key(KeyCode::Char('t')));

        // then
        assert!(event.is_none());
        assert!(matches!(state.mode, Mode::Normal));
    }

    #[test]
    fn pad_label__fixed_display_width() {
        assert_eq!(pad_label("Go").width(), LABEL_WIDTH);
        assert_eq!(pad_label("a very long option label indeed").width(), LABEL_WIDTH);
    }
}
