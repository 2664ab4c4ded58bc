use std::io::{self, Stdout};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use crossterm::event::{Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, terminal};
use jiracache_core::config::ConfigFile;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use super::core::{reduce, Action, Effect, Model, Msg};
use super::view;
use crate::channel::Channel;

struct TerminalGuard {
    stdout: Stdout,
}

impl TerminalGuard {
    fn enter() -> Result<(Self, Terminal<CrosstermBackend<Stdout>>)> {
        enable_raw_mode().context("enable raw mode")?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableBracketedPaste,
            terminal::Clear(terminal::ClearType::All)
        )
        .context("enter alt screen")?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).context("create terminal")?;

        Ok((
            Self {
                stdout: io::stdout(),
            },
            terminal,
        ))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, DisableBracketedPaste, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

pub async fn run(channel: Channel, config: ConfigFile) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));

    let (_guard, mut terminal) = TerminalGuard::enter()?;

    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Msg>();
    spawn_input_pump(msg_tx, shutdown.clone());

    let mut channel = Some(channel);
    let mut model = Model::new(config);
    let size = terminal.size().context("terminal size")?;
    (model, _) = reduce(
        model,
        Msg::Resize {
            width: size.width,
            height: size.height,
        },
    );
    terminal.draw(|f| view::draw(f, &model)).context("draw")?;

    loop {
        let msg = tokio::select! {
            msg = msg_rx.recv() => {
                let Some(msg) = msg else { break };
                msg
            }
            frame = async {
                match channel.as_mut() {
                    Some(c) => c.recv().await,
                    None => None,
                }
            }, if channel.is_some() => {
                match frame {
                    Some(frame) => Msg::Frame(frame),
                    None => {
                        channel = None;
                        Msg::Disconnected { reason: "connection closed".to_owned() }
                    }
                }
            }
        };

        let (next, effects) = reduce(model, msg);
        model = next;
        let (redraw, quit) = apply_effects(&mut model, effects, channel.as_ref());
        if quit {
            break;
        }
        if redraw {
            terminal.draw(|f| view::draw(f, &model)).context("draw")?;
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    Ok(())
}

fn apply_effects(model: &mut Model, effects: Vec<Effect>, channel: Option<&Channel>) -> (bool, bool) {
    let mut redraw = false;
    let mut quit = false;

    for effect in effects {
        match effect {
            Effect::Send(req) => match channel {
                Some(channel) => {
                    if let Err(err) = channel.send(req) {
                        tracing::warn!(error = %err, "send failed");
                    }
                }
                None => tracing::debug!(seq = req.seq, "not connected; request dropped"),
            },
            Effect::OpenUrl(url) => {
                if let Err(err) = open_url(&url) {
                    tracing::warn!(error = %err, %url, "open url failed");
                    model.status = Some(format!("{err:#}"));
                }
                redraw = true;
            }
            Effect::Render => redraw = true,
            Effect::Quit => quit = true,
        }
    }

    (redraw, quit)
}

fn open_url(url: &str) -> Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    spawn_opener(opener, url)
}

/// Starts `program url` detached from the terminal and reaps it in the
/// background.
fn spawn_opener(program: &str, url: &str) -> Result<()> {
    let mut child = tokio::process::Command::new(program)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawn {program}"))?;

    let program = program.to_owned();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => tracing::debug!(%program, "opener exited"),
            Ok(status) => tracing::warn!(%program, %status, "opener failed"),
            Err(err) => tracing::warn!(%program, error = %err, "wait for opener failed"),
        }
    });
    Ok(())
}

fn spawn_input_pump(tx: mpsc::UnboundedSender<Msg>, shutdown: Arc<AtomicBool>) {
    tokio::task::spawn_blocking(move || {
        while !shutdown.load(Ordering::Relaxed) {
            let ready = match crossterm::event::poll(Duration::from_millis(50)) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if !ready {
                continue;
            }

            let evt = match crossterm::event::read() {
                Ok(evt) => evt,
                Err(_) => continue,
            };

            let msg = match evt {
                CEvent::Key(key) => map_key(key).map(Msg::Action),
                CEvent::Paste(text) => Some(Msg::Paste(text)),
                CEvent::Resize(w, h) => Some(Msg::Resize {
                    width: w,
                    height: h,
                }),
                _ => None,
            };

            if let Some(msg) = msg {
                if tx.send(msg).is_err() {
                    break;
                }
            }
        }
    });
}

fn map_key(key: KeyEvent) -> Option<Action> {
    if !matches!(key.kind, KeyEventKind::Press) {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            KeyCode::Char('p') => Some(Action::MoveUp),
            KeyCode::Char('n') => Some(Action::MoveDown),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Esc => Some(Action::Cancel),
        KeyCode::Up => Some(Action::MoveUp),
        KeyCode::Down => Some(Action::MoveDown),
        KeyCode::Enter => Some(Action::Enter),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::ALT) {
                None
            } else {
                Some(Action::Char(c))
            }
        }
        _ => None,
    }
}
