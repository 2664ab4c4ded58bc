use jiracache_core::config::ConfigFile;
use jiracache_core::session::{Outcome, Session};
use jiracache_protocol::Request;

use super::editor::Editor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

#[derive(Debug)]
pub struct Model {
    pub width: u16,
    pub height: u16,
    pub connection: ConnectionState,

    pub session: Session,
    pub editor: Editor,
    pub config: ConfigFile,

    pub status: Option<String>,
}

impl Model {
    pub fn new(config: ConfigFile) -> Self {
        Self {
            width: 0,
            height: 0,
            connection: ConnectionState::Connected,
            session: Session::new(),
            editor: Editor::new(),
            config,
            status: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    MoveUp,
    MoveDown,
    Enter,
    Backspace,
    Char(char),
    Cancel,
}

#[derive(Debug, Clone)]
pub enum Msg {
    Resize { width: u16, height: u16 },
    Action(Action),
    Paste(String),
    Frame(String),
    Disconnected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(Request),
    OpenUrl(String),
    Render,
    Quit,
}

pub fn reduce(mut model: Model, msg: Msg) -> (Model, Vec<Effect>) {
    let mut effects = Vec::new();

    match msg {
        Msg::Resize { width, height } => {
            model.width = width;
            model.height = height;
            effects.push(Effect::Render);
        }
        Msg::Frame(frame) => {
            let outcome = model.session.on_frame(&frame);
            push_outcome(outcome, &mut effects);
        }
        Msg::Disconnected { reason } => {
            model.connection = ConnectionState::Disconnected;
            let abandoned = model.session.close();
            tracing::info!(%reason, abandoned, "disconnected");
            model.status = Some(format!("disconnected: {reason}"));
            effects.push(Effect::Render);
        }
        Msg::Paste(text) => {
            model.editor.insert_str(&text);
            query_edited(&mut model, &mut effects);
        }
        Msg::Action(action) => match action {
            Action::Quit => effects.push(Effect::Quit),
            Action::Char(ch) => {
                model.editor.insert_char(ch);
                query_edited(&mut model, &mut effects);
            }
            Action::Backspace => {
                model.editor.backspace();
                query_edited(&mut model, &mut effects);
            }
            Action::Cancel => {
                if model.editor.is_empty() {
                    effects.push(Effect::Quit);
                } else {
                    model.editor.clear();
                    query_edited(&mut model, &mut effects);
                }
            }
            Action::MoveUp => {
                let outcome = model.session.move_active(-1);
                push_outcome(outcome, &mut effects);
            }
            Action::MoveDown => {
                let outcome = model.session.move_active(1);
                push_outcome(outcome, &mut effects);
            }
            Action::Enter => {
                let Some(key) = model
                    .session
                    .selection()
                    .active_entry()
                    .map(|e| e.key().to_owned())
                else {
                    return (model, effects);
                };
                match model.config.browse_link(&key) {
                    Some(url) => {
                        model.status = Some(format!("opening {url}"));
                        effects.push(Effect::OpenUrl(url));
                    }
                    None => {
                        model.status = Some(format!("{key}: set browse-url to open issues"));
                    }
                }
                effects.push(Effect::Render);
            }
        },
    }

    (model, effects)
}

fn query_edited(model: &mut Model, effects: &mut Vec<Effect>) {
    model.status = None;
    let query = model.editor.buffer.clone();
    let outcome = model.session.set_query(&query);
    push_outcome(outcome, effects);
    if !effects.contains(&Effect::Render) {
        effects.push(Effect::Render);
    }
}

fn push_outcome(outcome: Outcome, effects: &mut Vec<Effect>) {
    effects.extend(outcome.requests.into_iter().map(Effect::Send));
    if outcome.changed {
        effects.push(Effect::Render);
    }
}
