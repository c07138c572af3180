//! Terminal front end: command registry, layered keymap, modal forms and the
//! ratatui event loop.

mod app;
mod commands;
mod keymap;
mod modals;
mod render;
mod runner;

pub use app::{App, Ui};
pub use commands::{
    Action, Command, CommandContext, CommandId, CommandRegistry, Guard, SelectedActivity,
    StateProbe,
};
pub use keymap::{Binding, KeyChord, Keymap, KeymapError, KeymapResult, Layer, LayerId};
pub use modals::{
    EncryptionChoice, FieldView, ModalHandlers, ModalOutcome, ModalTask, ModalView, TextField,
};
pub use render::{format_help_text, format_size, help_entries};
pub use runner::WorkflowRunner;
