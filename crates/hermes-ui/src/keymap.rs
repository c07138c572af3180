use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use hermes_core::{ModalKind, Section};
use thiserror::Error;

use crate::commands::{CommandContext, CommandId, CommandRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeymapError {
    #[error("command '{command_id}' declares no key chords")]
    NoKeys { command_id: CommandId },
    #[error("command '{command_id}' is not reachable from any layer")]
    NoLayers { command_id: CommandId },
    #[error("invalid key token '{token}': {message}")]
    InvalidKeyToken { token: String, message: String },
}

pub type KeymapResult<T> = Result<T, KeymapError>;

/// A key name plus the four modifier flags. Two chords match only when the key
/// and every flag are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyChord {
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Parses tokens such as `q`, `shift+tab` or `ctrl+c`.
    pub fn parse(raw: &str) -> KeymapResult<Self> {
        let invalid = |message: &str| KeymapError::InvalidKeyToken {
            token: raw.to_owned(),
            message: message.to_owned(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("token is empty"));
        }

        let parts = trimmed.split('+').collect::<Vec<_>>();
        let mut chord = Self::plain(String::new());
        for modifier in &parts[..parts.len() - 1] {
            match modifier.trim().to_ascii_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "alt" | "option" => chord.alt = true,
                "meta" | "cmd" | "command" | "super" => chord.meta = true,
                _ => return Err(invalid(&format!("unknown modifier '{}'", modifier.trim()))),
            }
        }

        let key_part = parts[parts.len() - 1].trim();
        if key_part.is_empty() {
            return Err(invalid("missing key after modifier"));
        }

        let lower = key_part.to_ascii_lowercase();
        chord.key = match lower.as_str() {
            "enter" | "return" => "return".to_owned(),
            "esc" | "escape" => "escape".to_owned(),
            "del" | "delete" => "delete".to_owned(),
            named if NAMED_KEYS.contains(&named) => named.to_owned(),
            _ => {
                let mut chars = key_part.chars();
                let (Some(ch), None) = (chars.next(), chars.next()) else {
                    return Err(invalid(
                        "keys must be single chars or named keys (tab/return/escape/etc.)",
                    ));
                };
                if ch.is_ascii_uppercase() {
                    chord.shift = true;
                }
                ch.to_ascii_lowercase().to_string()
            }
        };
        Ok(chord)
    }

    /// Converts a crossterm key event. Keys with no name in the keymap vocabulary yield `None`.
    pub fn from_event(event: KeyEvent) -> Option<Self> {
        let modifiers = event.modifiers;
        let mut chord = Self {
            key: String::new(),
            ctrl: modifiers.contains(KeyModifiers::CONTROL),
            shift: modifiers.contains(KeyModifiers::SHIFT),
            alt: modifiers.contains(KeyModifiers::ALT),
            meta: modifiers.intersects(KeyModifiers::SUPER | KeyModifiers::META),
        };

        chord.key = match event.code {
            KeyCode::Char(' ') => "space".to_owned(),
            KeyCode::Char(ch) if ch.is_ascii_uppercase() => {
                chord.shift = true;
                ch.to_ascii_lowercase().to_string()
            }
            KeyCode::Char(ch) if ch.is_alphabetic() => ch.to_string(),
            KeyCode::Char(ch) => {
                // `?` and friends already encode shift in the character itself.
                chord.shift = false;
                ch.to_string()
            }
            KeyCode::Enter => "return".to_owned(),
            KeyCode::Esc => "escape".to_owned(),
            KeyCode::Tab => "tab".to_owned(),
            KeyCode::BackTab => {
                chord.shift = true;
                "tab".to_owned()
            }
            KeyCode::Backspace => "backspace".to_owned(),
            KeyCode::Delete => "delete".to_owned(),
            KeyCode::Up => "up".to_owned(),
            KeyCode::Down => "down".to_owned(),
            KeyCode::Left => "left".to_owned(),
            KeyCode::Right => "right".to_owned(),
            KeyCode::Home => "home".to_owned(),
            KeyCode::End => "end".to_owned(),
            KeyCode::PageUp => "pageup".to_owned(),
            KeyCode::PageDown => "pagedown".to_owned(),
            _ => return None,
        };
        Some(chord)
    }

    pub fn has_modifiers(&self) -> bool {
        self.ctrl || self.shift || self.alt || self.meta
    }

    /// The character this chord types into a text field, if any.
    pub fn printable(&self) -> Option<char> {
        if self.ctrl || self.alt || self.meta {
            return None;
        }
        if self.key == "space" {
            return Some(' ');
        }
        let mut chars = self.key.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if self.shift => Some(ch.to_ascii_uppercase()),
            (Some(ch), None) => Some(ch),
            _ => None,
        }
    }

    /// Help-screen label: `Ctrl`, `Alt`, `Shift`, `Meta` prefixes, then the key.
    pub fn display_label(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl".to_owned());
        }
        if self.alt {
            parts.push("Alt".to_owned());
        }
        if self.shift {
            parts.push("Shift".to_owned());
        }
        if self.meta {
            parts.push("Meta".to_owned());
        }
        let label = match self.key.as_str() {
            "escape" => "Esc".to_owned(),
            "return" => "Enter".to_owned(),
            "tab" => "Tab".to_owned(),
            "up" => "↑".to_owned(),
            "down" => "↓".to_owned(),
            "left" => "←".to_owned(),
            "right" => "→".to_owned(),
            "space" => "Space".to_owned(),
            "backspace" => "Backspace".to_owned(),
            "delete" => "Del".to_owned(),
            key if key.chars().count() == 1 => key.to_uppercase(),
            key => key.to_owned(),
        };
        parts.push(label);
        parts.join("+")
    }
}

const NAMED_KEYS: [&str; 12] = [
    "tab",
    "backspace",
    "up",
    "down",
    "left",
    "right",
    "space",
    "home",
    "end",
    "pageup",
    "pagedown",
    "insert",
];

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("ctrl");
        }
        if self.alt {
            parts.push("alt");
        }
        if self.shift {
            parts.push("shift");
        }
        if self.meta {
            parts.push("meta");
        }
        parts.push(self.key.as_str());
        write!(f, "{}", parts.join("+"))
    }
}

/// A conditionally active group of bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerId {
    Modal(ModalKind),
    Section(Section),
    Global,
}

impl LayerId {
    /// Every layer, highest priority first.
    pub fn priority_order() -> Vec<LayerId> {
        ModalKind::ALL
            .into_iter()
            .map(LayerId::Modal)
            .chain(Section::ALL.into_iter().map(LayerId::Section))
            .chain(std::iter::once(LayerId::Global))
            .collect()
    }

    pub fn all_modals() -> Vec<LayerId> {
        ModalKind::ALL.into_iter().map(LayerId::Modal).collect()
    }

    pub fn all_sections() -> Vec<LayerId> {
        Section::ALL.into_iter().map(LayerId::Section).collect()
    }

    pub fn is_active(self, ctx: &CommandContext) -> bool {
        match self {
            Self::Modal(kind) => ctx.modal == kind,
            Self::Section(section) => !ctx.modal.is_open() && ctx.active_section == section,
            Self::Global => !ctx.modal.is_open(),
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modal(kind) => write!(f, "modal:{}", kind.as_str()),
            Self::Section(section) => write!(f, "section:{}", section.as_str()),
            Self::Global => f.write_str("global"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub chord: KeyChord,
    pub command_id: CommandId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub id: LayerId,
    /// In command registration order.
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    layers: Vec<Layer>,
}

impl Keymap {
    pub fn build(registry: &CommandRegistry) -> KeymapResult<Self> {
        let mut layers = LayerId::priority_order()
            .into_iter()
            .map(|id| Layer {
                id,
                bindings: Vec::new(),
            })
            .collect::<Vec<_>>();

        for command in registry.iter() {
            if command.keys.is_empty() {
                return Err(KeymapError::NoKeys {
                    command_id: command.id,
                });
            }
            if command.layers.is_empty() {
                return Err(KeymapError::NoLayers {
                    command_id: command.id,
                });
            }
            let chords = command
                .keys
                .iter()
                .map(|token| KeyChord::parse(token))
                .collect::<KeymapResult<Vec<_>>>()?;
            for layer in layers
                .iter_mut()
                .filter(|layer| command.layers.contains(&layer.id))
            {
                layer.bindings.extend(chords.iter().map(|chord| Binding {
                    chord: chord.clone(),
                    command_id: command.id,
                }));
            }
        }

        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn active_layers<'a>(
        &'a self,
        ctx: &'a CommandContext,
    ) -> impl Iterator<Item = &'a Layer> + 'a {
        self.layers.iter().filter(move |layer| layer.id.is_active(ctx))
    }

    /// Finds the command for `chord` using the registry's guards.
    pub fn resolve(
        &self,
        chord: &KeyChord,
        ctx: &CommandContext,
        registry: &CommandRegistry,
    ) -> Option<CommandId> {
        self.resolve_with(chord, ctx, |command_id| registry.allows(command_id, ctx))
    }

    /// Walks active layers in priority order. The first layer holding any binding
    /// for `chord` decides the outcome: its first binding whose guard passes wins,
    /// and if every guard fails nothing resolves.
    pub fn resolve_with(
        &self,
        chord: &KeyChord,
        ctx: &CommandContext,
        guard: impl Fn(CommandId) -> bool,
    ) -> Option<CommandId> {
        for layer in self.active_layers(ctx) {
            let mut matched = false;
            for binding in layer.bindings.iter().filter(|binding| &binding.chord == chord) {
                matched = true;
                if guard(binding.command_id) {
                    return Some(binding.command_id);
                }
            }
            if matched {
                tracing::debug!(layer = %layer.id, chord = %chord, "all guards failed in matching layer");
                return None;
            }
        }
        None
    }

    /// Display labels of every chord bound to `command_id` in `layer`.
    pub fn chord_labels(&self, layer: LayerId, command_id: CommandId) -> Vec<String> {
        self.layers
            .iter()
            .filter(|candidate| candidate.id == layer)
            .flat_map(|candidate| candidate.bindings.iter())
            .filter(|binding| binding.command_id == command_id)
            .map(|binding| binding.chord.display_label())
            .collect()
    }
}
