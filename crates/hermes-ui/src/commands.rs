use hermes_core::{ActivityEntry, AppStores, ModalKind, Pane, Section};

use crate::keymap::LayerId;

pub type CommandId = &'static str;

/// Which kind of row the activity selection points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectedActivity {
    #[default]
    None,
    Request,
    Transfer,
}

/// Derived facts the guards need beyond the plain navigation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateProbe {
    pub peers_non_empty: bool,
    pub selected_activity: SelectedActivity,
    /// Whether the open modal has registered confirm/cancel handlers.
    pub modal_handlers: bool,
}

/// Snapshot taken right before a keypress is resolved. Guards are pure
/// functions of this value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandContext {
    pub modal: ModalKind,
    pub active_section: Section,
    pub focused_pane: Pane,
    pub has_identity: bool,
    pub is_listening: bool,
    pub probe: StateProbe,
}

impl CommandContext {
    pub fn snapshot(stores: &AppStores, modal_handlers: bool) -> Self {
        let sections = stores.activity_sections();
        let selection = stores.activity.with(|activity| activity.selected.clone());
        let selected_activity = match sections.item_data(selection.as_ref()) {
            Some(ActivityEntry::Request(_)) => SelectedActivity::Request,
            Some(ActivityEntry::Transfer(_)) => SelectedActivity::Transfer,
            None => SelectedActivity::None,
        };

        Self {
            modal: stores.modal.with(|modal| modal.kind),
            active_section: stores.navigation.with(|navigation| navigation.active_section),
            focused_pane: stores.focus.with(|focus| focus.focused_pane),
            has_identity: stores.has_identity(),
            is_listening: stores.is_listening(),
            probe: StateProbe {
                peers_non_empty: stores.peers.with(|peers| !peers.peers.is_empty()),
                selected_activity,
                modal_handlers,
            },
        }
    }

    fn in_section(&self, section: Section) -> bool {
        self.active_section == section
    }

    fn in_main(&self, section: Section) -> bool {
        self.in_section(section) && self.focused_pane == Pane::Main
    }
}

/// The effect a command performs once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    OpenHelp,
    ModalCancel,
    ModalConfirm,
    ModalNextField,
    ModalPrevField,
    OpenAddPeer,
    OpenSendFile,
    FocusNextPane,
    FocusPrevPane,
    NavigateNext,
    NavigatePrev,
    NavigateTo(Section),
    CreateIdentity,
    CopyFingerprint,
    ExportIdentity,
    SelectNextPeer,
    SelectPrevPeer,
    TrustPeer,
    DeletePeer,
    SendToPeer,
    ToggleListening,
    StopListening,
    SelectNextActivity,
    SelectPrevActivity,
    AcceptRequest,
    DeclineRequest,
    CancelTransfer,
    DecryptFile,
    VerifyHash,
}

pub type Guard = fn(&CommandContext) -> bool;

#[derive(Debug, Clone)]
pub struct Command {
    pub id: CommandId,
    pub title: &'static str,
    pub keys: &'static [&'static str],
    pub layers: Vec<LayerId>,
    pub guard: Option<Guard>,
    pub action: Action,
}

impl Command {
    fn new(
        id: CommandId,
        title: &'static str,
        keys: &'static [&'static str],
        layers: Vec<LayerId>,
        action: Action,
    ) -> Self {
        Self {
            id,
            title,
            keys,
            layers,
            guard: None,
            action,
        }
    }

    fn when(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn allows(&self, ctx: &CommandContext) -> bool {
        self.guard.map_or(true, |guard| guard(ctx))
    }
}

#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    /// Every user-invocable action, in binding registration order.
    pub fn standard() -> Self {
        use LayerId::{Global, Modal, Section as Sec};

        let modals = LayerId::all_modals;
        let confirmable = || {
            LayerId::all_modals()
                .into_iter()
                .filter(|layer| {
                    !matches!(layer, Modal(ModalKind::Error) | Modal(ModalKind::Help))
                })
                .collect::<Vec<_>>()
        };
        let field_modals = || {
            vec![
                Modal(ModalKind::AddPeer),
                Modal(ModalKind::EncryptionOptions),
                Modal(ModalKind::DecryptFile),
            ]
        };
        let global_and_sections = || {
            let mut layers = vec![Global];
            layers.extend(LayerId::all_sections());
            layers
        };

        let commands = vec![
            Command::new("app.quit", "Quit", &["q", "ctrl+c"], vec![Global], Action::Quit),
            Command::new("app.help", "Help", &["?"], vec![Global], Action::OpenHelp),
            Command::new("modal.close", "Close", &["escape"], modals(), Action::ModalCancel),
            Command::new(
                "modal.confirm",
                "Confirm",
                &["return"],
                confirmable(),
                Action::ModalConfirm,
            ),
            Command::new(
                "modal.nextField",
                "Next Field",
                &["tab"],
                field_modals(),
                Action::ModalNextField,
            ),
            Command::new(
                "modal.prevField",
                "Previous Field",
                &["shift+tab"],
                field_modals(),
                Action::ModalPrevField,
            ),
            Command::new("app.addPeer", "Add Peer", &["a"], vec![Global], Action::OpenAddPeer)
                .when(|ctx| ctx.has_identity),
            Command::new("app.sendFile", "Send File", &["s"], vec![Global], Action::OpenSendFile)
                .when(|ctx| ctx.has_identity),
            Command::new("focus.nextPane", "Next Pane", &["tab"], vec![Global], Action::FocusNextPane)
                .when(|ctx| !ctx.modal.is_open()),
            Command::new(
                "focus.prevPane",
                "Previous Pane",
                &["shift+tab"],
                vec![Global],
                Action::FocusPrevPane,
            )
            .when(|ctx| !ctx.modal.is_open()),
            Command::new(
                "nav.next",
                "Next Section",
                &["j", "down"],
                global_and_sections(),
                Action::NavigateNext,
            )
            .when(|ctx| ctx.focused_pane == Pane::Navigation),
            Command::new(
                "nav.prev",
                "Previous Section",
                &["k", "up"],
                global_and_sections(),
                Action::NavigatePrev,
            )
            .when(|ctx| ctx.focused_pane == Pane::Navigation),
            Command::new(
                "nav.identity",
                "Go to Identity",
                &["1"],
                vec![Global],
                Action::NavigateTo(Section::Identity),
            ),
            Command::new(
                "nav.peers",
                "Go to Peers",
                &["2"],
                vec![Global],
                Action::NavigateTo(Section::Peers),
            ),
            Command::new(
                "nav.activity",
                "Go to Activity",
                &["3"],
                vec![Global],
                Action::NavigateTo(Section::Activity),
            ),
            Command::new(
                "identity.create",
                "Create Identity",
                &["n"],
                vec![Global, Sec(Section::Identity)],
                Action::CreateIdentity,
            )
            .when(|ctx| !ctx.has_identity && ctx.in_main(Section::Identity)),
            Command::new(
                "identity.copy",
                "Copy Fingerprint",
                &["c"],
                vec![Sec(Section::Identity)],
                Action::CopyFingerprint,
            )
            .when(|ctx| ctx.has_identity && ctx.in_main(Section::Identity)),
            Command::new(
                "identity.export",
                "Export Identity",
                &["e"],
                vec![Sec(Section::Identity)],
                Action::ExportIdentity,
            )
            .when(|ctx| ctx.has_identity && ctx.in_main(Section::Identity)),
            Command::new(
                "peers.selectNext",
                "Select Next",
                &["j", "down"],
                vec![Sec(Section::Peers)],
                Action::SelectNextPeer,
            )
            .when(|ctx| ctx.in_main(Section::Peers) && ctx.probe.peers_non_empty),
            Command::new(
                "peers.selectPrev",
                "Select Previous",
                &["k", "up"],
                vec![Sec(Section::Peers)],
                Action::SelectPrevPeer,
            )
            .when(|ctx| ctx.in_main(Section::Peers) && ctx.probe.peers_non_empty),
            Command::new(
                "peers.add",
                "Add Peer",
                &["a"],
                vec![Sec(Section::Peers)],
                Action::OpenAddPeer,
            )
            .when(|ctx| ctx.in_section(Section::Peers) && ctx.has_identity),
            Command::new(
                "peers.trust",
                "Trust Peer",
                &["t"],
                vec![Sec(Section::Peers)],
                Action::TrustPeer,
            )
            .when(|ctx| ctx.in_section(Section::Peers)),
            Command::new(
                "peers.delete",
                "Delete Peer",
                &["d", "delete", "backspace"],
                vec![Sec(Section::Peers)],
                Action::DeletePeer,
            )
            .when(|ctx| ctx.in_section(Section::Peers)),
            Command::new(
                "peers.sendFile",
                "Send File to Peer",
                &["s", "return"],
                vec![Sec(Section::Peers)],
                Action::SendToPeer,
            )
            .when(|ctx| ctx.in_section(Section::Peers)),
            Command::new(
                "activity.toggleListening",
                "Toggle Receive",
                &["r"],
                vec![Global, Sec(Section::Activity)],
                Action::ToggleListening,
            )
            .when(|ctx| ctx.has_identity),
            Command::new(
                "activity.stopListening",
                "Stop Listening",
                &["escape"],
                vec![Sec(Section::Activity)],
                Action::StopListening,
            )
            .when(|ctx| ctx.in_section(Section::Activity) && ctx.is_listening),
            Command::new(
                "activity.selectNext",
                "Select Next",
                &["j", "down"],
                vec![Sec(Section::Activity)],
                Action::SelectNextActivity,
            )
            .when(|ctx| ctx.in_main(Section::Activity)),
            Command::new(
                "activity.selectPrev",
                "Select Previous",
                &["k", "up"],
                vec![Sec(Section::Activity)],
                Action::SelectPrevActivity,
            )
            .when(|ctx| ctx.in_main(Section::Activity)),
            Command::new(
                "activity.acceptRequest",
                "Accept Request",
                &["return", "y"],
                vec![Sec(Section::Activity)],
                Action::AcceptRequest,
            )
            .when(|ctx| {
                ctx.in_section(Section::Activity)
                    && ctx.probe.selected_activity == SelectedActivity::Request
            }),
            Command::new(
                "activity.declineRequest",
                "Decline Request",
                &["d", "n"],
                vec![Sec(Section::Activity)],
                Action::DeclineRequest,
            )
            .when(|ctx| {
                ctx.in_section(Section::Activity)
                    && ctx.probe.selected_activity == SelectedActivity::Request
            }),
            Command::new(
                "activity.cancelTransfer",
                "Cancel Transfer",
                &["x", "delete"],
                vec![Sec(Section::Activity)],
                Action::CancelTransfer,
            )
            .when(|ctx| {
                ctx.in_section(Section::Activity)
                    && ctx.probe.selected_activity == SelectedActivity::Transfer
            }),
            Command::new(
                "activity.decryptFile",
                "Decrypt File",
                &["d"],
                vec![Sec(Section::Activity)],
                Action::DecryptFile,
            )
            .when(|ctx| {
                ctx.in_section(Section::Activity)
                    && ctx.probe.selected_activity == SelectedActivity::Transfer
            }),
            Command::new(
                "activity.verifyHash",
                "Verify Hash",
                &["v"],
                vec![Sec(Section::Activity)],
                Action::VerifyHash,
            )
            .when(|ctx| {
                ctx.in_section(Section::Activity)
                    && ctx.probe.selected_activity == SelectedActivity::Transfer
            }),
        ];

        Self::new(commands)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Command> {
        self.commands.iter().find(|command| command.id == id)
    }

    pub fn allows(&self, id: &str, ctx: &CommandContext) -> bool {
        self.get(id).is_some_and(|command| command.allows(ctx))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn command_ids_are_unique_and_every_command_is_bound() {
        let registry = CommandRegistry::standard();
        let mut seen = HashSet::new();
        for command in registry.iter() {
            assert!(seen.insert(command.id), "duplicate id {}", command.id);
            assert!(!command.keys.is_empty(), "{} has no keys", command.id);
            assert!(!command.layers.is_empty(), "{} has no layers", command.id);
        }
    }

    #[test]
    fn confirm_is_missing_from_error_and_help_modals() {
        let registry = CommandRegistry::standard();
        let confirm = registry.get("modal.confirm").expect("confirm");
        assert!(!confirm.layers.contains(&LayerId::Modal(ModalKind::Error)));
        assert!(!confirm.layers.contains(&LayerId::Modal(ModalKind::Help)));
        assert_eq!(confirm.layers.len(), 8);

        let close = registry.get("modal.close").expect("close");
        assert_eq!(close.layers.len(), 10);
    }

    #[test]
    fn identity_commands_require_main_pane_in_identity_section() {
        let registry = CommandRegistry::standard();
        let mut ctx = CommandContext {
            active_section: Section::Identity,
            focused_pane: Pane::Main,
            ..CommandContext::default()
        };
        assert!(registry.allows("identity.create", &ctx));
        assert!(!registry.allows("identity.copy", &ctx));

        ctx.has_identity = true;
        assert!(!registry.allows("identity.create", &ctx));
        assert!(registry.allows("identity.copy", &ctx));
        assert!(registry.allows("identity.export", &ctx));

        ctx.focused_pane = Pane::Navigation;
        assert!(!registry.allows("identity.copy", &ctx));
    }

    #[test]
    fn activity_guards_follow_selected_item_kind() {
        let registry = CommandRegistry::standard();
        let mut ctx = CommandContext {
            active_section: Section::Activity,
            ..CommandContext::default()
        };
        ctx.probe.selected_activity = SelectedActivity::Request;
        assert!(registry.allows("activity.acceptRequest", &ctx));
        assert!(!registry.allows("activity.cancelTransfer", &ctx));

        ctx.probe.selected_activity = SelectedActivity::Transfer;
        assert!(!registry.allows("activity.declineRequest", &ctx));
        assert!(registry.allows("activity.decryptFile", &ctx));
        assert!(registry.allows("activity.verifyHash", &ctx));
    }
}
