use std::collections::HashSet;

use hermes_core::{
    ActivityEntry, ActivityItem, AppStores, ModalData, ModalKind, Pane, ReceiveStatus, Section,
    ToastTone,
    Transfer, TransferDirection,
};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::commands::{CommandContext, CommandRegistry};
use crate::keymap::Keymap;
use crate::modals::{ModalHandlers, ModalView};

const FOOTER_HINT_LIMIT: usize = 8;

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Commands reachable in `ctx`, as `(chords, title)` in layer priority order.
/// A command bound in several active layers is listed once.
pub fn help_entries(
    keymap: &Keymap,
    registry: &CommandRegistry,
    ctx: &CommandContext,
) -> Vec<(String, &'static str)> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for layer in keymap.active_layers(ctx) {
        for binding in &layer.bindings {
            if !seen.insert(binding.command_id) {
                continue;
            }
            let Some(command) = registry.get(binding.command_id) else {
                continue;
            };
            let chords = keymap.chord_labels(layer.id, command.id).join("/");
            entries.push((chords, command.title));
        }
    }
    entries
}

pub fn format_help_text(entries: &[(String, &'static str)]) -> String {
    entries
        .iter()
        .map(|(chords, title)| format!("{chords}  {title}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Chords of the commands whose guards currently pass.
pub fn footer_hints(keymap: &Keymap, registry: &CommandRegistry, ctx: &CommandContext) -> String {
    let mut seen = HashSet::new();
    let mut hints = Vec::new();
    for layer in keymap.active_layers(ctx) {
        for binding in &layer.bindings {
            if hints.len() == FOOTER_HINT_LIMIT {
                break;
            }
            if !seen.insert(binding.command_id) || !registry.allows(binding.command_id, ctx) {
                continue;
            }
            if let Some(command) = registry.get(binding.command_id) {
                hints.push(format!("{} {}", binding.chord.display_label(), command.title));
            }
        }
    }
    hints.join(" · ")
}

pub fn render_navigation_panel(stores: &AppStores) -> String {
    let active = stores.navigation.with(|navigation| navigation.active_section);
    Section::ALL
        .iter()
        .enumerate()
        .map(|(index, section)| {
            let marker = if *section == active { ">" } else { " " };
            format!("{marker} {} {}", index + 1, section.title())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_identity_panel(stores: &AppStores) -> String {
    stores.identity.with(|state| {
        let mut lines = Vec::new();
        if state.is_loading {
            lines.push("Loading identity...".to_owned());
        } else if let Some(identity) = state.identity.as_ref() {
            lines.push(format!("Fingerprint: {}", identity.fingerprint));
            lines.push(format!("Public key:  {}", identity.public_key));
            lines.push(format!(
                "Created:     {}",
                identity.created_at.format("%Y-%m-%d %H:%M UTC")
            ));
        } else {
            lines.push("No identity yet. Press N to create one.".to_owned());
        }
        if let Some(error) = state.error.as_deref() {
            lines.push(String::new());
            lines.push(format!("error: {error}"));
        }
        if let Some(notice) = state.notice.as_ref() {
            lines.push(String::new());
            lines.push(notice.message.clone());
        }
        lines.join("\n")
    })
}

pub fn render_peers_panel(stores: &AppStores) -> String {
    stores.peers.with(|state| {
        let mut lines = Vec::new();
        if state.is_loading {
            lines.push("Loading peers...".to_owned());
        }
        if state.peers.is_empty() && !state.is_loading {
            lines.push("No peers. Press A to add one.".to_owned());
        }
        for peer in &state.peers {
            let marker = if state.selected_peer_id.as_deref() == Some(peer.id.as_str()) {
                ">"
            } else {
                " "
            };
            lines.push(format!(
                "{marker} {:<16} {:<8} {}",
                peer.display_name(),
                peer.trust_level.label(),
                peer.address
            ));
        }
        if let Some(error) = state.error.as_deref() {
            lines.push(String::new());
            lines.push(format!("error: {error}"));
        }
        lines.join("\n")
    })
}

fn transfer_line(transfer: &Transfer) -> String {
    let arrow = match transfer.direction {
        TransferDirection::Send => "↑",
        TransferDirection::Receive => "↓",
    };
    format!(
        "{arrow} {} {} {}% {}",
        transfer.file_name,
        transfer.peer_id,
        transfer.progress,
        transfer.status.label()
    )
}

pub fn render_activity_panel(stores: &AppStores) -> String {
    let sections = stores.activity_sections();
    let selected = stores.activity.with(|activity| activity.selected.clone());
    let (status, port, error) = stores
        .receive
        .with(|receive| (receive.status, receive.port, receive.error.clone()));
    let marker = |item: ActivityItem| {
        if selected.as_ref() == Some(&item) {
            ">"
        } else {
            " "
        }
    };

    let mut lines = vec![match port {
        Some(port) if status != ReceiveStatus::Idle => {
            format!("Receive: {} on port {port}", status.label())
        }
        _ => format!("Receive: {}", status.label()),
    }];
    if let Some(error) = error {
        lines.push(format!("error: {error}"));
    }

    lines.push(String::new());
    lines.push("Requests".to_owned());
    if sections.requests.is_empty() {
        lines.push("  none".to_owned());
    }
    for request in &sections.requests {
        lines.push(format!(
            "{} {} from {} ({})",
            marker(ActivityItem::request(request.id.as_str())),
            request.file_name,
            request.peer_id,
            format_size(request.file_size)
        ));
    }

    lines.push(String::new());
    lines.push("Active".to_owned());
    if sections.active_transfers.is_empty() {
        lines.push("  none".to_owned());
    }
    for transfer in &sections.active_transfers {
        lines.push(format!(
            "{} {}",
            marker(ActivityItem::transfer(transfer.id.as_str())),
            transfer_line(transfer)
        ));
    }

    lines.push(String::new());
    lines.push("History".to_owned());
    if sections.history_transfers.is_empty() {
        lines.push("  none".to_owned());
    }
    for transfer in &sections.history_transfers {
        lines.push(format!(
            "{} {}",
            marker(ActivityItem::transfer(transfer.id.as_str())),
            transfer_line(transfer)
        ));
    }
    lines.join("\n")
}

pub fn render_inspect_panel(stores: &AppStores) -> String {
    let section = stores.navigation.with(|navigation| navigation.active_section);
    match section {
        Section::Identity => stores.identity.with(|state| match state.identity.as_ref() {
            Some(identity) => format!(
                "Share your public key and fingerprint with peers.\n\n{}",
                identity.public_key
            ),
            None => "Create an identity to start sharing files.".to_owned(),
        }),
        Section::Peers => stores.peers.with(|state| match state.selected() {
            Some(peer) => format!(
                "Name: {}\nAddress: {}\nTrust: {}\nFingerprint: {}\nPublic key: {}",
                peer.display_name(),
                peer.address,
                peer.trust_level.label(),
                peer.fingerprint,
                peer.public_key
            ),
            None => "No peer selected.".to_owned(),
        }),
        Section::Activity => {
            let selected = stores.activity.with(|activity| activity.selected.clone());
            match stores.activity_sections().item_data(selected.as_ref()) {
                Some(ActivityEntry::Request(request)) => format!(
                    "Incoming request\nFrom: {}\nFingerprint: {}\nFile: {}\nSize: {}\nReceived: {}",
                    request.peer_id,
                    request.peer_fingerprint,
                    request.file_name,
                    format_size(request.file_size),
                    request.received_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                Some(ActivityEntry::Transfer(transfer)) => {
                    let mut lines = vec![
                        format!("File: {}", transfer.file_name),
                        format!("Peer: {}", transfer.peer_id),
                        format!("Size: {}", format_size(transfer.file_size)),
                        format!("Status: {}", transfer.status.label()),
                        format!("Progress: {}%", transfer.progress),
                    ];
                    if let Some(path) = transfer.file_path.as_deref() {
                        lines.push(format!("Path: {path}"));
                    }
                    if let Some(hash) = transfer.hash.as_deref() {
                        lines.push(format!("SHA-256: {hash}"));
                    }
                    if let Some(error) = transfer.error.as_deref() {
                        lines.push(format!("Error: {error}"));
                    }
                    lines.join("\n")
                }
                None => "Nothing selected.".to_owned(),
            }
        }
    }
}

pub fn render_modal_text(view: &ModalView) -> String {
    let mut lines = view.body.clone();
    if !view.body.is_empty() && !view.fields.is_empty() {
        lines.push(String::new());
    }
    for field in &view.fields {
        let cursor = if field.focused { "▏" } else { "" };
        let marker = if field.focused { ">" } else { " " };
        lines.push(format!("{marker} {}: {}{cursor}", field.label, field.value));
    }
    if let Some(error) = view.error.as_deref() {
        lines.push(String::new());
        lines.push(format!("! {error}"));
    }
    lines.push(String::new());
    lines.push(view.hint.to_owned());
    lines.join("\n")
}

fn tone_color(tone: ToastTone) -> Color {
    match tone {
        ToastTone::Success => Color::Green,
        ToastTone::Error => Color::Red,
        ToastTone::Info => Color::Cyan,
        ToastTone::Warning => Color::Yellow,
    }
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let block = Block::default().title(title).borders(Borders::ALL);
    if focused {
        block.border_style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan))
    } else {
        block
    }
}

fn modal_popup(area: Rect, content: &str) -> Option<Rect> {
    if area.width < 20 || area.height < 6 {
        return None;
    }
    let content_width = content.lines().map(|line| line.chars().count()).max().unwrap_or(0);
    let width = u16::try_from(content_width)
        .unwrap_or(u16::MAX)
        .saturating_add(4)
        .max(40)
        .min(area.width.saturating_sub(2));
    let height = u16::try_from(content.lines().count())
        .unwrap_or(u16::MAX)
        .saturating_add(2)
        .min(area.height.saturating_sub(2));
    Some(Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    })
}

/// Everything one frame draws from.
pub struct Screen<'a> {
    pub stores: &'a AppStores,
    pub keymap: &'a Keymap,
    pub registry: &'a CommandRegistry,
    pub ctx: &'a CommandContext,
    pub handlers: Option<&'a dyn ModalHandlers>,
}

pub fn draw(frame: &mut Frame<'_>, screen: &Screen<'_>) {
    let stores = screen.stores;
    let area = frame.area();
    let layout = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(3),
    ]);
    let [main, toast_area, footer] = layout.areas(area);
    let columns = Layout::horizontal([
        Constraint::Length(20),
        Constraint::Percentage(50),
        Constraint::Min(20),
    ]);
    let [nav_area, section_area, inspect_area] = columns.areas(main);
    let focused = screen.ctx.focused_pane;

    frame.render_widget(
        Paragraph::new(render_navigation_panel(stores))
            .block(pane_block("hermes", focused == Pane::Navigation)),
        nav_area,
    );

    let section = screen.ctx.active_section;
    let section_text = match section {
        Section::Identity => render_identity_panel(stores),
        Section::Peers => render_peers_panel(stores),
        Section::Activity => render_activity_panel(stores),
    };
    frame.render_widget(
        Paragraph::new(section_text)
            .wrap(Wrap { trim: false })
            .block(pane_block(section.title(), focused == Pane::Main)),
        section_area,
    );
    frame.render_widget(
        Paragraph::new(render_inspect_panel(stores))
            .wrap(Wrap { trim: false })
            .block(pane_block("inspect", focused == Pane::Inspect)),
        inspect_area,
    );

    if let Some(toast) = stores.toast.with(|toast| toast.current.clone()) {
        frame.render_widget(
            Paragraph::new(toast.message).style(Style::default().fg(tone_color(toast.tone))),
            toast_area,
        );
    }

    let footer_text = footer_hints(screen.keymap, screen.registry, screen.ctx);
    frame.render_widget(
        Paragraph::new(footer_text).block(Block::default().title("keys").borders(Borders::ALL)),
        footer,
    );

    draw_modal(frame, main, screen);
}

fn draw_modal(frame: &mut Frame<'_>, area: Rect, screen: &Screen<'_>) {
    let (kind, data) = screen
        .stores
        .modal
        .with(|modal| (modal.kind, modal.data.clone()));
    let (title, content) = match (kind, screen.handlers) {
        (ModalKind::None, _) => return,
        (ModalKind::Help, _) => {
            let underlying = CommandContext {
                modal: ModalKind::None,
                ..screen.ctx.clone()
            };
            let entries = help_entries(screen.keymap, screen.registry, &underlying);
            ("Help".to_owned(), format!("{}\n\nEsc close", format_help_text(&entries)))
        }
        (ModalKind::Error, _) => {
            let message = match data {
                ModalData::Error { message } => message,
                _ => "Something went wrong.".to_owned(),
            };
            ("Error".to_owned(), format!("{message}\n\nEsc close"))
        }
        (_, Some(handlers)) => {
            let view = handlers.view();
            (view.title.clone(), render_modal_text(&view))
        }
        (_, None) => return,
    };

    let Some(popup) = modal_popup(area, &content) else {
        return;
    };
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(content)
            .wrap(Wrap { trim: false })
            .block(Block::default().title(title).borders(Borders::ALL)),
        popup,
    );
}
