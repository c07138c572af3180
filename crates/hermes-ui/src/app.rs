use std::collections::HashSet;
use std::future::Future;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use hermes_core::{ActivityEntry, AppStores, ModalData, ModalKind, ToastTone};
use ratatui::backend::CrosstermBackend;
use ratatui::{Frame, Terminal};
use tokio::runtime::Handle as TokioHandle;

use crate::commands::{Action, CommandContext, CommandId, CommandRegistry};
use crate::keymap::{KeyChord, Keymap, KeymapResult};
use crate::modals::{self, ModalHandlers, ModalOutcome, ModalTask};
use crate::render::{self, Screen};
use crate::runner::WorkflowRunner;

const REDRAW_INTERVAL: Duration = Duration::from_millis(250);
const INPUT_POLL: Duration = Duration::from_millis(50);

/// Keypress dispatcher and modal host. Owns no terminal, so it can be driven
/// directly in tests.
pub struct App {
    stores: Arc<AppStores>,
    runner: Arc<dyn WorkflowRunner>,
    registry: CommandRegistry,
    keymap: Keymap,
    handlers: Option<Box<dyn ModalHandlers>>,
    mounted_modal_version: Option<u64>,
    announced_requests: HashSet<String>,
    should_quit: bool,
}

impl App {
    pub fn new(stores: Arc<AppStores>, runner: Arc<dyn WorkflowRunner>) -> KeymapResult<Self> {
        let registry = CommandRegistry::standard();
        let keymap = Keymap::build(&registry)?;
        Ok(Self {
            stores,
            runner,
            registry,
            keymap,
            handlers: None,
            mounted_modal_version: None,
            announced_requests: HashSet::new(),
            should_quit: false,
        })
    }

    pub fn stores(&self) -> &Arc<AppStores> {
        &self.stores
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn context(&self) -> CommandContext {
        CommandContext::snapshot(&self.stores, self.handlers.is_some())
    }

    pub fn modal_handlers(&self) -> Option<&dyn ModalHandlers> {
        self.handlers.as_deref()
    }

    /// Periodic housekeeping: modal mount state, request prompts, expiring toasts.
    pub fn tick(&mut self, now: Instant) {
        self.stores.expire_timed(now);
        self.announce_requests();
        self.sync_modal();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if let Some(chord) = KeyChord::from_event(key) {
            self.handle_chord(&chord);
        }
    }

    /// Resolves `chord` against a fresh context. Unclaimed keys go to the open
    /// modal's text input.
    pub fn handle_chord(&mut self, chord: &KeyChord) {
        self.sync_modal();
        let ctx = self.context();
        match self.keymap.resolve(chord, &ctx, &self.registry) {
            Some(command_id) => self.dispatch(command_id),
            None => {
                if let Some(handlers) = self.handlers.as_mut() {
                    handlers.input(chord);
                }
            }
        }
        self.sync_modal();
    }

    pub fn dispatch(&mut self, command_id: CommandId) {
        let Some(action) = self.registry.get(command_id).map(|command| command.action) else {
            tracing::warn!(command = command_id, "unknown command");
            return;
        };
        tracing::debug!(command = command_id, "dispatching command");
        self.execute(action);
    }

    pub fn draw(&self, frame: &mut Frame<'_>) {
        let ctx = self.context();
        render::draw(
            frame,
            &Screen {
                stores: &self.stores,
                keymap: &self.keymap,
                registry: &self.registry,
                ctx: &ctx,
                handlers: self.modal_handlers(),
            },
        );
    }

    fn execute(&mut self, action: Action) {
        let stores = Arc::clone(&self.stores);
        match action {
            Action::Quit => self.should_quit = true,
            Action::OpenHelp => self.open_modal(ModalKind::Help, ModalData::None),
            Action::ModalCancel => match self.handlers.as_mut() {
                Some(handlers) => {
                    let outcome = handlers.cancel(&stores);
                    self.apply_outcome(outcome);
                }
                None => self.close_modal(),
            },
            Action::ModalConfirm => {
                if let Some(handlers) = self.handlers.as_mut() {
                    let outcome = handlers.confirm(&stores);
                    self.apply_outcome(outcome);
                }
            }
            Action::ModalNextField => {
                if let Some(handlers) = self.handlers.as_mut() {
                    handlers.next_field();
                }
            }
            Action::ModalPrevField => {
                if let Some(handlers) = self.handlers.as_mut() {
                    handlers.prev_field();
                }
            }
            Action::OpenAddPeer => self.open_modal(ModalKind::AddPeer, ModalData::None),
            Action::OpenSendFile => {
                self.open_modal(ModalKind::SelectFile, ModalData::SendTarget { peer: None })
            }
            Action::FocusNextPane => stores.focus.update(|focus| focus.focus_next()),
            Action::FocusPrevPane => stores.focus.update(|focus| focus.focus_prev()),
            Action::NavigateNext => stores
                .navigation
                .update(|navigation| navigation.navigate_next()),
            Action::NavigatePrev => stores
                .navigation
                .update(|navigation| navigation.navigate_prev()),
            Action::NavigateTo(section) => stores
                .navigation
                .update(|navigation| navigation.navigate_to(section)),
            Action::CreateIdentity => {
                self.spawn("identity creation", |runner| async move {
                    runner.create_identity().await;
                });
            }
            Action::CopyFingerprint => self.runner.copy_fingerprint(),
            Action::ExportIdentity => {
                self.spawn("identity export", |runner| async move {
                    runner.export_identity().await;
                });
            }
            Action::SelectNextPeer => stores.peers.update(|peers| peers.select_next()),
            Action::SelectPrevPeer => stores.peers.update(|peers| peers.select_prev()),
            Action::TrustPeer => {
                let Some(peer) = stores.peers.with(|peers| peers.selected().cloned()) else {
                    return;
                };
                if peer.is_trusted() {
                    self.spawn("peer blocking", |runner| async move {
                        runner.block_peer(&peer.id).await;
                    });
                } else {
                    self.open_modal(ModalKind::TrustPeer, ModalData::Peer(peer));
                }
            }
            Action::DeletePeer => {
                let Some(peer_id) = stores
                    .peers
                    .with(|peers| peers.selected().map(|peer| peer.id.clone()))
                else {
                    return;
                };
                self.spawn("peer removal", |runner| async move {
                    runner.remove_peer(&peer_id).await;
                });
            }
            Action::SendToPeer => {
                let peer = stores
                    .peers
                    .with(|peers| peers.selected().filter(|peer| peer.is_trusted()).cloned());
                if let Some(peer) = peer {
                    self.open_modal(ModalKind::SelectFile, ModalData::SendTarget { peer: Some(peer) });
                }
            }
            Action::ToggleListening => {
                self.spawn("receive listener", |runner| async move {
                    runner.toggle_listening().await;
                });
            }
            Action::StopListening => {
                self.spawn("receive listener", |runner| async move {
                    runner.stop_listening().await;
                });
            }
            Action::SelectNextActivity => {
                let items = stores.activity_sections().items();
                stores.activity.update(|activity| activity.select_next(&items));
            }
            Action::SelectPrevActivity => {
                let items = stores.activity_sections().items();
                stores.activity.update(|activity| activity.select_prev(&items));
            }
            Action::AcceptRequest => {
                if let Some(ActivityEntry::Request(request)) = self.selected_activity() {
                    self.open_modal(ModalKind::SaveLocation, ModalData::Request(request));
                }
            }
            Action::DeclineRequest => {
                if let Some(ActivityEntry::Request(request)) = self.selected_activity() {
                    self.runner.decline_request(&request.id);
                }
            }
            Action::CancelTransfer => {
                if let Some(ActivityEntry::Transfer(transfer)) = self.selected_activity() {
                    if transfer.status.is_active() {
                        self.spawn("transfer cancellation", |runner| async move {
                            runner.cancel_transfer(&transfer.id).await;
                        });
                    }
                }
            }
            Action::DecryptFile => {
                if let Some(ActivityEntry::Transfer(transfer)) = self.selected_activity() {
                    if let Some(data) = self.runner.decrypt_target(&transfer) {
                        self.open_modal(ModalKind::DecryptFile, data);
                    }
                }
            }
            Action::VerifyHash => {
                if let Some(ActivityEntry::Transfer(transfer)) = self.selected_activity() {
                    self.spawn("hash verification", |runner| async move {
                        runner.verify_transfer_hash(&transfer).await;
                    });
                }
            }
        }
    }

    fn apply_outcome(&mut self, outcome: ModalOutcome) {
        match outcome {
            ModalOutcome::Stay => {}
            ModalOutcome::Close => self.close_modal(),
            ModalOutcome::Open { kind, data } => self.open_modal(kind, data),
            ModalOutcome::Error(message) => self.stores.show_error_modal(message),
            ModalOutcome::Run(task) => self.run_task(task),
        }
    }

    fn run_task(&mut self, task: ModalTask) {
        match task {
            ModalTask::TrustPeer(peer) => {
                self.close_modal();
                self.spawn("peer trust", |runner| async move {
                    runner.trust_peer(&peer).await;
                });
            }
            ModalTask::Send {
                peer,
                file_path,
                encryption,
            } => {
                self.close_modal();
                self.spawn("file send", |runner| async move {
                    runner.send_file(&peer, &file_path, &encryption).await;
                });
            }
            ModalTask::Decrypt { file_path, method } => {
                self.close_modal();
                self.spawn("file decryption", |runner| async move {
                    runner.decrypt_file(&file_path, &method).await;
                });
            }
            ModalTask::AcceptRequest { request, save_dir } => {
                self.runner.accept_request(&request, &save_dir);
                self.close_modal();
            }
            ModalTask::DeclineRequest(request_id) => {
                self.runner.decline_request(&request_id);
                self.close_modal();
            }
        }
    }

    fn spawn<F>(&self, label: &'static str, task: impl FnOnce(Arc<dyn WorkflowRunner>) -> F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match TokioHandle::try_current() {
            Ok(handle) => {
                handle.spawn(task(Arc::clone(&self.runner)));
            }
            Err(_) => {
                tracing::warn!(task = label, "tokio runtime is not active");
                self.stores.show_toast(
                    format!("{label} unavailable: tokio runtime is not active"),
                    ToastTone::Warning,
                );
            }
        }
    }

    fn selected_activity(&self) -> Option<ActivityEntry> {
        let selected = self.stores.activity.with(|activity| activity.selected.clone());
        self.stores.activity_sections().item_data(selected.as_ref())
    }

    fn open_modal(&mut self, kind: ModalKind, data: ModalData) {
        self.stores.modal.update(|modal| modal.open(kind, data));
        self.sync_modal();
    }

    fn close_modal(&mut self) {
        self.stores.modal.update(|modal| modal.close());
        self.sync_modal();
    }

    /// Mounts handlers for a modal opened since the last check and drops them
    /// once it closes. Workflows open and close modals from other tasks.
    fn sync_modal(&mut self) {
        let version = self.stores.modal.version();
        if self.mounted_modal_version == Some(version) {
            return;
        }
        let (kind, data) = self
            .stores
            .modal
            .with(|modal| (modal.kind, modal.data.clone()));
        self.handlers = modals::mount(kind, &data, &self.stores);
        self.mounted_modal_version = Some(version);
        tracing::debug!(modal = kind.as_str(), handlers = self.handlers.is_some(), "modal synced");
    }

    /// Prompts for the newest unseen incoming request while no modal is open.
    fn announce_requests(&mut self) {
        let requests = self
            .stores
            .receive
            .with(|receive| receive.incoming_requests.clone());
        let fresh = requests
            .iter()
            .find(|request| !self.announced_requests.contains(&request.id))
            .cloned();
        self.announced_requests
            .retain(|id| requests.iter().any(|request| &request.id == id));
        let Some(request) = fresh else {
            return;
        };
        if self.stores.modal.with(|modal| modal.is_open()) {
            return;
        }
        self.announced_requests
            .extend(requests.iter().map(|request| request.id.clone()));
        self.stores.sync_activity_selection();
        self.open_modal(ModalKind::ReceiveRequest, ModalData::Request(request));
    }
}

pub struct Ui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Ui {
    pub fn init() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    /// Runs until a quit command. Redraws on every tick and as soon as any
    /// store changes.
    pub fn run(&mut self, app: &mut App) -> io::Result<()> {
        let mut last_draw: Option<(Instant, u64)> = None;
        loop {
            let now = Instant::now();
            app.tick(now);
            let version = app.stores().version();
            let due = match last_draw {
                Some((drawn_at, drawn_version)) => {
                    drawn_version != version || now.duration_since(drawn_at) >= REDRAW_INTERVAL
                }
                None => true,
            };
            if due {
                self.terminal.draw(|frame| app.draw(frame))?;
                last_draw = Some((now, version));
            }

            if event::poll(INPUT_POLL)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        app.handle_key(key);
                        last_draw = None;
                    }
                    Event::Resize(_, _) => last_draw = None,
                    _ => {}
                }
            }
            if app.should_quit() {
                break;
            }
        }
        Ok(())
    }
}

impl Drop for Ui {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
    }
}
