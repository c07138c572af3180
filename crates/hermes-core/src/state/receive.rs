use std::path::PathBuf;

use crate::{IncomingRequest, ReceiveStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveState {
    pub status: ReceiveStatus,
    /// Newest first.
    pub incoming_requests: Vec<IncomingRequest>,
    pub selected_request_id: Option<String>,
    pub default_save_path: PathBuf,
    pub port: Option<u16>,
    pub error: Option<String>,
}

impl ReceiveState {
    pub fn new(default_save_path: PathBuf) -> Self {
        Self {
            status: ReceiveStatus::Idle,
            incoming_requests: Vec::new(),
            selected_request_id: None,
            default_save_path,
            port: None,
            error: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.status != ReceiveStatus::Idle
    }

    pub fn start_listening(&mut self, port: u16) {
        self.status = ReceiveStatus::Listening;
        self.port = Some(port);
        self.error = None;
    }

    pub fn stop_listening(&mut self, error: Option<String>) {
        self.status = ReceiveStatus::Idle;
        self.port = None;
        if error.is_some() {
            self.error = error;
        }
    }

    pub fn add_request(&mut self, request: IncomingRequest) {
        self.incoming_requests.insert(0, request);
    }

    pub fn remove_request(&mut self, id: &str) -> Option<IncomingRequest> {
        let index = self
            .incoming_requests
            .iter()
            .position(|request| request.id == id)?;
        if self.selected_request_id.as_deref() == Some(id) {
            self.selected_request_id = None;
        }
        Some(self.incoming_requests.remove(index))
    }

    pub fn find_request(&self, id: &str) -> Option<&IncomingRequest> {
        self.incoming_requests.iter().find(|request| request.id == id)
    }
}

impl Default for ReceiveState {
    fn default() -> Self {
        Self::new(
            dirs::home_dir()
                .map(|home| home.join("Downloads"))
                .unwrap_or_else(|| PathBuf::from("Downloads")),
        )
    }
}
