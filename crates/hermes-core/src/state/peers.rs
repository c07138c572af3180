use crate::Peer;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeersState {
    pub peers: Vec<Peer>,
    pub selected_peer_id: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl PeersState {
    /// Replaces the whole list, keeping the selection only if it still exists.
    pub fn set_peers(&mut self, peers: Vec<Peer>) {
        let keep = self
            .selected_peer_id
            .as_ref()
            .is_some_and(|selected| peers.iter().any(|peer| &peer.id == selected));
        if !keep {
            self.selected_peer_id = peers.first().map(|peer| peer.id.clone());
        }
        self.peers = peers;
        self.is_loading = false;
        self.error = None;
    }

    pub fn set_loading(&mut self) {
        self.is_loading = true;
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.is_loading = false;
        self.error = Some(error.into());
    }

    /// Inserts or replaces a peer that is not yet known to the engine.
    pub fn add_local(&mut self, peer: Peer) {
        match self.peers.iter_mut().find(|existing| existing.id == peer.id) {
            Some(existing) => *existing = peer,
            None => self.peers.push(peer),
        }
    }

    pub fn update_peer(&mut self, id: &str, apply: impl FnOnce(&mut Peer)) -> bool {
        match self.peers.iter_mut().find(|peer| peer.id == id) {
            Some(peer) => {
                apply(peer);
                true
            }
            None => false,
        }
    }

    pub fn remove_local(&mut self, id: &str) -> Option<Peer> {
        let index = self.peers.iter().position(|peer| peer.id == id)?;
        let removed = self.peers.remove(index);
        if self.selected_peer_id.as_deref() == Some(id) {
            self.selected_peer_id = None;
        }
        Some(removed)
    }

    pub fn select(&mut self, id: Option<String>) {
        self.selected_peer_id = id;
    }

    pub fn select_next(&mut self) {
        if self.peers.is_empty() {
            return;
        }
        let next = match self.selected_index() {
            Some(index) => (index + 1) % self.peers.len(),
            None => 0,
        };
        self.selected_peer_id = Some(self.peers[next].id.clone());
    }

    pub fn select_prev(&mut self) {
        if self.peers.is_empty() {
            return;
        }
        let prev = match self.selected_index() {
            Some(0) | None => self.peers.len() - 1,
            Some(index) => index - 1,
        };
        self.selected_peer_id = Some(self.peers[prev].id.clone());
    }

    pub fn selected(&self) -> Option<&Peer> {
        let selected = self.selected_peer_id.as_deref()?;
        self.find(selected)
    }

    pub fn find(&self, id: &str) -> Option<&Peer> {
        self.peers.iter().find(|peer| peer.id == id)
    }

    fn selected_index(&self) -> Option<usize> {
        let selected = self.selected_peer_id.as_deref()?;
        self.peers.iter().position(|peer| peer.id == selected)
    }
}
