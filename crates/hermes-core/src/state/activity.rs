use crate::{IncomingRequest, Transfer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Request,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub id: String,
}

impl ActivityItem {
    pub fn request(id: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Request,
            id: id.into(),
        }
    }

    pub fn transfer(id: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Transfer,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEntry {
    Request(IncomingRequest),
    Transfer(Transfer),
}

/// Snapshot of the activity feed: requests, then active transfers, then history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySections {
    pub requests: Vec<IncomingRequest>,
    pub active_transfers: Vec<Transfer>,
    pub history_transfers: Vec<Transfer>,
}

impl ActivitySections {
    pub fn build(requests: &[IncomingRequest], transfers: &[Transfer]) -> Self {
        let (active_transfers, history_transfers) = transfers
            .iter()
            .cloned()
            .partition(|transfer| transfer.status.is_active());
        Self {
            requests: requests.to_vec(),
            active_transfers,
            history_transfers,
        }
    }

    pub fn items(&self) -> Vec<ActivityItem> {
        self.requests
            .iter()
            .map(|request| ActivityItem::request(request.id.as_str()))
            .chain(
                self.active_transfers
                    .iter()
                    .chain(self.history_transfers.iter())
                    .map(|transfer| ActivityItem::transfer(transfer.id.as_str())),
            )
            .collect()
    }

    pub fn item_data(&self, selection: Option<&ActivityItem>) -> Option<ActivityEntry> {
        let selection = selection?;
        match selection.kind {
            ActivityKind::Request => self
                .requests
                .iter()
                .find(|request| request.id == selection.id)
                .cloned()
                .map(ActivityEntry::Request),
            ActivityKind::Transfer => self
                .active_transfers
                .iter()
                .chain(self.history_transfers.iter())
                .find(|transfer| transfer.id == selection.id)
                .cloned()
                .map(ActivityEntry::Transfer),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityState {
    pub selected: Option<ActivityItem>,
}

impl ActivityState {
    pub fn select(&mut self, selection: Option<ActivityItem>) {
        self.selected = selection;
    }

    pub fn select_next(&mut self, items: &[ActivityItem]) {
        self.selected = match self.position(items) {
            _ if items.is_empty() => None,
            Some(index) => Some(items[(index + 1) % items.len()].clone()),
            None => items.first().cloned(),
        };
    }

    pub fn select_prev(&mut self, items: &[ActivityItem]) {
        self.selected = match self.position(items) {
            _ if items.is_empty() => None,
            Some(index) => Some(items[(index + items.len() - 1) % items.len()].clone()),
            None => items.last().cloned(),
        };
    }

    /// Keeps a selection that is still listed, otherwise falls back to the first item.
    /// Returns whether the selection changed.
    pub fn sync_selection(&mut self, items: &[ActivityItem]) -> bool {
        if self.position(items).is_some() {
            return false;
        }
        let next = items.first().cloned();
        let changed = next != self.selected;
        self.selected = next;
        changed
    }

    fn position(&self, items: &[ActivityItem]) -> Option<usize> {
        let selected = self.selected.as_ref()?;
        items.iter().position(|item| item == selected)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{TransferDirection, TransferStatus};

    fn request(id: &str) -> IncomingRequest {
        IncomingRequest {
            id: id.to_owned(),
            peer_id: "alice".to_owned(),
            peer_fingerprint: "fp".to_owned(),
            file_name: "a.txt".to_owned(),
            file_size: 1,
            received_at: Utc::now(),
        }
    }

    fn transfer(status: TransferStatus) -> Transfer {
        Transfer::new(TransferDirection::Receive, "alice", "a.txt", 1).with_status(status)
    }

    #[test]
    fn items_list_requests_then_active_then_history() {
        let done = transfer(TransferStatus::Completed);
        let running = transfer(TransferStatus::InProgress);
        let sections = ActivitySections::build(
            &[request("r1")],
            &[done.clone(), running.clone()],
        );

        assert_eq!(
            sections.items(),
            vec![
                ActivityItem::request("r1"),
                ActivityItem::transfer(running.id.as_str()),
                ActivityItem::transfer(done.id.as_str()),
            ]
        );
        assert_eq!(
            sections.item_data(Some(&ActivityItem::transfer(done.id.as_str()))),
            Some(ActivityEntry::Transfer(done))
        );
        assert_eq!(sections.item_data(Some(&ActivityItem::request("gone"))), None);
    }

    #[test]
    fn selection_wraps_and_starts_at_the_ends() {
        let items = vec![
            ActivityItem::request("a"),
            ActivityItem::transfer("b"),
            ActivityItem::transfer("c"),
        ];
        let mut state = ActivityState::default();
        state.select_prev(&items);
        assert_eq!(state.selected, Some(ActivityItem::transfer("c")));
        state.select_next(&items);
        assert_eq!(state.selected, Some(ActivityItem::request("a")));

        let mut fresh = ActivityState::default();
        fresh.select_next(&items);
        assert_eq!(fresh.selected, Some(ActivityItem::request("a")));

        fresh.select_next(&[]);
        assert_eq!(fresh.selected, None);
    }

    #[test]
    fn sync_keeps_present_selection_and_replaces_stale_one() {
        let items = vec![ActivityItem::request("a"), ActivityItem::transfer("b")];
        let mut state = ActivityState {
            selected: Some(ActivityItem::transfer("b")),
        };
        assert!(!state.sync_selection(&items));

        state.selected = Some(ActivityItem::transfer("gone"));
        assert!(state.sync_selection(&items));
        assert_eq!(state.selected, Some(ActivityItem::request("a")));

        assert!(state.sync_selection(&[]));
        assert_eq!(state.selected, None);
    }
}
