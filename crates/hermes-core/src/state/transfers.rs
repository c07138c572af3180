use chrono::Utc;

use crate::{Transfer, TransferStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransfersState {
    /// Newest first.
    pub transfers: Vec<Transfer>,
    pub selected_transfer_id: Option<String>,
}

impl TransfersState {
    pub fn add(&mut self, transfer: Transfer) {
        self.transfers.insert(0, transfer);
    }

    pub fn get(&self, id: &str) -> Option<&Transfer> {
        self.transfers.iter().find(|transfer| transfer.id == id)
    }

    pub fn update(&mut self, id: &str, apply: impl FnOnce(&mut Transfer)) -> bool {
        match self.transfers.iter_mut().find(|transfer| transfer.id == id) {
            Some(transfer) => {
                apply(transfer);
                true
            }
            None => false,
        }
    }

    pub fn update_progress(&mut self, id: &str, progress: u8) -> bool {
        self.update(id, |transfer| {
            transfer.progress = progress.min(100);
            transfer.status = TransferStatus::InProgress;
        })
    }

    pub fn complete(&mut self, id: &str, hash: impl Into<String>) -> bool {
        let hash = hash.into();
        self.update(id, |transfer| {
            transfer.status = TransferStatus::Completed;
            transfer.progress = 100;
            transfer.hash = Some(hash);
            transfer.completed_at = Some(Utc::now());
        })
    }

    pub fn fail(&mut self, id: &str, error: impl Into<String>) -> bool {
        let error = error.into();
        self.update(id, |transfer| {
            transfer.status = TransferStatus::Failed;
            transfer.error = Some(error);
            transfer.completed_at = Some(Utc::now());
        })
    }

    /// Cancels a pending or in-progress transfer. Finished transfers are left alone.
    pub fn cancel(&mut self, id: &str) -> bool {
        let Some(transfer) = self
            .transfers
            .iter_mut()
            .find(|transfer| transfer.id == id && transfer.status.is_active())
        else {
            return false;
        };
        transfer.status = TransferStatus::Cancelled;
        transfer.completed_at = Some(Utc::now());
        true
    }

    pub fn active(&self) -> Vec<&Transfer> {
        self.transfers
            .iter()
            .filter(|transfer| transfer.status.is_active())
            .collect()
    }

    pub fn history(&self) -> Vec<&Transfer> {
        self.transfers
            .iter()
            .filter(|transfer| transfer.status.is_finished())
            .collect()
    }

    /// Appends persisted transfers behind anything already tracked this run.
    pub fn load_history(&mut self, history: Vec<Transfer>) {
        for transfer in history {
            if self.get(&transfer.id).is_none() {
                self.transfers.push(transfer);
            }
        }
    }
}
