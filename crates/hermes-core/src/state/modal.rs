use crate::{ModalData, ModalKind};

/// The single open modal. Opening another one replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalState {
    pub kind: ModalKind,
    pub data: ModalData,
}

impl ModalState {
    pub fn open(&mut self, kind: ModalKind, data: ModalData) {
        self.kind = kind;
        self.data = data;
    }

    pub fn close(&mut self) {
        *self = Self::default();
    }

    pub fn update_data(&mut self, data: ModalData) {
        self.data = data;
    }

    pub fn is_open(&self) -> bool {
        self.kind.is_open()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.open(
            ModalKind::Error,
            ModalData::Error {
                message: message.into(),
            },
        );
    }
}
