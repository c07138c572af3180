use crate::{Pane, Section};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub active_section: Section,
}

impl NavigationState {
    pub fn navigate_next(&mut self) {
        self.active_section = self.active_section.next();
    }

    pub fn navigate_prev(&mut self) {
        self.active_section = self.active_section.prev();
    }

    pub fn navigate_to(&mut self, section: Section) {
        self.active_section = section;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusState {
    pub focused_pane: Pane,
}

impl FocusState {
    pub fn focus_next(&mut self) {
        self.focused_pane = self.focused_pane.next();
    }

    pub fn focus_prev(&mut self) {
        self.focused_pane = self.focused_pane.prev();
    }

    pub fn focus(&mut self, pane: Pane) {
        self.focused_pane = pane;
    }
}
