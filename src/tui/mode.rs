use crate::shared::PanelField;

// state local to the tui: which panel row the arrow keys are editing
#[derive(Clone, Debug)]
pub struct TuiState {
    pub selected: PanelField,
    pub show_help: bool,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            selected: PanelField::Volume,
            show_help: false,
        }
    }
}
