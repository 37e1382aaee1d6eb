//! Pending form field edits and the form API they are applied through

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Values for all edited form elements of a PDF, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormInputValues {
    pub text_name_to_value: BTreeMap<String, String>,
    pub checkbox_name_to_value: BTreeMap<String, bool>,
    pub dropdown_name_to_selected_index: BTreeMap<String, i64>,
    pub option_name_to_selected_index: BTreeMap<String, i64>,
    pub radio_group_name_to_selected_index: BTreeMap<String, i64>,
}

impl FormInputValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text_name_to_value.is_empty()
            && self.checkbox_name_to_value.is_empty()
            && self.dropdown_name_to_selected_index.is_empty()
            && self.option_name_to_selected_index.is_empty()
            && self.radio_group_name_to_selected_index.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text_name_to_value.len()
            + self.checkbox_name_to_value.len()
            + self.dropdown_name_to_selected_index.len()
            + self.option_name_to_selected_index.len()
            + self.radio_group_name_to_selected_index.len()
    }

    /// Selected-index edits grouped by the kind of field they target
    pub fn choice_edits(&self) -> [(ChoiceKind, &BTreeMap<String, i64>); 3] {
        [
            (ChoiceKind::Dropdown, &self.dropdown_name_to_selected_index),
            (ChoiceKind::OptionList, &self.option_name_to_selected_index),
            (ChoiceKind::RadioGroup, &self.radio_group_name_to_selected_index),
        ]
    }
}

/// Form fields whose value is one option picked by index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceKind {
    Dropdown,
    OptionList,
    RadioGroup,
}

impl ChoiceKind {
    pub fn label(self) -> &'static str {
        match self {
            ChoiceKind::Dropdown => "dropdown",
            ChoiceKind::OptionList => "option list",
            ChoiceKind::RadioGroup => "radio group",
        }
    }
}

/// Form API of an editable document, keyed by fully-qualified field name.
/// Every method fails with [`FieldError::NotFound`] for unknown names.
pub trait FormFields {
    fn set_text(&mut self, name: &str, value: &str) -> Result<(), FieldError>;

    fn set_checked(&mut self, name: &str, checked: bool) -> Result<(), FieldError>;

    /// Options of a choice field, in document order
    fn options(&self, name: &str, kind: ChoiceKind) -> Result<Vec<String>, FieldError>;

    fn select(&mut self, name: &str, kind: ChoiceKind, option: &str) -> Result<(), FieldError>;
}
