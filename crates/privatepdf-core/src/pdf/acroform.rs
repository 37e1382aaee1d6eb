//! Interactive form (AcroForm) access by fully-qualified field name

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use super::editor::LopdfEditor;
use super::page_info::{inherited_attribute, resolve};
use crate::error::FieldError;
use crate::forms::{ChoiceKind, FormFields};

const FLAG_RADIO: i64 = 1 << 15;
const FLAG_PUSHBUTTON: i64 = 1 << 16;
const FLAG_COMBO: i64 = 1 << 17;

const MAX_FIELD_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Checkbox,
    RadioGroup,
    PushButton,
    Dropdown,
    OptionList,
    Signature,
    Unknown,
}

impl FieldKind {
    pub fn label(self) -> &'static str {
        match self {
            FieldKind::Text => "text field",
            FieldKind::Checkbox => "checkbox",
            FieldKind::RadioGroup => "radio group",
            FieldKind::PushButton => "button",
            FieldKind::Dropdown => "dropdown",
            FieldKind::OptionList => "option list",
            FieldKind::Signature => "signature",
            FieldKind::Unknown => "field of unknown type",
        }
    }

    fn of_choice(kind: ChoiceKind) -> FieldKind {
        match kind {
            ChoiceKind::Dropdown => FieldKind::Dropdown,
            ChoiceKind::OptionList => FieldKind::OptionList,
            ChoiceKind::RadioGroup => FieldKind::RadioGroup,
        }
    }
}

fn acroform(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.catalog().ok()?;
    resolve(doc, catalog.get(b"AcroForm").ok()?).as_dict().ok()
}

/// Every named field of the document, keyed by `parent.child` name
pub fn collect_fields(doc: &Document) -> BTreeMap<String, ObjectId> {
    let mut fields = BTreeMap::new();
    let roots = acroform(doc)
        .and_then(|form| form.get(b"Fields").ok())
        .and_then(|fields| resolve(doc, fields).as_array().ok());
    for root in roots.into_iter().flatten() {
        if let Ok(id) = root.as_reference() {
            walk_field(doc, id, None, &mut fields, 0);
        }
    }
    fields
}

fn walk_field(
    doc: &Document,
    id: ObjectId,
    parent_name: Option<&str>,
    fields: &mut BTreeMap<String, ObjectId>,
    depth: usize,
) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        return;
    };

    let partial = dict
        .get(b"T")
        .ok()
        .and_then(|t| resolve(doc, t).as_str().ok())
        .map(decode_text_string);
    let name = match (parent_name, partial) {
        (Some(parent), Some(partial)) => Some(format!("{}.{}", parent, partial)),
        (None, Some(partial)) => Some(partial),
        (parent, None) => parent.map(str::to_string),
    };
    if let Some(name) = &name {
        fields.entry(name.clone()).or_insert(id);
    }

    for kid in kids(doc, dict) {
        walk_field(doc, kid, name.as_deref(), fields, depth + 1);
    }
}

fn kids(doc: &Document, dict: &Dictionary) -> Vec<ObjectId> {
    dict.get(b"Kids")
        .ok()
        .and_then(|kids| resolve(doc, kids).as_array().ok())
        .map(|kids| kids.iter().filter_map(|kid| kid.as_reference().ok()).collect())
        .unwrap_or_default()
}

fn is_field_node(doc: &Document, id: ObjectId) -> bool {
    doc.get_dictionary(id)
        .map(|dict| dict.has(b"T"))
        .unwrap_or(false)
}

/// Widget annotations of a field: its unnamed kids, or the field itself
/// when field and widget are merged into one dictionary
pub fn widgets(doc: &Document, field_id: ObjectId) -> Vec<ObjectId> {
    let Ok(dict) = doc.get_dictionary(field_id) else {
        return Vec::new();
    };
    let widget_kids: Vec<_> = kids(doc, dict)
        .into_iter()
        .filter(|kid| !is_field_node(doc, *kid))
        .collect();
    if widget_kids.is_empty() {
        vec![field_id]
    } else {
        widget_kids
    }
}

/// Name of the appearance state that turns a button widget on
pub fn on_state(doc: &Document, widget_id: ObjectId) -> Option<Vec<u8>> {
    let widget = doc.get_dictionary(widget_id).ok()?;
    let appearances = resolve(doc, widget.get(b"AP").ok()?).as_dict().ok()?;
    let normal = resolve(doc, appearances.get(b"N").ok()?).as_dict().ok()?;
    normal
        .iter()
        .map(|(state, _)| state)
        .find(|state| state.as_slice() != b"Off")
        .cloned()
}

pub fn field_kind(doc: &Document, dict: &Dictionary) -> FieldKind {
    let field_type = inherited_attribute(doc, dict, b"FT").and_then(|ft| ft.as_name().ok());
    let flags = inherited_attribute(doc, dict, b"Ff")
        .and_then(|ff| ff.as_i64().ok())
        .unwrap_or(0);

    match field_type {
        Some(b"Tx") => FieldKind::Text,
        Some(b"Btn") if flags & FLAG_PUSHBUTTON != 0 => FieldKind::PushButton,
        Some(b"Btn") if flags & FLAG_RADIO != 0 => FieldKind::RadioGroup,
        Some(b"Btn") => FieldKind::Checkbox,
        Some(b"Ch") if flags & FLAG_COMBO != 0 => FieldKind::Dropdown,
        Some(b"Ch") => FieldKind::OptionList,
        Some(b"Sig") => FieldKind::Signature,
        _ => FieldKind::Unknown,
    }
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, otherwise
/// treated as Latin-1
pub fn decode_text_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}

pub fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// (export value, display text) pairs of a choice field's `/Opt`
fn choice_options(doc: &Document, name: &str, dict: &Dictionary) -> Result<Vec<(String, String)>, FieldError> {
    let malformed = |reason: &str| FieldError::Malformed {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let Some(options) = inherited_attribute(doc, dict, b"Opt") else {
        return Ok(Vec::new());
    };
    let options = options.as_array().map_err(|_| malformed("/Opt is not an array"))?;

    options
        .iter()
        .map(|option| match resolve(doc, option) {
            Object::String(text, _) => {
                let text = decode_text_string(text);
                Ok((text.clone(), text))
            }
            Object::Array(pair) if pair.len() == 2 => {
                let part = |i: usize| {
                    resolve(doc, &pair[i])
                        .as_str()
                        .map(decode_text_string)
                        .map_err(|_| malformed("/Opt pair entry is not a string"))
                };
                Ok((part(0)?, part(1)?))
            }
            _ => Err(malformed("unexpected /Opt entry")),
        })
        .collect()
}

impl LopdfEditor {
    fn find_field(&self, name: &str, expected: FieldKind) -> Result<ObjectId, FieldError> {
        let id = collect_fields(&self.doc)
            .get(name)
            .copied()
            .ok_or_else(|| FieldError::NotFound(name.to_string()))?;
        let dict = self
            .doc
            .get_dictionary(id)
            .map_err(|e| FieldError::Malformed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let found = field_kind(&self.doc, dict);
        if found != expected {
            return Err(FieldError::WrongType {
                name: name.to_string(),
                expected: expected.label(),
                found: found.label(),
            });
        }
        Ok(id)
    }

    fn set_entry(&mut self, name: &str, id: ObjectId, key: &str, value: Object) -> Result<(), FieldError> {
        let dict = self
            .doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| FieldError::Malformed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        dict.set(key, value);
        self.mark_form_edited();
        Ok(())
    }

    fn set_widget_states(&mut self, name: &str, field_id: ObjectId, selected: Option<&[u8]>) -> Result<(), FieldError> {
        for widget in widgets(&self.doc, field_id) {
            let state = match (on_state(&self.doc, widget), selected) {
                (Some(on), Some(selected)) if on == selected => on,
                _ => b"Off".to_vec(),
            };
            self.set_entry(name, widget, "AS", Object::Name(state))?;
        }
        Ok(())
    }
}

impl FormFields for LopdfEditor {
    fn set_text(&mut self, name: &str, value: &str) -> Result<(), FieldError> {
        let id = self.find_field(name, FieldKind::Text)?;
        self.set_entry(name, id, "V", encode_text_string(value))
    }

    fn set_checked(&mut self, name: &str, checked: bool) -> Result<(), FieldError> {
        let id = self.find_field(name, FieldKind::Checkbox)?;
        let on = widgets(&self.doc, id)
            .into_iter()
            .find_map(|widget| on_state(&self.doc, widget))
            .unwrap_or_else(|| b"Yes".to_vec());

        let value = if checked { on.clone() } else { b"Off".to_vec() };
        self.set_entry(name, id, "V", Object::Name(value))?;
        self.set_widget_states(name, id, checked.then_some(on.as_slice()))
    }

    fn options(&self, name: &str, kind: ChoiceKind) -> Result<Vec<String>, FieldError> {
        let id = self.find_field(name, FieldKind::of_choice(kind))?;
        if kind == ChoiceKind::RadioGroup {
            return Ok(widgets(&self.doc, id)
                .into_iter()
                .filter_map(|widget| on_state(&self.doc, widget))
                .map(|state| String::from_utf8_lossy(&state).into_owned())
                .collect());
        }

        let dict = self.doc.get_dictionary(id).map_err(|e| FieldError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(choice_options(&self.doc, name, dict)?
            .into_iter()
            .map(|(_, display)| display)
            .collect())
    }

    fn select(&mut self, name: &str, kind: ChoiceKind, option: &str) -> Result<(), FieldError> {
        let id = self.find_field(name, FieldKind::of_choice(kind))?;
        let unknown = || FieldError::UnknownOption {
            name: name.to_string(),
            option: option.to_string(),
        };

        if kind == ChoiceKind::RadioGroup {
            let state = option.as_bytes();
            let available = widgets(&self.doc, id)
                .into_iter()
                .any(|widget| on_state(&self.doc, widget).as_deref() == Some(state));
            if !available {
                return Err(unknown());
            }
            self.set_entry(name, id, "V", Object::Name(state.to_vec()))?;
            return self.set_widget_states(name, id, Some(state));
        }

        let dict = self.doc.get_dictionary(id).map_err(|e| FieldError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let options = choice_options(&self.doc, name, dict)?;
        let (index, (export, _)) = options
            .iter()
            .enumerate()
            .find(|(_, (_, display))| display == option)
            .ok_or_else(unknown)?;

        self.set_entry(name, id, "V", encode_text_string(export))?;
        if kind == ChoiceKind::OptionList {
            self.set_entry(name, id, "I", Object::Array(vec![Object::Integer(index as i64)]))?;
        }
        Ok(())
    }
}
