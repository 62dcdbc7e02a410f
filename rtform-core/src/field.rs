//! Field model: identities, input semantics, values and the binding contract.
//!
//! A field is anything the user can edit that the form tracks: a checkbox,
//! a text box, a select. The core never touches a UI toolkit directly; it
//! talks to fields through [`FieldBinding`], which a host implements for its
//! own widgets. [`MemoryField`] is the headless implementation used by tests,
//! benches and the demo.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Prefix shared by every generated field identity.
pub const FIELD_ID_PREFIX: &str = "rtform-";

/// Opaque, session-stable identity of one tracked field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Identity of the field at `index` in enumeration order (`rtform-3`).
    ///
    /// Every client enumerating the same form derives the same ids, which is
    /// what lets their documents share keys.
    pub fn sequential(index: usize) -> Self {
        Self(format!("{FIELD_ID_PREFIX}{index}"))
    }

    /// Wrap a caller-chosen identity (deterministic ids for tests and fixtures).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Editing semantics of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Boolean-valued (checkbox, radio).
    Toggle,
    /// String-valued.
    Text,
}

/// Notifications a field binding can raise when the user interacts with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldEvent {
    Change,
    KeyUp,
    Click,
    Input,
}

/// Raw input semantics of a candidate field, as reported by its binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputType {
    Checkbox,
    Radio,
    Text,
    Password,
    Textarea,
    Email,
    Number,
    Range,
    SelectOne,
    SelectMultiple,
    /// Any other editable type, kept verbatim.
    Other(String),
}

impl InputType {
    /// Parse an input type name (`"checkbox"`, `"select-one"`, ...).
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "text" => Self::Text,
            "password" => Self::Password,
            "textarea" => Self::Textarea,
            "email" => Self::Email,
            "number" => Self::Number,
            "range" => Self::Range,
            "select-one" => Self::SelectOne,
            "select-multiple" => Self::SelectMultiple,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Text => "text",
            Self::Password => "password",
            Self::Textarea => "textarea",
            Self::Email => "email",
            Self::Number => "number",
            Self::Range => "range",
            Self::SelectOne => "select-one",
            Self::SelectMultiple => "select-multiple",
            Self::Other(name) => name,
        }
    }

    /// Value kind this input type is tracked as.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Checkbox | Self::Radio => FieldKind::Toggle,
            _ => FieldKind::Text,
        }
    }

    /// Whether caret/selection must survive remote edits.
    ///
    /// Only free-text inputs carry a caret worth preserving.
    pub fn preserves_cursor(&self) -> bool {
        matches!(self, Self::Text | Self::Password | Self::Textarea)
    }

    /// Events that count as a content change for this input type.
    pub fn events(&self) -> &'static [FieldEvent] {
        use FieldEvent::*;
        match self {
            Self::Checkbox | Self::Radio => &[Change, Click],
            Self::Text | Self::Password | Self::Textarea | Self::Email => &[Change, KeyUp, Input],
            Self::Number | Self::Range => &[Change, KeyUp],
            Self::SelectOne | Self::SelectMultiple | Self::Other(_) => &[Change],
        }
    }

    pub fn listens_to(&self, event: FieldEvent) -> bool {
        self.events().contains(&event)
    }
}

/// Immutable description of a registered field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub kind: FieldKind,
    pub input_type: InputType,
    pub preserve_cursor: bool,
    pub name: String,
}

/// A field value. Serializes as a bare JSON bool or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Toggle(bool),
    Text(String),
}

impl FieldValue {
    /// Text value with line endings normalized.
    pub fn text(value: impl AsRef<str>) -> Self {
        Self::Text(canonicalize(value.as_ref()))
    }

    /// Boolean reading: toggles as-is, non-empty text is true.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Toggle(b) => *b,
            Self::Text(s) => !s.is_empty(),
        }
    }

    /// String reading: text as-is, toggles as `"true"`/`"false"`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Toggle(b) => b.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn as_toggle(&self) -> Option<bool> {
        match self {
            Self::Toggle(b) => Some(*b),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Toggle(_) => None,
        }
    }

    /// Coerce to the representation of `kind`, normalizing text.
    pub fn coerce(&self, kind: FieldKind) -> FieldValue {
        match kind {
            FieldKind::Toggle => FieldValue::Toggle(self.truthy()),
            FieldKind::Text => FieldValue::text(self.to_text()),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Toggle(b)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

/// Collapse `\r\n` to `\n` so diffs are stable across platforms.
pub fn canonicalize(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Map a char offset in `raw` to the same place in `canonicalize(raw)`.
pub fn canonical_offset(raw: &str, offset: usize) -> usize {
    let chars: Vec<char> = raw.chars().collect();
    let offset = offset.min(chars.len());
    let dropped = chars
        .windows(2)
        .take(offset)
        .filter(|pair| pair[0] == '\r' && pair[1] == '\n')
        .count();
    offset - dropped
}

/// Caret/selection offsets (in chars) local to one text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
}

impl SelectionRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Collapsed selection (a bare caret).
    pub fn caret(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }
}

/// Contract between the core and one live UI field.
pub trait FieldBinding {
    fn input_type(&self) -> InputType;
    fn name(&self) -> String;

    fn checked(&self) -> bool;
    fn set_checked(&mut self, checked: bool);

    /// Raw text value, before line-ending normalization.
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);

    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);

    /// Current selection, if the field has one.
    fn selection(&self) -> Option<SelectionRange>;
    fn set_selection(&mut self, selection: SelectionRange);
}

#[derive(Debug, Default)]
struct MemoryFieldState {
    input_type: Option<InputType>,
    name: String,
    checked: bool,
    text: String,
    enabled: bool,
    selection: Option<SelectionRange>,
    value_writes: u64,
    selection_writes: u64,
}

/// Headless field. Clones share the same underlying element, so a caller can
/// keep a handle after handing a clone to the registry.
#[derive(Debug, Clone)]
pub struct MemoryField {
    state: Rc<RefCell<MemoryFieldState>>,
}

impl MemoryField {
    pub fn new(input_type: InputType, name: impl Into<String>) -> Self {
        let state = MemoryFieldState {
            input_type: Some(input_type),
            name: name.into(),
            enabled: true,
            ..Default::default()
        };
        Self { state: Rc::new(RefCell::new(state)) }
    }

    pub fn checkbox(name: impl Into<String>, checked: bool) -> Self {
        let field = Self::new(InputType::Checkbox, name);
        field.state.borrow_mut().checked = checked;
        field
    }

    pub fn text_input(name: impl Into<String>, text: &str) -> Self {
        Self::new(InputType::Text, name).with_text(text)
    }

    pub fn textarea(name: impl Into<String>, text: &str) -> Self {
        Self::new(InputType::Textarea, name).with_text(text)
    }

    pub fn with_text(self, text: &str) -> Self {
        self.state.borrow_mut().text = text.to_string();
        self
    }

    /// Simulate the user typing: replaces the text and puts the caret at `caret`.
    pub fn type_text(&self, text: &str, caret: usize) {
        let mut state = self.state.borrow_mut();
        state.text = text.to_string();
        state.selection = Some(SelectionRange::caret(caret));
    }

    /// Simulate the user clicking a toggle.
    pub fn click(&self, checked: bool) {
        self.state.borrow_mut().checked = checked;
    }

    /// Place a selection without counting it as a programmatic write.
    pub fn select(&self, selection: SelectionRange) {
        self.state.borrow_mut().selection = Some(selection);
    }

    /// Programmatic value writes since creation.
    pub fn value_writes(&self) -> u64 {
        self.state.borrow().value_writes
    }

    /// Programmatic selection writes since creation.
    pub fn selection_writes(&self) -> u64 {
        self.state.borrow().selection_writes
    }

    pub fn boxed(&self) -> Box<dyn FieldBinding> {
        Box::new(self.clone())
    }
}

impl FieldBinding for MemoryField {
    fn input_type(&self) -> InputType {
        self.state
            .borrow()
            .input_type
            .clone()
            .unwrap_or(InputType::Text)
    }

    fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    fn checked(&self) -> bool {
        self.state.borrow().checked
    }

    fn set_checked(&mut self, checked: bool) {
        let mut state = self.state.borrow_mut();
        state.checked = checked;
        state.value_writes += 1;
    }

    fn text(&self) -> String {
        self.state.borrow().text.clone()
    }

    fn set_text(&mut self, text: &str) {
        let mut state = self.state.borrow_mut();
        state.text = text.to_string();
        state.value_writes += 1;
        // Writing a value moves the caret to the end, like a browser does.
        let end = state.text.chars().count();
        if state.selection.is_some() {
            state.selection = Some(SelectionRange::caret(end));
        }
    }

    fn is_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    fn selection(&self) -> Option<SelectionRange> {
        self.state.borrow().selection
    }

    fn set_selection(&mut self, selection: SelectionRange) {
        let mut state = self.state.borrow_mut();
        state.selection = Some(selection);
        state.selection_writes += 1;
    }
}
