//! Core types for spark-vdom.
//!
//! Prop values, props, styles and keys. These flow from the builders through
//! the runtime into both backends and define what a backend understands.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::Event;
use crate::error::Result;
use crate::vnode::Child;

// =============================================================================
// Event Handler
// =============================================================================

/// Event listener attached through an `on*` prop.
///
/// Returning `Err` aborts the dispatch and hands the error to whoever
/// dispatched the event (typically a test or the host event loop).
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event) -> Result<()>>);

impl EventHandler {
    pub fn new(handler: impl Fn(&Event) -> Result<()> + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) -> Result<()> {
        (self.0)(event)
    }

    /// Identity comparison (same underlying closure).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(..)")
    }
}

// =============================================================================
// Style
// =============================================================================

/// Ordered inline style declarations, keyed the way they were written
/// (camelCase or kebab-case).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style(IndexMap<String, String>);

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, property: impl Into<String>, value: impl fmt::Display) -> Self {
        self.0.insert(property.into(), value.to_string());
        self
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl fmt::Display) {
        self.0.insert(property.into(), value.to_string());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: fmt::Display> FromIterator<(K, V)> for Style {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.to_string())).collect())
    }
}

/// Convert a camelCase CSS property to kebab-case (`backgroundColor` ->
/// `background-color`). Already-kebab names pass through.
pub fn css_property_name(property: &str) -> String {
    let mut out = String::with_capacity(property.len() + 4);
    for ch in property.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

// =============================================================================
// Prop Value
// =============================================================================

/// A single prop value.
///
/// `Null` plays the role of both `null` and `undefined`: backends treat a
/// missing prop and a `Null` prop the same way.
#[derive(Clone, Default)]
pub enum PropValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    Style(Style),
    Handler(EventHandler),
    Children(Child),
    /// Arbitrary typed data for component props and provider values.
    Data(Rc<dyn Any>),
}

impl PropValue {
    pub fn data<T: 'static>(value: T) -> Self {
        PropValue::Data(Rc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Downcast `Data` to a concrete type.
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            PropValue::Data(any) => any.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("Null"),
            PropValue::Bool(b) => write!(f, "Bool({b})"),
            PropValue::Number(n) => write!(f, "Number({n})"),
            PropValue::Text(s) => write!(f, "Text({s:?})"),
            PropValue::Style(s) => write!(f, "Style({s:?})"),
            PropValue::Handler(h) => h.fmt(f),
            PropValue::Children(c) => write!(f, "Children({c:?})"),
            PropValue::Data(_) => f.write_str("Data(..)"),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.into())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value.into())
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Text(value)
    }
}

impl From<Style> for PropValue {
    fn from(value: Style) -> Self {
        PropValue::Style(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

impl From<Child> for PropValue {
    fn from(value: Child) -> Self {
        PropValue::Children(value)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropValue::Null, Into::into)
    }
}

macro_rules! number_prop {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropValue {
                fn from(value: $ty) -> Self {
                    PropValue::Number(value as f64)
                }
            }
        )*
    };
}

number_prop!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

// =============================================================================
// Props
// =============================================================================

/// Ordered prop mapping. `children` lives here like any other prop.
#[derive(Debug, Clone, Default)]
pub struct Props(IndexMap<String, PropValue>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `children` prop, or `Child::Empty` when absent.
    pub fn children(&self) -> Child {
        match self.0.get("children") {
            Some(PropValue::Children(child)) => child.clone(),
            _ => Child::Empty,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PropValue::as_f64)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropValue::as_bool)
    }

    pub fn data<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.get(name).and_then(PropValue::downcast)
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// =============================================================================
// Key
// =============================================================================

/// VNode key. Carried on the node; the runtime identifies components by
/// tree position, not by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Text(Rc<str>),
    Int(i64),
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Text(value.into())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

// =============================================================================
// Number formatting
// =============================================================================

/// Format a number the way it shows up in markup: integral values without a
/// fractional part, `NaN`, `Infinity`, `-Infinity`.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e21 {
        return format!("{value:.0}");
    }
    value.to_string()
}
