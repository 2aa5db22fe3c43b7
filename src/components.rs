use std::collections::{BTreeSet, btree_set};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;
use tracing::debug;

use super::{Params, Responder};

/// Capability exchange. Takes the caller's component set, returns ours.
pub const LIST_COMPONENTS: &str = "system.listComponents";
/// Extension probe. Its presence in a component set enables dual batches.
pub const DUAL_BATCH: &str = "system.extension.dual-batch";

/// A set of method names, written on the wire as `{"name": true, ...}`.
///
/// Reading also accepts a plain array of names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentSet(BTreeSet<String>);

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub(crate) fn with_builtins() -> Self {
        [LIST_COMPONENTS, DUAL_BATCH].into_iter().collect()
    }
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.0.iter()
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map.keys().cloned().collect()),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<_>>()
                .map(Self),
            _ => None,
        }
    }
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|n| (n.clone(), Value::Bool(true))).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for ComponentSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
impl<'a> IntoIterator for &'a ComponentSet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for ComponentSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|n| (n, true)))
    }
}
impl<'de> Deserialize<'de> for ComponentSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| de::Error::custom("expected an object or an array of method names"))
    }
}

/// What the peer at the other end is believed to expose.
#[derive(Debug, Default)]
pub(crate) struct RemoteComponents {
    names: ComponentSet,
    upgraded: bool,
}
impl RemoteComponents {
    pub fn replace(&mut self, names: ComponentSet) {
        debug!(components = names.len(), "remote components negotiated");
        self.names = names;
        self.upgraded = true;
    }
    pub fn names(&self) -> &ComponentSet {
        &self.names
    }
    pub fn is_upgraded(&self) -> bool {
        self.upgraded
    }
    /// Before negotiation anything may be called.
    pub fn allows(&self, method: &str) -> bool {
        !self.upgraded || self.names.contains(method)
    }
    pub fn has_dual_batch(&self) -> bool {
        self.names.contains(DUAL_BATCH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    ListComponents,
    DualBatch,
}

impl Builtin {
    pub fn serve(self, params: Params, responder: Responder) {
        match self {
            Builtin::ListComponents => {
                let Some(peer) = responder.raw_peer() else {
                    return;
                };
                let announced = params.as_value().and_then(ComponentSet::from_value);
                let local = peer.with_active(|s| {
                    if let Some(names) = announced {
                        s.remote_components.replace(names);
                    }
                    s.local_components.to_value()
                });
                if let Some(local) = local {
                    responder.respond(Ok(local));
                }
            }
            Builtin::DualBatch => responder.respond(Ok(Value::Bool(true))),
        }
    }
}
