//! Lua units run by a map-reduce job.

use mimic_value::Document;
use mimic_vm::document_literal;

/// Globals the user functions are bound to.
pub(crate) const MAP_FN: &str = "__mr_map";
pub(crate) const REDUCE_FN: &str = "__mr_reduce";
pub(crate) const FINALIZE_FN: &str = "__mr_finalize";

/// Emitted keys in first-emit order, and one result per key.
pub(crate) const KEYS: &str = "__mr_keys";
pub(crate) const REDUCED: &str = "__mr_reduced";
pub(crate) const EMIT_COUNT: &str = "__mr_emit_count";

/// Key registry and `emit`.
///
/// Keys are looked up through a Lua table, so strings, numbers and booleans
/// group by value while tables group by identity.
pub(crate) const EMIT_REGISTRY: &str = r#"
__mr_keys = Array({})
__mr_slots = {}
__mr_emits = {}
__mr_reduced = Array({})
__mr_emit_count = 0

local nan_slot = {}

function emit(key, value)
  if key == nil then key = null end
  if value == nil then value = null end
  local slot_key = key
  if key ~= key then slot_key = nan_slot end
  local slot = __mr_slots[slot_key]
  if slot == nil then
    slot = #__mr_keys + 1
    __mr_keys[slot] = key
    __mr_slots[slot_key] = slot
    __mr_emits[slot] = Array({})
  end
  local values = __mr_emits[slot]
  values[#values + 1] = value
  __mr_emit_count = __mr_emit_count + 1
end
"#;

/// Reduce every key's emitted values, in registration order.
pub(crate) const REDUCE_UNIT: &str = r#"
for slot = 1, #__mr_keys do
  local reduced = __mr_reduce(__mr_keys[slot], __mr_emits[slot])
  if reduced == nil then reduced = null end
  __mr_reduced[slot] = reduced
end
"#;

pub(crate) const FINALIZE_UNIT: &str = r#"
for slot = 1, #__mr_keys do
  local finalized = __mr_finalize(__mr_keys[slot], __mr_reduced[slot])
  if finalized == nil then finalized = null end
  __mr_reduced[slot] = finalized
end
"#;

/// The Lua statement applying the map function to one document.
pub(crate) fn map_call(doc: &Document) -> String {
    format!("__with_document({}, {MAP_FN})\n", document_literal(doc))
}

/// Groups map calls into script units of bounded size.
///
/// A single call larger than the limit still forms its own unit.
pub(crate) struct BatchBuilder {
    limit: usize,
    current: String,
}

impl BatchBuilder {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            current: String::new(),
        }
    }

    /// Add a call, returning the previous unit when the call would push it
    /// past the limit.
    pub(crate) fn push(&mut self, call: &str) -> Option<String> {
        let full = if !self.current.is_empty() && self.current.len() + call.len() > self.limit {
            Some(std::mem::take(&mut self.current))
        } else {
            None
        };
        self.current.push_str(call);
        full
    }

    pub(crate) fn finish(self) -> Option<String> {
        (!self.current.is_empty()).then_some(self.current)
    }
}
