//! Telemetry sink contract and the deduplicating last-value store.
//!
//! Components report state changes by topic (`"CS/state"`,
//! `"ValveController/mode"`, ...).  The [`ValueBus`] keeps the most recent
//! value per topic and swallows re-publications of an unchanged value, so
//! reporting is edge-triggered even when a state machine re-asserts its state
//! on every tick.  Status consumers read the store back by topic prefix.

use std::collections::BTreeMap;
use std::sync::RwLock;

use aquactl_types::TelemetryValue;

/// Sink for observed state and value changes.
///
/// Injected into every device and state machine at construction time; there
/// is deliberately no ambient global bus.
pub trait Telemetry: Send + Sync {
    /// Publish `value` under `topic`.
    fn emit(&self, topic: &str, value: TelemetryValue);
}

/// Last-value cache behind the [`Telemetry`] trait.
///
/// A published value identical to the stored one is dropped, so downstream
/// consumers only ever observe transitions.
#[derive(Default)]
pub struct ValueBus {
    values: RwLock<BTreeMap<String, TelemetryValue>>,
}

impl ValueBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the last value published under `topic`, if any.
    pub fn get(&self, topic: &str) -> Option<TelemetryValue> {
        self.values.read().expect("value bus poisoned").get(topic).copied()
    }

    /// Return all `(topic, value)` pairs whose topic starts with `prefix`,
    /// in topic order.
    pub fn collect_prefix(&self, prefix: &str) -> BTreeMap<String, TelemetryValue> {
        self.values
            .read()
            .expect("value bus poisoned")
            .iter()
            .filter(|(topic, _)| topic.starts_with(prefix))
            .map(|(topic, value)| (topic.clone(), *value))
            .collect()
    }
}

impl Telemetry for ValueBus {
    fn emit(&self, topic: &str, value: TelemetryValue) {
        let mut values = self.values.write().expect("value bus poisoned");
        if values.get(topic) == Some(&value) {
            return;
        }
        values.insert(topic.to_string(), value);
    }
}

/// Telemetry sink that discards everything.  Handy for tests that don't
/// assert on reported values.
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn emit(&self, _topic: &str, _value: TelemetryValue) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_last_value_per_topic() {
        let bus = ValueBus::new();
        bus.emit("CS/state", TelemetryValue::Int(1));
        bus.emit("CS/state", TelemetryValue::Int(4));
        assert_eq!(bus.get("CS/state"), Some(TelemetryValue::Int(4)));
        assert_eq!(bus.get("HS/state"), None);
    }

    #[test]
    fn collect_prefix_filters_topics() {
        let bus = ValueBus::new();
        bus.emit("CS/open/state", TelemetryValue::Int(1));
        bus.emit("CS/close/state", TelemetryValue::Int(0));
        bus.emit("Heater/state", TelemetryValue::Int(1));

        let cs = bus.collect_prefix("CS/");
        assert_eq!(cs.len(), 2);
        assert!(cs.contains_key("CS/open/state"));
        assert!(cs.contains_key("CS/close/state"));
    }

    #[test]
    fn floats_and_ints_coexist() {
        let bus = ValueBus::new();
        bus.emit("HT/value", TelemetryValue::Float(55.5));
        bus.emit("HT/state", TelemetryValue::Int(2));
        assert_eq!(bus.get("HT/value"), Some(TelemetryValue::Float(55.5)));
        assert_eq!(bus.get("HT/state"), Some(TelemetryValue::Int(2)));
    }
}
