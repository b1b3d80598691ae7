//! Status snapshot serialization.

use aquactl_hal::ValueBus;

/// Serialize the full telemetry snapshot as one JSON object keyed by topic.
pub fn snapshot_json(bus: &ValueBus) -> String {
    let values = bus.collect_prefix("");
    serde_json::to_string(&values).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquactl_hal::Telemetry;
    use aquactl_types::TelemetryValue;

    #[test]
    fn snapshot_carries_every_topic() {
        let bus = ValueBus::new();
        bus.emit("ValveController/state", TelemetryValue::Int(4));
        bus.emit("HST/value", TelemetryValue::Float(45.5));

        let json = snapshot_json(&bus);
        assert!(json.contains("\"ValveController/state\":4"));
        assert!(json.contains("\"HST/value\":45.5"));
    }

    #[test]
    fn empty_bus_serializes_to_an_empty_object() {
        assert_eq!(snapshot_json(&ValueBus::new()), "{}");
    }
}
