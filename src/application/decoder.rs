// Message decoder - tolerant decoding of inbound rig frames
use crate::domain::telemetry::TelemetryEvent;
use serde_json::Value;

/// Legacy field name the fish-count firmware still emits.
const LEGACY_COUNT_FIELD: &str = "message3";

/// Generic envelope field used by newer firmware revisions.
const MESSAGE_FIELD: &str = "message";

/// Decode one raw text frame into a telemetry event.
///
/// The firmware has shipped at least two envelope shapes for the same
/// logical signal and both must be accepted indefinitely, so decoding
/// tries them in priority order and fails soft: anything unparseable
/// becomes `Malformed` rather than an error. Never panics.
pub fn decode(raw: &str) -> TelemetryEvent {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(raw) else {
        return TelemetryEvent::Malformed {
            raw: raw.to_string(),
        };
    };

    // Legacy integer-count envelope, e.g. {"message3": "5"}
    if let Some(text) = fields.get(LEGACY_COUNT_FIELD).and_then(Value::as_str) {
        if let Some(value) = leading_integer(text) {
            return TelemetryEvent::IntegerSample { value };
        }
    }

    // Generic envelope, e.g. {"message": "26.4 => server echo"}; the
    // trailing annotation after the numeric prefix is ignored.
    if let Some(text) = fields.get(MESSAGE_FIELD).and_then(Value::as_str) {
        if let Some(value) = leading_float(text) {
            return TelemetryEvent::FloatSample { value };
        }
    }

    TelemetryEvent::Malformed {
        raw: raw.to_string(),
    }
}

/// Greedy decimal-number prefix anchored at the start of the string:
/// optional sign, digits, optional fractional part.
fn decimal_prefix(text: &str) -> Option<&str> {
    let mut end = 0;
    let bytes = text.as_bytes();

    if matches!(bytes.first(), Some(&b'+') | Some(&b'-')) {
        end += 1;
    }

    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == digits_start {
        return None;
    }

    // Fractional part only counts if at least one digit follows the dot
    if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
        end += 2;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }

    Some(&text[..end])
}

fn leading_integer(text: &str) -> Option<i64> {
    let prefix = decimal_prefix(text)?;
    let integral = prefix.split('.').next().unwrap_or(prefix);
    integral.parse().ok()
}

fn leading_float(text: &str) -> Option<f64> {
    decimal_prefix(text)?.parse().ok()
}
