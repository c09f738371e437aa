//! Step protocol spoken by compiled programs on their standard streams.
//!
//! Each output line is tried as a JSON object:
//! - with a truthy `startTime`: a step started
//! - with a truthy `endTime` on stdout: a step finished
//! - with a truthy `endTime` on stderr: a step failed
//!
//! Anything else is a plain log line of the stream it came from. Truthy
//! follows script semantics: `null`, `false`, `0` and `""` are not.

use serde_json::Value;

use crate::event::{StepCode, StepData, StepStart};
use crate::spawn::StreamKind;

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolLine {
  StepStarted(StepStart),
  StepData(StepData),
}

pub fn classify(stream: StreamKind, line: &str) -> ProtocolLine {
  let parsed = serde_json::from_str::<Value>(line)
    .ok()
    .filter(Value::is_object);

  if let Some(mut payload) = parsed {
    if let Some(start_time) = payload.get("startTime").filter(|v| is_truthy(v)).cloned() {
      return ProtocolLine::StepStarted(StepStart {
        start_time,
        inputs: take(&mut payload, "inputs"),
        step_info: take(&mut payload, "info"),
        step_meta: take(&mut payload, "meta"),
      });
    }
    if payload.get("endTime").is_some_and(is_truthy) {
      let code = match stream {
        StreamKind::Stdout => StepCode::Success,
        StreamKind::Stderr => StepCode::Error,
      };
      return ProtocolLine::StepData(StepData::new(code, payload));
    }
  }

  let code = match stream {
    StreamKind::Stdout => StepCode::Log,
    StreamKind::Stderr => StepCode::ErrorLog,
  };
  ProtocolLine::StepData(StepData::new(code, line))
}

fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

fn take(payload: &mut Value, key: &str) -> Value {
  payload
    .as_object_mut()
    .and_then(|obj| obj.remove(key))
    .unwrap_or(Value::Null)
}
