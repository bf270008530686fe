//! Single-flight submit pipeline (spec §4.9 last bullets, §7 "Submission
//! errors").
//!
//! The transport itself is abstracted behind [`SubmitTransport`] so tests can
//! supply a fake; [`FetchTransport`] is the default, built on `gloo-net`
//! exactly the way this corpus's other browser-facing HTTP calls are (compare
//! `examples/patrickulrich-nostr.blue/src/stores/cashu_ws.rs`'s
//! `gloo_net::http::Request::get(...).send().await`).

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::event_bus::{Event, EventBus};
use crate::form::field::{FieldRegistry, FieldValue};
use crate::form::state::{DataSnapshot, ModifiedTracker};
use crate::form::validation::Validator;

impl FieldValue {
    /// Encode a [`FieldValue`] as JSON, for submit bodies.
    pub fn to_json(&self) -> Json {
        match self {
            FieldValue::Null => Json::Null,
            FieldValue::Bool(b) => Json::Bool(*b),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null),
            FieldValue::Text(s) => Json::String(s.clone()),
            FieldValue::List(items) => Json::Array(items.iter().map(FieldValue::to_json).collect()),
        }
    }
}

fn snapshot_to_json(data: &DataSnapshot) -> Json {
    let map: serde_json::Map<String, Json> = data.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
    Json::Object(map)
}

/// Abstracts the network call `submit()` awaits, so user-supplied submit
/// handlers and the default `fetch`-based transport share one call shape
/// (spec §4.9: "awaits either a user-supplied handler or
/// `fetch(action, {...})`").
#[async_trait(?Send)]
pub trait SubmitTransport {
    /// Send `data`, returning an error message on failure (spec §7: HTTP
    /// non-2xx or handler rejection both collapse to this).
    async fn send(&self, data: &DataSnapshot) -> Result<(), String>;
}

/// The default transport: `fetch(action, {method, headers, body:
/// JSON.stringify(data)})` (spec §4.9), built on `gloo-net`.
pub struct FetchTransport {
    /// Request URL.
    pub action: String,
    /// HTTP method (`"POST"`, `"PUT"`, ...).
    pub method: String,
    /// Additional request headers.
    pub headers: Vec<(String, String)>,
}

#[async_trait(?Send)]
impl SubmitTransport for FetchTransport {
    async fn send(&self, data: &DataSnapshot) -> Result<(), String> {
        let body = snapshot_to_json(data);
        let mut builder = match self.method.to_ascii_uppercase().as_str() {
            "GET" => gloo_net::http::Request::get(&self.action),
            "PUT" => gloo_net::http::Request::put(&self.action),
            "PATCH" => gloo_net::http::Request::patch(&self.action),
            "DELETE" => gloo_net::http::Request::delete(&self.action),
            _ => gloo_net::http::Request::post(&self.action),
        };
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let request = builder.json(&body).map_err(|e| e.to_string())?;
        let response = request.send().await.map_err(|e| e.to_string())?;

        if response.ok() {
            return Ok(());
        }

        // "on HTTP failure extracts an error message from the JSON body's
        // `error` field if present" (spec §4.9).
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Json>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(Json::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Err(message)
    }
}

/// `state.submitting` (spec §4.9): guards the pipeline so a second `submit()`
/// call while one is already in flight is rejected rather than racing it.
#[derive(Default)]
pub struct SubmitState {
    submitting: Cell<bool>,
}

impl SubmitState {
    /// Whether a submit is currently in flight.
    pub fn is_submitting(&self) -> bool {
        self.submitting.get()
    }
}

impl std::fmt::Debug for SubmitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitState").field("submitting", &self.submitting.get()).finish()
    }
}

/// `submit()` (spec §4.9): single-flight, validates unless disabled,
/// disables/re-enables controls around the transport call, snapshots on
/// success, re-throws on failure.
pub async fn submit(
    state: &SubmitState,
    registry: &FieldRegistry,
    tracker: &Rc<std::cell::RefCell<ModifiedTracker>>,
    validator: Option<&Validator>,
    skip_validation: bool,
    events: &EventBus,
    transport: &dyn SubmitTransport,
    now: f64,
) -> Result<(), String> {
    if state.submitting.get() {
        return Err("a submission is already in progress".to_string());
    }

    if !skip_validation {
        if let Some(validator) = validator {
            let data = tracker.borrow().current().clone();
            let errors = validator.validate_and_emit(&data, events, now);
            if !errors.is_empty() {
                let mut tracker = tracker.borrow_mut();
                for (field, message) in &errors {
                    tracker.set_error(field, Some(message.clone()));
                }
                return Err("validation failed".to_string());
            }
        }
    }

    state.submitting.set(true);
    registry.set_all_enabled(false);
    events.emit(Event::Submit, None, now);

    let data = tracker.borrow().current().clone();
    let result = transport.send(&data).await;

    state.submitting.set(false);
    registry.set_all_enabled(true);

    match result {
        Ok(()) => {
            tracker.borrow_mut().snapshot(now);
            events.emit(Event::SubmitSuccess, None, now);
            Ok(())
        }
        Err(message) => {
            events.emit(Event::SubmitError { message: message.clone() }, None, now);
            Err(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeTransport {
        result: Result<(), String>,
    }

    #[async_trait(?Send)]
    impl SubmitTransport for FakeTransport {
        async fn send(&self, _data: &DataSnapshot) -> Result<(), String> {
            self.result.clone()
        }
    }

    fn registry() -> FieldRegistry {
        FieldRegistry::default()
    }

    #[test]
    fn field_value_to_json_round_trips_primitives() {
        assert_eq!(FieldValue::Text("x".into()).to_json(), Json::String("x".into()));
        assert_eq!(FieldValue::Bool(true).to_json(), Json::Bool(true));
        assert_eq!(FieldValue::Null.to_json(), Json::Null);
    }

    #[test]
    fn successful_submit_snapshots_and_emits_success() {
        futures::executor::block_on(async {
            let mut initial = DataSnapshot::new();
            initial.insert("username".into(), FieldValue::Text("jane".into()));
            let events = EventBus::new();
            let tracker = Rc::new(RefCell::new(ModifiedTracker::new(initial, events.clone())));
            tracker.borrow_mut().set_field_value("username", FieldValue::Text("janet".into()), 0.0);
            assert!(tracker.borrow().modified());

            let state = SubmitState::default();
            let transport = FakeTransport { result: Ok(()) };
            let registry = registry();
            let result = submit(&state, &registry, &tracker, None, true, &events, &transport, 1.0).await;

            assert!(result.is_ok());
            assert!(!tracker.borrow().modified());
            assert!(!state.is_submitting());
        });
    }

    #[test]
    fn failed_submit_reenables_and_propagates_message() {
        futures::executor::block_on(async {
            let initial = DataSnapshot::new();
            let events = EventBus::new();
            let tracker = Rc::new(RefCell::new(ModifiedTracker::new(initial, events.clone())));
            let state = SubmitState::default();
            let transport = FakeTransport { result: Err("boom".to_string()) };
            let registry = registry();

            let result = submit(&state, &registry, &tracker, None, true, &events, &transport, 0.0).await;
            assert_eq!(result, Err("boom".to_string()));
            assert!(!state.is_submitting());
        });
    }

    #[test]
    fn concurrent_submit_is_rejected_single_flight() {
        let state = SubmitState::default();
        state.submitting.set(true);
        assert!(state.is_submitting());
    }
}
