//! Form Core (spec §4.9): field registry, data-conflict protection overlays,
//! and the validate/submit pipeline that sit alongside the virtualized list
//! when the rendered items are form fields rather than read-only rows.

mod binding;
mod field;
mod protection;
mod state;
mod submit;
mod validation;

pub use binding::{dedup_emit, FieldBinder};
pub use field::{FieldCategory, FieldHandle, FieldRegistry, FieldValue, ListenerToken};
pub use protection::{BeforeUnloadGuard, OverlaySet, ProtectionConfig, ScopedListener};
pub use state::{has_data_changed, DataSnapshot, FormState, ModifiedTracker};
pub use submit::{FetchTransport, SubmitState, SubmitTransport};
pub use validation::{RuleOutcome, ValidationRule, Validator};

use std::cell::RefCell;
use std::rc::Rc;

use crate::event_bus::EventBus;

/// Configuration for a [`Form`].
pub struct FormConfig {
    /// Data-conflict and `beforeunload` protection.
    pub protect_changes: ProtectionConfig,
    /// Ordered validation rules, if any.
    pub rules: Vec<ValidationRule>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            protect_changes: ProtectionConfig::default(),
            rules: Vec::new(),
        }
    }
}

/// The Form Core facade: composes [`FieldRegistry`], [`ModifiedTracker`],
/// [`Validator`], [`FieldBinder`] and the submit pipeline into the one object
/// a host component owns (spec §4.9's enhancer, generalized the same way
/// `Collection` composes range tracking and placeholder synthesis for the
/// list side).
pub struct Form {
    registry: FieldRegistry,
    tracker: Rc<RefCell<ModifiedTracker>>,
    validator: Option<Validator>,
    binder: Option<FieldBinder>,
    submit_state: SubmitState,
    events: EventBus,
    overlays: Option<OverlaySet>,
    before_unload: Option<BeforeUnloadGuard>,
    protect: ProtectionConfig,
}

impl Form {
    /// Construct a form over `registry`'s fields, starting from `initial`
    /// data. Does not yet bind DOM listeners or mount overlays; call
    /// [`Form::bind`] once the host component has a live `Window`/`Document`.
    pub fn new(registry: FieldRegistry, initial: DataSnapshot, config: FormConfig, events: EventBus) -> Self {
        let tracker = Rc::new(RefCell::new(ModifiedTracker::new(initial, events.clone())));
        let validator = if config.rules.is_empty() { None } else { Some(Validator::new(config.rules)) };
        Self {
            registry,
            tracker,
            validator,
            binder: None,
            submit_state: SubmitState::default(),
            events,
            overlays: None,
            before_unload: None,
            protect: config.protect_changes,
        }
    }

    /// Bind `input`/`change` listeners on every registered field (spec
    /// §4.9 bullet 2). Idempotent only in the sense that calling it twice
    /// double-binds; callers own calling this exactly once per mount.
    pub fn bind(&mut self, now: Rc<dyn Fn() -> f64>) {
        self.binder = Some(FieldBinder::bind(&self.registry, self.tracker.clone(), self.events.clone(), now));
    }

    /// Read-only access to the field registry, e.g. for protection-overlay
    /// geometry or host-level introspection.
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Whether the form currently differs from its last snapshot.
    pub fn modified(&self) -> bool {
        self.tracker.borrow().modified()
    }

    /// Current validation errors, keyed by field.
    pub fn errors(&self) -> std::collections::HashMap<String, String> {
        self.tracker.borrow().errors().clone()
    }

    /// Mount the four data-conflict overlays around `form_element`, if
    /// `protectChanges.onDataOverwrite` is enabled and the form is currently
    /// dirty (spec §4.9: overlays exist "when ... enabled AND the form is
    /// dirty"). A no-op if already mounted or not applicable.
    pub fn sync_overlays(&mut self, document: web_sys::Document, window: web_sys::Window, form_element: web_sys::Element) {
        let should_show = self.protect.on_data_overwrite && self.modified();
        match (should_show, self.overlays.take()) {
            (true, Some(existing)) => self.overlays = Some(existing),
            (true, None) => {
                self.overlays = Some(OverlaySet::mount(document, window, form_element, self.events.clone(), self.tracker.clone()));
            }
            (false, Some(existing)) => existing.unmount(),
            (false, None) => {}
        }
    }

    /// Attach or release the `beforeunload` guard to match
    /// `protectChanges.beforeUnload` and the current dirty state (spec §4.9:
    /// "active ... AND dirty").
    pub fn sync_before_unload(&mut self, window: web_sys::Window) {
        let should_guard = self.protect.before_unload && self.modified();
        match (should_guard, self.before_unload.is_some()) {
            (true, false) => self.before_unload = Some(BeforeUnloadGuard::attach(window)),
            (false, true) => self.before_unload = None,
            _ => {}
        }
    }

    /// Run `submit()` (spec §4.9): single-flight, validates unless
    /// `skip_validation`, disables controls for the duration, snapshots on
    /// success.
    pub async fn submit(&self, transport: &dyn SubmitTransport, skip_validation: bool, now: f64) -> Result<(), String> {
        submit::submit(
            &self.submit_state,
            &self.registry,
            &self.tracker,
            self.validator.as_ref(),
            skip_validation,
            &self.events,
            transport,
            now,
        )
        .await
    }

    /// Tear the form down: unbind listeners, drop overlays and the
    /// `beforeunload` guard, clear the event bus (spec §5: "A destroyed list
    /// MUST ... clear all listeners").
    pub fn destroy(mut self) {
        if let Some(binder) = self.binder.take() {
            binder.unbind();
        }
        self.overlays.take();
        self.before_unload.take();
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_starts_pristine_and_tracks_modification() {
        let registry = FieldRegistry::default();
        let mut initial = DataSnapshot::new();
        initial.insert("username".into(), FieldValue::Text("jane".into()));
        let events = EventBus::new();
        let form = Form::new(registry, initial, FormConfig::default(), events);
        assert!(!form.modified());
        assert!(form.errors().is_empty());
    }
}
