//! Ambient identity and tenant context.
//!
//! Context is read best-effort from persisted key/value storage. A missing
//! store entry or a malformed blob yields `None` and never an error, so a
//! request without context simply goes out unauthenticated.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;

use crate::StorageKeys;

/// Token, clinic and tenant resolved for one call.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct AuthContext {
    pub token: Option<String>,
    pub clinic_id: Option<String>,
    pub tenant_id: Option<String>,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("clinic_id", &self.clinic_id)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

/// Source of the ambient [`AuthContext`].
pub trait AuthContextProvider: Send + Sync {
    fn resolve(&self) -> AuthContext;
}

/// No ambient context.
impl AuthContextProvider for () {
    fn resolve(&self) -> AuthContext {
        AuthContext::default()
    }
}

/// Fixed context, mostly useful for services and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticContext(pub AuthContext);

impl AuthContextProvider for StaticContext {
    fn resolve(&self) -> AuthContext {
        self.0.clone()
    }
}

impl<P: AuthContextProvider + ?Sized> AuthContextProvider for Arc<P> {
    fn resolve(&self) -> AuthContext {
        (**self).resolve()
    }
}

/// Read access to persisted string values.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
}

/// In-memory [`KeyValueStore`], shareable across clones.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_item(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut items) = self.items.write() {
            items.insert(key.into(), value.into());
        }
    }

    pub fn remove_item(&self, key: &str) {
        if let Ok(mut items) = self.items.write() {
            items.remove(key);
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().ok()?.get(key).cloned()
    }
}

/// Resolves context from a [`KeyValueStore`] using [`StorageKeys`].
#[derive(Clone, Debug)]
pub struct StorageContextProvider<S> {
    store: S,
    keys: StorageKeys,
}

impl<S: KeyValueStore> StorageContextProvider<S> {
    pub fn new(store: S) -> Self {
        Self::with_keys(store, StorageKeys::default())
    }

    pub fn with_keys(store: S, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: KeyValueStore> AuthContextProvider for StorageContextProvider<S> {
    fn resolve(&self) -> AuthContext {
        AuthContext {
            token: get_auth_token(&self.store, &self.keys),
            clinic_id: get_clinic_id(&self.store, &self.keys),
            tenant_id: get_tenant_id(&self.store, &self.keys),
        }
    }
}

/// Bearer token from the clinic auth blob (`state.token`).
pub fn get_auth_token<S: KeyValueStore + ?Sized>(store: &S, keys: &StorageKeys) -> Option<String> {
    let state = read_auth_state(store, &keys.clinic_auth)?;
    identifier(state.get("token"))
}

/// Clinic id from the clinic auth blob (`state.user.clinicId`).
pub fn get_clinic_id<S: KeyValueStore + ?Sized>(store: &S, keys: &StorageKeys) -> Option<String> {
    let state = read_auth_state(store, &keys.clinic_auth)?;
    identifier(state.get("user").and_then(|user| user.get("clinicId")))
}

/// Tenant id: `state.activeTenantId`, then `state.user.tenantId` from the
/// clinic auth blob, then the patient tenant entry.
pub fn get_tenant_id<S: KeyValueStore + ?Sized>(store: &S, keys: &StorageKeys) -> Option<String> {
    read_auth_state(store, &keys.clinic_auth)
        .and_then(|state| {
            identifier(state.get("activeTenantId")).or_else(|| {
                identifier(state.get("user").and_then(|user| user.get("tenantId")))
            })
        })
        .or_else(|| read_patient_tenant(store, &keys.patient_tenant))
}

fn read_auth_state<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<JsonValue> {
    let raw = store.get_item(key)?;
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<JsonValue>(&raw) {
        Ok(mut blob) => blob.get_mut("state").map(JsonValue::take),
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(key, error = %_err, "ignoring malformed auth storage entry");
            None
        }
    }
}

fn read_patient_tenant<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<String> {
    let raw = store.get_item(key)?;
    let trimmed = raw.trim();
    if trimmed.starts_with('"') {
        return match serde_json::from_str::<String>(trimmed) {
            Ok(value) => non_blank(value),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key, error = %_err, "ignoring malformed tenant storage entry");
                None
            }
        };
    }
    non_blank(trimmed.to_owned())
}

fn identifier(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(text) => non_blank(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
