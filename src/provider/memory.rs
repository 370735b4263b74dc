//! In-memory provider.
//!
//! Keeps objects in a map and records every call, so runs can be exercised
//! and inspected without a cloud account. Provider-assigned values (ids, DNS
//! names, public addresses) are generated deterministically.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ProviderError;

use super::client::CloudProvider;
use super::types::{CreateRequest, Filter, ProviderObject, Query, ResourceKind, UpdateRequest};

/// A call received by [`MemoryCloud`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    /// A describe call.
    Describe(Query),
    /// A create call.
    Create(CreateRequest),
    /// An update call.
    Update(UpdateRequest),
    /// A tag call.
    Tag {
        /// Tagged object.
        id: String,
        /// Tags applied.
        tags: BTreeMap<String, String>,
    },
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, ProviderObject>,
    calls: Vec<ProviderCall>,
    counter: u32,
    // Newly created objects stay invisible to this many describes.
    lookup_lag: u32,
    hidden: BTreeMap<String, u32>,
}

/// In-memory [`CloudProvider`].
#[derive(Debug, Default)]
pub struct MemoryCloud {
    state: Mutex<MemoryState>,
}

impl MemoryCloud {
    /// Creates an empty cloud.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pre-existing object.
    pub async fn seed(&self, object: ProviderObject) {
        let mut state = self.state.lock().await;
        state.objects.insert(object.id.clone(), object);
    }

    /// Makes created objects invisible to the next `describes` matching lookups.
    pub async fn set_lookup_lag(&self, describes: u32) {
        self.state.lock().await.lookup_lag = describes;
    }

    /// Returns every call received so far.
    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().await.calls.clone()
    }

    /// Returns calls other than describes.
    pub async fn mutations(&self) -> Vec<ProviderCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| !matches!(c, ProviderCall::Describe(_)))
            .collect()
    }

    /// Forgets recorded calls.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Returns an object by id.
    pub async fn object(&self, id: &str) -> Option<ProviderObject> {
        self.state.lock().await.objects.get(id).cloned()
    }

    fn matches(object: &ProviderObject, query: &Query) -> bool {
        if object.kind != query.kind {
            return false;
        }
        match &query.filter {
            Filter::Id(id) => &object.id == id,
            Filter::Name(name) => {
                object.tags.get("Name") == Some(name)
                    || (object.kind == ResourceKind::LoadBalancer && &object.id == name)
            }
            Filter::PublicIp(ip) => object.attribute("public_ip").as_ref() == Some(ip),
        }
    }

    fn provider_attributes(kind: ResourceKind, id: &str, serial: u32, spec: &Value) -> Value {
        let mut attributes = spec.clone();
        if !attributes.is_object() {
            attributes = json!({});
        }
        if let Some(map) = attributes.as_object_mut() {
            match kind {
                ResourceKind::LoadBalancer => {
                    map.insert(
                        String::from("dns_name"),
                        json!(format!("{id}-{serial}.elb.memory.internal")),
                    );
                    map.insert(String::from("hosted_zone_id"), json!("ZMEMORY0000"));
                    map.entry("listeners").or_insert_with(|| json!([]));
                }
                ResourceKind::ElasticIp => {
                    map.insert(
                        String::from("public_ip"),
                        json!(format!("203.0.113.{}", serial % 250 + 1)),
                    );
                }
                ResourceKind::Subnet | ResourceKind::SecurityGroup => {}
            }
        }
        attributes
    }
}

#[async_trait]
impl CloudProvider for MemoryCloud {
    async fn describe(&self, query: &Query) -> Result<Vec<ProviderObject>, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::Describe(query.clone()));

        let matching: Vec<ProviderObject> = state
            .objects
            .values()
            .filter(|o| Self::matches(o, query))
            .cloned()
            .collect();

        let mut visible = Vec::with_capacity(matching.len());
        for object in matching {
            match state.hidden.get_mut(&object.id) {
                Some(remaining) if *remaining > 0 => *remaining -= 1,
                _ => visible.push(object),
            }
        }

        debug!("memory describe {query}: {} visible", visible.len());
        Ok(visible)
    }

    async fn create(&self, request: &CreateRequest) -> Result<ProviderObject, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::Create(request.clone()));
        state.counter += 1;
        let serial = state.counter;

        let id = match request.kind {
            ResourceKind::LoadBalancer => request.name.clone(),
            ResourceKind::Subnet => format!("subnet-{serial:08x}"),
            ResourceKind::SecurityGroup => format!("sg-{serial:08x}"),
            ResourceKind::ElasticIp => format!("eipalloc-{serial:08x}"),
        };
        if state.objects.contains_key(&id) {
            return Err(ProviderError::api(
                "DuplicateName",
                format!("{} {id} already exists", request.kind),
            ));
        }

        let object = ProviderObject {
            kind: request.kind,
            id: id.clone(),
            tags: BTreeMap::new(),
            attributes: Self::provider_attributes(request.kind, &id, serial, &request.spec),
        };
        let lag = state.lookup_lag;
        if lag > 0 {
            state.hidden.insert(id.clone(), lag);
        }
        state.objects.insert(id, object.clone());
        Ok(object)
    }

    async fn update(&self, request: &UpdateRequest) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::Update(request.clone()));

        let object = state
            .objects
            .get_mut(&request.id)
            .ok_or_else(|| ProviderError::not_found(format!("{} {}", request.kind, request.id)))?;

        if request.operation.as_str() == "create_listeners" {
            let added = request.spec.get("listeners").and_then(Value::as_array).cloned();
            if let (Some(added), Some(map)) = (added, object.attributes.as_object_mut()) {
                let listeners = map.entry("listeners").or_insert_with(|| json!([]));
                if let Some(existing) = listeners.as_array_mut() {
                    for listener in added {
                        let port = listener.get("lb_port").cloned();
                        existing.retain(|l| l.get("lb_port").cloned() != port);
                        existing.push(listener);
                    }
                }
            }
            Ok(())
        } else {
            Err(ProviderError::api(
                "UnsupportedOperation",
                format!("{} does not support {}", request.kind, request.operation),
            ))
        }
    }

    async fn tag(&self, id: &str, tags: &BTreeMap<String, String>) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::Tag {
            id: id.to_string(),
            tags: tags.clone(),
        });

        let object = state
            .objects
            .get_mut(id)
            .ok_or_else(|| ProviderError::not_found(id.to_string()))?;
        object
            .tags
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}
