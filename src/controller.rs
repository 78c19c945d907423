//! Composition root: owns the bus, the state store, the subscription
//! registry, the manifest, and the dataset cache, and runs the fetch/join
//! flows that drive them.

use crate::bus::{LocalBus, PubSubBus};
use crate::error::{Error, Result};
use crate::geojson::{join_overlay, FeatureCollection};
use crate::manifest::Manifest;
use crate::state::StateStore;
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::Transport;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A dataset request: name plus optional path parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataRequest {
    pub name: String,
    pub params: Vec<String>,
}

impl DataRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Cache key: the name, underscore-joined with any params.
    /// `crime` with params `["all", "ward"]` caches as `crime_all_ward`.
    pub fn cache_key(&self) -> String {
        if self.params.is_empty() {
            self.name.clone()
        } else {
            format!("{}_{}", self.name, self.params.join("_"))
        }
    }
}

/// The application's coordination hub.
///
/// Rendering code never touches the cache or the bus directly: it wires
/// handlers through [`subs`](Controller::subs) and reacts to the milestone
/// keys the controller sets (`dataLoaded.*`, `joinedToGeo.*`).
pub struct Controller {
    bus: Arc<LocalBus>,
    state: Arc<StateStore>,
    subs: SubscriptionRegistry,
    manifest: Manifest,
    transport: Box<dyn Transport>,
    collection: RwLock<HashMap<String, Arc<Value>>>,
}

impl Controller {
    pub fn new(manifest: Manifest, transport: Box<dyn Transport>) -> Self {
        let bus = Arc::new(LocalBus::new());
        let state = Arc::new(StateStore::new(bus.clone() as Arc<dyn PubSubBus>));
        let subs = SubscriptionRegistry::new(bus.clone() as Arc<dyn PubSubBus>);
        Self {
            bus,
            state,
            subs,
            manifest,
            transport,
            collection: RwLock::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> Arc<LocalBus> {
        Arc::clone(&self.bus)
    }

    pub fn state(&self) -> Arc<StateStore> {
        Arc::clone(&self.state)
    }

    pub fn subs(&self) -> &SubscriptionRegistry {
        &self.subs
    }

    /// A cached dataset, if present.
    pub fn dataset(&self, cache_key: &str) -> Option<Arc<Value>> {
        self.collection.read().get(cache_key).cloned()
    }

    /// Fetch a dataset, or return it from cache.
    ///
    /// On a fresh fetch the result is cached and `dataLoaded.<cache key>`
    /// is set to `true`, which broadcasts to any wired handlers. A failed
    /// fetch is logged and returned without touching cache or state, so
    /// the dataset is never marked loaded on error. Concurrent requests for
    /// the same not-yet-cached key each fetch; last write wins.
    pub fn get_data(&self, request: &DataRequest) -> Result<Arc<Value>> {
        let cache_key = request.cache_key();

        if let Some(cached) = self.collection.read().get(&cache_key) {
            debug!(dataset = %cache_key, "cache hit");
            return Ok(Arc::clone(cached));
        }

        let meta = self.manifest.meta(&request.name)?;
        let url = meta.url(&request.name, &request.params);
        info!(dataset = %cache_key, url = %url, "fetching");

        let data = self.transport.fetch(&url).map_err(|e| {
            warn!(dataset = %cache_key, error = %e, "fetch failed");
            e
        })?;

        let data = Arc::new(data);
        self.collection
            .write()
            .insert(cache_key.clone(), Arc::clone(&data));
        self.state.set_state(format!("dataLoaded.{cache_key}"), json!(true));
        Ok(data)
    }

    /// Join a cached overlay onto a cached zone layer.
    ///
    /// Expects `<overlay>_all_<grouping>` and `<active_layer>` to be in the
    /// cache (fetched via [`get_data`](Controller::get_data)). The joined
    /// collection replaces the cached layer, then
    /// `joinedToGeo.<overlay>-<active_layer>` records the join parameters.
    pub fn join_to_geojson(
        &self,
        overlay: &str,
        grouping: &str,
        active_layer: &str,
    ) -> Result<()> {
        let data_key = format!("{overlay}_all_{grouping}");
        let overlay_data = self
            .dataset(&data_key)
            .ok_or_else(|| Error::DatasetNotLoaded(data_key.clone()))?;
        let items = overlay_data
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::MissingField {
                dataset: data_key.clone(),
                field: "items".to_string(),
            })?;

        let layer_data = self
            .dataset(active_layer)
            .ok_or_else(|| Error::DatasetNotLoaded(active_layer.to_string()))?;
        let mut collection: FeatureCollection =
            serde_json::from_value(Value::clone(&layer_data))?;

        let joined = join_overlay(&mut collection, overlay, items);
        debug!(overlay, grouping, active_layer, joined, "overlay joined");

        self.collection.write().insert(
            active_layer.to_string(),
            Arc::new(serde_json::to_value(&collection)?),
        );

        self.state.set_state(
            format!("joinedToGeo.{overlay}-{active_layer}"),
            json!({
                "overlay": overlay,
                "grouping": grouping,
                "activeLayer": active_layer,
            }),
        );
        Ok(())
    }
}
