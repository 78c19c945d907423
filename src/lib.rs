//! # dashstate
//!
//! Coordination core for a data-dashboard application: an observable
//! key-value state store and a duplicate-checked subscription registry,
//! composed by a controller that fetches, caches, and joins datasets.
//!
//! ## Core Concepts
//!
//! - **StateStore**: current + previous value per key, synchronous change
//!   broadcast on the key's own topic
//! - **SubscriptionRegistry**: at most one live subscription per
//!   (topic, handler key) pair, cancellable without bus tokens
//! - **Controller**: fetches manifest-described datasets, joins tabular
//!   overlays onto GeoJSON zones, and records milestones in the store
//!
//! ## Example
//!
//! ```ignore
//! use dashstate::{Controller, DataRequest, HttpTransport, Manifest, Subscriber, Topic};
//!
//! let controller = Controller::new(manifest, Box::new(transport));
//!
//! // React when the crime dataset lands
//! controller.subs().set_subs([(
//!     Topic::new("dataLoaded.crime"),
//!     Subscriber::new("render-crime", |_topic, _payload| { /* redraw */ }),
//! )])?;
//!
//! controller.get_data(&DataRequest::new("crime"))?;
//! ```

pub mod bus;
pub mod controller;
pub mod error;
pub mod geojson;
pub mod manifest;
pub mod state;
pub mod subscriptions;
pub mod transport;
pub mod types;

// Re-exports
pub use bus::{BusToken, LocalBus, PubSubBus};
pub use controller::{Controller, DataRequest};
pub use error::{Error, Result};
pub use geojson::{convert_to_geojson, join_overlay, Feature, FeatureCollection};
pub use manifest::{DataMeta, Manifest, SourceFormat, SourcePattern};
pub use state::{StateEntry, StateStore};
pub use subscriptions::SubscriptionRegistry;
pub use transport::{HttpTransport, Transport};
pub use types::{Callback, HandlerKey, Subscriber, Topic, CLEARED_TOPIC};
