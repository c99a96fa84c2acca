//! Product-lifecycle event delivery.
//!
//! Event types and payloads, the transactional outbox publisher, a thin
//! stream-bus client over Redis streams, and the relay that drains the
//! outbox onto the bus. The outbox is the sole writer to the bus: no
//! component publishes stream entries directly.

pub mod error;
pub mod publisher;
pub mod relay;
pub mod stream;
pub mod types;

pub use error::{EventError, Result};
pub use publisher::{publish_new_product_detected, publish_product_created};
pub use relay::{Relay, RelayConfig};
pub use stream::{StreamBus, StreamMessage};
pub use types::{
    is_product_detection_event, EventEnvelope, EventMetadata, NewProductDetectedPayload, Price,
    ProductCreatedPayload, EVENT_NEW_PRODUCT_DETECTED, EVENT_PRODUCT_CREATED,
    EVENT_PRODUCT_DETECTED_V1, EVENT_PRODUCT_VALIDATED,
};
