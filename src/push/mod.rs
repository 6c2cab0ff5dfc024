pub mod relay;
pub mod transport;
pub mod vapid;

pub use relay::RelayTransport;
pub use transport::{DeliveryError, PushPayload, PushTransport};
pub use vapid::VapidSigner;
