pub use crate::byte_view::ByteView;
pub use crate::ds::{FlightGroup, HashRing};
pub use crate::error::{BoxError, GetError, PeerError};
pub use crate::group::{get_group, new_group, Group, Loader};
pub use crate::http::HttpPool;
pub use crate::peers::{PeerGetter, PeerPicker};
pub use crate::store::lru::{ByteSized, ConcurrentLruStore, LruStore, StoreMetrics};
