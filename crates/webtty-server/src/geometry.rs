//! Shared slot holding the most recently reported terminal geometry.
//!
//! The browser posts its size to `/size` before opening `/ws`; the next
//! session to spawn reads whatever value is current. Last writer wins.

use tokio::sync::RwLock;
use tracing::debug;
use webtty_core::Geometry;

#[derive(Debug, Default)]
pub struct GeometryChannel {
    current: RwLock<Geometry>,
}

impl GeometryChannel {
    pub async fn set(&self, geometry: Geometry) {
        *self.current.write().await = geometry;
        debug!(cols = geometry.cols, rows = geometry.rows, "geometry updated");
    }

    pub async fn current(&self) -> Geometry {
        *self.current.read().await
    }
}
