use std::sync::{Arc, Mutex, MutexGuard};

use slotmap::{SlotMap, new_key_type};
use tiles::Tile;

new_key_type! {
    /// Handle to a tile registered with a window. Many cells may share one.
    pub struct TileId;
}

#[derive(Default)]
pub(crate) struct TileRegistry {
    tiles: Mutex<SlotMap<TileId, Arc<dyn Tile>>>,
}

impl TileRegistry {
    pub(crate) fn insert(&self, tile: Arc<dyn Tile>) -> TileId {
        self.lock_tiles().insert(tile)
    }

    pub(crate) fn get(&self, id: TileId) -> Option<Arc<dyn Tile>> {
        self.lock_tiles().get(id).cloned()
    }

    /// Cells already showing the tile keep their reference.
    pub(crate) fn remove(&self, id: TileId) -> bool {
        self.lock_tiles().remove(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock_tiles().len()
    }

    fn lock_tiles(&self) -> MutexGuard<'_, SlotMap<TileId, Arc<dyn Tile>>> {
        self.tiles
            .lock()
            .unwrap_or_else(|_| panic!("tile registry lock poisoned"))
    }
}
