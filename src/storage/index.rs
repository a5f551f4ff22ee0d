//! Index Arena & BST
//!
//! An unbalanced binary search tree over 128-bit ids. Nodes live in index
//! pages allocated from a growing arena; edges are `NodeAddress` values.
//! The tree is never rebalanced and deleted nodes are only tombstoned, so
//! lookups degrade to O(n) on sorted insert order.

use std::cmp::Ordering;

use tracing::debug;
use uuid::Uuid;

use crate::error::{FileDbError, Result};

use super::{Backend, IndexNode, IndexPage, NodeAddress, PageFile, PageId, NODES_PER_PAGE};

impl<S: Backend> PageFile<S> {
    /// The fixed root node location (root page, slot 0)
    pub fn root_address(&self) -> NodeAddress {
        NodeAddress::new(self.header.index_root_page_id, 0)
    }

    /// Node at `addr`
    pub fn node(&mut self, addr: NodeAddress) -> Result<&IndexNode> {
        self.check_page_id(addr.page_id)?;
        self.cache.get_page(&mut self.pager, addr.page_id)?.node(addr.slot)
    }

    /// Node at `addr`, with its page flagged dirty
    pub fn node_mut(&mut self, addr: NodeAddress) -> Result<&mut IndexNode> {
        self.check_page_id(addr.page_id)?;
        self.cache
            .get_page_mut(&mut self.pager, addr.page_id)?
            .node_mut(addr.slot)
    }

    /// Insert `node` under its id
    ///
    /// Fails with `DuplicateIdentifier` on an exact match, tombstoned or not.
    pub fn insert(&mut self, mut node: IndexNode) -> Result<NodeAddress> {
        node.left = None;
        node.right = None;
        let id = node.id;

        let mut current = self.root_address();
        let mut steps = 0u64;
        let max_steps = self.max_chain_hops() * NODES_PER_PAGE as u64;

        loop {
            steps += 1;
            if steps > max_steps {
                return Err(FileDbError::Corrupted(
                    "index tree contains a cycle".to_string(),
                ));
            }

            let (go_left, next) = {
                let parent = self.node(current)?;
                match id.cmp(&parent.id) {
                    Ordering::Equal => return Err(FileDbError::DuplicateIdentifier(id)),
                    Ordering::Less => (true, parent.left),
                    Ordering::Greater => (false, parent.right),
                }
            };

            match next {
                Some(addr) => current = addr,
                None => {
                    let addr = self.allocate_node_slot(node)?;
                    let parent = self.node_mut(current)?;
                    if go_left {
                        parent.left = Some(addr);
                    } else {
                        parent.right = Some(addr);
                    }
                    debug!(%id, page_id = addr.page_id, slot = addr.slot, "inserted index node");
                    return Ok(addr);
                }
            }
        }
    }

    /// Find the node holding `id`, tombstoned or not
    pub fn search(&mut self, id: Uuid) -> Result<Option<NodeAddress>> {
        let mut current = Some(self.root_address());
        let mut steps = 0u64;
        let max_steps = self.max_chain_hops() * NODES_PER_PAGE as u64;

        while let Some(addr) = current {
            steps += 1;
            if steps > max_steps {
                return Err(FileDbError::Corrupted(
                    "index tree contains a cycle".to_string(),
                ));
            }

            let node = self.node(addr)?;
            current = match id.cmp(&node.id) {
                Ordering::Equal => return Ok(Some(addr)),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        Ok(None)
    }

    /// Tombstone the node at `addr`; the tree shape is left untouched
    pub fn mark_deleted(&mut self, addr: NodeAddress) -> Result<()> {
        self.node_mut(addr)?.is_deleted = true;
        Ok(())
    }

    /// Ids of all index pages in allocation order
    pub fn index_page_ids(&mut self) -> Result<Vec<PageId>> {
        let mut ids = Vec::new();
        let mut current = Some(self.header.index_root_page_id);
        let max_hops = self.max_chain_hops();

        while let Some(page_id) = current {
            if ids.len() as u64 >= max_hops {
                return Err(FileDbError::Corrupted(
                    "index page chain contains a cycle".to_string(),
                ));
            }
            self.check_page_id(page_id)?;
            ids.push(page_id);
            current = self.cache.get_page(&mut self.pager, page_id)?.next_page_id;
        }
        Ok(ids)
    }

    /// Every node in page order (not id order), tombstones included
    pub fn all_nodes(&mut self) -> Result<Vec<IndexNode>> {
        let mut nodes = Vec::new();
        for page_id in self.index_page_ids()? {
            let page = self.cache.get_page(&mut self.pager, page_id)?;
            nodes.extend(page.nodes.iter().cloned());
        }
        Ok(nodes)
    }

    /// Live nodes in page order; the tombstoned root is skipped
    pub fn list_nodes(&mut self) -> Result<Vec<IndexNode>> {
        Ok(self
            .all_nodes()?
            .into_iter()
            .filter(|node| !node.is_deleted)
            .collect())
    }

    /// Place `node` in the next free slot of the arena frontier
    ///
    /// A full frontier is chained to a fresh page, which becomes the new
    /// frontier with `node` in slot 0.
    fn allocate_node_slot(&mut self, node: IndexNode) -> Result<NodeAddress> {
        let frontier = self.header.free_index_page_id;
        let is_full = self.cache.get_page(&mut self.pager, frontier)?.is_full();

        if !is_full {
            let page = self.cache.get_page_mut(&mut self.pager, frontier)?;
            let slot = page.nodes.len() as u8;
            page.nodes.push(node);
            return Ok(NodeAddress::new(frontier, slot));
        }

        let new_page_id = self.allocate_page_id()?;
        self.cache
            .get_page_mut(&mut self.pager, frontier)?
            .next_page_id = Some(new_page_id);
        self.cache
            .add_page(&mut self.pager, IndexPage::new(new_page_id, node), true)?;
        self.header.free_index_page_id = new_page_id;
        self.header.dirty = true;

        debug!(page_id = new_page_id, "advanced index arena frontier");
        Ok(NodeAddress::new(new_page_id, 0))
    }
}
