//! Static-fanout inode index. Dense inode numbers addressed by a multi-way
//! tree that grows a new root when full; grounded on `vfs.c`'s
//! `btree_node`/`btree_new`/`btree_get_index`/`btree_set_leaf`, reshaped
//! into an enum of leaf/internal node kinds instead of a uniformly-typed
//! `void *` child array.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::inode::RamInode;

enum Node {
    Leaf {
        used: usize,
        slots: Vec<Option<RamInode>>,
    },
    Internal {
        used: usize,
        level: usize,
        children: Vec<Option<Box<Node>>>,
    },
}

impl Node {
    fn new_empty(level: usize, fanout: usize) -> Node {
        if level == 0 {
            Node::Leaf {
                used: 0,
                slots: (0..fanout).map(|_| None).collect(),
            }
        } else {
            Node::Internal {
                used: 0,
                level,
                children: (0..fanout).map(|_| None).collect(),
            }
        }
    }

    fn level(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Internal { level, .. } => *level,
        }
    }

    fn used(&self) -> usize {
        match self {
            Node::Leaf { used, .. } => *used,
            Node::Internal { used, .. } => *used,
        }
    }

    fn capacity(&self, fanout: usize) -> usize {
        fanout.pow((self.level() + 1) as u32)
    }

    fn is_full(&self, fanout: usize) -> bool {
        self.used() >= self.capacity(fanout)
    }

    /// Finds the lowest-numbered free leaf slot and writes `record` there.
    /// Returns the slot's index local to this subtree, or hands `record`
    /// back unharmed if this subtree is full.
    fn insert(&mut self, fanout: usize, record: RamInode) -> Result<usize, RamInode> {
        match self {
            Node::Leaf { used, slots } => match slots.iter().position(|s| s.is_none()) {
                Some(idx) => {
                    slots[idx] = Some(record);
                    *used += 1;
                    Ok(idx)
                }
                None => Err(record),
            },
            Node::Internal { used, level, children } => {
                let child_cap = fanout.pow(*level as u32);
                let mut target = None;
                for (i, child) in children.iter_mut().enumerate() {
                    if child.is_none() {
                        *child = Some(Box::new(Node::new_empty(*level - 1, fanout)));
                    }
                    if !child.as_ref().unwrap().is_full(fanout) {
                        target = Some(i);
                        break;
                    }
                }
                let Some(i) = target else { return Err(record) };
                match children[i].as_mut().unwrap().insert(fanout, record) {
                    Ok(local) => {
                        *used += 1;
                        Ok(i * child_cap + local)
                    }
                    Err(record) => Err(record),
                }
            }
        }
    }

    fn lookup(&self, fanout: usize, index: usize) -> Option<&RamInode> {
        match self {
            Node::Leaf { slots, .. } => slots.get(index).and_then(|s| s.as_ref()),
            Node::Internal { level, children, .. } => {
                let child_cap = fanout.pow(*level as u32);
                let (i, rem) = (index / child_cap, index % child_cap);
                children.get(i)?.as_ref()?.lookup(fanout, rem)
            }
        }
    }

    fn lookup_mut(&mut self, fanout: usize, index: usize) -> Option<&mut RamInode> {
        match self {
            Node::Leaf { slots, .. } => slots.get_mut(index).and_then(|s| s.as_mut()),
            Node::Internal { level, children, .. } => {
                let child_cap = fanout.pow(*level as u32);
                let (i, rem) = (index / child_cap, index % child_cap);
                children.get_mut(i)?.as_mut()?.lookup_mut(fanout, rem)
            }
        }
    }

    /// Removes the leaf at `index`, if present. Never collapses interior
    /// nodes back down (spec.md's `free_leaf` open question, resolved here
    /// as "never shrink, only the root may grow" to keep issued inode
    /// numbers stable for the mount's lifetime).
    fn free(&mut self, fanout: usize, index: usize) -> Option<RamInode> {
        match self {
            Node::Leaf { used, slots } => {
                let removed = slots.get_mut(index)?.take();
                if removed.is_some() {
                    *used -= 1;
                }
                removed
            }
            Node::Internal { used, level, children } => {
                let child_cap = fanout.pow(*level as u32);
                let (i, rem) = (index / child_cap, index % child_cap);
                let removed = children.get_mut(i)?.as_mut()?.free(fanout, rem);
                if removed.is_some() {
                    *used -= 1;
                }
                removed
            }
        }
    }
}

/// Dense inode-number index. Grows monotonically; an index, once issued,
/// is stable for the mount's lifetime even across `free`.
pub struct BTree {
    fanout: usize,
    root: Box<Node>,
}

impl BTree {
    pub fn new(fanout: usize) -> Self {
        assert!(fanout > 1, "fanout must allow growth");
        BTree {
            fanout,
            root: Box::new(Node::new_empty(0, fanout)),
        }
    }

    pub fn lookup(&self, index: u32) -> Option<&RamInode> {
        if (index as usize) >= self.root.capacity(self.fanout) {
            return None;
        }
        self.root.lookup(self.fanout, index as usize)
    }

    pub fn lookup_mut(&mut self, index: u32) -> Option<&mut RamInode> {
        if (index as usize) >= self.root.capacity(self.fanout) {
            return None;
        }
        self.root.lookup_mut(self.fanout, index as usize)
    }

    /// Inserts `record` at the lowest-numbered free slot, growing the tree
    /// if every leaf is occupied. Returns the assigned index.
    pub fn insert(&mut self, record: RamInode) -> u32 {
        let mut record = record;
        loop {
            match self.root.insert(self.fanout, record) {
                Ok(idx) => return idx as u32,
                Err(given_back) => {
                    record = given_back;
                    self.grow();
                }
            }
        }
    }

    pub fn free(&mut self, index: u32) -> Option<RamInode> {
        if (index as usize) >= self.root.capacity(self.fanout) {
            return None;
        }
        self.root.free(self.fanout, index as usize)
    }

    fn grow(&mut self) {
        let fanout = self.fanout;
        let placeholder = Box::new(Node::new_empty(0, fanout));
        let old_root = core::mem::replace(&mut self.root, placeholder);
        let old_level = old_root.level();
        let old_used = old_root.used();
        let mut children: Vec<Option<Box<Node>>> = (0..fanout).map(|_| None).collect();
        children[0] = Some(old_root);
        self.root = Box::new(Node::Internal {
            used: old_used,
            level: old_level + 1,
            children,
        });
    }
}
