//! Generation-stamped slab of pending callback registrations.
//!
//! Each registration occupies a slot identified by a [`RegKey`] (index plus
//! generation). Slots are recycled through a free list, and the generation
//! counter makes stale keys harmless: removing an entry that has already
//! been fired or cancelled is a no-op, which is exactly what the
//! fire-versus-cancel race needs.
//!
//! # Design
//!
//! - Entries leave the slab exactly once: through [`remove`](Registry::remove)
//!   (early cancellation) or through [`drain`](Registry::drain) (the soul
//!   resolved). Never both, never neither.
//! - No unsafe code; bounds checks plus generation validation.

/// A key identifying one pending registration in a soul's registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RegKey {
    index: u32,
    generation: u32,
}

impl core::fmt::Debug for RegKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RegKey({}:{})", self.index, self.generation)
    }
}

/// A pending callback awaiting the soul's resolution.
pub(crate) type Entry = Box<dyn FnOnce() + Send>;

enum Slot {
    Occupied { entry: Entry, generation: u32 },
    Vacant { next_free: Option<u32>, generation: u32 },
}

/// Slab of pending registrations with free-list reuse and ABA-safe keys.
pub(crate) struct Registry {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    len: usize,
}

impl Registry {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Number of occupied slots.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a pending entry, reusing a vacant slot if one exists.
    pub(crate) fn insert(&mut self, entry: Entry) -> RegKey {
        self.len += 1;

        if let Some(index) = self.free_head {
            let slot = &mut self.slots[index as usize];
            match slot {
                Slot::Vacant {
                    next_free,
                    generation,
                } => {
                    let generation = *generation;
                    self.free_head = *next_free;
                    *slot = Slot::Occupied { entry, generation };
                    RegKey { index, generation }
                }
                Slot::Occupied { .. } => unreachable!("free list points at occupied slot"),
            }
        } else {
            let index = u32::try_from(self.slots.len()).expect("registry slot count overflow");
            self.slots.push(Slot::Occupied {
                entry,
                generation: 0,
            });
            RegKey {
                index,
                generation: 0,
            }
        }
    }

    /// Removes the entry identified by `key`, returning it if it was still
    /// pending. A stale key (already fired, cancelled, or recycled) yields
    /// `None`.
    pub(crate) fn remove(&mut self, key: RegKey) -> Option<Entry> {
        let slot = self.slots.get_mut(key.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == key.generation => {
                let vacant = Slot::Vacant {
                    next_free: self.free_head,
                    generation: key.generation.wrapping_add(1),
                };
                let Slot::Occupied { entry, .. } = core::mem::replace(slot, vacant) else {
                    unreachable!("slot matched Occupied above");
                };
                self.free_head = Some(key.index);
                self.len -= 1;
                Some(entry)
            }
            _ => None,
        }
    }

    /// Takes every pending entry out of the slab, leaving it empty.
    ///
    /// All keys handed out so far become stale: generations are bumped so
    /// late removals miss.
    pub(crate) fn drain(&mut self) -> Vec<Entry> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut drained = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Slot::Occupied { generation, .. } = slot {
                let vacant = Slot::Vacant {
                    next_free: self.free_head,
                    generation: generation.wrapping_add(1),
                };
                let Slot::Occupied { entry, .. } = core::mem::replace(slot, vacant) else {
                    unreachable!("slot matched Occupied above");
                };
                self.free_head = Some(index as u32);
                drained.push(entry);
            }
        }
        self.len = 0;
        drained
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.len)
            .field("slots", &self.slots.len())
            .finish()
    }
}
