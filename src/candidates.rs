//! `Candidates`: the tagged variant used for `opts.needed` / `opts.identities` /
//! `opts.subscriptions`. The source accepts a single address, an ordered sequence,
//! or a tag-keyed map; modeling this as one enum (rather than three overloaded
//! function signatures) lets each decode path pick the lookup strategy the shape
//! affords it.

use std::collections::HashMap;

use crate::address::Address;

/// A set of candidate addresses offered to a decode call.
#[derive(Debug, Clone)]
pub enum Candidates {
    /// A single address. Tag lookups on this are O(1).
    One(Address),
    /// An ordered sequence. Tag lookups scan in order, O(n); trial loops
    /// (msg/broadcast-v4 decode) iterate in this order.
    Many(Vec<Address>),
    /// A tag-keyed map. Tag lookups are O(1); trial loops iterate in whatever
    /// order the map yields (unordered).
    ByTag(HashMap<[u8; 32], Address>),
}

impl Candidates {
    /// Iterates candidates in the order a serial trial loop (msg decode,
    /// broadcast-v4 decode) should attempt them.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Address> + '_> {
        match self {
            Candidates::One(a) => Box::new(std::iter::once(a)),
            Candidates::Many(v) => Box::new(v.iter()),
            Candidates::ByTag(m) => Box::new(m.values()),
        }
    }

    /// Finds the first address with `version >= 4` whose tag equals `tag`,
    /// using the lookup strategy the variant affords (O(1) for `One`/`ByTag`,
    /// O(n) scan for `Many`).
    pub fn find_by_tag(&self, tag: &[u8; 32]) -> Option<&Address> {
        match self {
            Candidates::One(a) => (a.version >= 4 && &a.tag == tag).then_some(a),
            Candidates::Many(v) => v.iter().find(|a| a.version >= 4 && &a.tag == tag),
            Candidates::ByTag(m) => m.get(tag).filter(|a| a.version >= 4),
        }
    }
}

impl From<Address> for Candidates {
    fn from(a: Address) -> Self {
        Candidates::One(a)
    }
}

impl From<Vec<Address>> for Candidates {
    fn from(v: Vec<Address>) -> Self {
        Candidates::Many(v)
    }
}

impl From<HashMap<[u8; 32], Address>> for Candidates {
    fn from(m: HashMap<[u8; 32], Address>) -> Self {
        Candidates::ByTag(m)
    }
}
