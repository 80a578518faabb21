//! In-process frame tree
//!
//! Buffers the transforms published by the software's input streams (for
//! example the base pose in the world frame, and the static mount of the arm
//! on the base) and answers lookups between any two connected frames.
//!
//! Each frame has at most one parent. Links are either static, valid at all
//! times, or dynamic, holding a history of timestamped samples covering at
//! most `cache_time_s`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    collections::{HashMap, VecDeque},
    sync::RwLock,
};

use log::warn;
use nalgebra::{Isometry3, Translation3};
use util::maths::{clamp, lin_map};

use super::{LookupError, LookupTime, StampedTransform, TransformSource};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A buffer of parent to child transforms forming a tree.
pub struct FrameTree {
    links: RwLock<HashMap<String, FrameLink>>,

    /// Length of the history kept for dynamic links
    cache_time_s: f64,
}

/// The link between a frame and its parent.
#[derive(Debug, Clone)]
struct FrameLink {
    parent: String,
    kind: LinkKind,
}

#[derive(Debug, Clone)]
enum LinkKind {
    Static(Isometry3<f64>),

    /// Samples ordered by increasing time
    Dynamic(VecDeque<(f64, Isometry3<f64>)>),
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur when inserting transforms into the tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("Frame {child:?} already has parent {existing:?}, cannot reparent to {requested:?}")]
    Reparent {
        child: String,
        existing: String,
        requested: String,
    },

    #[error("Linking {child:?} to {parent:?} would create a loop")]
    Loop { parent: String, child: String },

    #[error("Frame {0:?} is static and cannot take timestamped samples (or vice versa)")]
    KindMismatch(String),

    #[error("The transform for {0:?} contains non-finite values")]
    NonFinite(String),

    #[error("The frame tree lock was poisoned")]
    Poisoned,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FrameTree {
    pub fn new(cache_time_s: f64) -> Self {
        Self {
            links: RwLock::new(HashMap::new()),
            cache_time_s,
        }
    }

    /// Set a static link, valid at all times.
    pub fn set_static(
        &self,
        parent: &str,
        child: &str,
        transform: Isometry3<f64>,
    ) -> Result<(), TreeError> {
        self.insert(parent, child, None, transform)
    }

    /// Add a timestamped sample to a dynamic link.
    pub fn set_transform(
        &self,
        parent: &str,
        child: &str,
        stamp_s: f64,
        transform: Isometry3<f64>,
    ) -> Result<(), TreeError> {
        self.insert(parent, child, Some(stamp_s), transform)
    }

    fn insert(
        &self,
        parent: &str,
        child: &str,
        stamp_s: Option<f64>,
        transform: Isometry3<f64>,
    ) -> Result<(), TreeError> {
        if !is_finite(&transform) || stamp_s.map(|s| !s.is_finite()).unwrap_or(false) {
            return Err(TreeError::NonFinite(child.to_string()));
        }

        let mut links = self.links.write().map_err(|_| TreeError::Poisoned)?;

        match links.get_mut(child) {
            Some(link) => {
                if link.parent != parent {
                    return Err(TreeError::Reparent {
                        child: child.to_string(),
                        existing: link.parent.clone(),
                        requested: parent.to_string(),
                    });
                }

                match (&mut link.kind, stamp_s) {
                    (LinkKind::Static(t), None) => *t = transform,
                    (LinkKind::Dynamic(samples), Some(s)) => {
                        insert_sample(samples, s, transform);
                        prune(samples, self.cache_time_s);
                    }
                    _ => return Err(TreeError::KindMismatch(child.to_string())),
                }
            }
            None => {
                // Adding a new link must not close a loop, i.e. the child must not already be an
                // ancestor of the parent.
                if chain_to_root(&links, parent).iter().any(|f| f == child) {
                    return Err(TreeError::Loop {
                        parent: parent.to_string(),
                        child: child.to_string(),
                    });
                }

                let kind = match stamp_s {
                    None => LinkKind::Static(transform),
                    Some(s) => {
                        let mut samples = VecDeque::new();
                        samples.push_back((s, transform));
                        LinkKind::Dynamic(samples)
                    }
                };

                links.insert(
                    child.to_string(),
                    FrameLink {
                        parent: parent.to_string(),
                        kind,
                    },
                );
            }
        }

        Ok(())
    }
}

impl TransformSource for FrameTree {
    fn lookup(
        &self,
        parent: &str,
        child: &str,
        at: LookupTime,
    ) -> Result<StampedTransform, LookupError> {
        let links = match self.links.read() {
            Ok(l) => l,
            Err(_) => {
                warn!("Frame tree lock poisoned");
                return Err(LookupError::UnknownFrame(child.to_string()));
            }
        };

        for frame in &[parent, child] {
            if !is_known(&links, frame) {
                return Err(LookupError::UnknownFrame(frame.to_string()));
            }
        }

        let child_chain = chain_to_root(&links, child);
        let parent_chain = chain_to_root(&links, parent);

        // Find the first common ancestor
        let ancestor = match child_chain.iter().find(|f| parent_chain.contains(f)) {
            Some(a) => a.clone(),
            None => {
                return Err(LookupError::NotConnected(
                    parent.to_string(),
                    child.to_string(),
                ))
            }
        };

        let child_links = links_below(&child_chain, &ancestor);
        let parent_links = links_below(&parent_chain, &ancestor);

        let time_s = match at {
            LookupTime::At(t) => t,
            LookupTime::Latest => latest_common_time(
                child_links
                    .iter()
                    .chain(parent_links.iter())
                    .filter_map(|f| links.get(*f)),
            ),
        };

        let ancestor_from_child = compose_to_ancestor(&links, &child_links, time_s)?;
        let ancestor_from_parent = compose_to_ancestor(&links, &parent_links, time_s)?;

        Ok(StampedTransform {
            parent: parent.to_string(),
            child: child.to_string(),
            stamp_s: time_s,
            transform: ancestor_from_parent.inverse() * ancestor_from_child,
        })
    }
}

impl FrameLink {
    /// Get the transform from this frame into its parent at the given time.
    fn at(&self, time_s: f64) -> Result<Isometry3<f64>, LookupError> {
        let samples = match &self.kind {
            LinkKind::Static(t) => return Ok(*t),
            LinkKind::Dynamic(s) => s,
        };

        let (oldest_s, newest_s) = match (samples.front(), samples.back()) {
            (Some(o), Some(n)) => (o.0, n.0),
            _ => return Err(LookupError::UnknownFrame(self.parent.clone())),
        };

        if time_s < oldest_s {
            return Err(LookupError::ExtrapolationPast {
                requested_s: time_s,
                oldest_s,
                newest_s,
            });
        }
        if time_s > newest_s {
            return Err(LookupError::ExtrapolationFuture {
                requested_s: time_s,
                oldest_s,
                newest_s,
            });
        }

        // Find the pair of samples bracketing the requested time
        let idx = samples
            .iter()
            .position(|(s, _)| *s >= time_s)
            .unwrap_or(samples.len() - 1);

        let (t1, iso1) = samples[idx];
        if idx == 0 || t1 == time_s {
            return Ok(iso1);
        }
        let (t0, iso0) = samples[idx - 1];

        Ok(interpolate(&iso0, &iso1, clamp(lin_map((t0, t1), (0.0, 1.0), time_s), 0.0, 1.0)))
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn is_finite(iso: &Isometry3<f64>) -> bool {
    iso.translation.vector.iter().all(|v| v.is_finite())
        && iso.rotation.coords.iter().all(|v| v.is_finite())
}

/// A frame is known if it is either a child or the parent of some link.
fn is_known(links: &HashMap<String, FrameLink>, frame: &str) -> bool {
    links.contains_key(frame) || links.values().any(|l| l.parent == frame)
}

/// The chain of frames from `frame` (inclusive) up to the root of its tree.
fn chain_to_root(links: &HashMap<String, FrameLink>, frame: &str) -> Vec<String> {
    let mut chain = vec![frame.to_string()];
    let mut current = frame;

    while let Some(link) = links.get(current) {
        // Loops are rejected on insert, the length check only guards the loop itself
        if chain.len() > links.len() {
            break;
        }
        chain.push(link.parent.clone());
        current = &link.parent;
    }

    chain
}

/// The frames of a chain strictly below the given ancestor, each of which has a link to its
/// parent.
fn links_below<'a>(chain: &'a [String], ancestor: &str) -> Vec<&'a str> {
    chain
        .iter()
        .take_while(|f| f.as_str() != ancestor)
        .map(|f| f.as_str())
        .collect()
}

/// The newest time at which all dynamic links are known, or 0 if all links are static.
fn latest_common_time<'a>(links: impl Iterator<Item = &'a FrameLink>) -> f64 {
    links
        .filter_map(|l| match &l.kind {
            LinkKind::Static(_) => None,
            LinkKind::Dynamic(s) => s.back().map(|b| b.0),
        })
        .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.min(t))))
        .unwrap_or(0.0)
}

/// Compose the links of the chain into the transform from the first frame into the ancestor.
fn compose_to_ancestor(
    links: &HashMap<String, FrameLink>,
    chain: &[&str],
    time_s: f64,
) -> Result<Isometry3<f64>, LookupError> {
    let mut acc = Isometry3::identity();

    for frame in chain {
        let link = links
            .get(*frame)
            .ok_or_else(|| LookupError::UnknownFrame(frame.to_string()))?;
        acc = link.at(time_s)? * acc;
    }

    Ok(acc)
}

/// Insert a sample keeping the buffer ordered, replacing any sample with the same stamp.
fn insert_sample(samples: &mut VecDeque<(f64, Isometry3<f64>)>, stamp_s: f64, iso: Isometry3<f64>) {
    match samples.iter().position(|(s, _)| *s >= stamp_s) {
        Some(i) if samples[i].0 == stamp_s => samples[i] = (stamp_s, iso),
        Some(i) => samples.insert(i, (stamp_s, iso)),
        None => samples.push_back((stamp_s, iso)),
    }
}

/// Drop samples older than the cache time relative to the newest sample.
fn prune(samples: &mut VecDeque<(f64, Isometry3<f64>)>, cache_time_s: f64) {
    let newest_s = match samples.back() {
        Some(b) => b.0,
        None => return,
    };

    while samples.len() > 1 {
        match samples.front() {
            Some((s, _)) if *s < newest_s - cache_time_s => {
                samples.pop_front();
            }
            _ => break,
        }
    }
}

fn interpolate(a: &Isometry3<f64>, b: &Isometry3<f64>, alpha: f64) -> Isometry3<f64> {
    let ta = a.translation.vector;
    let tb = b.translation.vector;

    Isometry3::from_parts(
        Translation3::from(ta + (tb - ta) * alpha),
        a.rotation.slerp(&b.rotation, alpha),
    )
}
