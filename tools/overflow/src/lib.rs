//! Recovery from linker memory region overflow.
//!
//! When a firmware image doesn't fit, the linker names the region that
//! overflowed and by how much. This crate turns that report into a bigger
//! region: it finds the device-tree node behind the region, grows it to the
//! next page boundary past the overflow, and asks for another build with an
//! overlay carrying the new sizes. That repeats until the image links or
//! growing stops helping.
//!
//! Nothing here runs a build. Callers provide that through [`Rebuild`].

use std::collections::{btree_map, BTreeMap, BTreeSet};

pub mod diag;
pub mod dts;
pub mod overlay;

pub use dts::{ResolveError, ResolvedNode};

/// Regions are grown in whole multiples of this many bytes.
pub const SIZE_GRANULE: u64 = 4096;

/// Default bound on rebuilds in one recovery session.
pub const DEFAULT_MAX_ATTEMPTS: usize = 32;

/// Size increase needed to cover an overflow of `overflow` bytes, or `None`
/// if that isn't representable.
pub fn size_increase(overflow: u64) -> Option<u64> {
    overflow.div_ceil(SIZE_GRANULE).checked_mul(SIZE_GRANULE)
}

/// A single "region overflowed" diagnostic.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OverflowReport {
    /// Region name as the linker spelled it.
    pub region: String,
    pub bytes: u64,
}

/// A memory region we may be resizing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    /// Name used by the linker, e.g. `RAM`.
    pub logical_name: String,
    /// Label of the device-tree node backing it, e.g. `sram0`.
    pub node_name: String,
    /// Base address cell, exactly as the device tree spells it.
    pub base: String,
    /// Size declared by the unmodified device tree.
    pub original_size: u64,
    /// Size we will ask for in the next build. Never shrinks.
    pub current_size: u64,
}

impl MemoryRegion {
    pub fn from_node(logical_name: &str, node: ResolvedNode) -> Self {
        Self {
            logical_name: logical_name.to_string(),
            node_name: node.node,
            base: node.base,
            original_size: node.size,
            current_size: node.size,
        }
    }

    /// Grows the region to cover an overflow and returns the increment.
    ///
    /// Leaves the region alone and returns `None` if the new size would not
    /// fit in a `u64`.
    fn grow(&mut self, overflow: u64) -> Option<u64> {
        let increment = size_increase(overflow)?;
        self.current_size = self.current_size.checked_add(increment)?;
        Some(increment)
    }
}

/// Result of one invocation of the build.
#[derive(Clone, Debug)]
pub struct BuildAttempt {
    pub succeeded: bool,
    pub raw_output: String,
    pub overflow_reports: Vec<OverflowReport>,
}

impl BuildAttempt {
    pub fn new(succeeded: bool, raw_output: String) -> Self {
        let overflow_reports = diag::overflow_reports(&raw_output);
        Self {
            succeeded,
            raw_output,
            overflow_reports,
        }
    }
}

/// Why recovery gave up on a failed build.
#[derive(Debug, thiserror::Error)]
pub enum Stop {
    #[error("DTS file is not present")]
    MissingDeviceTree,
    #[error("arch not supported")]
    ArchUnsupported,
    #[error("size is not the issue")]
    NotMemory,
    #[error("resizing didn't change any value in linker output")]
    NoProgress {
        reports: Vec<OverflowReport>,
    },
    #[error("can't resize region {region}: {source}")]
    Unresolved {
        region: String,
        #[source]
        source: ResolveError,
    },
    #[error("can't grow region {region} by {bytes} bytes")]
    TooLarge {
        region: String,
        bytes: u64,
    },
    #[error("still overflowing after {attempts} rebuilds")]
    AttemptLimit {
        attempts: usize,
    },
}

/// The distinct `(region, bytes)` pairs reported by one attempt.
pub type Signature = BTreeSet<OverflowReport>;

pub fn signature(reports: &[OverflowReport]) -> Signature {
    reports.iter().cloned().collect()
}

/// Largest overflow per region. A region reported twice grows once.
fn largest_per_region(reports: &[OverflowReport]) -> BTreeMap<&str, u64> {
    let mut largest = BTreeMap::new();
    for r in reports {
        let bytes = largest.entry(r.region.as_str()).or_insert(0);
        *bytes = u64::max(*bytes, r.bytes);
    }
    largest
}

/// One region enlarged by a recovery step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Growth {
    pub logical_name: String,
    pub node_name: String,
    pub base: String,
    pub new_size: u64,
    pub increment: u64,
}

/// Running state of the fixed-point loop for one build.
#[derive(Clone, Debug)]
pub struct RetrySession {
    regions: BTreeMap<String, MemoryRegion>,
    /// Every signature we have already grown for. Seeing one again means
    /// growing didn't move the linker, whether that took one step or a cycle.
    history: BTreeSet<Signature>,
    attempt_count: usize,
    max_attempts: Option<usize>,
}

impl RetrySession {
    pub fn new(max_attempts: Option<usize>) -> Self {
        Self {
            regions: BTreeMap::new(),
            history: BTreeSet::new(),
            attempt_count: 0,
            max_attempts,
        }
    }

    pub fn regions(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions.values()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempt_count
    }

    /// Looks at a failed attempt and grows every region it reports.
    ///
    /// `resolve` maps a linker region name to its node in the unmodified
    /// device tree. It is called once per region over the whole session; after
    /// that the base stays fixed and only the tracked size changes.
    ///
    /// On `Ok`, the caller should rebuild with [`Self::regions`] applied.
    pub fn plan(
        &mut self,
        attempt: &BuildAttempt,
        mut resolve: impl FnMut(&str) -> Result<ResolvedNode, ResolveError>,
    ) -> Result<Vec<Growth>, Stop> {
        if diag::arch_unsupported(&attempt.raw_output) {
            return Err(Stop::ArchUnsupported);
        }
        if attempt.overflow_reports.is_empty() {
            return Err(Stop::NotMemory);
        }

        let sig = signature(&attempt.overflow_reports);
        if self.history.contains(&sig) {
            return Err(Stop::NoProgress {
                reports: attempt.overflow_reports.clone(),
            });
        }
        if let Some(max) = self.max_attempts {
            if self.attempt_count >= max {
                return Err(Stop::AttemptLimit { attempts: self.attempt_count });
            }
        }

        let mut growths = vec![];
        for (region, bytes) in largest_per_region(&attempt.overflow_reports) {
            let tracked = match self.regions.entry(region.to_string()) {
                btree_map::Entry::Occupied(e) => e.into_mut(),
                btree_map::Entry::Vacant(v) => {
                    let node = resolve(region).map_err(|source| Stop::Unresolved {
                        region: region.to_string(),
                        source,
                    })?;
                    v.insert(MemoryRegion::from_node(region, node))
                }
            };
            let Some(increment) = tracked.grow(bytes) else {
                return Err(Stop::TooLarge { region: region.to_string(), bytes });
            };
            growths.push(Growth {
                logical_name: tracked.logical_name.clone(),
                node_name: tracked.node_name.clone(),
                base: tracked.base.clone(),
                new_size: tracked.current_size,
                increment,
            });
        }

        self.history.insert(sig);
        self.attempt_count += 1;
        Ok(growths)
    }
}

/// What the recovery loop needs from whoever runs builds.
pub trait Rebuild {
    type Error;

    /// Locates the node behind a linker region name in the device tree as it
    /// was before any resizing.
    fn resolve(&mut self, region: &str) -> Result<ResolvedNode, ResolveError>;

    /// Builds again with one overlay describing all `regions` at their
    /// current sizes.
    fn rebuild(&mut self, regions: &[MemoryRegion]) -> Result<BuildAttempt, Self::Error>;

    /// Called for each region enlarged before a rebuild.
    fn extending(&mut self, _growth: &Growth) {}
}

#[derive(Debug)]
pub enum RecoveryOutcome {
    Recovered,
    Stopped(Stop),
}

#[derive(Debug)]
pub struct Recovery {
    pub outcome: RecoveryOutcome,
    /// Regions at the sizes used by the last rebuild.
    pub regions: Vec<MemoryRegion>,
    pub rebuilds: usize,
    /// The final attempt, which is the original failure if we never rebuilt.
    pub last: BuildAttempt,
}

impl Recovery {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RecoveryOutcome::Recovered)
    }

    /// Whether any build ran with enlarged memory.
    pub fn memory_extended(&self) -> bool {
        self.rebuilds > 0
    }
}

/// Drives a failed build to success by growing overflowing regions, or to a
/// [`Stop`].
///
/// Only errors from `host` itself are returned as `Err`; every reason to give
/// up is reported in the [`Recovery`].
pub fn recover<H: Rebuild>(
    host: &mut H,
    failed: BuildAttempt,
    max_attempts: Option<usize>,
) -> Result<Recovery, H::Error> {
    let mut session = RetrySession::new(max_attempts);
    let mut attempt = failed;
    let mut rebuilds = 0;

    let outcome = loop {
        if attempt.succeeded {
            break RecoveryOutcome::Recovered;
        }
        let growths = match session.plan(&attempt, |region| host.resolve(region)) {
            Ok(g) => g,
            Err(stop) => break RecoveryOutcome::Stopped(stop),
        };
        for g in &growths {
            host.extending(g);
        }

        let regions = session.regions().cloned().collect::<Vec<_>>();
        attempt = host.rebuild(&regions)?;
        rebuilds += 1;
    };

    Ok(Recovery {
        outcome,
        regions: session.regions().cloned().collect(),
        rebuilds,
        last: attempt,
    })
}
