//! Nested group resolution
//!
//! Turns a user's direct group memberships into role claims. With nesting
//! enabled, the directory's member-of relation is followed upwards until
//! every ancestor group has been seen once.
//!
//! Traversal is an explicit depth-first work list. Groups are keyed
//! case-insensitively in a visited set, so cycles terminate and a group
//! reachable along several paths is queried and emitted once. Roles come out
//! in the order a recursive walk would produce them. With a depth limit, a
//! group reached again along a shorter path has its ancestry re-expanded
//! from the shallower depth.

use crate::directory::DirectoryEndpoint;
use crate::filter::{group_filter, ObjectClass};
use crate::metrics;
use adclaims_core::dn::common_name;
use adclaims_core::types::{
    Diagnostic, DiagnosticKind, DirectoryEntry, RoleClaim, SearchScope, Severity,
};
use adclaims_core::Result;
use std::collections::HashMap;
use tracing::debug;

/// Bounds for traversals over untrusted or pathological directories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverLimits {
    /// Levels of ancestry followed above a starting group
    pub max_depth: Option<usize>,

    /// Distinct groups looked up in the directory
    pub max_groups: Option<usize>,
}

/// Roles discovered by one resolution, with what was observed on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub roles: Vec<RoleClaim>,
    pub diagnostics: Vec<Diagnostic>,
}

struct Pending {
    name: String,
    depth: usize,
}

/// Shallowest depth a group was expanded at, and its member-of DNs
struct Visit {
    depth: usize,
    parents: Vec<String>,
}

pub struct GroupResolver<'a, D: ?Sized> {
    directory: &'a D,
    search_base: &'a str,
    limits: ResolverLimits,
    ambiguous_match_level: Severity,
}

impl<'a, D: DirectoryEndpoint + ?Sized> GroupResolver<'a, D> {
    pub fn new(directory: &'a D, search_base: &'a str) -> Self {
        Self {
            directory,
            search_base,
            limits: ResolverLimits::default(),
            ambiguous_match_level: Severity::Warn,
        }
    }

    pub fn with_limits(mut self, limits: ResolverLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_ambiguous_match_level(mut self, level: Severity) -> Self {
        self.ambiguous_match_level = level;
        self
    }

    /// Resolve role claims for a set of starting group common names.
    ///
    /// Flat resolution emits each starting name as given, duplicates
    /// included, without touching the directory. Nested resolution emits the
    /// full DN of every group found, starting groups included.
    pub async fn resolve_roles(
        &self,
        starting_groups: &[String],
        nested: bool,
    ) -> Result<Resolution> {
        if !nested {
            return Ok(Resolution {
                roles: starting_groups.iter().map(RoleClaim::new).collect(),
                diagnostics: Vec::new(),
            });
        }

        self.resolve_nested(starting_groups).await
    }

    async fn resolve_nested(&self, starting_groups: &[String]) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        let mut visited: HashMap<String, Visit> = HashMap::new();
        let mut pending: Vec<Pending> = starting_groups
            .iter()
            .rev()
            .map(|name| Pending {
                name: name.clone(),
                depth: 0,
            })
            .collect();

        while let Some(group) = pending.pop() {
            let key = visit_key(&group.name);

            let parents = match visited.get_mut(&key) {
                Some(seen) if group.depth >= seen.depth => continue,
                Some(seen) => {
                    // reached again by a shorter path: expand further, no new lookup
                    seen.depth = group.depth;
                    resolution.diagnostics.retain(|d| {
                        !matches!(&d.kind, DiagnosticKind::DepthLimitReached { group, .. }
                            if visit_key(group) == key)
                    });
                    seen.parents.clone()
                }
                None => {
                    if let Some(limit) = self.limits.max_groups {
                        if visited.len() >= limit {
                            resolution
                                .diagnostics
                                .push(Diagnostic::new(DiagnosticKind::GroupLimitReached {
                                    limit,
                                }));
                            break;
                        }
                    }

                    let found = self
                        .find_group(&group.name, &mut resolution.diagnostics)
                        .await?;
                    let parents = match found {
                        Some(entry) => {
                            debug!(
                                group = %group.name,
                                dn = %entry.dn,
                                depth = group.depth,
                                "Resolved group"
                            );
                            let parents = entry.member_of();
                            resolution.roles.push(RoleClaim::new(entry.dn));
                            parents
                        }
                        None => Vec::new(),
                    };

                    visited.insert(
                        key,
                        Visit {
                            depth: group.depth,
                            parents: parents.clone(),
                        },
                    );
                    parents
                }
            };

            if parents.is_empty() {
                continue;
            }

            if let Some(max_depth) = self.limits.max_depth {
                if group.depth >= max_depth {
                    resolution.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::DepthLimitReached {
                            group: group.name.clone(),
                            depth: max_depth,
                        },
                    ));
                    continue;
                }
            }

            let depth = group.depth + 1;
            for dn in parents.iter().rev() {
                let name = common_name(dn)?;
                let shallower = visited
                    .get(&visit_key(name))
                    .map_or(true, |seen| depth < seen.depth);
                if shallower {
                    pending.push(Pending {
                        name: name.to_string(),
                        depth,
                    });
                }
            }
        }

        Ok(resolution)
    }

    async fn find_group(
        &self,
        name: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Option<DirectoryEntry>> {
        let filter = group_filter(name);
        debug!(filter = %filter, base_dn = %self.search_base, "Searching for group");

        metrics::record_search(ObjectClass::Group);
        let entries = self
            .directory
            .search(self.search_base, &filter, SearchScope::Subtree)
            .await
            .map_err(|e| {
                metrics::record_directory_error(ObjectClass::Group);
                e
            })?;

        if entries.len() > 1 {
            metrics::record_ambiguous_match(ObjectClass::Group);
        }

        let entry = first_match(
            entries,
            &filter,
            self.search_base,
            self.ambiguous_match_level,
            diagnostics,
        );

        if entry.is_none() {
            diagnostics.push(Diagnostic::new(DiagnosticKind::GroupNotFound {
                group: name.to_string(),
            }));
        }

        Ok(entry)
    }
}

/// Take the first entry of a result set expected to hold at most one,
/// recording an ambiguous-match diagnostic when it holds more.
pub fn first_match(
    entries: Vec<DirectoryEntry>,
    filter: &str,
    base_dn: &str,
    ambiguous_match_level: Severity,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<DirectoryEntry> {
    let count = entries.len();
    if count > 1 {
        diagnostics.push(
            Diagnostic::new(DiagnosticKind::AmbiguousMatch {
                filter: filter.to_string(),
                base_dn: base_dn.to_string(),
                count,
            })
            .with_severity(ambiguous_match_level),
        );
    }

    entries.into_iter().next()
}

fn visit_key(name: &str) -> String {
    name.to_lowercase()
}
