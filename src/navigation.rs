// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Role-gated navigation.
//!
//! Maps a role (or no role) to the sidebar sections it may see. The policy
//! is a static rule table evaluated top to bottom; every matching rule
//! contributes its sections, in table order, to its group. Settings is
//! appended for everyone.
//!
//! An absent or unrecognized role matches no rule, so it sees Settings and
//! nothing else.

use serde::Serialize;

use crate::types::Role;

/// A named area of the dashboard reachable from the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NavigationSection {
    MyProject,
    MyDashboard,
    #[serde(rename = "CRM")]
    Crm,
    Calendar,
    Tasks,
    Meetings,
    Companies,
    ClientTracker,
    Reports,
    TeamPerformance,
    Settings,
}

/// How a section decides whether it is the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMatch {
    /// Only the route itself.
    Exact,
    /// The route and anything beneath it (detail pages).
    Prefix,
}

impl NavigationSection {
    pub fn route(&self) -> &'static str {
        match self {
            Self::MyProject => "/portal",
            Self::MyDashboard => "/dashboard",
            Self::Crm => "/crm",
            Self::Calendar => "/calendar",
            Self::Tasks => "/tasks",
            Self::Meetings => "/meetings",
            Self::Companies => "/companies",
            Self::ClientTracker => "/client-tracker",
            Self::Reports => "/reports",
            Self::TeamPerformance => "/admin/performance",
            Self::Settings => "/settings",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MyProject => "My Project",
            Self::MyDashboard => "My Dashboard",
            Self::Crm => "CRM & Leads",
            Self::Calendar => "Universal Calendar",
            Self::Tasks => "Tasks",
            Self::Meetings => "Meeting Tracker",
            Self::Companies => "Companies",
            Self::ClientTracker => "Client Tracker",
            Self::Reports => "Reports",
            Self::TeamPerformance => "Team Performance",
            Self::Settings => "Settings",
        }
    }

    pub fn route_match(&self) -> RouteMatch {
        match self {
            Self::Tasks | Self::Meetings | Self::Companies | Self::ClientTracker => RouteMatch::Prefix,
            _ => RouteMatch::Exact,
        }
    }

    /// Whether `path` should highlight this section.
    pub fn is_active(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let route = self.route();
        match self.route_match() {
            RouteMatch::Exact => path == route,
            RouteMatch::Prefix => {
                path == route
                    || path
                        .strip_prefix(route)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

impl std::fmt::Display for NavigationSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Drop any query string or fragment and a trailing slash.
fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Sidebar group a section is rendered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavGroup {
    Primary,
    Analytics,
}

/// Who a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    /// Clients only.
    Client,
    /// Any internal role.
    Internal,
    /// Internal roles at least as senior as the given one.
    AtLeast(Role),
}

impl Audience {
    fn admits(&self, role: Role) -> bool {
        match self {
            Audience::Client => role.is_client(),
            Audience::Internal => !role.is_client(),
            Audience::AtLeast(required) => role.at_least(*required),
        }
    }
}

struct NavRule {
    audience: Audience,
    group: NavGroup,
    sections: &'static [NavigationSection],
}

const RULES: &[NavRule] = &[
    NavRule {
        audience: Audience::Client,
        group: NavGroup::Primary,
        sections: &[NavigationSection::MyProject],
    },
    NavRule {
        audience: Audience::Internal,
        group: NavGroup::Primary,
        sections: &[NavigationSection::MyDashboard],
    },
    NavRule {
        audience: Audience::AtLeast(Role::Admin),
        group: NavGroup::Primary,
        sections: &[NavigationSection::Crm],
    },
    NavRule {
        audience: Audience::AtLeast(Role::Employee),
        group: NavGroup::Primary,
        sections: &[
            NavigationSection::Calendar,
            NavigationSection::Tasks,
            NavigationSection::Meetings,
            NavigationSection::Companies,
            NavigationSection::ClientTracker,
        ],
    },
    NavRule {
        audience: Audience::AtLeast(Role::SuperAdmin),
        group: NavGroup::Analytics,
        sections: &[NavigationSection::Reports, NavigationSection::TeamPerformance],
    },
];

/// The sidebar a role gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SidebarView {
    pub primary: Vec<NavigationSection>,
    /// Empty for everyone except super admins.
    pub analytics: Vec<NavigationSection>,
    /// Always `[Settings]`.
    pub footer: Vec<NavigationSection>,
}

impl SidebarView {
    /// All visible sections in render order: primary, analytics, footer.
    pub fn all(&self) -> Vec<NavigationSection> {
        self.primary
            .iter()
            .chain(self.analytics.iter())
            .chain(self.footer.iter())
            .copied()
            .collect()
    }

    pub fn contains(&self, section: NavigationSection) -> bool {
        self.primary.contains(&section)
            || self.analytics.contains(&section)
            || self.footer.contains(&section)
    }

    pub fn group(&self, group: NavGroup) -> &[NavigationSection] {
        match group {
            NavGroup::Primary => &self.primary,
            NavGroup::Analytics => &self.analytics,
        }
    }

    /// The visible section `path` belongs to, if any.
    pub fn active_section(&self, path: &str) -> Option<NavigationSection> {
        self.all().into_iter().find(|section| section.is_active(path))
    }
}

/// Visible sections for `role`. `None` means unauthenticated.
pub fn sections_for(role: Option<Role>) -> SidebarView {
    let mut view = SidebarView::default();

    if let Some(role) = role {
        for rule in RULES.iter().filter(|rule| rule.audience.admits(role)) {
            let target = match rule.group {
                NavGroup::Primary => &mut view.primary,
                NavGroup::Analytics => &mut view.analytics,
            };
            target.extend_from_slice(rule.sections);
        }
    }

    view.footer.push(NavigationSection::Settings);
    view
}

/// Visible sections for a raw role tag. Unknown tags are treated as no role.
pub fn sections_for_tag(tag: Option<&str>) -> SidebarView {
    let role = tag.and_then(|raw| {
        let parsed = Role::parse(raw);
        if parsed.is_none() {
            tracing::warn!("NAV_UNKNOWN_ROLE | role={} | falling back to no sections", raw);
        }
        parsed
    });
    sections_for(role)
}

#[cfg(test)]
mod tests {
    use super::NavigationSection::*;
    use super::*;
    use std::collections::HashSet;

    fn set(view: &SidebarView) -> HashSet<NavigationSection> {
        view.all().into_iter().collect()
    }

    #[test]
    fn test_admin_primary_and_analytics() {
        let view = sections_for(Some(Role::Admin));
        assert_eq!(
            view.primary,
            vec![MyDashboard, Crm, Calendar, Tasks, Meetings, Companies, ClientTracker]
        );
        assert!(view.analytics.is_empty());
        assert_eq!(view.footer, vec![Settings]);
    }

    #[test]
    fn test_super_admin_sees_analytics() {
        let view = sections_for(Some(Role::SuperAdmin));
        assert_eq!(view.analytics, vec![Reports, TeamPerformance]);
        assert_eq!(view.primary[0], MyDashboard);
        assert!(view.contains(Crm));
    }

    #[test]
    fn test_employee_has_no_crm() {
        let view = sections_for(Some(Role::Employee));
        assert_eq!(
            view.primary,
            vec![MyDashboard, Calendar, Tasks, Meetings, Companies, ClientTracker]
        );
        assert!(!view.contains(Crm));
        assert!(view.analytics.is_empty());
    }

    #[test]
    fn test_client_is_disjoint_from_internal_sections() {
        let view = sections_for(Some(Role::Client));
        assert_eq!(view.all(), vec![MyProject, Settings]);
        for forbidden in [Crm, Tasks, Meetings, Companies, ClientTracker, Reports, TeamPerformance, MyDashboard, Calendar] {
            assert!(!view.contains(forbidden), "{:?} leaked to client", forbidden);
        }
    }

    #[test]
    fn test_absent_role_sees_settings_only() {
        let view = sections_for(None);
        assert_eq!(view.all(), vec![Settings]);
        assert!(view.primary.is_empty());
        assert!(view.analytics.is_empty());
    }

    #[test]
    fn test_unknown_tag_is_denied_by_default() {
        assert_eq!(sections_for_tag(Some("ROLE_OWNER")), sections_for(None));
        assert_eq!(sections_for_tag(Some("admin")), sections_for(None));
        assert_eq!(sections_for_tag(None), sections_for(None));
        assert_eq!(sections_for_tag(Some("ROLE_ADMIN")), sections_for(Some(Role::Admin)));
    }

    #[test]
    fn test_analytics_only_for_super_admin() {
        for role in Role::ALL {
            let view = sections_for(Some(role));
            assert_eq!(!view.analytics.is_empty(), role == Role::SuperAdmin, "{:?}", role);
        }
    }

    #[test]
    fn test_seniority_inherits_navigation() {
        let employee = set(&sections_for(Some(Role::Employee)));
        let admin = set(&sections_for(Some(Role::Admin)));
        let super_admin = set(&sections_for(Some(Role::SuperAdmin)));

        assert!(admin.is_superset(&employee));
        assert!(super_admin.is_superset(&admin));

        let mut expected: HashSet<_> = employee.clone();
        expected.extend([Crm, Reports, TeamPerformance]);
        assert!(super_admin.is_superset(&expected));
    }

    #[test]
    fn test_settings_is_always_last() {
        for role in Role::ALL.into_iter().map(Some).chain([None]) {
            assert_eq!(sections_for(role).all().last(), Some(&Settings));
        }
    }

    #[test]
    fn test_exact_route_matching() {
        assert!(MyDashboard.is_active("/dashboard"));
        assert!(MyDashboard.is_active("/dashboard/"));
        assert!(MyDashboard.is_active("/dashboard?tab=1"));
        assert!(!MyDashboard.is_active("/dashboard/widgets"));
        assert!(TeamPerformance.is_active("/admin/performance"));
    }

    #[test]
    fn test_prefix_route_matching() {
        assert!(Tasks.is_active("/tasks"));
        assert!(Tasks.is_active("/tasks/42"));
        assert!(!Tasks.is_active("/tasksboard"));
        assert!(ClientTracker.is_active("/client-tracker/7/notes"));
    }

    #[test]
    fn test_active_section_respects_visibility() {
        let employee = sections_for(Some(Role::Employee));
        assert_eq!(employee.active_section("/meetings/3"), Some(Meetings));
        assert_eq!(employee.active_section("/crm"), None);
        assert_eq!(employee.active_section("/settings"), Some(Settings));
    }

    #[test]
    fn test_group_accessor() {
        let view = sections_for(Some(Role::SuperAdmin));
        assert_eq!(view.group(NavGroup::Analytics), &[Reports, TeamPerformance]);
        assert_eq!(view.group(NavGroup::Primary).len(), 7);
    }
}
