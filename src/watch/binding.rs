//! Watch bindings: which changes re-run which tasks.

use std::path::Path;

use crate::compose::Step;
use crate::registry::{Category, PathRegistry, SourceSet};
use crate::task::TaskId;

/// Globs mapped to a task sequence. Never mutated once built.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub name: &'static str,
    sources: Vec<SourceSet>,
    pub tasks: Vec<TaskId>,
    /// Broadcast a reload after a clean run.
    pub reload: bool,
}

impl WatchBinding {
    pub fn new(name: &'static str, sources: Vec<SourceSet>, tasks: Vec<TaskId>, reload: bool) -> Self {
        Self {
            name,
            sources,
            tasks,
            reload,
        }
    }

    /// Binding over registry categories.
    pub fn for_categories(
        name: &'static str,
        registry: &PathRegistry,
        categories: &[Category],
        tasks: &[TaskId],
    ) -> Self {
        let sources = categories
            .iter()
            .map(|&c| registry.sources(c).clone())
            .collect();
        Self::new(name, sources, tasks.to_vec(), true)
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.sources.iter().any(|s| s.matches(path))
    }

    /// The tasks as a series step.
    pub fn step(&self) -> Step {
        Step::tasks(&self.tasks)
    }

    /// Include patterns, for listing.
    pub fn patterns(&self) -> Vec<String> {
        self.sources
            .iter()
            .flat_map(|s| {
                let base = s.base().to_path_buf();
                s.include_patterns()
                    .iter()
                    .map(move |p| base.join(p).display().to_string())
            })
            .collect()
    }
}

/// Dev session bindings, one per category group.
pub fn default_bindings(registry: &PathRegistry) -> Vec<WatchBinding> {
    use Category as C;

    vec![
        WatchBinding::for_categories("html", registry, &[C::Html], &[TaskId::Pages]),
        WatchBinding::for_categories("templates", registry, &[C::Templates], &[]),
        WatchBinding::for_categories("scripts", registry, &[C::Scripts], &[TaskId::Scripts]),
        WatchBinding::for_categories("vendor", registry, &[C::Vendor], &[TaskId::Vendor]),
        WatchBinding::for_categories("styles", registry, &[C::Styles], &[TaskId::Styles]),
        WatchBinding::for_categories("images", registry, &[C::Images], &[TaskId::Images]),
        WatchBinding::for_categories("assets", registry, &[C::Fonts, C::Assets], &[TaskId::Assets]),
    ]
}
