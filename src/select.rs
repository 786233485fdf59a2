use crate::options::PageBreakMode;
use crate::visual::{NodeMatcher, Visual};

/// Picks the nodes that are captured independently. Never empty: when the
/// selector matches nothing the root is used alone.
pub fn select_nodes<V: Visual>(root: &V, mode: PageBreakMode, selector: &str) -> Vec<V> {
    let matcher = match mode {
        PageBreakMode::None => return vec![root.clone()],
        PageBreakMode::Class => NodeMatcher::class(selector),
        PageBreakMode::Tag => NodeMatcher::tag(selector),
    };
    let found = root.descendants_matching(|node| matcher.matches(node));
    if found.is_empty() {
        log::debug!(
            "selector '{}' ({}) matched nothing, rendering root",
            selector,
            mode.as_str()
        );
        return vec![root.clone()];
    }
    found
}
