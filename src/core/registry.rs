//! Insertion-ordered binding of states to their nodes.

use super::state::State;
use indexmap::IndexSet;

/// One node per state, kept in registration order.
///
/// States and nodes live in parallel collections so a hook can borrow its
/// own node mutably while the set of registered states stays readable.
pub(crate) struct Registry<S: State, N> {
    states: IndexSet<S>,
    nodes: Vec<N>,
}

impl<S: State, N> Default for Registry<S, N> {
    fn default() -> Self {
        Self {
            states: IndexSet::new(),
            nodes: Vec::new(),
        }
    }
}

impl<S: State, N> Registry<S, N> {
    pub(crate) fn states(&self) -> &IndexSet<S> {
        &self.states
    }

    pub(crate) fn contains(&self, state: &S) -> bool {
        self.states.contains(state)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Bind `node` to `state`. A state that is already bound keeps its
    /// position and the displaced node is returned.
    pub(crate) fn insert(&mut self, state: S, node: N) -> Option<N> {
        let (index, inserted) = self.states.insert_full(state);
        if inserted {
            self.nodes.push(node);
            None
        } else {
            Some(std::mem::replace(&mut self.nodes[index], node))
        }
    }

    pub(crate) fn remove(&mut self, state: &S) -> Option<N> {
        let (index, _) = self.states.shift_remove_full(state)?;
        Some(self.nodes.remove(index))
    }

    /// Borrow the registered state set alongside one node.
    pub(crate) fn split_mut(&mut self, state: &S) -> Option<(&IndexSet<S>, &mut N)> {
        let index = self.states.get_index_of(state)?;
        Some((&self.states, &mut self.nodes[index]))
    }

    /// The earliest registered state still bound.
    pub(crate) fn first(&self) -> Option<&S> {
        self.states.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_enum;

    state_enum! {
        enum TestState {
            Init,
            Loading,
            Shutdown,
        }
    }

    #[test]
    fn insert_preserves_registration_order() {
        let mut registry = Registry::default();
        registry.insert(TestState::Shutdown, 3);
        registry.insert(TestState::Init, 1);
        registry.insert(TestState::Loading, 2);

        let order: Vec<_> = registry.states().iter().cloned().collect();
        assert_eq!(
            order,
            vec![TestState::Shutdown, TestState::Init, TestState::Loading]
        );
    }

    #[test]
    fn replacing_keeps_position_and_returns_old_node() {
        let mut registry = Registry::default();
        registry.insert(TestState::Init, 1);
        registry.insert(TestState::Loading, 2);

        let displaced = registry.insert(TestState::Init, 10);

        assert_eq!(displaced, Some(1));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.states().get_index_of(&TestState::Init), Some(0));
        let (_, node) = registry.split_mut(&TestState::Init).unwrap();
        assert_eq!(*node, 10);
    }

    #[test]
    fn remove_keeps_states_and_nodes_aligned() {
        let mut registry = Registry::default();
        registry.insert(TestState::Init, 1);
        registry.insert(TestState::Loading, 2);
        registry.insert(TestState::Shutdown, 3);

        assert_eq!(registry.remove(&TestState::Loading), Some(2));
        assert_eq!(registry.remove(&TestState::Loading), None);

        let (states, node) = registry.split_mut(&TestState::Shutdown).unwrap();
        assert!(!states.contains(&TestState::Loading));
        assert_eq!(*node, 3);
    }

    #[test]
    fn first_follows_registration_order() {
        let mut registry = Registry::default();
        registry.insert(TestState::Loading, 2);
        registry.insert(TestState::Init, 1);
        assert_eq!(registry.first(), Some(&TestState::Loading));

        registry.remove(&TestState::Loading);
        assert_eq!(registry.first(), Some(&TestState::Init));
        registry.remove(&TestState::Init);
        assert_eq!(registry.first(), None);
    }
}
