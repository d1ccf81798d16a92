/// Location of a leaf record inside a group tree.
///
/// The first step indexes the root groups, the middle steps index subgroups,
/// and the last step is the record's position inside its leaf group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupPath(Vec<usize>);

impl GroupPath {
    pub fn new(steps: Vec<usize>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[usize] {
        &self.0
    }

    /// Steps addressing the leaf group.
    pub fn group_steps(&self) -> &[usize] {
        match self.0.split_last() {
            Some((_, group)) => group,
            None => &[],
        }
    }

    pub fn leaf_index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for GroupPath {
    fn from(steps: Vec<usize>) -> Self {
        Self(steps)
    }
}
