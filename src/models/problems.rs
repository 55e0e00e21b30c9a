#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProblemSetId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProblemId(pub u64);
