use std::fmt;

/// # Status
/// neighbor conversation states, ordered by progress toward a full
/// adjacency.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Status {
    Down,
    Init,
    TwoWay,
    ExStart,
    Exchange,
    Loading,
    Full,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Status::Down => "down",
            Status::Init => "init",
            Status::TwoWay => "two-way",
            Status::ExStart => "exstart",
            Status::Exchange => "exchange",
            Status::Loading => "loading",
            Status::Full => "full",
        };
        write!(f, "{}", name)
    }
}
