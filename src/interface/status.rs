use std::fmt;

/// # Status
/// interface states ordered by responsibility on the segment.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Status {
    Down,
    Waiting,
    PointToPoint,
    DrOther,
    Backup,
    Dr,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Status::Down => "down",
            Status::Waiting => "waiting",
            Status::PointToPoint => "point-to-point",
            Status::DrOther => "drother",
            Status::Backup => "backup",
            Status::Dr => "dr",
        };
        write!(f, "{}", name)
    }
}
