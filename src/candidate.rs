use std::fmt;

/// Compound identity of a cached object: an application label plus the
/// object's own id within that application.
///
/// A generic, possibly-expensive-to-clone key would usually be wrapped in
/// `Arc` so cloning it for a second index stays cheap. Here the key is two
/// integers, already `Copy`, so that indirection would buy nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate {
    pub app_id: i32,
    pub object_id: i64,
}

impl Candidate {
    pub fn new(app_id: i32, object_id: i64) -> Self {
        Candidate { app_id, object_id }
    }

    /// The application's class for LHD's per-class histograms: `appId mod APP_CLASSES`.
    pub fn app_class(&self, app_classes: u32) -> u32 {
        self.app_id.rem_euclid(app_classes as i32) as u32
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.app_id, self.object_id)
    }
}
